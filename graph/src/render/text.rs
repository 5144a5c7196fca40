use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::core::commit::{Commit, CommitKind, FoldState};

/// Terminal colors a row may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub fg: Color,
    pub bold: bool,
    pub reverse: bool,
}

impl Style {
    pub fn fg(color: Color) -> Self {
        Self {
            fg: color,
            ..Self::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

/// A styled piece of a rendered row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub style: Style,
    pub text: String,
}

impl Fragment {
    pub fn new(style: Style, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(Style::default(), text)
    }
}

/// Everything a formatter needs to render one history row
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    pub index: usize,
    pub commit: &'a Commit,
    pub selected: bool,
    /// Widest author date materialized so far
    pub date_max_len: usize,
    /// Widest author name materialized so far
    pub name_max_len: usize,
}

/// Turns a history row into styled fragments
pub trait RowFormatter {
    fn format(&self, row: &RowView<'_>) -> Vec<Fragment>;
}

/// `<fold marker> <id> <date> <author> <subject> (<labels>)`, indented by level
#[derive(Debug, Clone)]
pub struct DefaultFormatter {
    /// Upper bound for the author column
    pub author_name_width: usize,
    /// Fixed date column width, 0 to fit the widest date
    pub author_date_width: usize,
}

impl Default for DefaultFormatter {
    fn default() -> Self {
        Self {
            author_name_width: 10,
            author_date_width: 0,
        }
    }
}

impl DefaultFormatter {
    fn marker(commit: &Commit) -> (&'static str, Color) {
        if commit.is_commit_link() {
            return ("↳", Color::Yellow);
        }
        match (commit.kind(), commit.fold_state()) {
            (_, Some(FoldState::Folded)) => ("▸", Color::Cyan),
            (_, Some(FoldState::Unfolded)) => ("▾", Color::Cyan),
            (CommitKind::Initial, _) => ("◉", Color::Default),
            (CommitKind::Boundary, _) => ("○", Color::Red),
            _ if commit.is_fork_point() => ("●", Color::Green),
            _ => ("●", Color::Default),
        }
    }
}

impl RowFormatter for DefaultFormatter {
    fn format(&self, row: &RowView<'_>) -> Vec<Fragment> {
        let commit = row.commit;
        let date_width = match self.author_date_width {
            0 => row.date_max_len,
            width => width,
        };
        let name_width = self.author_name_width.min(row.name_max_len);
        let (marker, marker_color) = Self::marker(commit);

        let mut fragments = vec![
            Fragment::plain("  ".repeat(commit.level())),
            Fragment::new(Style::fg(marker_color), marker),
            Fragment::plain(" "),
            Fragment::new(Style::fg(Color::Magenta), commit.short_id()),
            Fragment::plain(" "),
            Fragment::new(
                Style::fg(Color::Blue),
                adjust_string(commit.author_date(), date_width),
            ),
            Fragment::plain(" "),
            Fragment::new(
                Style::fg(Color::Green),
                adjust_string(commit.author_name(), name_width),
            ),
            Fragment::plain(" "),
            Fragment::plain(commit.subject()),
        ];

        if !commit.branch_labels().is_empty() {
            let mut style = Style::fg(Color::Yellow);
            if commit.is_head() {
                style = style.bold();
            }
            fragments.push(Fragment::plain(" "));
            let labels = format!("({})", commit.branch_labels().join(", "));
            fragments.push(Fragment::new(style, labels));
        }
        fragments
    }
}

/// Pad or truncate `text` to exactly `width` display columns.
///
/// Truncated text ends in `…`. Grapheme clusters are never split.
pub fn adjust_string(text: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }

    let actual = text.width();
    if actual <= width {
        return format!("{}{}", text, " ".repeat(width - actual));
    }

    let mut result = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let grapheme_width = grapheme.width();
        if used + grapheme_width > width - 1 {
            break;
        }
        result.push_str(grapheme);
        used += grapheme_width;
    }
    result.push('…');
    used += 1;

    result.push_str(&" ".repeat(width - used));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commit::{ParentIds, RawCommit, Signature};
    use chrono::Utc;
    use git2::Oid;

    fn commit(kind: CommitKind, level: usize, labels: &[&str]) -> Commit {
        let signature = Signature {
            name: "Bartholomew".to_string(),
            email: "b@example.com".to_string(),
            time: Utc::now(),
        };
        let raw = RawCommit {
            id: Oid::from_str("abcdef0123456789abcdef0123456789abcdef01").unwrap(),
            parent_ids: ParentIds::new(),
            author: signature.clone(),
            committer: signature,
            subject: "Fix the parser".to_string(),
            body: String::new(),
            branch_labels: labels.iter().map(|l| l.to_string()).collect(),
            is_head: true,
        };
        Commit::new(raw, kind, level)
    }

    fn text(fragments: &[Fragment]) -> String {
        fragments.iter().map(|f| f.text.as_str()).collect()
    }

    #[test]
    fn test_adjust_string() {
        assert_eq!(adjust_string("abc", 5), "abc  ");
        assert_eq!(adjust_string("abcde", 5), "abcde");
        assert_eq!(adjust_string("abcdefgh", 5), "abcd…");
        assert_eq!(adjust_string("anything", 0), "");
        assert_eq!(adjust_string("abc", 1), "…");
    }

    #[test]
    fn test_adjust_string_wide_characters() {
        // each CJK character takes two columns
        let adjusted = adjust_string("你好世界", 6);
        assert_eq!(adjusted, "你好… ");
        assert_eq!(adjusted.width(), 6);
    }

    #[test]
    fn test_default_formatter_columns() {
        let commit = commit(CommitKind::Regular, 0, &["main", "v1"]);
        let row = RowView {
            index: 0,
            commit: &commit,
            selected: false,
            date_max_len: 16,
            name_max_len: 11,
        };
        let fragments = DefaultFormatter::default().format(&row);
        let line = text(&fragments);

        assert!(line.starts_with("● abcdef0 "));
        assert!(line.contains("Bartholom… Fix the parser (main, v1)"));
        let labels = fragments.last().unwrap();
        assert!(labels.style.bold);
        assert_eq!(labels.style.fg, Color::Yellow);
    }

    #[test]
    fn test_default_formatter_fold_markers_and_indent() {
        let formatter = DefaultFormatter {
            author_name_width: 20,
            author_date_width: 3,
        };
        let merge = commit(CommitKind::Merge, 1, &[]);
        let row = RowView {
            index: 3,
            commit: &merge,
            selected: false,
            date_max_len: 0,
            name_max_len: 11,
        };
        let line = text(&formatter.format(&row));
        assert!(line.starts_with("  ▸ abcdef0 "));
        assert!(line.ends_with("Bartholomew Fix the parser"));
    }

    #[test]
    fn test_default_formatter_link_and_fork_markers() {
        let link = commit(CommitKind::Merge, 1, &[]).into_link();
        let row = RowView {
            index: 4,
            commit: &link,
            selected: false,
            date_max_len: 0,
            name_max_len: 11,
        };
        let fragments = DefaultFormatter::default().format(&row);
        assert_eq!(fragments[1].text, "↳");
        assert_eq!(fragments[1].style.fg, Color::Yellow);

        let mut fork = commit(CommitKind::Regular, 0, &[]);
        fork.set_fork_point(true);
        let row = RowView { commit: &fork, ..row };
        let fragments = DefaultFormatter::default().format(&row);
        assert_eq!(fragments[1].text, "●");
        assert_eq!(fragments[1].style.fg, Color::Green);
    }
}
