use chrono::{DateTime, Utc};
use git2::Oid;
use smallvec::SmallVec;

/// Number of hex digits shown for abbreviated commit ids.
pub const SHORT_ID_LEN: usize = 7;

pub type ParentIds = SmallVec<[Oid; 2]>;

/// Name, e-mail and time of an author or committer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub time: DateTime<Utc>,
}

/// Commit metadata as read from the repository, before classification
#[derive(Debug, Clone)]
pub struct RawCommit {
    pub id: Oid,
    pub parent_ids: ParentIds,
    pub author: Signature,
    pub committer: Signature,
    pub subject: String,
    pub body: String,
    pub branch_labels: Vec<String>,
    pub is_head: bool,
}

/// Position of a commit in the commit graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitKind {
    /// No parents
    Initial,
    /// Parents exist but cannot be resolved locally (shallow or grafted edge)
    Boundary,
    /// Exactly one parent
    Regular,
    /// Two parents sharing a common ancestor
    Merge,
    /// Two parents without a common ancestor
    Subtree,
    /// More than two parents
    Octopus,
}

impl CommitKind {
    /// Kinds that hide a side history which can be unfolded
    pub fn is_foldable(self) -> bool {
        matches!(self, CommitKind::Merge | CommitKind::Subtree | CommitKind::Octopus)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FoldState {
    Folded,
    Unfolded,
}

/// A classified commit as displayed in the history
#[derive(Debug, Clone)]
pub struct Commit {
    id: Oid,
    short_id: String,
    parent_ids: ParentIds,
    author: Signature,
    author_date: String,
    committer: Signature,
    subject: String,
    body: String,
    branch_labels: Vec<String>,
    is_head: bool,
    kind: CommitKind,
    level: usize,
    fold_state: Option<FoldState>,
    is_commit_link: bool,
    is_fork_point: bool,
}

impl Commit {
    pub fn new(raw: RawCommit, kind: CommitKind, level: usize) -> Self {
        let mut short_id = raw.id.to_string();
        short_id.truncate(SHORT_ID_LEN);
        let author_date = relative_date(raw.author.time, Utc::now());
        let fold_state = kind.is_foldable().then_some(FoldState::Folded);

        Self {
            id: raw.id,
            short_id,
            parent_ids: raw.parent_ids,
            author: raw.author,
            author_date,
            committer: raw.committer,
            subject: raw.subject,
            body: raw.body,
            branch_labels: raw.branch_labels,
            is_head: raw.is_head,
            kind,
            level,
            fold_state,
            is_commit_link: false,
            is_fork_point: false,
        }
    }

    /// Turn the record into a link row pointing at the commit displayed elsewhere.
    /// Link rows never fold.
    pub(crate) fn into_link(mut self) -> Self {
        self.is_commit_link = true;
        self.fold_state = None;
        self
    }

    pub fn id(&self) -> Oid {
        self.id
    }

    pub fn short_id(&self) -> &str {
        &self.short_id
    }

    pub fn parent_ids(&self) -> &[Oid] {
        &self.parent_ids
    }

    /// First parent, followed by first-parent walks
    pub fn first_parent(&self) -> Option<Oid> {
        self.parent_ids.first().copied()
    }

    pub fn author_name(&self) -> &str {
        &self.author.name
    }

    pub fn author_email(&self) -> &str {
        &self.author.email
    }

    pub fn author_time(&self) -> DateTime<Utc> {
        self.author.time
    }

    /// Author date relative to the moment the record was built, e.g. "3 days ago"
    pub fn author_date(&self) -> &str {
        &self.author_date
    }

    pub fn committer_name(&self) -> &str {
        &self.committer.name
    }

    pub fn committer_email(&self) -> &str {
        &self.committer.email
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn branch_labels(&self) -> &[String] {
        &self.branch_labels
    }

    pub fn is_head(&self) -> bool {
        self.is_head
    }

    pub fn kind(&self) -> CommitKind {
        self.kind
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// `None` for kinds which cannot be folded
    pub fn fold_state(&self) -> Option<FoldState> {
        self.fold_state
    }

    pub fn is_foldable(&self) -> bool {
        !self.is_commit_link && self.kind.is_foldable()
    }

    pub fn is_folded(&self) -> bool {
        self.fold_state == Some(FoldState::Folded)
    }

    /// Row standing for the commit where a side line rejoins history shown elsewhere
    pub fn is_commit_link(&self) -> bool {
        self.is_commit_link
    }

    /// A side history branched off at this commit
    pub fn is_fork_point(&self) -> bool {
        self.is_fork_point
    }

    pub(crate) fn set_fork_point(&mut self, is_fork_point: bool) {
        self.is_fork_point = is_fork_point;
    }

    pub(crate) fn set_fold_state(&mut self, state: FoldState) {
        if self.fold_state.is_some() {
            self.fold_state = Some(state);
        }
    }

    /// Substring match over short id, subject, author name and branch labels
    pub fn matches(&self, needle: &str, ignore_case: bool) -> bool {
        let candidates = [
            self.short_id.as_str(),
            self.subject.as_str(),
            self.author.name.as_str(),
        ];
        let labels = self.branch_labels.iter().map(String::as_str);

        if ignore_case {
            let needle = needle.to_lowercase();
            candidates
                .into_iter()
                .chain(labels)
                .any(|text| text.to_lowercase().contains(&needle))
        } else {
            candidates.into_iter().chain(labels).any(|text| text.contains(needle))
        }
    }
}

/// Human relative date in the style of `git log --date=relative`
pub fn relative_date(time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - time).num_seconds();
    if seconds < 0 {
        return "in the future".to_string();
    }

    let (amount, unit) = match seconds {
        0..=89 => (seconds, "second"),
        90..=5_399 => ((seconds + 30) / 60, "minute"),
        5_400..=129_599 => ((seconds + 1_800) / 3_600, "hour"),
        129_600..=1_209_599 => ((seconds + 43_200) / 86_400, "day"),
        1_209_600..=5_183_999 => ((seconds + 302_400) / 604_800, "week"),
        5_184_000..=31_535_999 => ((seconds + 1_296_000) / 2_592_000, "month"),
        _ => ((seconds + 15_768_000) / 31_536_000, "year"),
    };

    if amount == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", amount, unit)
    }
}
