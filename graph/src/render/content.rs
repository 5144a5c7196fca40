use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use super::text::{Fragment, RowFormatter, RowView};
use super::viewport::Viewport;
use crate::core::commit::Commit;
use crate::core::history::History;
use crate::error::{HistoryError, Result};
use crate::git_backend::{HistoryWalker, Repository, Revision};

/// What to show and how much to fetch at a time
#[derive(Debug, Clone)]
pub struct ContentConfig {
    /// Revision expression for the top-level walk, a commit or an `A..B` range
    pub revision: String,
    /// Restrict the top-level walk to commits touching these paths
    pub paths: Vec<PathBuf>,
    /// Viewport height, also the number of rows fetched per search extension
    pub page_size: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            revision: "HEAD".to_string(),
            paths: Vec::new(),
            page_size: 40,
        }
    }
}

/// History content shared between the UI thread and a running search
pub type SharedContent = Arc<Mutex<HistoryContent>>;

/// Lock shared content; a poisoned lock still guards a consistent history
pub fn lock(content: &Mutex<HistoryContent>) -> MutexGuard<'_, HistoryContent> {
    content.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Serves history rows to a renderer, fetching more commits on demand
pub struct HistoryContent {
    repo: Repository,
    revision: Revision,
    paths: Vec<PathBuf>,
    history: History,
    /// Expected number of top-level rows
    estimate: usize,
    /// A short read proved the end of the top-level walk
    exhausted: bool,
    viewport: Viewport,
    status: Option<String>,
}

impl HistoryContent {
    /// Resolve the revision, check the paths and fetch the first page
    pub fn open(repo: Repository, config: &ContentConfig) -> Result<Self> {
        let revision = repo.resolve(&config.revision)?;
        repo.check_paths(&revision, &config.paths)?;
        let estimate = repo.history_length(&revision, &config.paths)?;
        info!(revision = %config.revision, estimate, "opened history");

        let mut content = Self {
            repo,
            revision,
            paths: config.paths.clone(),
            history: History::new(),
            estimate,
            exhausted: false,
            viewport: Viewport::new(config.page_size),
            status: None,
        };
        let page_size = content.page_size();
        content.fill_up(page_size)?;
        Ok(content)
    }

    pub fn into_shared(self) -> SharedContent {
        Arc::new(Mutex::new(self))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Rows known or expected: top-level estimate plus unfolded rows
    pub fn line_count(&self) -> usize {
        self.estimate.max(self.history.top_level_count()) + self.history.nested_count()
    }

    pub fn page_size(&self) -> usize {
        self.viewport.height
    }

    /// Append up to `amount` top-level commits, returning how many were fetched.
    ///
    /// A short count means the history ended.
    pub fn fill_up(&mut self, amount: usize) -> Result<usize> {
        if amount == 0 {
            return Err(HistoryError::invalid_argument("fill_up amount must be positive"));
        }
        if self.exhausted {
            return Ok(0);
        }

        let skip = self.history.top_level_count();
        let above = self
            .history
            .commits()
            .iter()
            .rev()
            .find(|c| c.level() == 0)
            .cloned();
        let walker = HistoryWalker::new(&self.repo);
        let mut fetched = 0;
        let commits = walker
            .top_level(&self.revision, &self.paths, skip, amount)
            .below(above);
        for commit in commits {
            self.history.push(commit?);
            fetched += 1;
        }

        if fetched < amount {
            self.exhausted = true;
            self.estimate = self.history.top_level_count();
        }
        debug!(skip, amount, fetched, "filled up");
        Ok(fetched)
    }

    /// The record at row `n`, fetching up to it if needed
    pub fn commit_at(&mut self, n: usize) -> Result<Option<&Commit>> {
        self.materialize(n)?;
        Ok(self.history.get(n))
    }

    fn materialize(&mut self, n: usize) -> Result<()> {
        let length = self.history.len();
        if n >= length {
            self.fill_up(n - length + 1)?;
        }
        Ok(())
    }

    /// Render row `n`, highlighted when it holds the cursor.
    /// `None` past the end of history.
    pub fn get_line<F: RowFormatter + ?Sized>(
        &mut self,
        n: usize,
        formatter: &F,
    ) -> Result<Option<Vec<Fragment>>> {
        self.materialize(n)?;
        let Some(commit) = self.history.get(n) else {
            return Ok(None);
        };

        let selected = n == self.viewport.cursor;
        let row = RowView {
            index: n,
            commit,
            selected,
            date_max_len: self.history.date_max_len(),
            name_max_len: self.history.name_max_len(),
        };

        let mut fragments = formatter.format(&row);
        if selected {
            for fragment in &mut fragments {
                fragment.style.reverse = true;
            }
        }
        Ok(Some(fragments))
    }

    /// Already materialized record at `index`
    pub fn current(&self, index: usize) -> Option<&Commit> {
        self.history.get(index)
    }

    pub fn is_folded(&self, index: usize) -> bool {
        self.history.is_folded(index)
    }

    pub fn is_foldable(&self, index: usize) -> bool {
        self.history.is_foldable(index)
    }

    pub fn is_child(&self, index: usize) -> bool {
        self.history.is_child(index)
    }

    pub fn is_link(&self, index: usize) -> bool {
        self.history.get(index).is_some_and(Commit::is_commit_link)
    }

    /// Move the cursor from a link row to the row of the commit it links to,
    /// fetching top-level pages until that commit shows up.
    ///
    /// Returns false for rows which are no links, or when the commit is not
    /// part of the top-level history.
    pub fn go_to_link(&mut self, index: usize) -> Result<bool> {
        let Some(target) = self
            .history
            .get(index)
            .filter(|c| c.is_commit_link())
            .map(Commit::id)
        else {
            return Ok(false);
        };

        loop {
            if let Some(row) = self.history.position(target) {
                self.set_cursor(row);
                return Ok(true);
            }
            let page_size = self.page_size().max(1);
            if self.fill_up(page_size)? == 0 {
                debug!(commit = %target, "linked commit not displayed");
                return Ok(false);
            }
        }
    }

    /// Unfold a folded row or fold an unfolded one. Returns false when nothing changed.
    ///
    /// The cursor keeps pointing at the same commit, or at the folding row
    /// when its commit was folded away.
    pub fn toggle_fold(&mut self, index: usize) -> Result<bool> {
        let cursor = self.viewport.cursor;

        if self.history.is_folded(index) {
            let inserted = self.history.unfold(&self.repo, index)?;
            if cursor > index {
                self.viewport.cursor += inserted;
            }
        } else if self.history.is_unfolded(index) {
            let removed = self.history.fold(index);
            if cursor > index + removed {
                self.viewport.cursor -= removed;
            } else if cursor > index {
                self.viewport.cursor = index;
            }
        } else {
            return Ok(false);
        }

        self.viewport.follow_cursor();
        Ok(true)
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn cursor(&self) -> usize {
        self.viewport.cursor
    }

    /// Place the cursor on a row, clamped to the known rows
    pub fn set_cursor(&mut self, index: usize) {
        let total = self.line_count();
        self.viewport.jump_to(index, total);
    }

    pub fn resize(&mut self, height: usize) {
        self.viewport.resize(height);
    }

    pub fn move_cursor_down(&mut self) {
        let total = self.line_count();
        self.viewport.cursor_down(total);
    }

    pub fn move_cursor_up(&mut self) {
        self.viewport.cursor_up();
    }

    pub fn page_down(&mut self) {
        let total = self.line_count();
        self.viewport.page_down(total);
    }

    pub fn page_up(&mut self) {
        self.viewport.page_up();
    }

    /// Jump to a row; negative numbers count back from the last row
    pub fn goto_line(&mut self, line: isize) {
        let total = self.line_count();
        let index = if line < 0 {
            total.saturating_sub(line.unsigned_abs())
        } else {
            line.unsigned_abs()
        };
        self.viewport.jump_to(index, total);
    }

    pub fn goto_first(&mut self) {
        self.viewport.jump_to_top();
    }

    pub fn goto_last(&mut self) {
        let total = self.line_count();
        self.viewport.jump_to_bottom(total);
    }

    /// Move the cursor to the commit owning the current row
    pub fn go_to_parent(&mut self) -> bool {
        match self.history.parent_index(self.viewport.cursor) {
            Some(parent) => {
                self.set_cursor(parent);
                true
            }
            None => false,
        }
    }

    /// Transient message shown while a search runs
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub(crate) fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    pub(crate) fn clear_status(&mut self) {
        self.status = None;
    }
}
