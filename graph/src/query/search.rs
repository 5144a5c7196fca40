use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, info};

use crate::error::{HistoryError, Result};
use crate::render::content::{lock, HistoryContent, SharedContent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    Forward,
    Backward,
}

/// Text to look for and where to look
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub needle: String,
    pub direction: SearchDirection,
    /// Whether the row under the cursor can match
    pub include_current: bool,
    pub ignore_case: bool,
}

impl SearchQuery {
    pub fn new(needle: impl Into<String>, direction: SearchDirection) -> Self {
        Self {
            needle: needle.into(),
            direction,
            include_current: false,
            ignore_case: false,
        }
    }

    pub fn include_current(mut self, include: bool) -> Self {
        self.include_current = include;
        self
    }

    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The cursor was moved to this row
    Found(usize),
    NotFound,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    Searching,
}

struct RunningSearch {
    content: SharedContent,
    cancel_flag: Arc<AtomicBool>,
    handle: JoinHandle<Result<SearchOutcome>>,
}

impl RunningSearch {
    /// Callers hold the content lock
    fn signal_cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    fn join(self) -> Result<SearchOutcome> {
        self.handle.join().map_err(|_| HistoryError::SearchAborted)?
    }
}

/// Runs at most one background search over shared history content.
///
/// Callers must not hold the content lock while starting, cancelling or
/// waiting for a search.
#[derive(Default)]
pub struct SearchNavigator {
    running: Option<RunningSearch>,
}

impl SearchNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SearchState {
        match &self.running {
            Some(search) if !search.handle.is_finished() => SearchState::Searching,
            _ => SearchState::Idle,
        }
    }

    /// Start a search, first stopping the one in flight.
    ///
    /// The previous search has finished touching the content by the time the
    /// new one starts. Returns the outcome of the search that was replaced.
    pub fn apply_search(
        &mut self,
        content: &SharedContent,
        query: SearchQuery,
    ) -> Result<Option<SearchOutcome>> {
        let replaced = self.cancel()?;

        info!(needle = %query.needle, direction = ?query.direction, "search started");
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let handle = {
            let content = Arc::clone(content);
            let cancel_flag = Arc::clone(&cancel_flag);
            thread::Builder::new()
                .name("glv-search".to_string())
                .spawn(move || run_search(&content, &query, &cancel_flag))?
        };

        self.running = Some(RunningSearch {
            content: Arc::clone(content),
            cancel_flag,
            handle,
        });
        Ok(replaced)
    }

    /// Stop the running search, if any, and wait for it to exit
    pub fn cancel(&mut self) -> Result<Option<SearchOutcome>> {
        let Some(search) = self.running.take() else {
            return Ok(None);
        };

        {
            // flagged under the lock so no cursor write can slip in after it
            let _guard = lock(&search.content);
            search.signal_cancel();
        }
        let outcome = search.join()?;
        info!(?outcome, "search cancelled");
        Ok(Some(outcome))
    }

    /// Block until the running search finishes
    pub fn wait(&mut self) -> Result<Option<SearchOutcome>> {
        match self.running.take() {
            Some(search) => search.join().map(Some),
            None => Ok(None),
        }
    }

    /// Collect the outcome of a search that has finished, without blocking
    pub fn poll(&mut self) -> Result<Option<SearchOutcome>> {
        match &self.running {
            Some(search) if search.handle.is_finished() => self.wait(),
            _ => Ok(None),
        }
    }
}

impl Drop for SearchNavigator {
    fn drop(&mut self) {
        if let Some(search) = self.running.take() {
            search.signal_cancel();
            let _ = search.join();
        }
    }
}

fn run_search(
    content: &Mutex<HistoryContent>,
    query: &SearchQuery,
    cancel_flag: &AtomicBool,
) -> Result<SearchOutcome> {
    let start = {
        let mut content = lock(content);
        content.set_status(format!("Searching for \"{}\"...", query.needle));
        let cursor = content.cursor();
        match query.direction {
            SearchDirection::Forward if !query.include_current => cursor + 1,
            SearchDirection::Backward if !query.include_current && cursor > 0 => cursor - 1,
            _ => cursor,
        }
    };

    let outcome = match query.direction {
        SearchDirection::Forward => search_forward(content, query, cancel_flag, start),
        SearchDirection::Backward => search_backward(content, query, cancel_flag, start),
    };

    lock(content).clear_status();
    debug!(?outcome, "search finished");
    outcome
}

fn search_forward(
    content: &Mutex<HistoryContent>,
    query: &SearchQuery,
    cancel_flag: &AtomicBool,
    start: usize,
) -> Result<SearchOutcome> {
    let mut index = start;
    loop {
        let mut content = lock(content);
        if cancel_flag.load(Ordering::Relaxed) {
            return Ok(SearchOutcome::Cancelled);
        }

        if index >= content.history().len() {
            let page_size = content.page_size();
            if content.fill_up(page_size)? == 0 {
                return Ok(SearchOutcome::NotFound);
            }
            continue;
        }

        if let Some(found) = try_match(&mut content, query, index) {
            return Ok(found);
        }
        index += 1;
    }
}

fn search_backward(
    content: &Mutex<HistoryContent>,
    query: &SearchQuery,
    cancel_flag: &AtomicBool,
    start: usize,
) -> Result<SearchOutcome> {
    let length = lock(content).history().len();
    if length == 0 {
        return Ok(SearchOutcome::NotFound);
    }

    // rows past the materialized end are never fetched going backward
    for index in (0..=start.min(length - 1)).rev() {
        let mut content = lock(content);
        if cancel_flag.load(Ordering::Relaxed) {
            return Ok(SearchOutcome::Cancelled);
        }
        if let Some(found) = try_match(&mut content, query, index) {
            return Ok(found);
        }
    }
    Ok(SearchOutcome::NotFound)
}

fn try_match(
    content: &mut HistoryContent,
    query: &SearchQuery,
    index: usize,
) -> Option<SearchOutcome> {
    let matched = content
        .current(index)
        .is_some_and(|commit| commit.matches(&query.needle, query.ignore_case));
    if !matched {
        return None;
    }
    content.set_cursor(index);
    Some(SearchOutcome::Found(index))
}
