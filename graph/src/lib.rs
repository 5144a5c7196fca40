pub mod core;
pub mod error;
pub mod git_backend;
pub mod query;
pub mod render;

#[cfg(test)]
mod fixtures;

pub use crate::core::{
    classify, is_fork_point, Ancestry, Commit, CommitKind, FoldState, History, RawCommit,
    Signature,
};
pub use error::{HistoryError, Result};
pub use git_backend::{HistoryWalker, Repository, Revision, WalkQuery};
pub use query::{SearchDirection, SearchNavigator, SearchOutcome, SearchQuery, SearchState};
pub use render::{
    adjust_string, Color, ContentConfig, DefaultFormatter, Fragment, HistoryContent, RowFormatter,
    RowView, SharedContent, Style, Viewport,
};
