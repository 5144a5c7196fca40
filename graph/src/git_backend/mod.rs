pub mod repository;
pub mod walker;

pub use repository::{FirstParentIds, Repository, Revision, WalkQuery};
pub use walker::{Commits, HistoryWalker};
