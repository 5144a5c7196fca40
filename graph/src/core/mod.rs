pub mod classify;
pub mod commit;
pub mod history;

pub use classify::{classify, is_fork_point, Ancestry};
pub use commit::{Commit, CommitKind, FoldState, RawCommit, Signature};
pub use history::History;
