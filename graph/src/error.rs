use std::path::PathBuf;

use git2::Oid;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HistoryError>;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("no revisions match `{0}`")]
    RevisionNotFound(String),

    #[error("no paths match `{}`", .0.display())]
    PathNotFound(PathBuf),

    #[error("commit {0} cannot be resolved")]
    CommitUnresolvable(Oid),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("background search stopped unexpectedly")]
    SearchAborted,

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HistoryError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
