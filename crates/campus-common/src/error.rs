//! Repository errors shared by every persistence seam

use thiserror::Error;

/// Repository result type
pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// No record with that key
    #[error("not found: {0}")]
    NotFound(String),

    /// Optimistic version check failed
    #[error("version conflict on {id}: expected {expected}, found {found}")]
    VersionConflict {
        /// Record key
        id: String,
        /// Version the writer loaded
        expected: u64,
        /// Version currently stored
        found: u64,
    },

    /// Unique constraint violated
    #[error("conflict: {0}")]
    Conflict(String),

    /// Backend failure
    #[error("storage error: {0}")]
    StorageError(String),
}
