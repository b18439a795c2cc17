//! Storage error types
//!
//! Defines all errors that can occur in the Reading Store.

use thiserror::Error;

/// Errors that can occur in the Reading Store
#[derive(Error, Debug)]
pub enum StorageError {
    /// Producer-supplied values were rejected before any write
    #[error("Invalid reading: {0}")]
    Invalid(String),

    /// SQLite failed to execute a statement or commit
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking worker running a store call panicked or was cancelled
    #[error("Storage task failed: {0}")]
    Task(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl StorageError {
    /// Whether the caller caused this error (and retrying the same input is pointless)
    pub fn is_invalid(&self) -> bool {
        matches!(self, StorageError::Invalid(_))
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
