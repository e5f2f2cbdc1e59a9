//! Error types for the wallet index.

use thiserror::Error;

/// Storage-related errors reported by the storage collaborator.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Data not found: {0}")]
    NotFound(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Inconsistent state: {0}")]
    InconsistentState(String),
}

/// Type alias for storage operation results.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
