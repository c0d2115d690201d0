//! Storage types

use thiserror::Error;

/// Blob storage errors
///
/// `NotFound` is recoverable (the caller answers "not found"); `Io` is a disk
/// fault and surfaces as a server error.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Blob already exists: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Map an open/stat error, keeping absence distinct from disk faults
    pub(crate) fn from_io(id: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(id.to_string())
        } else {
            StorageError::Io(err)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}
