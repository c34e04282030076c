use std::error::Error;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A unique constraint rejected the write.
    #[error("duplicate {what}")]
    Duplicate { what: String },
    /// Compare-and-swap miss: the stored room no longer carries `expected` (or is gone).
    #[error("room `{id}` changed concurrently (expected version {expected})")]
    VersionConflict { id: Uuid, expected: u64 },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
