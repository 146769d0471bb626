//! Session persistence error types.

use std::io;

use thiserror::Error;

/// Failure while loading or saving the persisted session credential.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to serialize session: {message}")]
    Serialize { message: String },
}

impl StorageError {
    /// Creates a serialization error.
    #[must_use]
    pub fn serialize(message: impl Into<String>) -> Self {
        Self::Serialize {
            message: message.into(),
        }
    }
}
