//! Error types shared by the identifier/spike primitives

use thiserror::Error;

/// Result type for storage-layer operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while constructing or validating the shared
/// identifier/time/spike primitives.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Invalid format or malformed value
    #[error("Invalid format: {reason}")]
    InvalidFormat {
        /// Reason for invalid format
        reason: String,
    },

    /// Generic operation error
    #[error("Operation failed: {message}")]
    OperationError {
        /// Error message
        message: String,
    },

    /// Out of bounds access
    #[error("Index {index} out of bounds (max: {max})")]
    OutOfBounds {
        /// Index that was out of bounds
        index: usize,
        /// Maximum allowed index
        max: usize,
    },
}

impl StorageError {
    /// Create an invalid format error
    pub fn invalid_format(reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            reason: reason.into(),
        }
    }

    /// Create an out-of-bounds error
    pub fn out_of_bounds(index: usize, max: usize) -> Self {
        Self::OutOfBounds { index, max }
    }
}
