//! Error types for the slicer.

use thiserror::Error;

/// Errors that can occur during slicing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlicerError {
    /// The caller raised the cancellation flag while slicing.
    #[error("slicing cancelled")]
    Cancelled,
}

/// Result type for slicer operations.
pub type Result<T> = std::result::Result<T, SlicerError>;
