//! Error types for the post layer.

use thiserror::Error;

/// Errors raised while selecting a post configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PostError {
    /// The flavor name matched none of the known posts.
    #[error("unknown post flavor: {0}")]
    UnknownFlavor(String),

    /// The unit name was neither millimeters nor inches.
    #[error("unknown units: {0}")]
    UnknownUnits(String),
}

/// Result type for post operations.
pub type Result<T> = std::result::Result<T, PostError>;
