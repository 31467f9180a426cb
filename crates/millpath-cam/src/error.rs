//! Error types for toolpath planning.

use millpath_slicer::SlicerError;
use thiserror::Error;

/// Errors that can occur while planning a toolpath.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CamError {
    /// Tool diameter is zero, negative or not finite.
    #[error("tool diameter must be positive, got {0}")]
    InvalidToolDiameter(f64),

    /// A settings value cannot be repaired.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// The strategy predictor failed.
    #[error("strategy prediction failed: {0}")]
    Strategy(String),

    /// A tool library could not be read or held no usable tools.
    #[error("tool library: {0}")]
    ToolLibrary(String),

    /// The caller raised the cancellation flag.
    #[error("generation cancelled")]
    Cancelled,
}

impl From<SlicerError> for CamError {
    fn from(err: SlicerError) -> Self {
        match err {
            SlicerError::Cancelled => CamError::Cancelled,
        }
    }
}

/// Result type for planning operations.
pub type Result<T> = std::result::Result<T, CamError>;
