//! Error types for dense-nn.
//!
//! Matrix arithmetic panics on shape mismatches (they are programming errors).
//! Everything that touches caller data or the filesystem returns [`NnError`].

use thiserror::Error;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, NnError>;

#[derive(Error, Debug)]
pub enum NnError {
    /// Architecture or hyperparameters that cannot produce a working network.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A caller-supplied vector does not match the layer it is fed to.
    #[error("shape mismatch for {what}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Dataset contents that cannot be used (bad IDX header, label out of range, ...).
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A model file whose header or contents disagree with what was expected.
    #[error("model format error: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl NnError {
    pub(crate) fn shape(what: &'static str, expected: usize, actual: usize) -> NnError {
        NnError::ShapeMismatch { what, expected, actual }
    }
}
