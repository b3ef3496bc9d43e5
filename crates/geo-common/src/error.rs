//! Error types for geospatial value types.

use thiserror::Error;

/// Result type alias using GeoError.
pub type GeoResult<T> = Result<T, GeoError>;

/// Errors raised while building or parsing envelopes, positions and CRS.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Invalid number in envelope: {0}")]
    InvalidNumber(String),

    #[error("Mismatched dimension for '{argument}': expected {expected}, got {actual}")]
    MismatchedDimension {
        argument: String,
        expected: usize,
        actual: usize,
    },

    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),
}

impl GeoError {
    /// Create a MismatchedDimension error.
    pub fn mismatched_dimension(argument: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::MismatchedDimension {
            argument: argument.into(),
            expected,
            actual,
        }
    }
}
