//! Error types for grid derivation.

use geo_common::GeoError;
use projection::TransformError;
use thiserror::Error;

/// Errors that can occur while building or deriving grid geometries.
#[derive(Error, Debug, Clone)]
pub enum GridError {
    /// The base geometry lacks the extent or the transform needed by the operation.
    #[error("incomplete grid geometry: {0}")]
    IncompleteState(String),

    /// Invalid call sequence or argument, detected before any numeric work.
    #[error("illegal request: {0}")]
    IllegalRequest(String),

    /// A coordinate operation or a transform step failed.
    #[error("cannot transform '{argument}': {source}")]
    TransformFailure {
        argument: String,
        #[source]
        source: TransformError,
    },

    /// A position mapped to grid indices falls outside the extent.
    #[error("'{argument}' is outside the grid domain: {message}")]
    OutOfDomain { argument: String, message: String },
}

impl GridError {
    /// Create an IncompleteState error.
    pub fn incomplete_state(msg: impl Into<String>) -> Self {
        Self::IncompleteState(msg.into())
    }

    /// Create an IllegalRequest error.
    pub fn illegal_request(msg: impl Into<String>) -> Self {
        Self::IllegalRequest(msg.into())
    }

    /// Create a TransformFailure error.
    pub fn transform_failure(argument: impl Into<String>, source: TransformError) -> Self {
        Self::TransformFailure {
            argument: argument.into(),
            source,
        }
    }

    /// Create an OutOfDomain error.
    pub fn out_of_domain(argument: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OutOfDomain {
            argument: argument.into(),
            message: message.into(),
        }
    }
}

impl From<GeoError> for GridError {
    fn from(err: GeoError) -> Self {
        Self::IllegalRequest(err.to_string())
    }
}

/// Result type for grid geometry operations.
pub type GridResult<T> = std::result::Result<T, GridError>;
