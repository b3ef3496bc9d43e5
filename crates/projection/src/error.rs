//! Error types for coordinate transforms.

use geo_common::GeoError;
use thiserror::Error;

/// Result type for transform operations.
pub type TransformResult<T> = std::result::Result<T, TransformError>;

/// Errors that can occur while building, separating or applying transforms.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// A point, matrix or transform does not have the expected number of dimensions.
    #[error("mismatched dimension for {what}: expected {expected}, got {actual}")]
    MismatchedDimension {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// The transform (or matrix) has no inverse.
    #[error("transform is not invertible: {0}")]
    NonInvertible(String),

    /// The requested dimensions can not be isolated from the rest of the transform.
    #[error("cannot separate transform: {0}")]
    NotSeparable(String),

    /// No coordinate operation is known between two CRS.
    #[error("no coordinate operation from {source_crs} to {target_crs}")]
    OperationNotFound {
        source_crs: String,
        target_crs: String,
    },

    /// A list of dimension indices is unordered, duplicated or out of range.
    #[error("illegal dimensions {dimensions:?}: {message}")]
    IllegalDimensions {
        dimensions: Vec<usize>,
        message: String,
    },

    /// A matrix is not usable as an affine transform.
    #[error("illegal matrix: {0}")]
    IllegalMatrix(String),

    /// The point is outside the domain of validity of a projection.
    #[error("point {0:?} is outside the projection domain")]
    OutsideDomain(Vec<f64>),

    /// A transformed envelope or position could not be built.
    #[error(transparent)]
    Geometry(#[from] GeoError),
}

impl TransformError {
    /// Create a MismatchedDimension error.
    pub fn mismatched_dimension(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::MismatchedDimension {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Create a NotSeparable error.
    pub fn not_separable(msg: impl Into<String>) -> Self {
        Self::NotSeparable(msg.into())
    }

    /// Create an IllegalDimensions error.
    pub fn illegal_dimensions(dimensions: &[usize], message: impl Into<String>) -> Self {
        Self::IllegalDimensions {
            dimensions: dimensions.to_vec(),
            message: message.into(),
        }
    }
}
