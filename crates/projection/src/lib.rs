//! Coordinate transforms for grid geometries.
//!
//! Provides the small numeric toolbox the grid derivation engine is built on:
//! homogeneous affine matrices, composable [`MathTransform`]s, dimension
//! separation and the resolution of coordinate operations between reference
//! systems.

pub mod error;
pub mod matrix;
pub mod mercator;
pub mod operation;
pub mod separator;
pub mod transform;

pub use error::{TransformError, TransformResult};
pub use matrix::Matrix;
pub use mercator::Mercator;
pub use operation::{CoordinateOperationFactory, DefaultOperationFactory};
pub use separator::{separate, separate_sources, separate_targets, Separated};
pub use transform::{
    concatenate, transform_envelope, transforms_equal, LinearTransform, MathTransform,
    PassThroughTransform, Structure, TransformRef,
};
