//! Grid geometries and their derivation.
//!
//! A [`GridGeometry`] ties an integer [`GridExtent`] to a coordinate
//! reference system through a grid-to-CRS transform. New geometries are
//! derived from existing ones with a [`GridDerivation`]:
//!
//! - **subgrid**: restrict to an area of interest, optionally subsampled to a
//!   coarser resolution
//! - **slice**: collapse some dimensions to the cell containing a point
//! - **reduce**: keep only some dimensions
//!
//! # Example
//!
//! ```ignore
//! use grid_geometry::{GridGeometry, GridRoundingMode};
//!
//! let mut derivation = global.derive();
//! derivation
//!     .rounding(GridRoundingMode::Enclosing)?
//!     .subgrid(Some(&area_of_interest), &[2.0, 2.0])?;
//! let subsampled: GridGeometry = derivation.build()?;
//! ```

pub mod config;
pub mod derivation;
pub mod error;
pub mod extent;
pub mod geometry;
pub mod rounding;

// Re-export commonly used types at crate root
pub use config::DerivationConfig;
pub use derivation::GridDerivation;
pub use error::{GridError, GridResult};
pub use extent::GridExtent;
pub use geometry::GridGeometry;
pub use rounding::GridRoundingMode;
