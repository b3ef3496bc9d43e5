//! Common geospatial value types shared across the grid derivation crates.

pub mod crs;
pub mod envelope;
pub mod error;
pub mod position;

pub use crs::{Crs, CrsCode, TemporalCrs, TimeUnit};
pub use envelope::Envelope;
pub use error::{GeoError, GeoResult};
pub use position::Position;
