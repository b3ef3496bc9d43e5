//! Direct positions.

use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::error::{GeoError, GeoResult};

/// A point given by its coordinates, optionally tied to a CRS.
///
/// NaN coordinates leave the corresponding dimension unconstrained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    coordinates: Vec<f64>,
    crs: Option<Crs>,
}

impl Position {
    pub fn new(coordinates: Vec<f64>) -> Self {
        Self {
            coordinates,
            crs: None,
        }
    }

    /// Same position, associated with the given CRS.
    pub fn with_crs(mut self, crs: Crs) -> GeoResult<Self> {
        if crs.dimension() != self.dimension() {
            return Err(GeoError::mismatched_dimension("crs", self.dimension(), crs.dimension()));
        }
        self.crs = Some(crs);
        Ok(self)
    }

    pub fn dimension(&self) -> usize {
        self.coordinates.len()
    }

    pub fn coordinates(&self) -> &[f64] {
        &self.coordinates
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }
}

impl From<Vec<f64>> for Position {
    fn from(coordinates: Vec<f64>) -> Self {
        Self::new(coordinates)
    }
}
