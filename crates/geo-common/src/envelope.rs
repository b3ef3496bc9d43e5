//! N-dimensional envelopes.

use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::error::{GeoError, GeoResult};

/// An axis-aligned box in N dimensions, optionally tied to a CRS.
///
/// A NaN bound means "unconstrained" in that dimension. Infinite bounds are
/// accepted and mean "unbounded".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    lower: Vec<f64>,
    upper: Vec<f64>,
    crs: Option<Crs>,
}

impl Envelope {
    /// Create a new envelope from its lower and upper corners.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> GeoResult<Self> {
        if lower.len() != upper.len() {
            return Err(GeoError::mismatched_dimension("upper", lower.len(), upper.len()));
        }
        if lower.is_empty() {
            return Err(GeoError::InvalidEnvelope("envelope has no dimension".to_string()));
        }
        for (i, (lo, hi)) in lower.iter().zip(&upper).enumerate() {
            if lo > hi {
                return Err(GeoError::InvalidEnvelope(format!(
                    "lower bound {} is greater than upper bound {} in dimension {}",
                    lo, hi, i
                )));
            }
        }
        Ok(Self {
            lower,
            upper,
            crs: None,
        })
    }

    /// Parse "minx,miny,...,maxx,maxy,...": first half is the lower corner.
    pub fn parse(s: &str) -> GeoResult<Self> {
        let values = s
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<f64>()
                    .map_err(|_| GeoError::InvalidNumber(part.to_string()))
            })
            .collect::<GeoResult<Vec<f64>>>()?;
        if values.is_empty() || values.len() % 2 != 0 {
            return Err(GeoError::InvalidEnvelope(format!(
                "{}. Expected 'min1,...,minN,max1,...,maxN'",
                s
            )));
        }
        let n = values.len() / 2;
        Self::new(values[..n].to_vec(), values[n..].to_vec())
    }

    /// Same envelope, associated with the given CRS.
    ///
    /// Fails if the CRS dimension does not match.
    pub fn with_crs(mut self, crs: Crs) -> GeoResult<Self> {
        if crs.dimension() != self.dimension() {
            return Err(GeoError::mismatched_dimension("crs", self.dimension(), crs.dimension()));
        }
        self.crs = Some(crs);
        Ok(self)
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    pub fn lower(&self, dim: usize) -> f64 {
        self.lower[dim]
    }

    pub fn upper(&self, dim: usize) -> f64 {
        self.upper[dim]
    }

    pub fn lower_corner(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper_corner(&self) -> &[f64] {
        &self.upper
    }

    /// Width along the given dimension.
    pub fn span(&self, dim: usize) -> f64 {
        self.upper[dim] - self.lower[dim]
    }

    /// Middle value along the given dimension.
    pub fn median(&self, dim: usize) -> f64 {
        (self.lower[dim] + self.upper[dim]) * 0.5
    }

    /// Check if a point (same dimension) is contained within this envelope.
    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.dimension()
            && point
                .iter()
                .enumerate()
                .all(|(i, &p)| p >= self.lower[i] && p <= self.upper[i])
    }
}
