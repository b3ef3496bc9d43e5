//! Integer index ranges of a grid.

use std::fmt;

use geo_common::Envelope;
use serde::Serialize;

use crate::error::{GridError, GridResult};
use crate::rounding::GridRoundingMode;

const MIN_INDEX: f64 = i64::MIN as f64;
const MAX_INDEX: f64 = i64::MAX as f64;

/// An N-dimensional box of grid cell indices.
///
/// Both bounds are inclusive and `low[i] <= high[i]` in every dimension.
/// Extents are immutable: slicing or reducing one produces a new extent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GridExtent {
    low: Vec<i64>,
    high: Vec<i64>,
}

impl GridExtent {
    /// Create an extent from its inclusive lower and upper indices.
    pub fn new(low: Vec<i64>, high: Vec<i64>) -> GridResult<Self> {
        if low.len() != high.len() {
            return Err(GridError::illegal_request(format!(
                "mismatched extent dimensions: {} low values for {} high values",
                low.len(),
                high.len()
            )));
        }
        if low.is_empty() {
            return Err(GridError::illegal_request("extent has no dimension"));
        }
        if let Some(i) = (0..low.len()).find(|&i| low[i] > high[i]) {
            return Err(GridError::illegal_request(format!(
                "illegal grid range [{} … {}] in dimension {}",
                low[i], high[i], i
            )));
        }
        Ok(Self { low, high })
    }

    /// Extent starting at index 0 with the given number of cells per dimension.
    pub fn with_size(sizes: &[u64]) -> GridResult<Self> {
        if sizes.contains(&0) {
            return Err(GridError::illegal_request(format!("empty grid size {:?}", sizes)));
        }
        let high = sizes
            .iter()
            .map(|&s| {
                i64::try_from(s)
                    .map(|s| s - 1)
                    .map_err(|_| GridError::illegal_request(format!("grid size {} is too large", s)))
            })
            .collect::<GridResult<Vec<i64>>>()?;
        Self::new(vec![0; sizes.len()], high)
    }

    pub fn dimension(&self) -> usize {
        self.low.len()
    }

    pub fn low(&self, dim: usize) -> i64 {
        self.low[dim]
    }

    pub fn high(&self, dim: usize) -> i64 {
        self.high[dim]
    }

    pub fn low_corner(&self) -> &[i64] {
        &self.low
    }

    pub fn high_corner(&self) -> &[i64] {
        &self.high
    }

    /// Number of cells along the given dimension, saturating at `u64::MAX`.
    pub fn size(&self, dim: usize) -> u64 {
        self.high[dim].abs_diff(self.low[dim]).saturating_add(1)
    }

    /// Center of the extent in cell-corner coordinates.
    pub fn point_of_interest(&self) -> Vec<f64> {
        (0..self.dimension())
            .map(|i| (self.low[i] as f64 + self.high[i] as f64 + 1.0) * 0.5)
            .collect()
    }

    /// Point of interest restricted to the given dimensions, in that order.
    pub fn point_of_interest_in(&self, dimensions: Option<&[usize]>) -> Vec<f64> {
        let poi = self.point_of_interest();
        match dimensions {
            Some(dims) => dims.iter().map(|&i| poi[i]).collect(),
            None => poi,
        }
    }

    /// Cell-corner envelope: `[low, high + 1)` in each dimension.
    pub fn to_envelope(&self) -> GridResult<Envelope> {
        let lower = self.low.iter().map(|&v| v as f64).collect();
        let upper = self.high.iter().map(|&v| v as f64 + 1.0).collect();
        Ok(Envelope::new(lower, upper)?)
    }

    /// Convert continuous grid coordinates to an extent.
    ///
    /// `indices` holds `[lower, upper)` ranges in cell-corner coordinates. When
    /// `dimension_map` is given, envelope dimension `k` sets extent dimension
    /// `dimension_map[k]` and the other dimensions keep the bounds of
    /// `enclosing`, which is then mandatory. Bounds are clamped to
    /// `enclosing` before rounding. NaN or infinite bounds take the value of
    /// `enclosing`; without it, bounds beyond the `i64` range fail with
    /// [`GridError::OutOfDomain`].
    pub fn from_envelope(
        indices: &Envelope,
        rounding: GridRoundingMode,
        enclosing: Option<&GridExtent>,
        dimension_map: Option<&[usize]>,
    ) -> GridResult<Self> {
        let dimension = match (dimension_map, enclosing) {
            (Some(_), None) => {
                return Err(GridError::illegal_request(
                    "a dimension map requires an enclosing extent",
                ))
            }
            (_, Some(e)) => e.dimension(),
            (None, None) => indices.dimension(),
        };
        let mapped = dimension_map.map_or(dimension, <[usize]>::len);
        if indices.dimension() != mapped {
            return Err(GridError::illegal_request(format!(
                "envelope has {} dimensions, expected {}",
                indices.dimension(),
                mapped
            )));
        }
        if let Some(&i) = dimension_map.and_then(|m| m.iter().find(|&&i| i >= dimension)) {
            return Err(GridError::illegal_request(format!(
                "dimension {} is out of range 0..{}",
                i, dimension
            )));
        }

        let (mut low, mut high) = match enclosing {
            Some(e) => (e.low.clone(), e.high.clone()),
            None => (vec![0; dimension], vec![0; dimension]),
        };
        for k in 0..indices.dimension() {
            let i = dimension_map.map_or(k, |m| m[k]);
            let mut lower = indices.lower(k);
            let mut upper = indices.upper(k);
            if !lower.is_finite() || !upper.is_finite() {
                let Some(e) = enclosing else {
                    return Err(GridError::illegal_request(format!(
                        "unbounded range [{} … {}] in dimension {} without enclosing extent",
                        lower, upper, i
                    )));
                };
                if !lower.is_finite() {
                    lower = e.low[i] as f64;
                }
                if !upper.is_finite() {
                    upper = e.high[i] as f64 + 1.0;
                }
            }
            if let Some(e) = enclosing {
                lower = lower.clamp(e.low[i] as f64, e.high[i] as f64 + 1.0);
                upper = upper.clamp(e.low[i] as f64, e.high[i] as f64 + 1.0);
            } else if lower < MIN_INDEX || upper > MAX_INDEX {
                return Err(GridError::out_of_domain(
                    "envelope",
                    format!(
                        "range [{} … {}] exceeds the grid index range in dimension {}",
                        lower, upper, i
                    ),
                ));
            }
            let (mut l, mut h) = rounding.round(lower, upper);
            if l > h {
                return Err(GridError::out_of_domain(
                    "envelope",
                    format!("no cell {} [{} … {}] in dimension {}", rounding, lower, upper, i),
                ));
            }
            if let Some(e) = enclosing {
                l = l.max(e.low[i]);
                h = h.min(e.high[i]);
                if l > h {
                    return Err(GridError::out_of_domain(
                        "envelope",
                        format!(
                            "range [{} … {}] does not intersect [{} … {}] in dimension {}",
                            lower, upper, e.low[i], e.high[i], i
                        ),
                    ));
                }
            }
            low[i] = l;
            high[i] = h;
        }
        Self::new(low, high)
    }

    /// Collapse dimensions to the cell containing the given grid coordinates.
    ///
    /// Coordinate `k` applies to dimension `dimension_map[k]` (or `k`). NaN
    /// coordinates leave their dimension unchanged. Fails with
    /// [`GridError::OutOfDomain`] when a rounded index is outside this extent.
    pub fn slice(&self, point: &[f64], dimension_map: Option<&[usize]>) -> GridResult<Self> {
        let expected = dimension_map.map_or(self.dimension(), <[usize]>::len);
        if point.len() != expected {
            return Err(GridError::illegal_request(format!(
                "slice point has {} dimensions, expected {}",
                point.len(),
                expected
            )));
        }
        let mut sliced = self.clone();
        for (k, &p) in point.iter().enumerate() {
            if p.is_nan() {
                continue;
            }
            let i = dimension_map.map_or(k, |m| m[k]);
            if i >= self.dimension() {
                return Err(GridError::illegal_request(format!(
                    "dimension {} is out of range 0..{}",
                    i,
                    self.dimension()
                )));
            }
            let c = (p + 0.5).floor();
            if c < self.low[i] as f64 || c > self.high[i] as f64 {
                return Err(GridError::out_of_domain(
                    "point",
                    format!(
                        "index {} is outside [{} … {}] in dimension {}",
                        c, self.low[i], self.high[i], i
                    ),
                ));
            }
            sliced.low[i] = c as i64;
            sliced.high[i] = c as i64;
        }
        Ok(sliced)
    }

    /// Extent with only the given dimensions, in that order.
    pub fn reduce(&self, dimensions: &[usize]) -> GridResult<Self> {
        let dims = verify_dimensions(dimensions, self.dimension())?;
        Ok(Self {
            low: dims.iter().map(|&i| self.low[i]).collect(),
            high: dims.iter().map(|&i| self.high[i]).collect(),
        })
    }

    /// Indices of `count` dimensions forming a sub-space of this extent.
    ///
    /// Dimensions with more than one cell are always selected; degenerate
    /// dimensions complete the list in order. Fails if more than `count`
    /// dimensions have more than one cell.
    pub fn subspace_dimensions(&self, count: usize) -> GridResult<Vec<usize>> {
        if count == 0 || count > self.dimension() {
            return Err(GridError::illegal_request(format!(
                "sub-space of {} dimensions in a {}-dimensional extent",
                count,
                self.dimension()
            )));
        }
        let mut selected: Vec<usize> = (0..self.dimension()).filter(|&i| self.low[i] != self.high[i]).collect();
        if selected.len() > count {
            return Err(GridError::illegal_request(format!(
                "{} dimensions have more than one cell, cannot select {}",
                selected.len(),
                count
            )));
        }
        for i in 0..self.dimension() {
            if selected.len() == count {
                break;
            }
            if self.low[i] == self.high[i] {
                selected.push(i);
            }
        }
        selected.sort_unstable();
        Ok(selected)
    }
}

/// Check that dimensions are non-empty, strictly increasing and below `count`.
pub(crate) fn verify_dimensions(dimensions: &[usize], count: usize) -> GridResult<Vec<usize>> {
    if dimensions.is_empty() {
        return Err(GridError::illegal_request("no dimension selected"));
    }
    if let Some(w) = dimensions.windows(2).find(|w| w[0] >= w[1]) {
        return Err(GridError::illegal_request(format!(
            "dimensions {:?} must be strictly increasing, found {} before {}",
            dimensions, w[0], w[1]
        )));
    }
    if let Some(&d) = dimensions.iter().find(|&&d| d >= count) {
        return Err(GridError::illegal_request(format!(
            "dimension {} is out of range 0..{}",
            d, count
        )));
    }
    Ok(dimensions.to_vec())
}

impl fmt::Display for GridExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.dimension() {
            if i > 0 {
                write!(f, " × ")?;
            }
            write!(f, "[{} … {}]", self.low[i], self.high[i])?;
        }
        Ok(())
    }
}
