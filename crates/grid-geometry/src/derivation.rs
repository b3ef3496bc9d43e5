//! Derivation of new grid geometries from an existing one.
//!
//! A [`GridDerivation`] is a single-use builder bound to a base geometry.
//! Calls follow a fixed order:
//!
//! ```text
//! rounding()?  →  slice() | subgrid()  →  reduce()?  →  extent() / build()
//! ```
//!
//! `slice` and `subgrid` are mutually exclusive, `rounding` must come before
//! either of them, and `reduce` may be called once at any point. The base
//! geometry is never modified.

use std::fmt;
use std::sync::Arc;

use geo_common::{Crs, Envelope, Position};
use num_traits::Float;
use projection::{
    concatenate, matrix, separate, transform_envelope, CoordinateOperationFactory,
    DefaultOperationFactory, LinearTransform, TransformRef,
};
use tracing::{debug, warn};

use crate::config::DerivationConfig;
use crate::error::{GridError, GridResult};
use crate::extent::{verify_dimensions, GridExtent};
use crate::geometry::GridGeometry;
use crate::rounding::GridRoundingMode;

static DEFAULT_FACTORY: DefaultOperationFactory = DefaultOperationFactory;

/// Which mutually exclusive restriction has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Restriction {
    Initial,
    Sliced,
    Subgridded,
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "none"),
            Self::Sliced => write!(f, "slice"),
            Self::Subgridded => write!(f, "subgrid"),
        }
    }
}

/// Builder of a grid geometry derived from a base geometry.
#[derive(Debug)]
pub struct GridDerivation<'a> {
    base: &'a GridGeometry,
    factory: &'a dyn CoordinateOperationFactory,
    config: DerivationConfig,
    rounding: GridRoundingMode,
    restriction: Restriction,
    /// Extent after slice or subgrid, shared with the base when unchanged.
    sub_extent: Option<Arc<GridExtent>>,
    /// Maps subsampled grid coordinates to base grid coordinates.
    to_subsampled: Option<TransformRef>,
    /// Base grid dimensions kept by the transform separation.
    modified_dimensions: Option<Vec<usize>>,
    /// Dimensions requested by `reduce`.
    selected_dimensions: Option<Vec<usize>>,
}

impl<'a> GridDerivation<'a> {
    pub fn new(base: &'a GridGeometry) -> Self {
        Self::with_config(base, DerivationConfig::default())
    }

    pub fn with_config(base: &'a GridGeometry, config: DerivationConfig) -> Self {
        Self {
            base,
            factory: &DEFAULT_FACTORY,
            rounding: config.rounding,
            config,
            restriction: Restriction::Initial,
            sub_extent: None,
            to_subsampled: None,
            modified_dimensions: None,
            selected_dimensions: None,
        }
    }

    /// Use another resolver for coordinate operations between CRS.
    pub fn with_factory(mut self, factory: &'a dyn CoordinateOperationFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Set the rounding mode used to convert envelopes to grid indices.
    pub fn rounding(&mut self, mode: GridRoundingMode) -> GridResult<&mut Self> {
        self.ensure_subgrid_not_set()?;
        self.rounding = mode;
        Ok(self)
    }

    fn ensure_subgrid_not_set(&self) -> GridResult<()> {
        if self.restriction != Restriction::Initial {
            return Err(GridError::illegal_request(format!(
                "cannot set derived grid property: '{}' has already been invoked",
                self.restriction
            )));
        }
        Ok(())
    }

    /// Concatenate the operation from the base CRS to `target` when both are known and differ.
    fn to_request_crs(
        &self,
        corner_to_crs: TransformRef,
        target: Option<&Crs>,
        argument: &str,
    ) -> GridResult<TransformRef> {
        let (Some(source), Some(target)) = (self.base.crs(), target) else {
            return Ok(corner_to_crs);
        };
        if source == target {
            return Ok(corner_to_crs);
        }
        let operation = self
            .factory
            .find_operation(source, target)
            .map_err(|e| GridError::transform_failure(argument, e))?;
        debug!(source = %source, target = %target, "Concatenated coordinate operation");
        concatenate(&corner_to_crs, &operation).map_err(|e| GridError::transform_failure(argument, e))
    }

    /// Keep only the grid dimensions that contribute to the `dimension` CRS coordinates.
    fn drop_unused_dimensions(
        &mut self,
        corner_to_crs: TransformRef,
        dimension: usize,
        argument: &str,
    ) -> GridResult<TransformRef> {
        if dimension >= corner_to_crs.source_dimensions() {
            return Ok(corner_to_crs);
        }
        let (separated, kept) =
            separate(&corner_to_crs, dimension).map_err(|e| GridError::transform_failure(argument, e))?;
        debug!(kept = ?kept, "Dropped unused grid dimensions");
        self.modified_dimensions = kept;
        Ok(separated)
    }

    /// Restrict the grid to the single cell containing `point` in some dimensions.
    ///
    /// NaN coordinates leave the matching grid dimensions unchanged. The
    /// point may use another CRS than the base geometry.
    pub fn slice(&mut self, point: &Position) -> GridResult<&mut Self> {
        self.ensure_subgrid_not_set()?;
        let corner_to_crs = self.base.require_grid_to_crs()?.clone();
        let base_extent = self.base.require_extent()?.clone();
        self.restriction = Restriction::Sliced;

        let corner_to_crs = self.to_request_crs(corner_to_crs, point.crs(), "slice_point")?;
        let dimension = corner_to_crs.target_dimensions();
        if point.dimension() != dimension {
            return Err(GridError::illegal_request(format!(
                "mismatched dimension for 'slice_point': expected {}, got {}",
                dimension,
                point.dimension()
            )));
        }
        let corner_to_crs = self.drop_unused_dimensions(corner_to_crs, dimension, "slice_point")?;
        let indices = corner_to_crs
            .inverse()
            .and_then(|inverse| inverse.transform(point.coordinates()))
            .map_err(|e| GridError::transform_failure("slice_point", e))?;
        let sliced = base_extent
            .slice(&indices, self.modified_dimensions.as_deref())
            .map_err(|e| rename_argument(e, "slice_point"))?;
        debug!(extent = %sliced, "Sliced grid extent");
        self.sub_extent = Some(keep_if_equal(base_extent, sliced));
        Ok(self)
    }

    /// Restrict the grid to an area of interest, optionally at a coarser resolution.
    ///
    /// `resolution` is given in units of the area of interest CRS (or of the
    /// base CRS without area of interest). Missing trailing values mean "no
    /// subsampling"; extra values are ignored unless the configuration is
    /// strict.
    pub fn subgrid(&mut self, area_of_interest: Option<&Envelope>, resolution: &[f64]) -> GridResult<&mut Self> {
        self.ensure_subgrid_not_set()?;
        let corner_to_crs = self.base.require_grid_to_crs()?.clone();
        let base_extent = self.base.require_extent()?.clone();
        self.restriction = Restriction::Subgridded;

        let corner_to_crs =
            self.to_request_crs(corner_to_crs, area_of_interest.and_then(Envelope::crs), "area_of_interest")?;
        let dimension = corner_to_crs.target_dimensions();
        if let Some(aoi) = area_of_interest {
            if aoi.dimension() != dimension {
                return Err(GridError::illegal_request(format!(
                    "mismatched dimension for 'area_of_interest': expected {}, got {}",
                    dimension,
                    aoi.dimension()
                )));
            }
        }
        if resolution.len() > dimension {
            if self.config.strict_resolution {
                return Err(GridError::illegal_request(format!(
                    "resolution has {} values for {} dimensions",
                    resolution.len(),
                    dimension
                )));
            }
            warn!(
                given = resolution.len(),
                used = dimension,
                "Ignoring extra resolution values"
            );
        }
        let corner_to_crs = self.drop_unused_dimensions(corner_to_crs, dimension, "area_of_interest")?;

        let mut sub_extent = base_extent.clone();
        if let Some(aoi) = area_of_interest {
            let indices = corner_to_crs
                .inverse()
                .and_then(|inverse| transform_envelope(inverse.as_ref(), aoi))
                .map_err(|e| GridError::transform_failure("area_of_interest", e))?;
            let extent = GridExtent::from_envelope(
                &indices,
                self.rounding,
                Some(&base_extent),
                self.modified_dimensions.as_deref(),
            )
            .map_err(|e| rename_argument(e, "area_of_interest"))?;
            debug!(extent = %extent, "Restricted grid extent to area of interest");
            sub_extent = keep_if_equal(base_extent, extent);
        }
        self.sub_extent = Some(sub_extent.clone());

        if !resolution.is_empty() {
            let mut resolution = resolution.to_vec();
            resolution.resize(dimension, 0.0);
            self.subsample(&corner_to_crs, &sub_extent, &resolution)?;
        }
        Ok(self)
    }

    /// Convert a resolution in CRS units to integer-ish subsampling factors.
    fn subsample(
        &mut self,
        corner_to_crs: &TransformRef,
        extent: &GridExtent,
        resolution: &[f64],
    ) -> GridResult<()> {
        let failure = |e| GridError::transform_failure("resolution", e);
        let map = self.modified_dimensions.as_deref();
        let jacobian = corner_to_crs
            .derivative(&extent.point_of_interest_in(map))
            .map_err(failure)?;
        let steps = matrix::multiply(&matrix::inverse(&jacobian).map_err(failure)?, resolution).map_err(failure)?;

        let dimension = extent.dimension();
        let mut lower: Vec<f64> = extent.low_corner().iter().map(|&v| v as f64).collect();
        let mut upper: Vec<f64> = extent.high_corner().iter().map(|&v| v as f64 + 1.0).collect();
        let mut factors = vec![1.0; dimension];
        let mut modified = false;
        for (k, step) in steps.iter().enumerate() {
            let s = step.abs();
            // Also skips NaN.
            if s > 1.0 {
                let i = map.map_or(k, |m| m[k]);
                let s = round_factor(s, upper[i] - lower[i]);
                lower[i] /= s;
                upper[i] /= s;
                factors[i] = s;
                modified = true;
            }
        }
        if !modified {
            return Ok(());
        }

        let indices = Envelope::new(lower, upper)?;
        let subsampled = GridExtent::from_envelope(&indices, self.rounding, None, None)?;
        let translations: Vec<f64> = (0..dimension)
            .map(|i| extent.low(i) as f64 - subsampled.low(i) as f64 * factors[i])
            .collect();
        let to_subsampled = LinearTransform::scale_translate(&factors, &translations)
            .map_err(failure)?
            .into_ref();
        debug!(factors = ?factors, extent = %subsampled, "Subsampled grid extent");
        self.to_subsampled = Some(to_subsampled);
        self.sub_extent = Some(Arc::new(subsampled));
        Ok(())
    }

    /// Select the grid dimensions to keep in the result.
    ///
    /// Dimensions must be strictly increasing and refer to the base geometry.
    pub fn reduce(&mut self, dimensions: &[usize]) -> GridResult<&mut Self> {
        if self.selected_dimensions.is_some() {
            return Err(GridError::illegal_request(
                "cannot set derived grid property: 'reduce' has already been invoked",
            ));
        }
        self.selected_dimensions = Some(verify_dimensions(dimensions, self.base.dimension())?);
        Ok(self)
    }

    /// Transform from subsampled grid coordinates to base grid coordinates, if any.
    pub fn subsampling(&self) -> Option<&TransformRef> {
        self.to_subsampled.as_ref()
    }

    /// Extent of the derived geometry.
    pub fn extent(&self) -> GridResult<Arc<GridExtent>> {
        let extent = match &self.sub_extent {
            Some(extent) => extent.clone(),
            None => self.base.require_extent()?.clone(),
        };
        match &self.selected_dimensions {
            Some(dims) => Ok(Arc::new(extent.reduce(dims)?)),
            None => Ok(extent),
        }
    }

    /// Build the derived geometry.
    ///
    /// Returns a copy of the base geometry sharing its extent when nothing was
    /// restricted.
    pub fn build(&self) -> GridResult<GridGeometry> {
        let mut grid = self.base.clone();
        let extent_changed = match (&self.sub_extent, self.base.extent()) {
            (Some(sub), Some(base)) => !Arc::ptr_eq(sub, base),
            (Some(_), None) => true,
            (None, _) => false,
        };
        if extent_changed || self.to_subsampled.is_some() {
            let extent = match &self.sub_extent {
                Some(extent) => extent.clone(),
                None => self.base.require_extent()?.clone(),
            };
            grid = GridGeometry::subgrid(&grid, extent, self.to_subsampled.as_ref())?;
        }
        if let Some(dims) = &self.selected_dimensions {
            grid = GridGeometry::reduce(&grid, dims)?;
        }
        Ok(grid)
    }
}

/// The current extent when `candidate` has the same bounds.
fn keep_if_equal(current: Arc<GridExtent>, candidate: GridExtent) -> Arc<GridExtent> {
    if *current == candidate {
        current
    } else {
        Arc::new(candidate)
    }
}

fn rename_argument(err: GridError, argument: &str) -> GridError {
    match err {
        GridError::OutOfDomain { message, .. } => GridError::out_of_domain(argument, message),
        other => other,
    }
}

/// Round a subsampling factor to a multiple of a power of two.
///
/// The power is chosen from the span (in cells) of the dimension so that
/// `|factor - rounded| * span < 0.5`.
fn round_factor(factor: f64, span: f64) -> f64 {
    let accuracy = exponent(span).max(0) + 1;
    let scale = 2f64.powi(accuracy);
    (factor * scale).round_ties_even() / scale
}

/// Unbiased binary exponent of a normal, finite value.
fn exponent(value: f64) -> i32 {
    let (_, exp, _) = Float::integer_decode(value);
    i32::from(exp) + 52
}

#[cfg(test)]
mod tests {
    use super::*;
    use projection::Matrix;
    use proptest::prelude::*;

    fn global() -> GridGeometry {
        let transform = LinearTransform::new(Matrix::from_row_slice(
            3,
            3,
            &[1.0, 0.0, -180.0, 0.0, -1.0, 90.0, 0.0, 0.0, 1.0],
        ))
        .unwrap()
        .into_ref();
        GridGeometry::new(Some(GridExtent::with_size(&[360, 180]).unwrap()), None, Some(transform)).unwrap()
    }

    #[test]
    fn test_exponent() {
        assert_eq!(exponent(1.0), 0);
        assert_eq!(exponent(40.0), 5);
        assert_eq!(exponent(64.0), 6);
        assert_eq!(exponent(0.75), -1);
    }

    #[test]
    fn test_round_factor() {
        // span 40 → accuracy 6 → multiples of 1/64.
        assert_eq!(round_factor(2.0, 40.0), 2.0);
        assert_eq!(round_factor(2.3, 40.0), 147.0 / 64.0);
        assert_eq!(round_factor(3.0 + 1.0 / 256.0, 40.0), 3.0);
    }

    #[test]
    fn test_rounding_after_subgrid_fails() {
        let grid = global();
        let mut derivation = grid.derive();
        derivation.subgrid(None, &[]).unwrap();
        let err = derivation.rounding(GridRoundingMode::Enclosing).unwrap_err();
        assert!(matches!(err, GridError::IllegalRequest(ref msg) if msg.contains("subgrid")));
    }

    #[test]
    fn test_reduce_twice_fails() {
        let grid = global();
        let mut derivation = grid.derive();
        derivation.reduce(&[0]).unwrap();
        assert!(matches!(derivation.reduce(&[1]), Err(GridError::IllegalRequest(_))));
    }

    #[test]
    fn test_slice_renames_out_of_domain_argument() {
        let grid = global();
        let mut derivation = grid.derive();
        let err = derivation.slice(&Position::new(vec![500.0, 0.0])).unwrap_err();
        assert!(matches!(err, GridError::OutOfDomain { ref argument, .. } if argument == "slice_point"));
    }

    proptest! {
        #[test]
        fn prop_round_factor_error_is_below_half_cell(factor in 1.0f64..1000.0, span in 1u32..100_000) {
            let span = span as f64;
            let rounded = round_factor(factor, span);
            prop_assert!((factor - rounded).abs() * span < 0.5);
        }
    }
}
