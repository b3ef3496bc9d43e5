//! Grid geometries: extent, CRS and grid-to-CRS transform.

use std::sync::{Arc, OnceLock};

use geo_common::{Crs, Envelope};
use projection::{concatenate, separate_sources, transform_envelope, transforms_equal, TransformRef};
use tracing::{debug, warn};

use crate::config::DerivationConfig;
use crate::derivation::GridDerivation;
use crate::error::{GridError, GridResult};
use crate::extent::{verify_dimensions, GridExtent};

/// Valid domain of a grid and its relation to a coordinate reference system.
///
/// The transform maps cell-corner grid coordinates to CRS coordinates. Grid
/// geometries are immutable; [`GridGeometry::derive`] is the way to obtain a
/// restricted, sliced or subsampled geometry from an existing one.
#[derive(Debug, Clone)]
pub struct GridGeometry {
    extent: Option<Arc<GridExtent>>,
    crs: Option<Crs>,
    corner_to_crs: Option<TransformRef>,
    envelope: OnceLock<Option<Envelope>>,
}

impl GridGeometry {
    /// Create a grid geometry.
    ///
    /// At least the extent or the transform is required. The transform source
    /// dimensions must match the extent, and its target dimensions the CRS.
    pub fn new(
        extent: Option<GridExtent>,
        crs: Option<Crs>,
        corner_to_crs: Option<TransformRef>,
    ) -> GridResult<Self> {
        Self::from_parts(extent.map(Arc::new), crs, corner_to_crs)
    }

    fn from_parts(
        extent: Option<Arc<GridExtent>>,
        crs: Option<Crs>,
        corner_to_crs: Option<TransformRef>,
    ) -> GridResult<Self> {
        if extent.is_none() && corner_to_crs.is_none() {
            return Err(GridError::illegal_request(
                "grid geometry needs an extent or a grid to CRS transform",
            ));
        }
        if let (Some(extent), Some(transform)) = (&extent, &corner_to_crs) {
            if extent.dimension() != transform.source_dimensions() {
                return Err(GridError::illegal_request(format!(
                    "extent has {} dimensions but the transform expects {}",
                    extent.dimension(),
                    transform.source_dimensions()
                )));
            }
        }
        if let Some(crs) = &crs {
            let expected = match (&corner_to_crs, &extent) {
                (Some(t), _) => t.target_dimensions(),
                (None, Some(e)) => e.dimension(),
                (None, None) => crs.dimension(),
            };
            if crs.dimension() != expected {
                return Err(GridError::illegal_request(format!(
                    "CRS {} has {} dimensions, expected {}",
                    crs,
                    crs.dimension(),
                    expected
                )));
            }
        }
        Ok(Self {
            extent,
            crs,
            corner_to_crs,
            envelope: OnceLock::new(),
        })
    }

    /// Geometry of `base` restricted to `extent`.
    ///
    /// `to_base` maps the new grid coordinates to the grid coordinates of
    /// `base`; without it both grids share the same cell size.
    pub fn subgrid(
        base: &GridGeometry,
        extent: Arc<GridExtent>,
        to_base: Option<&TransformRef>,
    ) -> GridResult<Self> {
        let corner_to_crs = match (to_base, &base.corner_to_crs) {
            (Some(to_base), Some(transform)) => Some(
                concatenate(to_base, transform)
                    .map_err(|e| GridError::transform_failure("subgrid", e))?,
            ),
            (None, transform) => transform.clone(),
            (Some(_), None) => return Err(GridError::incomplete_state("grid to CRS transform is missing")),
        };
        debug!(extent = %extent, "Built subgrid geometry");
        Self::from_parts(Some(extent), base.crs.clone(), corner_to_crs)
    }

    /// Geometry of `base` with only the given grid dimensions.
    ///
    /// The transform keeps the CRS dimensions that depend only on the selected
    /// grid dimensions, and the CRS is reduced to those dimensions.
    pub fn reduce(base: &GridGeometry, dimensions: &[usize]) -> GridResult<Self> {
        let dims = verify_dimensions(dimensions, base.dimension())?;
        let extent = match &base.extent {
            Some(e) => Some(Arc::new(e.reduce(&dims)?)),
            None => None,
        };
        let (corner_to_crs, crs_dimensions) = match &base.corner_to_crs {
            Some(transform) => {
                let separated = separate_sources(transform, &dims)
                    .map_err(|e| GridError::transform_failure("dimensions", e))?;
                (Some(separated.transform), separated.target_dimensions)
            }
            None => (None, dims.clone()),
        };
        let crs = match &base.crs {
            Some(crs) => Some(crs.select_dimensions(&crs_dimensions).ok_or_else(|| {
                GridError::illegal_request(format!(
                    "cannot reduce CRS {} to dimensions {:?}",
                    crs, crs_dimensions
                ))
            })?),
            None => None,
        };
        debug!(dimensions = ?dims, "Built reduced geometry");
        Self::from_parts(extent, crs, corner_to_crs)
    }

    /// Number of grid dimensions.
    pub fn dimension(&self) -> usize {
        match (&self.extent, &self.corner_to_crs) {
            (Some(e), _) => e.dimension(),
            (None, Some(t)) => t.source_dimensions(),
            (None, None) => 0,
        }
    }

    pub fn extent(&self) -> Option<&Arc<GridExtent>> {
        self.extent.as_ref()
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    pub fn corner_to_crs(&self) -> Option<&TransformRef> {
        self.corner_to_crs.as_ref()
    }

    /// The extent, or [`GridError::IncompleteState`] if there is none.
    pub fn require_extent(&self) -> GridResult<&Arc<GridExtent>> {
        self.extent
            .as_ref()
            .ok_or_else(|| GridError::incomplete_state("grid extent is missing"))
    }

    /// The grid to CRS transform, or [`GridError::IncompleteState`] if there is none.
    pub fn require_grid_to_crs(&self) -> GridResult<&TransformRef> {
        self.corner_to_crs
            .as_ref()
            .ok_or_else(|| GridError::incomplete_state("grid to CRS transform is missing"))
    }

    /// Bounding box of the grid in CRS coordinates, computed on first use.
    ///
    /// `None` when the extent or the transform is missing, or when the
    /// transform fails on the grid corners.
    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope
            .get_or_init(|| {
                let (extent, transform) = (self.extent.as_ref()?, self.corner_to_crs.as_ref()?);
                let computed = extent
                    .to_envelope()
                    .ok()
                    .and_then(|cells| transform_envelope(transform.as_ref(), &cells).ok());
                let Some(envelope) = computed else {
                    warn!(extent = %extent, "Cannot compute grid geometry envelope");
                    return None;
                };
                match &self.crs {
                    Some(crs) => envelope.with_crs(crs.clone()).ok(),
                    None => Some(envelope),
                }
            })
            .as_ref()
    }

    /// Size of a grid cell in CRS units, per CRS dimension, at the point of interest.
    pub fn resolution(&self) -> GridResult<Vec<f64>> {
        let extent = self.require_extent()?;
        let transform = self.require_grid_to_crs()?;
        let jacobian = transform
            .derivative(&extent.point_of_interest())
            .map_err(|e| GridError::transform_failure("resolution", e))?;
        Ok(jacobian
            .row_iter()
            .map(|row| row.iter().map(|v| v * v).sum::<f64>().sqrt())
            .collect())
    }

    /// Start a derivation with the default configuration.
    pub fn derive(&self) -> GridDerivation<'_> {
        GridDerivation::new(self)
    }

    /// Start a derivation with the given configuration.
    pub fn derive_with(&self, config: DerivationConfig) -> GridDerivation<'_> {
        GridDerivation::with_config(self, config)
    }
}

impl PartialEq for GridGeometry {
    fn eq(&self, other: &Self) -> bool {
        let transforms = match (&self.corner_to_crs, &other.corner_to_crs) {
            (Some(a), Some(b)) => transforms_equal(a, b),
            (None, None) => true,
            _ => false,
        };
        transforms && self.extent == other.extent && self.crs == other.crs
    }
}
