//! Derivation requests read from JSON files.
//!
//! ```json
//! {
//!   "base": {
//!     "low": [0, 0], "high": [359, 179], "crs": "EPSG:4326",
//!     "corner_to_crs": [[1, 0, -180], [0, -1, 90], [0, 0, 1]]
//!   },
//!   "rounding": "nearest",
//!   "subgrid": { "envelope": "10,-20,50,20", "resolution": [2, 2] },
//!   "reduce": [0, 1]
//! }
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use geo_common::{Crs, Envelope, Position};
use grid_geometry::{DerivationConfig, GridExtent, GridGeometry, GridRoundingMode};
use projection::{LinearTransform, Matrix, MathTransform, Structure, TransformRef};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A base grid geometry and the derivation steps to apply to it.
#[derive(Debug, Clone, Deserialize)]
pub struct DerivationRequest {
    pub base: BaseGrid,
    /// Overrides the configured default rounding mode.
    #[serde(default)]
    pub rounding: Option<GridRoundingMode>,
    #[serde(default)]
    pub subgrid: Option<SubgridRequest>,
    #[serde(default)]
    pub slice: Option<SliceRequest>,
    #[serde(default)]
    pub reduce: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BaseGrid {
    pub low: Vec<i64>,
    pub high: Vec<i64>,
    #[serde(default)]
    pub crs: Option<String>,
    /// Row-major homogeneous matrix from cell corners to CRS coordinates.
    #[serde(default)]
    pub corner_to_crs: Option<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubgridRequest {
    /// "min1,...,minN,max1,...,maxN"
    #[serde(default)]
    pub envelope: Option<String>,
    #[serde(default)]
    pub crs: Option<String>,
    #[serde(default)]
    pub resolution: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SliceRequest {
    /// `null` leaves the dimension unconstrained.
    pub point: Vec<Option<f64>>,
    #[serde(default)]
    pub crs: Option<String>,
}

/// Summary of a derived grid geometry.
#[derive(Debug, Clone, Serialize)]
pub struct DerivationOutput {
    pub extent: Option<GridExtent>,
    pub crs: Option<String>,
    /// Present when the grid to CRS transform is affine.
    pub corner_to_crs: Option<Vec<Vec<f64>>>,
    pub envelope: Option<EnvelopeOutput>,
    pub resolution: Option<Vec<f64>>,
    /// Subsampled grid coordinates to base grid coordinates.
    pub subsampling: Option<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeOutput {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl DerivationRequest {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file: {}", path.display()))?;
        let request: DerivationRequest = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse request file: {}", path.display()))?;
        debug!(path = %path.display(), "Loaded derivation request");
        Ok(request)
    }

    /// Run the derivation steps on the base grid.
    ///
    /// Steps run in the order rounding, subgrid, slice, reduce; asking for
    /// both a subgrid and a slice is rejected by the derivation itself.
    pub fn execute(&self, config: &DerivationConfig) -> Result<DerivationOutput> {
        let base = self.base.to_geometry()?;
        let mut derivation = base.derive_with(config.clone());
        if let Some(mode) = self.rounding {
            derivation.rounding(mode)?;
        }
        if let Some(subgrid) = &self.subgrid {
            let area_of_interest = match &subgrid.envelope {
                Some(text) => {
                    let envelope = Envelope::parse(text).context("Invalid subgrid envelope")?;
                    Some(match parse_crs(subgrid.crs.as_deref())? {
                        Some(crs) => envelope.with_crs(crs)?,
                        None => envelope,
                    })
                }
                None => None,
            };
            derivation
                .subgrid(area_of_interest.as_ref(), &subgrid.resolution)
                .context("Subgrid failed")?;
        }
        if let Some(slice) = &self.slice {
            let coordinates = slice.point.iter().map(|c| c.unwrap_or(f64::NAN)).collect();
            let mut point = Position::new(coordinates);
            if let Some(crs) = parse_crs(slice.crs.as_deref())? {
                point = point.with_crs(crs)?;
            }
            derivation.slice(&point).context("Slice failed")?;
        }
        if let Some(dimensions) = &self.reduce {
            derivation.reduce(dimensions)?;
        }

        let grid = derivation.build()?;
        Ok(DerivationOutput::new(&grid, derivation.subsampling()))
    }
}

impl BaseGrid {
    fn to_geometry(&self) -> Result<GridGeometry> {
        let extent = GridExtent::new(self.low.clone(), self.high.clone())?;
        let transform = match &self.corner_to_crs {
            Some(rows) => Some(matrix_transform(rows)?),
            None => None,
        };
        let crs = parse_crs(self.crs.as_deref())?;
        Ok(GridGeometry::new(Some(extent), crs, transform)?)
    }
}

fn parse_crs(text: Option<&str>) -> Result<Option<Crs>> {
    text.map(|s| s.parse::<Crs>().with_context(|| format!("Invalid CRS: {}", s)))
        .transpose()
}

fn matrix_transform(rows: &[Vec<f64>]) -> Result<TransformRef> {
    let ncols = rows.first().map_or(0, Vec::len);
    if ncols < 2 || rows.len() < 2 || rows.iter().any(|row| row.len() != ncols) {
        bail!("corner_to_crs must be a rectangular matrix of at least 2×2 values");
    }
    let values: Vec<f64> = rows.iter().flatten().copied().collect();
    let matrix = Matrix::from_row_slice(rows.len(), ncols, &values);
    Ok(LinearTransform::new(matrix)?.into_ref())
}

fn matrix_rows(transform: &TransformRef) -> Option<Vec<Vec<f64>>> {
    match transform.structure() {
        Structure::Linear(matrix) => Some(
            matrix
                .row_iter()
                .map(|row| row.iter().copied().collect())
                .collect(),
        ),
        _ => None,
    }
}

impl DerivationOutput {
    fn new(grid: &GridGeometry, subsampling: Option<&TransformRef>) -> Self {
        Self {
            extent: grid.extent().map(|e| e.as_ref().clone()),
            crs: grid.crs().map(Crs::to_string),
            corner_to_crs: grid.corner_to_crs().and_then(matrix_rows),
            envelope: grid.envelope().map(|e| EnvelopeOutput {
                lower: e.lower_corner().to_vec(),
                upper: e.upper_corner().to_vec(),
            }),
            resolution: grid.resolution().ok(),
            subsampling: subsampling.and_then(matrix_rows),
        }
    }
}
