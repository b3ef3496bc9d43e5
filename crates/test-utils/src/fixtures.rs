//! Base grid geometries for derivation tests.

use chrono::{TimeZone, Utc};
use geo_common::{Crs, CrsCode, TemporalCrs, TimeUnit};
use grid_geometry::{GridExtent, GridGeometry};
use projection::{LinearTransform, Matrix};

/// Hourly time axis starting 2024-01-01T00:00:00Z.
pub fn hours_since_2024() -> TemporalCrs {
    TemporalCrs::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        TimeUnit::Hours,
    )
}

/// One-degree global grid: extent `[0 … 359] × [0 … 179]`, index `(i, j)`
/// mapped to `(i - 180, 90 - j)` degrees in EPSG:4326.
pub fn global_one_degree() -> GridGeometry {
    let transform = LinearTransform::new(Matrix::from_row_slice(
        3,
        3,
        &[
            1.0, 0.0, -180.0, //
            0.0, -1.0, 90.0, //
            0.0, 0.0, 1.0,
        ],
    ))
    .unwrap()
    .into_ref();
    GridGeometry::new(
        Some(GridExtent::with_size(&[360, 180]).unwrap()),
        Some(CrsCode::Epsg4326.into()),
        Some(transform),
    )
    .unwrap()
}

/// Grid whose indices are CRS coordinates, without CRS.
pub fn identity_grid(low: &[i64], high: &[i64]) -> GridGeometry {
    GridGeometry::new(
        Some(GridExtent::new(low.to_vec(), high.to_vec()).unwrap()),
        None,
        Some(LinearTransform::identity(low.len()).into_ref()),
    )
    .unwrap()
}

/// Half-degree grid over the North Atlantic with 48 hourly time steps:
/// extent `[0 … 199] × [0 … 99] × [0 … 47]` in EPSG:4326 + hours since 2024.
///
/// Cell `(i, j, t)` has its corner at `(-80 + i/2, 70 - j/2)` degrees and
/// hour `t`.
pub fn lon_lat_time_grid() -> GridGeometry {
    let transform = LinearTransform::new(Matrix::from_row_slice(
        4,
        4,
        &[
            0.5, 0.0, 0.0, -80.0, //
            0.0, -0.5, 0.0, 70.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    ))
    .unwrap()
    .into_ref();
    GridGeometry::new(
        Some(GridExtent::with_size(&[200, 100, 48]).unwrap()),
        Some(Crs::compound(vec![
            CrsCode::Epsg4326.into(),
            hours_since_2024().into(),
        ])),
        Some(transform),
    )
    .unwrap()
}
