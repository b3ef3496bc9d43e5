//! Integration tests for grid derivation.
//!
//! Most tests use the one-degree global grid from `test-utils`: extent
//! `[0 … 359] × [0 … 179]`, index `(i, j)` at `(i - 180, 90 - j)` degrees.

use std::sync::Arc;

use geo_common::{Crs, CrsCode, Envelope, Position, TemporalCrs, TimeUnit};
use grid_geometry::{DerivationConfig, GridError, GridExtent, GridGeometry, GridRoundingMode};
use projection::{
    CoordinateOperationFactory, LinearTransform, MathTransform, Mercator, TransformError, TransformRef,
    TransformResult,
};
use test_utils::{assert_coords_approx_eq, global_one_degree, hours_since_2024, identity_grid, lon_lat_time_grid};

fn degrees(lower: [f64; 2], upper: [f64; 2]) -> Envelope {
    Envelope::new(lower.to_vec(), upper.to_vec())
        .unwrap()
        .with_crs(CrsCode::Epsg4326.into())
        .unwrap()
}

fn extent(low: &[i64], high: &[i64]) -> GridExtent {
    GridExtent::new(low.to_vec(), high.to_vec()).unwrap()
}

// =============================================================================
// Call sequence
// =============================================================================

#[test]
fn test_build_is_idempotent() {
    let grid = global_one_degree();
    let mut derivation = grid.derive();
    derivation
        .subgrid(Some(&degrees([10.0, -20.0], [50.0, 20.0])), &[2.0, 2.0])
        .unwrap();
    let first = derivation.build().unwrap();
    let second = derivation.build().unwrap();
    assert_eq!(first, second);
    assert_eq!(derivation.extent().unwrap(), derivation.extent().unwrap());
}

#[test]
fn test_no_restriction_returns_base() {
    let grid = global_one_degree();
    let mut derivation = grid.derive();
    derivation.subgrid(None, &[]).unwrap();
    let built = derivation.build().unwrap();
    assert!(Arc::ptr_eq(built.extent().unwrap(), grid.extent().unwrap()));
    assert_eq!(built, grid);
    assert!(derivation.subsampling().is_none());

    let untouched = grid.derive().build().unwrap();
    assert!(Arc::ptr_eq(untouched.extent().unwrap(), grid.extent().unwrap()));
}

#[test]
fn test_area_of_interest_covering_everything_keeps_base_extent() {
    let grid = global_one_degree();
    let mut derivation = grid.derive();
    derivation
        .subgrid(Some(&degrees([-180.0, -90.0], [180.0, 90.0])), &[])
        .unwrap();
    let built = derivation.build().unwrap();
    assert!(Arc::ptr_eq(built.extent().unwrap(), grid.extent().unwrap()));
}

#[test]
fn test_huge_area_of_interest_keeps_base_extent() {
    let grid = global_one_degree();
    let mut derivation = grid.derive();
    derivation
        .subgrid(Some(&degrees([-1e300, -1e300], [1e300, 1e300])), &[])
        .unwrap();
    let built = derivation.build().unwrap();
    assert!(Arc::ptr_eq(built.extent().unwrap(), grid.extent().unwrap()));
}

#[test]
fn test_far_away_area_of_interest_contains_no_cell() {
    let grid = global_one_degree();
    let mut derivation = grid.derive();
    derivation.rounding(GridRoundingMode::Contained).unwrap();
    let err = derivation
        .subgrid(Some(&degrees([-1e300, -90.0], [-1e299, 90.0])), &[])
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, GridError::OutOfDomain { ref argument, .. } if argument == "area_of_interest"));
}

#[test]
fn test_slice_and_subgrid_are_mutually_exclusive() {
    let grid = global_one_degree();

    let mut derivation = grid.derive();
    derivation.subgrid(None, &[]).unwrap();
    let err = derivation.slice(&Position::new(vec![0.0, 0.0])).unwrap_err();
    assert!(matches!(err, GridError::IllegalRequest(ref msg) if msg.contains("subgrid")));

    let mut derivation = grid.derive();
    derivation.slice(&Position::new(vec![0.0, 0.0])).unwrap();
    let err = derivation.subgrid(None, &[]).unwrap_err();
    assert!(matches!(err, GridError::IllegalRequest(ref msg) if msg.contains("slice")));
    assert!(matches!(
        derivation.rounding(GridRoundingMode::Contained),
        Err(GridError::IllegalRequest(_))
    ));
    assert!(matches!(derivation.slice(&Position::new(vec![1.0, 1.0])), Err(GridError::IllegalRequest(_))));
}

#[test]
fn test_incomplete_base_is_rejected_before_state_change() {
    let grid = GridGeometry::new(Some(GridExtent::with_size(&[10, 10]).unwrap()), None, None).unwrap();
    let mut derivation = grid.derive();
    assert!(matches!(derivation.subgrid(None, &[]), Err(GridError::IncompleteState(_))));
    // Still in the initial state.
    assert!(derivation.rounding(GridRoundingMode::Enclosing).is_ok());
}

#[test]
fn test_dimension_mismatch() {
    let grid = global_one_degree();
    let aoi = Envelope::new(vec![0.0, 0.0, 0.0], vec![10.0, 10.0, 10.0]).unwrap();
    let mut derivation = grid.derive();
    assert!(matches!(
        derivation.subgrid(Some(&aoi), &[]),
        Err(GridError::IllegalRequest(ref msg)) if msg.contains("area_of_interest")
    ));

    let mut derivation = grid.derive();
    assert!(matches!(
        derivation.slice(&Position::new(vec![1.0])),
        Err(GridError::IllegalRequest(_))
    ));
}

#[test]
fn test_invalid_reduce_dimensions() {
    let grid = global_one_degree();
    assert!(matches!(grid.derive().reduce(&[1, 0]), Err(GridError::IllegalRequest(_))));
    assert!(matches!(grid.derive().reduce(&[0, 0]), Err(GridError::IllegalRequest(_))));
    assert!(matches!(grid.derive().reduce(&[2]), Err(GridError::IllegalRequest(_))));
}

// =============================================================================
// Subgrid
// =============================================================================

#[test]
fn test_subgrid_without_resolution() {
    let grid = global_one_degree();
    let mut derivation = grid.derive();
    derivation
        .subgrid(Some(&degrees([10.0, -20.0], [50.0, 20.0])), &[])
        .unwrap();
    assert_eq!(*derivation.extent().unwrap(), extent(&[190, 70], &[229, 109]));
    assert!(derivation.subsampling().is_none());

    let built = derivation.build().unwrap();
    let env = built.envelope().unwrap();
    assert_coords_approx_eq!(env.lower_corner(), [10.0, -20.0], 1e-9);
    assert_coords_approx_eq!(env.upper_corner(), [50.0, 20.0], 1e-9);
}

#[test]
fn test_end_to_end_subsampled_subgrid() {
    let grid = global_one_degree();
    let mut derivation = grid.derive();
    derivation
        .subgrid(Some(&degrees([10.0, -20.0], [50.0, 20.0])), &[2.0, 2.0])
        .unwrap();

    assert_eq!(*derivation.extent().unwrap(), extent(&[95, 35], &[114, 54]));
    let to_base = derivation.subsampling().unwrap();
    assert_eq!(to_base.transform(&[95.0, 35.0]).unwrap(), vec![190.0, 70.0]);
    assert_eq!(
        to_base.derivative(&[0.0, 0.0]).unwrap(),
        projection::Matrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 2.0])
    );

    let built = derivation.build().unwrap();
    assert_eq!(built.resolution().unwrap(), vec![2.0, 2.0]);
    assert_eq!(built.crs(), grid.crs());
    let env = built.envelope().unwrap();
    assert_coords_approx_eq!(env.lower_corner(), [10.0, -20.0], 1e-9);
    assert_coords_approx_eq!(env.upper_corner(), [50.0, 20.0], 1e-9);

    // The base geometry is untouched.
    assert_eq!(grid, global_one_degree());
}

#[test]
fn test_resolution_finer_than_grid_is_ignored() {
    let grid = global_one_degree();
    let mut derivation = grid.derive();
    derivation
        .subgrid(Some(&degrees([10.0, -20.0], [50.0, 20.0])), &[0.5, f64::NAN])
        .unwrap();
    assert!(derivation.subsampling().is_none());
    assert_eq!(*derivation.extent().unwrap(), extent(&[190, 70], &[229, 109]));
}

#[test]
fn test_short_resolution_is_padded() {
    let grid = global_one_degree();
    let mut derivation = grid.derive();
    derivation
        .subgrid(Some(&degrees([10.0, -20.0], [50.0, 20.0])), &[2.0])
        .unwrap();
    assert_eq!(*derivation.extent().unwrap(), extent(&[95, 70], &[114, 109]));
    let scale = derivation.subsampling().unwrap().derivative(&[0.0, 0.0]).unwrap();
    assert_eq!(scale[(0, 0)], 2.0);
    assert_eq!(scale[(1, 1)], 1.0);
}

#[test]
fn test_long_resolution_is_truncated_by_default() {
    let grid = global_one_degree();
    let aoi = degrees([10.0, -20.0], [50.0, 20.0]);

    let mut lenient = grid.derive();
    lenient.subgrid(Some(&aoi), &[2.0, 2.0, 7.0]).unwrap();
    let mut exact = grid.derive();
    exact.subgrid(Some(&aoi), &[2.0, 2.0]).unwrap();
    assert_eq!(lenient.build().unwrap(), exact.build().unwrap());
}

#[test]
fn test_long_resolution_is_rejected_when_strict() {
    let grid = global_one_degree();
    let config = DerivationConfig {
        strict_resolution: true,
        ..DerivationConfig::default()
    };
    let mut derivation = grid.derive_with(config);
    let err = derivation
        .subgrid(Some(&degrees([10.0, -20.0], [50.0, 20.0])), &[2.0, 2.0, 7.0])
        .unwrap_err();
    assert!(matches!(err, GridError::IllegalRequest(ref msg) if msg.contains("resolution")));
}

#[test]
fn test_rounding_modes() {
    let grid = global_one_degree();
    let aoi = degrees([10.4, -20.4], [49.6, 19.6]);

    let mut enclosing = grid.derive();
    enclosing.rounding(GridRoundingMode::Enclosing).unwrap().subgrid(Some(&aoi), &[]).unwrap();
    assert_eq!(*enclosing.extent().unwrap(), extent(&[190, 70], &[229, 110]));

    let mut contained = grid.derive();
    contained.rounding(GridRoundingMode::Contained).unwrap().subgrid(Some(&aoi), &[]).unwrap();
    assert_eq!(*contained.extent().unwrap(), extent(&[191, 71], &[228, 109]));

    let config = DerivationConfig {
        rounding: GridRoundingMode::Enclosing,
        ..DerivationConfig::default()
    };
    let mut configured = grid.derive_with(config);
    configured.subgrid(Some(&aoi), &[]).unwrap();
    assert_eq!(configured.extent().unwrap(), enclosing.extent().unwrap());
}

#[test]
fn test_area_of_interest_outside_grid() {
    let grid = identity_grid(&[0, 0], &[99, 99]);
    let aoi = Envelope::new(vec![200.0, 200.0], vec![300.0, 300.0]).unwrap();
    let err = grid.derive().subgrid(Some(&aoi), &[]).map(|_| ()).unwrap_err();
    assert!(matches!(err, GridError::OutOfDomain { ref argument, .. } if argument == "area_of_interest"));
}

#[test]
fn test_area_of_interest_in_mercator() {
    let grid = global_one_degree();
    let mercator = Mercator::web();
    let lower = mercator.transform(&[10.0, -20.0]).unwrap();
    let upper = mercator.transform(&[50.0, 20.0]).unwrap();
    let aoi = Envelope::new(lower, upper)
        .unwrap()
        .with_crs(CrsCode::Epsg3857.into())
        .unwrap();

    let mut derivation = grid.derive();
    derivation.subgrid(Some(&aoi), &[]).unwrap();
    assert_eq!(*derivation.extent().unwrap(), extent(&[190, 70], &[229, 109]));
    // The derived geometry keeps the base CRS.
    assert_eq!(derivation.build().unwrap().crs(), Some(&Crs::Horizontal(CrsCode::Epsg4326)));
}

#[test]
fn test_unknown_operation_is_a_transform_failure() {
    let grid = global_one_degree();
    let aoi = Envelope::new(vec![0.0, 0.0], vec![1000.0, 1000.0])
        .unwrap()
        .with_crs(CrsCode::Epsg5070.into())
        .unwrap();
    let err = grid.derive().subgrid(Some(&aoi), &[]).map(|_| ()).unwrap_err();
    match err {
        GridError::TransformFailure { argument, source } => {
            assert_eq!(argument, "area_of_interest");
            assert!(matches!(source, TransformError::OperationNotFound { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_horizontal_area_of_interest_on_three_dimensional_grid() {
    let grid = lon_lat_time_grid();
    let mut derivation = grid.derive();
    derivation
        .subgrid(Some(&degrees([-70.0, 40.0], [-60.0, 50.0])), &[1.0, 1.0])
        .unwrap();

    // Time dimension is kept whole and never subsampled.
    assert_eq!(*derivation.extent().unwrap(), extent(&[10, 20, 0], &[19, 29, 47]));
    let to_base = derivation.subsampling().unwrap();
    assert_eq!(to_base.transform(&[10.0, 20.0, 3.0]).unwrap(), vec![20.0, 40.0, 3.0]);

    let built = derivation.build().unwrap();
    assert_eq!(built.resolution().unwrap(), vec![1.0, 1.0, 1.0]);
    assert_eq!(built.crs(), grid.crs());
}

// =============================================================================
// Slice
// =============================================================================

#[test]
fn test_slice_rounds_to_nearest_index() {
    let grid = identity_grid(&[-180, -90], &[179, 89]);
    let mut derivation = grid.derive();
    derivation.slice(&Position::new(vec![12.4, -7.6])).unwrap();
    assert_eq!(*derivation.extent().unwrap(), extent(&[12, -8], &[12, -8]));
}

#[test]
fn test_slice_outside_extent() {
    let grid = identity_grid(&[0, 0], &[359, 179]);
    let err = grid
        .derive()
        .slice(&Position::new(vec![12.4, -7.6]))
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, GridError::OutOfDomain { ref argument, .. } if argument == "slice_point"));
}

#[test]
fn test_slice_with_unconstrained_coordinate() {
    let grid = global_one_degree();
    let mut derivation = grid.derive();
    derivation.slice(&Position::new(vec![f64::NAN, 45.2])).unwrap();
    // Latitude 45.2 is at row 44.8, rounded to 45.
    assert_eq!(*derivation.extent().unwrap(), extent(&[0, 45], &[359, 45]));
}

#[test]
fn test_slice_time_in_other_temporal_crs() {
    let grid = lon_lat_time_grid();
    // Hours since 2024-01-02: -18.7 is hour 5.3 of the grid axis.
    let epoch = hours_since_2024().epoch + chrono::Duration::days(1);
    let point = Position::new(vec![-18.7])
        .with_crs(TemporalCrs::new(epoch, TimeUnit::Hours).into())
        .unwrap();

    let mut derivation = grid.derive();
    derivation.slice(&point).unwrap();
    let sliced = derivation.extent().unwrap();
    assert_eq!(*sliced, extent(&[0, 0, 5], &[199, 99, 5]));

    let horizontal = sliced.subspace_dimensions(2).unwrap();
    assert_eq!(horizontal, vec![0, 1]);
    derivation.reduce(&horizontal).unwrap();
    let built = derivation.build().unwrap();
    assert_eq!(*built.extent().unwrap().as_ref(), extent(&[0, 0], &[199, 99]));
    assert_eq!(built.crs(), Some(&Crs::Horizontal(CrsCode::Epsg4326)));
    assert_eq!(built.resolution().unwrap(), vec![0.5, 0.5]);
}

// =============================================================================
// Reduce
// =============================================================================

#[test]
fn test_reduce_extent() {
    let grid = identity_grid(&[0, 0, 0], &[9, 4, 1]);
    let mut derivation = grid.derive();
    derivation.reduce(&[0, 2]).unwrap();
    assert_eq!(*derivation.extent().unwrap(), extent(&[0, 0], &[9, 1]));
    let built = derivation.build().unwrap();
    assert_eq!(built.dimension(), 2);
    assert_eq!(built.corner_to_crs().unwrap().transform(&[3.0, 1.0]).unwrap(), vec![3.0, 1.0]);
}

#[test]
fn test_reduce_to_time_axis() {
    let grid = lon_lat_time_grid();
    let mut derivation = grid.derive();
    derivation.reduce(&[2]).unwrap();
    let built = derivation.build().unwrap();
    assert_eq!(built.crs(), Some(&Crs::Temporal(hours_since_2024())));
    assert_eq!(*built.extent().unwrap().as_ref(), extent(&[0], &[47]));
}

#[test]
fn test_reduce_splitting_crs_component_fails() {
    let grid = lon_lat_time_grid();
    let mut derivation = grid.derive();
    derivation.reduce(&[0, 2]).unwrap();
    assert_eq!(*derivation.extent().unwrap(), extent(&[0, 0], &[199, 47]));
    assert!(matches!(derivation.build(), Err(GridError::IllegalRequest(_))));
}

#[test]
fn test_subgrid_then_reduce() {
    let grid = lon_lat_time_grid();
    let mut derivation = grid.derive();
    derivation
        .subgrid(Some(&degrees([-70.0, 40.0], [-60.0, 50.0])), &[])
        .unwrap()
        .reduce(&[0, 1])
        .unwrap();
    let built = derivation.build().unwrap();
    assert_eq!(*built.extent().unwrap().as_ref(), extent(&[20, 40], &[39, 59]));
    let env = built.envelope().unwrap();
    assert_coords_approx_eq!(env.lower_corner(), [-70.0, 40.0], 1e-9);
    assert_coords_approx_eq!(env.upper_corner(), [-60.0, 50.0], 1e-9);
}

// =============================================================================
// Custom operation factory
// =============================================================================

/// Pretends EPSG:3413 is EPSG:4326 shifted by 1000 units.
#[derive(Debug)]
struct ShiftedFactory;

impl CoordinateOperationFactory for ShiftedFactory {
    fn find_operation(&self, _source: &Crs, _target: &Crs) -> TransformResult<TransformRef> {
        Ok(LinearTransform::scale_translate(&[1.0, 1.0], &[1000.0, 1000.0])?.into_ref())
    }
}

#[test]
fn test_custom_operation_factory() {
    let grid = global_one_degree();
    let aoi = Envelope::new(vec![1010.0, 980.0], vec![1050.0, 1020.0])
        .unwrap()
        .with_crs(CrsCode::Epsg3413.into())
        .unwrap();
    let mut derivation = grid.derive().with_factory(&ShiftedFactory);
    derivation.subgrid(Some(&aoi), &[]).unwrap();
    assert_eq!(*derivation.extent().unwrap(), extent(&[190, 70], &[229, 109]));
}
