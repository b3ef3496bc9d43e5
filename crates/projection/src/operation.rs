//! Coordinate operations between reference systems.
//!
//! The derivation engine does not know how to go from one CRS to another; it
//! asks a [`CoordinateOperationFactory`]. The default factory covers the
//! systems of this workspace: geographic and Web Mercator horizontal systems,
//! temporal axes with different units or epochs, and compound systems whose
//! components can be matched one by one.

use std::fmt;

use geo_common::{Crs, CrsCode, TemporalCrs};
use tracing::debug;

use crate::error::{TransformError, TransformResult};
use crate::matrix::Matrix;
use crate::mercator::Mercator;
use crate::transform::{concatenate, LinearTransform, MathTransform, PassThroughTransform, TransformRef};

/// Resolves the transform converting coordinates from one CRS to another.
pub trait CoordinateOperationFactory: fmt::Debug + Send + Sync {
    /// Transform from `source` coordinates to `target` coordinates.
    ///
    /// Fails with [`TransformError::OperationNotFound`] when no operation is known.
    fn find_operation(&self, source: &Crs, target: &Crs) -> TransformResult<TransformRef>;
}

/// Built-in operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultOperationFactory;

impl CoordinateOperationFactory for DefaultOperationFactory {
    fn find_operation(&self, source: &Crs, target: &Crs) -> TransformResult<TransformRef> {
        if source == target {
            return Ok(LinearTransform::identity(source.dimension()).into_ref());
        }
        let operation = match (source, target) {
            (Crs::Compound(_), _) | (_, Crs::Compound(_)) => compound_operation(source, target)?,
            _ => single_operation(source, target)?,
        };
        debug!(
            source = %source,
            target = %target,
            "Resolved coordinate operation"
        );
        Ok(operation)
    }
}

fn not_found(source: &Crs, target: &Crs) -> TransformError {
    TransformError::OperationNotFound {
        source_crs: source.to_string(),
        target_crs: target.to_string(),
    }
}

/// Operation between two single (non-compound) systems.
fn single_operation(source: &Crs, target: &Crs) -> TransformResult<TransformRef> {
    match (source, target) {
        (a, b) if a == b => Ok(LinearTransform::identity(a.dimension()).into_ref()),
        (Crs::Horizontal(a), Crs::Horizontal(b)) => horizontal_operation(*a, *b)
            .ok_or_else(|| not_found(source, target)),
        (Crs::Temporal(a), Crs::Temporal(b)) => temporal_operation(a, b),
        _ => Err(not_found(source, target)),
    }
}

fn horizontal_operation(source: CrsCode, target: CrsCode) -> Option<TransformRef> {
    match (source.is_geographic(), target.is_geographic()) {
        // WGS84 and NAD83 are treated as the same datum.
        (true, true) => Some(LinearTransform::identity(2).into_ref()),
        (true, false) if target == CrsCode::Epsg3857 => Some(Mercator::web().into_ref()),
        (false, true) if source == CrsCode::Epsg3857 => Mercator::web().inverse().ok(),
        _ => None,
    }
}

/// `t_target = (t_source * unit_source + (epoch_source - epoch_target)) / unit_target`.
fn temporal_operation(source: &TemporalCrs, target: &TemporalCrs) -> TransformResult<TransformRef> {
    let target_unit = target.unit.seconds();
    let shift = (source.epoch - target.epoch).num_milliseconds() as f64 / 1000.0;
    let transform = LinearTransform::scale_translate(
        &[source.unit.seconds() / target_unit],
        &[shift / target_unit],
    )?;
    Ok(transform.into_ref())
}

/// Match every target component with a convertible source component, select
/// those source dimensions, then convert each component in place.
fn compound_operation(source: &Crs, target: &Crs) -> TransformResult<TransformRef> {
    let source_parts = source.components();
    let mut offsets = Vec::with_capacity(source_parts.len());
    let mut offset = 0;
    for part in &source_parts {
        offsets.push(offset);
        offset += part.dimension();
    }

    let mut used = vec![false; source_parts.len()];
    let mut steps: Vec<(usize, TransformRef)> = Vec::new();
    for target_part in target.components() {
        let found = source_parts
            .iter()
            .enumerate()
            .filter(|(k, _)| !used[*k])
            .find_map(|(k, part)| single_operation(part, target_part).ok().map(|op| (k, op)));
        match found {
            Some((k, op)) => {
                used[k] = true;
                steps.push((k, op));
            }
            None => return Err(not_found(source, target)),
        }
    }

    // Selection matrix: rows are the selected source dimensions, in target order.
    let source_dim = source.dimension();
    let mut rows: Vec<usize> = Vec::new();
    for (k, _) in &steps {
        rows.extend(offsets[*k]..offsets[*k] + source_parts[*k].dimension());
    }
    let mut selection = Matrix::zeros(rows.len() + 1, source_dim + 1);
    for (i, &j) in rows.iter().enumerate() {
        selection[(i, j)] = 1.0;
    }
    selection[(rows.len(), source_dim)] = 1.0;
    let mut operation = LinearTransform::new(selection)?.into_ref();

    let total = rows.len();
    let mut position = 0;
    for (_, step) in steps {
        let dim = step.source_dimensions();
        if !step.is_identity() {
            let widened = PassThroughTransform::create(position, step, total - position - dim);
            operation = concatenate(&operation, &widened)?;
        }
        position += dim;
    }
    Ok(operation)
}
