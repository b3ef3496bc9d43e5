//! Dimension separation.
//!
//! Extracts from a transform the sub-transform that maps only some of its
//! source dimensions to only some of its target dimensions. Separation works
//! on the structure exposed by [`MathTransform::structure`]: matrices are cut
//! row by row, concatenations are separated step by step and pass-through
//! transforms are split around their sub-transform. Opaque transforms can only
//! be "separated" into themselves.

use std::sync::Arc;

use tracing::debug;

use crate::error::{TransformError, TransformResult};
use crate::matrix;
use crate::transform::{concatenate, LinearTransform, MathTransform, PassThroughTransform, Structure, TransformRef};

/// Result of a separation.
#[derive(Debug, Clone)]
pub struct Separated {
    /// Transform from the kept source dimensions to the kept target dimensions.
    pub transform: TransformRef,
    /// Indices of the kept source dimensions, strictly increasing.
    pub source_dimensions: Vec<usize>,
    /// Indices of the kept target dimensions, strictly increasing.
    pub target_dimensions: Vec<usize>,
}

/// Reduce `transform` so that it has exactly `required` source dimensions.
///
/// All target dimensions are kept. When the transform already has `required`
/// source dimensions it is returned unchanged with no dimension map; otherwise
/// the returned map lists the source dimensions that were kept.
pub fn separate(transform: &TransformRef, required: usize) -> TransformResult<(TransformRef, Option<Vec<usize>>)> {
    if transform.source_dimensions() == required {
        return Ok((transform.clone(), None));
    }
    let targets: Vec<usize> = (0..transform.target_dimensions()).collect();
    let separated = separate_targets(transform, &targets)?;
    if separated.source_dimensions.len() != required {
        return Err(TransformError::not_separable(format!(
            "cannot map to grid dimensions: {} source dimensions {:?} contribute to {} target dimensions",
            separated.source_dimensions.len(),
            separated.source_dimensions,
            required
        )));
    }
    debug!(
        kept = ?separated.source_dimensions,
        "Separated transform"
    );
    Ok((separated.transform, Some(separated.source_dimensions)))
}

/// Keep the given target dimensions and only the source dimensions they depend on.
pub fn separate_targets(transform: &TransformRef, targets: &[usize]) -> TransformResult<Separated> {
    check_dimensions(targets, transform.target_dimensions())?;
    by_targets(transform, targets)
}

/// Keep the given source dimensions and the target dimensions that depend only on them.
pub fn separate_sources(transform: &TransformRef, sources: &[usize]) -> TransformResult<Separated> {
    check_dimensions(sources, transform.source_dimensions())?;
    by_sources(transform, sources)
}

fn check_dimensions(dimensions: &[usize], count: usize) -> TransformResult<()> {
    if dimensions.is_empty() {
        return Err(TransformError::illegal_dimensions(dimensions, "no dimension selected"));
    }
    if dimensions.windows(2).any(|w| w[0] >= w[1]) {
        return Err(TransformError::illegal_dimensions(
            dimensions,
            "dimensions must be strictly increasing",
        ));
    }
    if let Some(&last) = dimensions.last() {
        if last >= count {
            return Err(TransformError::illegal_dimensions(
                dimensions,
                format!("dimension out of range 0..{}", count),
            ));
        }
    }
    Ok(())
}

fn all(count: usize) -> Vec<usize> {
    (0..count).collect()
}

fn by_targets(transform: &TransformRef, targets: &[usize]) -> TransformResult<Separated> {
    match transform.structure() {
        Structure::Linear(m) => {
            let src = transform.source_dimensions();
            let sources: Vec<usize> = (0..src)
                .filter(|&j| targets.iter().any(|&i| m[(i, j)] != 0.0))
                .collect();
            Ok(Separated {
                transform: linear_subset(m, targets, &sources, transform)?,
                source_dimensions: sources,
                target_dimensions: targets.to_vec(),
            })
        }
        Structure::Concatenated { first, second } => {
            let step2 = by_targets(second, targets)?;
            if step2.source_dimensions.is_empty() {
                return Err(TransformError::not_separable(format!(
                    "target dimensions {:?} do not depend on any source dimension",
                    targets
                )));
            }
            let step1 = by_targets(first, &step2.source_dimensions)?;
            Ok(Separated {
                transform: concatenate(&step1.transform, &step2.transform)?,
                source_dimensions: step1.source_dimensions,
                target_dimensions: targets.to_vec(),
            })
        }
        Structure::PassThrough {
            first_affected,
            sub,
            num_trailing: _,
        } => {
            let sub_src = sub.source_dimensions();
            let sub_tgt = sub.target_dimensions();
            let sub_end = first_affected + sub_tgt;
            let leading: Vec<usize> = targets.iter().copied().filter(|&t| t < first_affected).collect();
            let trailing: Vec<usize> = targets.iter().copied().filter(|&t| t >= sub_end).collect();
            let inner: Vec<usize> = targets
                .iter()
                .filter(|&&t| t >= first_affected && t < sub_end)
                .map(|&t| t - first_affected)
                .collect();

            let mut sources = leading.clone();
            let middle = if inner.is_empty() {
                None
            } else {
                let separated = by_targets(sub, &inner)?;
                sources.extend(separated.source_dimensions.iter().map(|&s| s + first_affected));
                Some(separated.transform)
            };
            sources.extend(trailing.iter().map(|&t| t - sub_tgt + sub_src));
            let transform = match middle {
                Some(sub) => PassThroughTransform::create(leading.len(), sub, trailing.len()),
                None => LinearTransform::identity(leading.len() + trailing.len()).into_ref(),
            };
            Ok(Separated {
                transform,
                source_dimensions: sources,
                target_dimensions: targets.to_vec(),
            })
        }
        Structure::Opaque => {
            if targets.len() == transform.target_dimensions() {
                Ok(Separated {
                    transform: transform.clone(),
                    source_dimensions: all(transform.source_dimensions()),
                    target_dimensions: targets.to_vec(),
                })
            } else {
                Err(TransformError::not_separable(format!(
                    "target dimensions {:?} of {:?}",
                    targets, transform
                )))
            }
        }
    }
}

fn by_sources(transform: &TransformRef, sources: &[usize]) -> TransformResult<Separated> {
    match transform.structure() {
        Structure::Linear(m) => {
            let src = transform.source_dimensions();
            let targets: Vec<usize> = (0..transform.target_dimensions())
                .filter(|&i| {
                    let mut depends = false;
                    for j in 0..src {
                        if m[(i, j)] != 0.0 {
                            if !sources.contains(&j) {
                                return false;
                            }
                            depends = true;
                        }
                    }
                    depends
                })
                .collect();
            Ok(Separated {
                transform: linear_subset(m, &targets, sources, transform)?,
                source_dimensions: sources.to_vec(),
                target_dimensions: targets,
            })
        }
        Structure::Concatenated { first, second } => {
            let step1 = by_sources(first, sources)?;
            if step1.target_dimensions.is_empty() {
                return Err(TransformError::not_separable(format!(
                    "no target dimension depends only on source dimensions {:?}",
                    sources
                )));
            }
            let step2 = by_sources(second, &step1.target_dimensions)?;
            Ok(Separated {
                transform: concatenate(&step1.transform, &step2.transform)?,
                source_dimensions: sources.to_vec(),
                target_dimensions: step2.target_dimensions,
            })
        }
        Structure::PassThrough {
            first_affected,
            sub,
            num_trailing: _,
        } => {
            let sub_src = sub.source_dimensions();
            let sub_tgt = sub.target_dimensions();
            let sub_end = first_affected + sub_src;
            let leading: Vec<usize> = sources.iter().copied().filter(|&s| s < first_affected).collect();
            let trailing: Vec<usize> = sources.iter().copied().filter(|&s| s >= sub_end).collect();
            let inner: Vec<usize> = sources
                .iter()
                .filter(|&&s| s >= first_affected && s < sub_end)
                .map(|&s| s - first_affected)
                .collect();

            let mut targets = leading.clone();
            let middle = if inner.is_empty() {
                None
            } else {
                let separated = by_sources(sub, &inner)?;
                targets.extend(separated.target_dimensions.iter().map(|&t| t + first_affected));
                Some(separated.transform)
            };
            targets.extend(trailing.iter().map(|&s| s - sub_src + sub_tgt));
            let transform = match middle {
                Some(sub) => PassThroughTransform::create(leading.len(), sub, trailing.len()),
                None => LinearTransform::identity(leading.len() + trailing.len()).into_ref(),
            };
            Ok(Separated {
                transform,
                source_dimensions: sources.to_vec(),
                target_dimensions: targets,
            })
        }
        Structure::Opaque => {
            if sources.len() == transform.source_dimensions() {
                Ok(Separated {
                    transform: transform.clone(),
                    source_dimensions: sources.to_vec(),
                    target_dimensions: all(transform.target_dimensions()),
                })
            } else {
                Err(TransformError::not_separable(format!(
                    "source dimensions {:?} of {:?}",
                    sources, transform
                )))
            }
        }
    }
}

/// Sub-matrix of an affine matrix, keeping the translation column and the last row.
fn linear_subset(
    m: &matrix::Matrix,
    targets: &[usize],
    sources: &[usize],
    original: &TransformRef,
) -> TransformResult<TransformRef> {
    let (src, tgt) = (original.source_dimensions(), original.target_dimensions());
    if sources.len() == src && targets.len() == tgt {
        return Ok(original.clone());
    }
    let rows: Vec<usize> = targets.iter().copied().chain(std::iter::once(tgt)).collect();
    let cols: Vec<usize> = sources.iter().copied().chain(std::iter::once(src)).collect();
    let selected = matrix::select(m, &rows, &cols);
    Ok(Arc::new(LinearTransform::new(selected)?))
}
