//! Mathematical transforms between coordinate spaces.
//!
//! A [`MathTransform`] maps points from a source space (for example grid
//! indices) to a target space (for example longitude/latitude). Transforms are
//! shared as [`TransformRef`] and never mutated; combining them always
//! produces a new transform.

use std::fmt;
use std::sync::Arc;

use geo_common::Envelope;

use crate::error::{TransformError, TransformResult};
use crate::matrix::{self, Matrix};

/// Shared, immutable transform.
pub type TransformRef = Arc<dyn MathTransform>;

/// How a transform is built, as seen by the dimension separator.
#[derive(Debug)]
pub enum Structure<'a> {
    /// Affine transform given by a homogeneous matrix.
    Linear(&'a Matrix),
    /// `second(first(x))`.
    Concatenated {
        first: &'a TransformRef,
        second: &'a TransformRef,
    },
    /// `sub` applied to a contiguous range of coordinates, the others being copied.
    PassThrough {
        first_affected: usize,
        sub: &'a TransformRef,
        num_trailing: usize,
    },
    /// No decomposition known.
    Opaque,
}

/// A mapping from source coordinates to target coordinates.
pub trait MathTransform: fmt::Debug + Send + Sync {
    /// Number of coordinates of input points.
    fn source_dimensions(&self) -> usize;

    /// Number of coordinates of output points.
    fn target_dimensions(&self) -> usize;

    /// Transform a single point.
    fn transform(&self, point: &[f64]) -> TransformResult<Vec<f64>>;

    /// Jacobian matrix (`target × source`) at the given source point.
    fn derivative(&self, point: &[f64]) -> TransformResult<Matrix>;

    /// The inverse transform.
    fn inverse(&self) -> TransformResult<TransformRef>;

    /// Decomposition used for dimension separation.
    fn structure(&self) -> Structure<'_> {
        Structure::Opaque
    }

    fn is_identity(&self) -> bool {
        false
    }
}

pub(crate) fn check_point(expected: usize, point: &[f64]) -> TransformResult<()> {
    if point.len() != expected {
        return Err(TransformError::mismatched_dimension("point", expected, point.len()));
    }
    Ok(())
}

/// Affine transform backed by a homogeneous matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearTransform {
    matrix: Matrix,
}

impl LinearTransform {
    /// Create a transform from a `(target + 1) × (source + 1)` affine matrix.
    pub fn new(matrix: Matrix) -> TransformResult<Self> {
        if !matrix::is_affine(&matrix) {
            return Err(TransformError::IllegalMatrix(format!(
                "last row of {}×{} matrix must be [0 … 0 1]",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        Ok(Self { matrix })
    }

    pub fn identity(dimension: usize) -> Self {
        Self {
            matrix: matrix::identity(dimension + 1),
        }
    }

    /// `x' = scale * x + translation` in each dimension.
    pub fn scale_translate(scales: &[f64], translations: &[f64]) -> TransformResult<Self> {
        Ok(Self {
            matrix: matrix::scale_translate(scales, translations)?,
        })
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    pub fn into_ref(self) -> TransformRef {
        Arc::new(self)
    }
}

impl MathTransform for LinearTransform {
    fn source_dimensions(&self) -> usize {
        self.matrix.ncols() - 1
    }

    fn target_dimensions(&self) -> usize {
        self.matrix.nrows() - 1
    }

    fn transform(&self, point: &[f64]) -> TransformResult<Vec<f64>> {
        check_point(self.source_dimensions(), point)?;
        let mut homogeneous = point.to_vec();
        homogeneous.push(1.0);
        let mut out = matrix::multiply(&self.matrix, &homogeneous)?;
        out.pop();
        Ok(out)
    }

    fn derivative(&self, point: &[f64]) -> TransformResult<Matrix> {
        let src = self.source_dimensions();
        check_point(src, point)?;
        let rows: Vec<usize> = (0..self.target_dimensions()).collect();
        let cols: Vec<usize> = (0..src).collect();
        Ok(matrix::select(&self.matrix, &rows, &cols))
    }

    fn inverse(&self) -> TransformResult<TransformRef> {
        let n = self.source_dimensions();
        if n != self.target_dimensions() {
            return Err(TransformError::NonInvertible(format!(
                "{} source dimensions for {} target dimensions",
                n,
                self.target_dimensions()
            )));
        }
        // Invert the linear part and solve the translation separately, so the
        // last row stays exactly [0 … 0 1].
        let all: Vec<usize> = (0..n).collect();
        let linear = matrix::inverse(&matrix::select(&self.matrix, &all, &all))?;
        let translation: Vec<f64> = (0..n).map(|i| self.matrix[(i, n)]).collect();
        let shifted = matrix::multiply(&linear, &translation)?;
        let mut inv = matrix::identity(n + 1);
        for i in 0..n {
            for j in 0..n {
                inv[(i, j)] = linear[(i, j)];
            }
            inv[(i, n)] = -shifted[i];
        }
        Ok(Arc::new(LinearTransform { matrix: inv }))
    }

    fn structure(&self) -> Structure<'_> {
        Structure::Linear(&self.matrix)
    }

    fn is_identity(&self) -> bool {
        matrix::is_identity(&self.matrix)
    }
}

/// `second(first(x))`. Build with [`concatenate`].
#[derive(Debug)]
pub struct ConcatenatedTransform {
    first: TransformRef,
    second: TransformRef,
}

impl MathTransform for ConcatenatedTransform {
    fn source_dimensions(&self) -> usize {
        self.first.source_dimensions()
    }

    fn target_dimensions(&self) -> usize {
        self.second.target_dimensions()
    }

    fn transform(&self, point: &[f64]) -> TransformResult<Vec<f64>> {
        let intermediate = self.first.transform(point)?;
        self.second.transform(&intermediate)
    }

    fn derivative(&self, point: &[f64]) -> TransformResult<Matrix> {
        let d1 = self.first.derivative(point)?;
        let intermediate = self.first.transform(point)?;
        let d2 = self.second.derivative(&intermediate)?;
        Ok(d2 * d1)
    }

    fn inverse(&self) -> TransformResult<TransformRef> {
        concatenate(&self.second.inverse()?, &self.first.inverse()?)
    }

    fn structure(&self) -> Structure<'_> {
        Structure::Concatenated {
            first: &self.first,
            second: &self.second,
        }
    }
}

/// Applies `sub` to coordinates `first_affected .. first_affected + sub.source_dimensions()`
/// and copies the `first_affected` leading and `num_trailing` trailing coordinates.
#[derive(Debug)]
pub struct PassThroughTransform {
    first_affected: usize,
    sub: TransformRef,
    num_trailing: usize,
}

impl PassThroughTransform {
    /// Create a pass-through transform, simplified when possible.
    ///
    /// Linear sub-transforms are expanded into a single larger matrix.
    pub fn create(first_affected: usize, sub: TransformRef, num_trailing: usize) -> TransformRef {
        if first_affected == 0 && num_trailing == 0 {
            return sub;
        }
        if let Structure::Linear(m) = sub.structure() {
            let expanded = expand_linear(m, first_affected, num_trailing);
            return Arc::new(LinearTransform { matrix: expanded });
        }
        Arc::new(Self {
            first_affected,
            sub,
            num_trailing,
        })
    }
}

fn expand_linear(sub: &Matrix, first: usize, trailing: usize) -> Matrix {
    let sub_src = sub.ncols() - 1;
    let sub_tgt = sub.nrows() - 1;
    let src = first + sub_src + trailing;
    let tgt = first + sub_tgt + trailing;
    let mut m = Matrix::zeros(tgt + 1, src + 1);
    for i in 0..first {
        m[(i, i)] = 1.0;
    }
    for i in 0..sub_tgt {
        for j in 0..sub_src {
            m[(first + i, first + j)] = sub[(i, j)];
        }
        m[(first + i, src)] = sub[(i, sub_src)];
    }
    for k in 0..trailing {
        m[(first + sub_tgt + k, first + sub_src + k)] = 1.0;
    }
    m[(tgt, src)] = 1.0;
    m
}

impl MathTransform for PassThroughTransform {
    fn source_dimensions(&self) -> usize {
        self.first_affected + self.sub.source_dimensions() + self.num_trailing
    }

    fn target_dimensions(&self) -> usize {
        self.first_affected + self.sub.target_dimensions() + self.num_trailing
    }

    fn transform(&self, point: &[f64]) -> TransformResult<Vec<f64>> {
        check_point(self.source_dimensions(), point)?;
        let end = self.first_affected + self.sub.source_dimensions();
        let mut out = Vec::with_capacity(self.target_dimensions());
        out.extend_from_slice(&point[..self.first_affected]);
        out.extend(self.sub.transform(&point[self.first_affected..end])?);
        out.extend_from_slice(&point[end..]);
        Ok(out)
    }

    fn derivative(&self, point: &[f64]) -> TransformResult<Matrix> {
        check_point(self.source_dimensions(), point)?;
        let sub_src = self.sub.source_dimensions();
        let sub_tgt = self.sub.target_dimensions();
        let first = self.first_affected;
        let inner = self.sub.derivative(&point[first..first + sub_src])?;
        let mut m = Matrix::zeros(self.target_dimensions(), self.source_dimensions());
        for i in 0..first {
            m[(i, i)] = 1.0;
        }
        for i in 0..sub_tgt {
            for j in 0..sub_src {
                m[(first + i, first + j)] = inner[(i, j)];
            }
        }
        for k in 0..self.num_trailing {
            m[(first + sub_tgt + k, first + sub_src + k)] = 1.0;
        }
        Ok(m)
    }

    fn inverse(&self) -> TransformResult<TransformRef> {
        Ok(Self::create(
            self.first_affected,
            self.sub.inverse()?,
            self.num_trailing,
        ))
    }

    fn structure(&self) -> Structure<'_> {
        Structure::PassThrough {
            first_affected: self.first_affected,
            sub: &self.sub,
            num_trailing: self.num_trailing,
        }
    }
}

/// Transform applying `first`, then `second`.
///
/// Identity steps are dropped and consecutive linear steps are multiplied
/// into a single matrix.
pub fn concatenate(first: &TransformRef, second: &TransformRef) -> TransformResult<TransformRef> {
    if first.target_dimensions() != second.source_dimensions() {
        return Err(TransformError::mismatched_dimension(
            "concatenated transform",
            first.target_dimensions(),
            second.source_dimensions(),
        ));
    }
    if first.is_identity() {
        return Ok(second.clone());
    }
    if second.is_identity() {
        return Ok(first.clone());
    }
    if let (Structure::Linear(a), Structure::Linear(b)) = (first.structure(), second.structure()) {
        return Ok(Arc::new(LinearTransform { matrix: b * a }));
    }
    Ok(Arc::new(ConcatenatedTransform {
        first: first.clone(),
        second: second.clone(),
    }))
}

/// Structural equality: same instance, or same decomposition with equal matrices.
pub fn transforms_equal(a: &TransformRef, b: &TransformRef) -> bool {
    if Arc::ptr_eq(a, b) {
        return true;
    }
    match (a.structure(), b.structure()) {
        (Structure::Linear(ma), Structure::Linear(mb)) => ma == mb,
        (
            Structure::Concatenated { first: f1, second: s1 },
            Structure::Concatenated { first: f2, second: s2 },
        ) => transforms_equal(f1, f2) && transforms_equal(s1, s2),
        (
            Structure::PassThrough { first_affected: p1, sub: t1, num_trailing: n1 },
            Structure::PassThrough { first_affected: p2, sub: t2, num_trailing: n2 },
        ) => p1 == p2 && n1 == n2 && transforms_equal(t1, t2),
        _ => false,
    }
}

/// Bounding box of an envelope after transformation.
///
/// Corners and mid-points of every dimension are projected. A dimension with
/// a NaN bound stays unconstrained: any output depending on it gets NaN bounds.
pub fn transform_envelope(transform: &dyn MathTransform, envelope: &Envelope) -> TransformResult<Envelope> {
    let n = transform.source_dimensions();
    if envelope.dimension() != n {
        return Err(TransformError::mismatched_dimension("envelope", n, envelope.dimension()));
    }
    let samples: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            let (lo, hi) = (envelope.lower(i), envelope.upper(i));
            if lo.is_nan() || hi.is_nan() {
                vec![f64::NAN]
            } else if lo == hi {
                vec![lo]
            } else if lo.is_infinite() || hi.is_infinite() {
                vec![lo, hi]
            } else {
                vec![lo, envelope.median(i), hi]
            }
        })
        .collect();

    let m = transform.target_dimensions();
    let mut lower = vec![f64::INFINITY; m];
    let mut upper = vec![f64::NEG_INFINITY; m];
    let mut unconstrained = vec![false; m];
    let mut index = vec![0usize; n];
    let mut point = vec![0.0; n];
    loop {
        for i in 0..n {
            point[i] = samples[i][index[i]];
        }
        let out = transform.transform(&point)?;
        for (k, &v) in out.iter().enumerate() {
            if v.is_nan() {
                unconstrained[k] = true;
            } else {
                lower[k] = lower[k].min(v);
                upper[k] = upper[k].max(v);
            }
        }
        // Odometer increment over the sample grid.
        let mut i = 0;
        while i < n {
            index[i] += 1;
            if index[i] < samples[i].len() {
                break;
            }
            index[i] = 0;
            i += 1;
        }
        if i == n {
            break;
        }
    }
    for k in 0..m {
        if unconstrained[k] {
            lower[k] = f64::NAN;
            upper[k] = f64::NAN;
        }
    }
    Ok(Envelope::new(lower, upper)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn affine(rows: usize, cols: usize, values: &[f64]) -> TransformRef {
        LinearTransform::new(Matrix::from_row_slice(rows, cols, values))
            .unwrap()
            .into_ref()
    }

    #[test]
    fn test_linear_transform_and_inverse() {
        let t = affine(3, 3, &[1.0, 0.0, -180.0, 0.0, -1.0, 90.0, 0.0, 0.0, 1.0]);
        assert_eq!(t.transform(&[190.0, 70.0]).unwrap(), vec![10.0, 20.0]);
        let inv = t.inverse().unwrap();
        assert_eq!(inv.transform(&[10.0, 20.0]).unwrap(), vec![190.0, 70.0]);
        assert_eq!(t.derivative(&[0.0, 0.0]).unwrap(), Matrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1.0]));
    }

    #[test]
    fn test_non_affine_matrix_rejected() {
        let m = Matrix::from_row_slice(2, 2, &[1.0, 0.0, 0.5, 1.0]);
        assert!(matches!(LinearTransform::new(m), Err(TransformError::IllegalMatrix(_))));
    }

    #[test]
    fn test_rectangular_linear_not_invertible() {
        let t = affine(2, 3, &[1.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        assert!(matches!(t.inverse(), Err(TransformError::NonInvertible(_))));
    }

    #[test]
    fn test_concatenate_multiplies_linear_steps() {
        let scale = LinearTransform::scale_translate(&[2.0, 2.0], &[0.0, 0.0]).unwrap().into_ref();
        let shift = LinearTransform::scale_translate(&[1.0, 1.0], &[5.0, -5.0]).unwrap().into_ref();
        let t = concatenate(&scale, &shift).unwrap();
        assert!(matches!(t.structure(), Structure::Linear(_)));
        assert_eq!(t.transform(&[1.0, 1.0]).unwrap(), vec![7.0, -3.0]);

        let id = LinearTransform::identity(2).into_ref();
        assert!(Arc::ptr_eq(&concatenate(&id, &scale).unwrap(), &scale));
        assert!(concatenate(&affine(2, 3, &[1.0, 1.0, 0.0, 0.0, 0.0, 1.0]), &scale).is_err());
    }

    #[test]
    fn test_pass_through_linear_is_expanded() {
        let sub = LinearTransform::scale_translate(&[3.0], &[1.0]).unwrap().into_ref();
        let t = PassThroughTransform::create(1, sub, 1);
        assert!(matches!(t.structure(), Structure::Linear(_)));
        assert_eq!(t.transform(&[5.0, 2.0, 7.0]).unwrap(), vec![5.0, 7.0, 7.0]);
    }

    #[test]
    fn test_transform_envelope_keeps_nan_dimensions_unconstrained() {
        let t = affine(3, 3, &[1.0, 0.0, -180.0, 0.0, -1.0, 90.0, 0.0, 0.0, 1.0]);
        let env = Envelope::new(vec![10.0, f64::NAN], vec![50.0, f64::NAN]).unwrap();
        let out = transform_envelope(&*t.inverse().unwrap(), &env).unwrap();
        assert_eq!(out.lower(0), 190.0);
        assert_eq!(out.upper(0), 230.0);
        assert!(out.lower(1).is_nan() && out.upper(1).is_nan());
    }

    #[test]
    fn test_transforms_equal() {
        let a = affine(2, 2, &[2.0, 1.0, 0.0, 1.0]);
        let b = affine(2, 2, &[2.0, 1.0, 0.0, 1.0]);
        let c = affine(2, 2, &[3.0, 1.0, 0.0, 1.0]);
        assert!(transforms_equal(&a, &b));
        assert!(!transforms_equal(&a, &c));
    }
}
