//! Small dense matrix helpers.
//!
//! Transforms between grid and CRS coordinates are affine most of the time, so
//! they are stored as `(target + 1) × (source + 1)` homogeneous matrices: the
//! last column holds the translation terms and the last row is `[0 … 0 1]`.

use nalgebra::DMatrix;

use crate::error::{TransformError, TransformResult};

/// Dense matrix of `f64`, row-major indexing via `m[(row, col)]`.
pub type Matrix = DMatrix<f64>;

/// Square identity matrix of the given size.
pub fn identity(size: usize) -> Matrix {
    Matrix::identity(size, size)
}

/// Check if the matrix is a square identity.
pub fn is_identity(matrix: &Matrix) -> bool {
    matrix.is_square()
        && (0..matrix.nrows()).all(|i| {
            (0..matrix.ncols()).all(|j| matrix[(i, j)] == if i == j { 1.0 } else { 0.0 })
        })
}

/// Check if the last row is `[0 … 0 1]`.
pub fn is_affine(matrix: &Matrix) -> bool {
    let (rows, cols) = matrix.shape();
    if rows == 0 || cols == 0 {
        return false;
    }
    let last = rows - 1;
    (0..cols).all(|j| matrix[(last, j)] == if j == cols - 1 { 1.0 } else { 0.0 })
}

/// Inverse of a square matrix.
pub fn inverse(matrix: &Matrix) -> TransformResult<Matrix> {
    if !matrix.is_square() {
        return Err(TransformError::NonInvertible(format!(
            "{}×{} matrix is not square",
            matrix.nrows(),
            matrix.ncols()
        )));
    }
    match matrix.clone().try_inverse() {
        Some(inv) if inv.iter().all(|v| v.is_finite()) => Ok(inv),
        _ => Err(TransformError::NonInvertible("singular matrix".to_string())),
    }
}

/// Matrix × vector product.
///
/// Zero coefficients are skipped, so a NaN or infinite value in `vector`
/// only propagates to the rows that actually depend on it.
pub fn multiply(matrix: &Matrix, vector: &[f64]) -> TransformResult<Vec<f64>> {
    if matrix.ncols() != vector.len() {
        return Err(TransformError::mismatched_dimension(
            "vector",
            matrix.ncols(),
            vector.len(),
        ));
    }
    let result = (0..matrix.nrows())
        .map(|i| {
            let mut sum = 0.0;
            for (j, &v) in vector.iter().enumerate() {
                let e = matrix[(i, j)];
                if e != 0.0 {
                    sum += e * v;
                }
            }
            sum
        })
        .collect();
    Ok(result)
}

/// Matrix built from the given rows and columns of `matrix`, in that order.
pub fn select(matrix: &Matrix, rows: &[usize], cols: &[usize]) -> Matrix {
    Matrix::from_fn(rows.len(), cols.len(), |i, j| matrix[(rows[i], cols[j])])
}

/// Homogeneous matrix for `x' = scale * x + translation` in each dimension.
pub fn scale_translate(scales: &[f64], translations: &[f64]) -> TransformResult<Matrix> {
    if scales.len() != translations.len() {
        return Err(TransformError::mismatched_dimension(
            "translations",
            scales.len(),
            translations.len(),
        ));
    }
    let n = scales.len();
    let mut m = identity(n + 1);
    for i in 0..n {
        m[(i, i)] = scales[i];
        m[(i, n)] = translations[i];
    }
    Ok(m)
}
