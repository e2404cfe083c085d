use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

/// Resize a scratch matrix to `rows x cols` and zero it.
///
/// The underlying buffer keeps its capacity, so once a solver has seen its
/// largest problem no further heap allocation happens here.
pub fn reshape_matrix(buf: &mut DMatrix<f64>, rows: usize, cols: usize) {
    if buf.shape() != (rows, cols) {
        buf.resize_mut(rows, cols, 0.0);
    }
    buf.fill(0.0);
}

/// Resize a scratch vector to `len` and zero it.
pub fn reshape_vector(buf: &mut DVector<f64>, len: usize) {
    if buf.len() != len {
        buf.resize_vertically_mut(len, 0.0);
    }
    buf.fill(0.0);
}

/// Copy `src` into `dst`, resizing `dst` only when the shapes differ
pub fn copy_matrix_into(src: &DMatrix<f64>, dst: &mut DMatrix<f64>) {
    if dst.shape() != src.shape() {
        dst.resize_mut(src.nrows(), src.ncols(), 0.0);
    }
    dst.copy_from(src);
}

pub fn copy_vector_into(src: &DVector<f64>, dst: &mut DVector<f64>) {
    if dst.len() != src.len() {
        dst.resize_vertically_mut(src.len(), 0.0);
    }
    dst.copy_from(src);
}

/// Write `(src + src^T) / 2` into `dst`
pub fn symmetrize_into(src: &DMatrix<f64>, dst: &mut DMatrix<f64>) {
    let n = src.nrows();
    debug_assert_eq!(n, src.ncols());
    reshape_matrix(dst, n, n);
    for j in 0..n {
        for i in 0..n {
            dst[(i, j)] = 0.5 * (src[(i, j)] + src[(j, i)]);
        }
    }
}

/// Validate that a matrix is positive semi-definite (PSD) within `tolerance`.
/// Checks symmetry, then attempts a Cholesky factorization of `M + tolerance * I`.
pub fn validate_psd(matrix: &DMatrix<f64>, tolerance: f64) -> bool {
    if matrix.nrows() != matrix.ncols() {
        return false;
    }

    let n = matrix.nrows();
    for j in 0..n {
        for i in 0..j {
            if (matrix[(i, j)] - matrix[(j, i)]).abs() > tolerance {
                return false;
            }
        }
    }

    let shifted = matrix + DMatrix::identity(n, n) * tolerance;
    Cholesky::new(shifted).is_some()
}

pub fn contains_nan(vector: &DVector<f64>) -> bool {
    vector.iter().any(|v| v.is_nan())
}

/// Factor the symmetric positive definite matrix held in `buf` in place and
/// run `f` with the factor.
///
/// The factorization borrows `buf`'s storage and hands it back afterwards, so
/// no allocation happens on success. Returns `None` when the matrix is not
/// positive definite or a pivot is negligible next to its largest entry; the
/// contents of `buf` are then unspecified.
pub fn with_cholesky<T>(buf: &mut DMatrix<f64>, f: impl FnOnce(&Cholesky<f64, Dyn>) -> T) -> Option<T> {
    let n = buf.nrows();
    debug_assert_eq!(n, buf.ncols());

    let scale = buf.amax();
    let matrix = std::mem::replace(buf, DMatrix::zeros(0, 0));
    let cholesky = Cholesky::new(matrix)?;

    // l_ii^2 is the pivot of the elimination step
    let tolerance = scale * n as f64 * f64::EPSILON;
    let well_conditioned = (0..n).all(|i| {
        let pivot = cholesky.l_dirty()[(i, i)];
        pivot * pivot > tolerance
    });

    let result = if well_conditioned { Some(f(&cholesky)) } else { None };
    *buf = cholesky.unpack();
    result
}
