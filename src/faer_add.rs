use faer::sparse::SparseColMatRef;
use faer::{Mat, MatRef};

/// Flatten a `[num_eqs x num_cells]` field into an equation-major column
/// vector: entry `(e, i)` lands at row `e * num_cells + i`.
pub fn flatten_eq_major(m: MatRef<'_, f64>) -> Mat<f64> {
    let n = m.ncols();
    Mat::from_fn(m.nrows() * n, 1, |k, _| m[(k / n, k % n)])
}

/// Inverse of [`flatten_eq_major`].
pub fn unflatten_eq_major(v: MatRef<'_, f64>, num_eqs: usize, num_cells: usize) -> Mat<f64> {
    debug_assert_eq!(v.nrows(), num_eqs * num_cells);
    Mat::from_fn(num_eqs, num_cells, |e, i| v[(e * num_cells + i, 0)])
}

/// `a * x` for a CSC matrix and a column vector.
pub fn sp_matvec(a: SparseColMatRef<'_, usize, f64>, x: MatRef<'_, f64>) -> Mat<f64> {
    debug_assert_eq!(a.ncols(), x.nrows());
    let mut y = Mat::zeros(a.nrows(), 1);
    for j in 0..a.ncols() {
        let xj = x[(j, 0)];
        if xj == 0.0 {
            continue;
        }
        for (i, v) in a.row_indices_of_col(j).zip(a.values_of_col(j)) {
            y[(i, 0)] += v * xj;
        }
    }
    y
}

pub fn all_finite(m: MatRef<'_, f64>) -> bool {
    for j in 0..m.ncols() {
        for i in 0..m.nrows() {
            if !m[(i, j)].is_finite() {
                return false;
            }
        }
    }
    true
}

/// Per-row RMS and mean-absolute norms, averaged across rows.
///
/// Rows are the conserved/primitive equations, so this weighs each
/// equation equally regardless of its magnitude relative to the others.
pub fn norms_l2_l1(m: MatRef<'_, f64>) -> (f64, f64) {
    let (nrows, ncols) = (m.nrows(), m.ncols());
    if nrows == 0 || ncols == 0 {
        return (0.0, 0.0);
    }
    let mut l2 = 0.0;
    let mut l1 = 0.0;
    for i in 0..nrows {
        let mut sq = 0.0;
        let mut ab = 0.0;
        for j in 0..ncols {
            let v = m[(i, j)];
            sq += v * v;
            ab += v.abs();
        }
        l2 += (sq / ncols as f64).sqrt();
        l1 += ab / ncols as f64;
    }
    (l2 / nrows as f64, l1 / nrows as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use faer::sparse::SparseColMat;

    #[test]
    fn flatten_round_trips() {
        let m = Mat::from_fn(3, 4, |i, j| (10 * i + j) as f64);
        let v = flatten_eq_major(m.as_ref());
        assert_eq!(v[(1 * 4 + 2, 0)], 12.0);
        let back = unflatten_eq_major(v.as_ref(), 3, 4);
        assert_eq!(back, m);
    }

    #[test]
    fn sparse_matvec_matches_dense() {
        let trips = [(0usize, 0usize, 2.0), (1, 1, 3.0), (0, 1, -1.0)];
        let a = SparseColMat::<usize, f64>::try_new_from_triplets(2, 2, &trips).unwrap();
        let x = Mat::from_fn(2, 1, |i, _| (i + 1) as f64);
        let y = sp_matvec(a.as_ref(), x.as_ref());
        assert_relative_eq!(y[(0, 0)], 2.0 * 1.0 - 1.0 * 2.0);
        assert_relative_eq!(y[(1, 0)], 3.0 * 2.0);
    }

    #[test]
    fn finite_scan_catches_nan() {
        let mut m = Mat::<f64>::zeros(2, 2);
        assert!(all_finite(m.as_ref()));
        m[(1, 0)] = f64::NAN;
        assert!(!all_finite(m.as_ref()));
    }

    #[test]
    fn row_norms_average_rows() {
        let m = Mat::from_fn(2, 2, |i, _| if i == 0 { 3.0 } else { -4.0 });
        let (l2, l1) = norms_l2_l1(m.as_ref());
        assert_relative_eq!(l2, (3.0 + 4.0) / 2.0);
        assert_relative_eq!(l1, (3.0 + 4.0) / 2.0);
    }
}
