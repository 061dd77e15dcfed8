//! Dense solver for the small normal-equation systems ridge produces.

use crate::{EstimatorError, Result};
use ndarray::{Array1, Array2};

/// Pivots below `PIVOT_RTOL * max|a|` count as zero. The tolerance is
/// relative, so uniformly small-scale systems still solve. An exactly rank
/// deficient system (e.g. a constant feature with `alpha = 0`) is reported as
/// singular; there is no least-squares fallback.
const PIVOT_RTOL: f64 = 1e-12;

/// Solves `a * w = b` by Gaussian elimination with partial pivoting.
pub(crate) fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();
    if a.dim() != (n, n) {
        return Err(EstimatorError::Shape(format!("system is {:?} but rhs has {n} rows", a.dim())));
    }
    let scale = a.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let tol = PIVOT_RTOL * scale;
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if !(a[[pivot, col]].abs() > tol) {
            return Err(EstimatorError::Numerical(format!("singular matrix at column {col}")));
        }
        if pivot != col {
            for k in 0..n {
                a.swap([pivot, k], [col, k]);
            }
            b.swap(pivot, col);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut w = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * w[k]).sum();
        w[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(w)
}
