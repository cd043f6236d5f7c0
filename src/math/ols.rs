//! Weighted ridge least squares.
//!
//! The fitter solves small regression problems of the form:
//!
//! ```text
//! minimize Σ w_i (y_i - x_i^T β)^2 + λ Σ_{j >= first_penalized} β_j^2
//! ```
//!
//! Implementation choices:
//! - Rows are scaled by `sqrt(w_i)` so the weighted problem becomes ordinary
//!   least squares.
//! - The L2 penalty is expressed as extra rows `sqrt(λ) e_j` with target 0,
//!   which keeps a single SVD-based solve path for both the plain and the
//!   penalized case. The intercept column is left out of the penalty.
//! - SVD tolerates the collinear lagged-driver columns; nalgebra's `QR::solve`
//!   would panic on the tall matrix anyway.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve the weighted ridge problem.
///
/// `x` is `n × p`, `y` and `w` have length `n`. Columns `first_penalized..p`
/// carry the penalty `lambda`; earlier columns (the intercept) are free.
pub fn solve_weighted_ridge(
    x: &DMatrix<f64>,
    y: &[f64],
    w: &[f64],
    lambda: f64,
    first_penalized: usize,
) -> Option<DVector<f64>> {
    let n = x.nrows();
    let p = x.ncols();
    if n == 0 || p == 0 || y.len() != n || w.len() != n {
        return None;
    }
    if w.iter().any(|v| !v.is_finite() || *v < 0.0) || y.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let penalized: Vec<usize> = if lambda > 0.0 {
        (first_penalized..p).collect()
    } else {
        Vec::new()
    };
    let rows = n + penalized.len();

    let mut xa = DMatrix::<f64>::zeros(rows, p);
    let mut ya = DVector::<f64>::zeros(rows);
    for i in 0..n {
        let sw = w[i].sqrt();
        for j in 0..p {
            xa[(i, j)] = x[(i, j)] * sw;
        }
        ya[i] = y[i] * sw;
    }
    let sl = lambda.sqrt();
    for (k, &j) in penalized.iter().enumerate() {
        xa[(n + k, j)] = sl;
    }

    solve_least_squares(&xa, &ya)
}
