//! Linear least squares building blocks for the nonlinear solver.
//!
//! Each Levenberg–Marquardt iteration solves a damped linear problem of the form:
//!
//! ```text
//! minimize ‖J δ + r‖² + λ ‖D δ‖²
//! ```
//!
//! which is the ordinary least squares problem for the stacked system
//! `[J; sqrt(λ) D] δ = [-r; 0]`.
//!
//! Implementation choices:
//! - We solve the stacked system with SVD so tall, rank-deficient Jacobians
//!   (a flat residual direction) still produce a finite step.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - `D` is Marquardt's scaling `sqrt(diag(JᵀJ))`, with zero columns replaced by 1.

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

/// Damped Gauss–Newton step `δ` for Jacobian `jacobian` and residuals `residuals`.
pub fn damped_step(jacobian: &DMatrix<f64>, residuals: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let (n, p) = jacobian.shape();
    let mut stacked = DMatrix::<f64>::zeros(n + p, p);
    let mut rhs = DVector::<f64>::zeros(n + p);

    stacked.view_mut((0, 0), (n, p)).copy_from(jacobian);
    for i in 0..n {
        rhs[i] = -residuals[i];
    }

    let damping = lambda.max(0.0).sqrt();
    for j in 0..p {
        let norm = jacobian.column(j).norm();
        let scale = if norm > 0.0 { norm } else { 1.0 };
        stacked[(n + j, j)] = damping * scale;
    }

    solve_least_squares(&stacked, &rhs)
}

/// Unscaled parameter covariance `(JᵀJ)⁻¹`, or `None` when `JᵀJ` is singular.
pub fn covariance(jacobian: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let jtj = jacobian.transpose() * jacobian;
    let cov = jtj.try_inverse()?;
    if cov.iter().all(|v| v.is_finite()) {
        Some(cov)
    } else {
        None
    }
}
