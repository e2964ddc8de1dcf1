//! Bounded Levenberg–Marquardt least squares.
//!
//! Minimises `Σ r_i(x)²` over a small parameter vector `x`, where each
//! parameter may carry a lower bound. Bounds are handled with the
//! MINUIT-style change of variables
//!
//! ```text
//! x = min - 1 + sqrt(u² + 1)
//! ```
//!
//! so the iteration runs unconstrained in `u`.
//!
//! Notes:
//! - The Jacobian is a forward difference with step `sqrt(ε)·max(|u|, 1)`.
//! - Standard errors come from `(JᵀJ)⁻¹` scaled by the reduced chi-square and
//!   mapped back through `dx/du`. They are absent when the covariance is
//!   singular or there are no degrees of freedom left.
//! - The solver never panics on a bad residual function: a non-finite trial
//!   point is simply rejected like any other uphill step.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::math::{covariance, damped_step};

/// One free parameter with an optional lower bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameter {
    pub value: f64,
    pub min: Option<f64>,
}

impl Parameter {
    pub fn bounded_below(value: f64, min: f64) -> Self {
        Self {
            value,
            min: Some(min),
        }
    }

    fn to_internal(self) -> f64 {
        match self.min {
            Some(min) => {
                let shifted = self.value.max(min) - min + 1.0;
                (shifted * shifted - 1.0).max(0.0).sqrt()
            }
            None => self.value,
        }
    }

    fn to_external(self, u: f64) -> f64 {
        match self.min {
            Some(min) => min - 1.0 + (u * u + 1.0).sqrt(),
            None => u,
        }
    }

    /// `dx/du` at internal value `u`.
    fn gradient(self, u: f64) -> f64 {
        match self.min {
            Some(_) => u / (u * u + 1.0).sqrt(),
            None => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    pub max_evaluations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
}

impl SolverOptions {
    /// Defaults for `n_params` parameters (`2000·(n+1)` evaluations).
    pub fn for_parameters(n_params: usize) -> Self {
        Self {
            max_evaluations: 2000 * (n_params + 1),
            ftol: 1e-7,
            xtol: 1e-7,
            gtol: 1e-7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("no free parameters to optimise")]
    NoParameters,
    #[error("residual function returned no residuals")]
    EmptyResiduals,
    #[error("residuals are not finite at the starting point")]
    NonFiniteStart,
}

/// Why the iteration stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// Relative reduction of the sum of squares fell below `ftol`.
    SumOfSquares,
    /// Relative step size fell below `xtol`.
    StepSize,
    /// Residuals are orthogonal to the Jacobian columns within `gtol`.
    Gradient,
    /// Evaluation budget exhausted before any convergence test passed.
    EvaluationLimit,
    /// No damping level produced a downhill step.
    Stalled,
}

impl Termination {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Termination::SumOfSquares | Termination::StepSize | Termination::Gradient
        )
    }

    pub fn message(&self) -> &'static str {
        match self {
            Termination::SumOfSquares => "relative reduction in the sum of squares is below ftol",
            Termination::StepSize => "relative change between iterates is below xtol",
            Termination::Gradient => "residuals are orthogonal to the Jacobian",
            Termination::EvaluationLimit => "maximum number of function evaluations reached",
            Termination::Stalled => "no step reduces the sum of squares",
        }
    }
}

/// Result of a minimisation.
#[derive(Debug, Clone)]
pub struct SolverOutcome {
    pub values: Vec<f64>,
    pub std_errors: Vec<Option<f64>>,
    pub termination: Termination,
    pub chisqr: f64,
    pub evaluations: usize,
    pub residuals: Vec<f64>,
}

/// A nonlinear least squares minimiser.
pub trait LeastSquaresSolver: Send + Sync {
    fn minimize(
        &self,
        residuals: &dyn Fn(&[f64]) -> Vec<f64>,
        initial: &[Parameter],
    ) -> Result<SolverOutcome, SolverError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LevenbergMarquardt {
    /// `None` uses [`SolverOptions::for_parameters`].
    pub options: Option<SolverOptions>,
}

impl LevenbergMarquardt {
    pub fn with_max_evaluations(max_evaluations: usize) -> Self {
        Self {
            options: Some(SolverOptions {
                max_evaluations,
                ..SolverOptions::for_parameters(1)
            }),
        }
    }
}

/// Current iterate in internal coordinates.
struct FitState {
    internal: DVector<f64>,
    residuals: DVector<f64>,
    cost: f64,
}

struct Problem<'a> {
    residuals: &'a dyn Fn(&[f64]) -> Vec<f64>,
    params: &'a [Parameter],
    evaluations: usize,
}

impl Problem<'_> {
    fn external(&self, internal: &DVector<f64>) -> Vec<f64> {
        self.params
            .iter()
            .zip(internal.iter())
            .map(|(p, &u)| p.to_external(u))
            .collect()
    }

    fn evaluate(&mut self, internal: &DVector<f64>) -> DVector<f64> {
        self.evaluations += 1;
        let x = self.external(internal);
        DVector::from_vec((self.residuals)(&x))
    }

    fn jacobian(&mut self, state: &FitState) -> DMatrix<f64> {
        let n = state.residuals.len();
        let p = state.internal.len();
        let mut jac = DMatrix::<f64>::zeros(n, p);
        let eps = f64::EPSILON.sqrt();

        for j in 0..p {
            let h = eps * state.internal[j].abs().max(1.0);
            let mut shifted = state.internal.clone();
            shifted[j] += h;
            let r = self.evaluate(&shifted);
            if r.len() != n {
                continue;
            }
            for i in 0..n {
                let d = (r[i] - state.residuals[i]) / h;
                jac[(i, j)] = if d.is_finite() { d } else { 0.0 };
            }
        }
        jac
    }
}

fn sum_of_squares(r: &DVector<f64>) -> f64 {
    r.iter().map(|v| v * v).sum()
}

impl LeastSquaresSolver for LevenbergMarquardt {
    fn minimize(
        &self,
        residuals: &dyn Fn(&[f64]) -> Vec<f64>,
        initial: &[Parameter],
    ) -> Result<SolverOutcome, SolverError> {
        if initial.is_empty() {
            return Err(SolverError::NoParameters);
        }
        let opts = self
            .options
            .unwrap_or_else(|| SolverOptions::for_parameters(initial.len()));

        let mut problem = Problem {
            residuals,
            params: initial,
            evaluations: 0,
        };

        let internal = DVector::from_iterator(initial.len(), initial.iter().map(|p| p.to_internal()));
        let r0 = problem.evaluate(&internal);
        if r0.is_empty() {
            return Err(SolverError::EmptyResiduals);
        }
        let cost0 = sum_of_squares(&r0);
        if !cost0.is_finite() {
            return Err(SolverError::NonFiniteStart);
        }

        let mut state = FitState {
            internal,
            residuals: r0,
            cost: cost0,
        };
        let mut lambda = 1e-3;

        let termination = 'outer: loop {
            if state.cost == 0.0 {
                break Termination::SumOfSquares;
            }
            if problem.evaluations >= opts.max_evaluations {
                break Termination::EvaluationLimit;
            }

            let jac = problem.jacobian(&state);
            if gradient_is_flat(&jac, &state.residuals, opts.gtol) {
                break Termination::Gradient;
            }

            loop {
                if problem.evaluations >= opts.max_evaluations {
                    break 'outer Termination::EvaluationLimit;
                }
                let Some(step) = damped_step(&jac, &state.residuals, lambda) else {
                    break 'outer Termination::Stalled;
                };

                let xnorm = state.internal.norm();
                let small_step = step.norm() <= opts.xtol * (xnorm + opts.xtol);

                let trial = &state.internal + &step;
                let r = problem.evaluate(&trial);
                let cost = if r.len() == state.residuals.len() {
                    sum_of_squares(&r)
                } else {
                    f64::NAN
                };

                if cost.is_finite() && cost <= state.cost {
                    let reduction = state.cost - cost;
                    let previous = state.cost;
                    state = FitState {
                        internal: trial,
                        residuals: r,
                        cost,
                    };
                    lambda = (lambda / 10.0).max(1e-12);

                    if reduction <= opts.ftol * previous {
                        break 'outer Termination::SumOfSquares;
                    }
                    if small_step {
                        break 'outer Termination::StepSize;
                    }
                    break;
                }

                if small_step {
                    break 'outer Termination::StepSize;
                }
                lambda *= 10.0;
                if lambda > 1e16 {
                    break 'outer Termination::Stalled;
                }
            }
        };

        let values = problem.external(&state.internal);
        let std_errors = standard_errors(&mut problem, &state);

        Ok(SolverOutcome {
            values,
            std_errors,
            termination,
            chisqr: state.cost,
            evaluations: problem.evaluations,
            residuals: state.residuals.iter().copied().collect(),
        })
    }
}

/// MINPACK's gradient test: the largest cosine between `r` and a Jacobian column.
fn gradient_is_flat(jac: &DMatrix<f64>, r: &DVector<f64>, gtol: f64) -> bool {
    let rnorm = r.norm();
    if rnorm == 0.0 {
        return true;
    }
    let g = jac.transpose() * r;
    let max_cos = (0..jac.ncols())
        .map(|j| {
            let cnorm = jac.column(j).norm();
            if cnorm == 0.0 {
                0.0
            } else {
                (g[j] / (cnorm * rnorm)).abs()
            }
        })
        .fold(0.0, f64::max);
    max_cos <= gtol
}

fn standard_errors(problem: &mut Problem<'_>, state: &FitState) -> Vec<Option<f64>> {
    let n = state.residuals.len();
    let p = state.internal.len();
    if n <= p {
        return vec![None; p];
    }

    let jac = problem.jacobian(state);
    let Some(cov) = covariance(&jac) else {
        return vec![None; p];
    };
    let redchi = state.cost / (n - p) as f64;

    problem
        .params
        .iter()
        .enumerate()
        .map(|(j, param)| {
            let var = cov[(j, j)] * redchi;
            let scale = param.gradient(state.internal[j]);
            let se = var.max(0.0).sqrt() * scale.abs();
            if se.is_finite() && scale != 0.0 { Some(se) } else { None }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fits_a_straight_line_slope() {
        // y = 3x, fit slope only.
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [3.1, 5.9, 9.05, 12.0];
        let f = |p: &[f64]| -> Vec<f64> { xs.iter().zip(ys.iter()).map(|(x, y)| p[0] * x - y).collect() };

        let out = LevenbergMarquardt::default()
            .minimize(&f, &[Parameter { value: 1.0, min: None }])
            .unwrap();

        assert!(out.termination.is_success(), "{:?}", out.termination);
        // Closed-form slope Σxy/Σx².
        let slope = xs.iter().zip(ys.iter()).map(|(x, y)| x * y).sum::<f64>()
            / xs.iter().map(|x| x * x).sum::<f64>();
        assert_relative_eq!(out.values[0], slope, epsilon = 1e-6);
        assert!(out.std_errors[0].is_some());
    }

    #[test]
    fn respects_lower_bound() {
        // Unconstrained minimum at x = -2; bound at 0.5.
        let f = |p: &[f64]| vec![p[0] + 2.0];
        let out = LevenbergMarquardt::default()
            .minimize(&f, &[Parameter::bounded_below(3.0, 0.5)])
            .unwrap();
        assert!(out.values[0] >= 0.5);
        assert!(out.values[0] < 0.51);
    }

    #[test]
    fn interior_minimum_with_bound() {
        let f = |p: &[f64]| vec![p[0] - 2.0, 0.5 * (p[0] - 2.0)];
        let out = LevenbergMarquardt::default()
            .minimize(&f, &[Parameter::bounded_below(0.7, 1e-5)])
            .unwrap();
        assert!(out.termination.is_success());
        assert_relative_eq!(out.values[0], 2.0, epsilon = 1e-5);
    }

    #[test]
    fn flat_objective_converges_in_place() {
        let f = |_: &[f64]| vec![1.0, 2.0];
        let out = LevenbergMarquardt::default()
            .minimize(&f, &[Parameter::bounded_below(0.7, 1e-5)])
            .unwrap();
        assert_eq!(out.termination, Termination::Gradient);
        assert_relative_eq!(out.values[0], 0.7, epsilon = 1e-12);
        assert!(out.std_errors[0].is_none());
    }

    #[test]
    fn evaluation_limit_is_reported() {
        let f = |p: &[f64]| vec![(p[0] - 5.0).powi(3), p[0].sin()];
        let out = LevenbergMarquardt::with_max_evaluations(3)
            .minimize(&f, &[Parameter { value: 0.0, min: None }])
            .unwrap();
        assert_eq!(out.termination, Termination::EvaluationLimit);
        assert!(!out.termination.is_success());
    }

    #[test]
    fn rejects_degenerate_problems() {
        let f = |_: &[f64]| Vec::<f64>::new();
        let err = LevenbergMarquardt::default()
            .minimize(&f, &[Parameter { value: 1.0, min: None }])
            .unwrap_err();
        assert_eq!(err, SolverError::EmptyResiduals);

        let g = |_: &[f64]| vec![f64::NAN];
        let err = LevenbergMarquardt::default()
            .minimize(&g, &[Parameter { value: 1.0, min: None }])
            .unwrap_err();
        assert_eq!(err, SolverError::NonFiniteStart);

        let err = LevenbergMarquardt::default().minimize(&g, &[]).unwrap_err();
        assert_eq!(err, SolverError::NoParameters);
    }
}
