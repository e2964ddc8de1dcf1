//! Per-model rotation optimisation.
//!
//! For one grid model, the rotation rate is a single bounded free parameter.
//! Every trial rate rescales the model's frequencies, re-runs pattern assembly
//! and yields the residual vector `selected - observed`. Because the selected
//! modes can switch between trials, the objective is piecewise; the solver is
//! only expected to find a local optimum near the estimate.

use tracing::{debug, warn};

use crate::domain::{RotationStatus, TheoreticalPattern, ZERO_ROTATION_PLACEHOLDER};
use crate::pattern::{AssembledPattern, PatternAssembler};

use super::rescale::RotationRescaler;
use super::solver::{LeastSquaresSolver, Parameter, SolverError};

/// Lower bound on the fitted rotation rate.
pub const MIN_ROTATION: f64 = 1e-5;

/// Outcome of optimising one model's rotation.
#[derive(Debug, Clone)]
pub struct RotationFit {
    pub rotation: f64,
    pub rotation_error: Option<f64>,
    pub status: RotationStatus,
    /// Pattern assembled at the final rotation.
    pub assembled: AssembledPattern,
    pub chisqr: f64,
    pub evaluations: usize,
}

pub struct RotationOptimizer<'a> {
    assembler: &'a PatternAssembler,
    rescaler: &'a dyn RotationRescaler,
    solver: &'a dyn LeastSquaresSolver,
    estimated_rotation: f64,
}

impl<'a> RotationOptimizer<'a> {
    pub fn new(
        assembler: &'a PatternAssembler,
        rescaler: &'a dyn RotationRescaler,
        solver: &'a dyn LeastSquaresSolver,
        estimated_rotation: f64,
    ) -> Self {
        Self {
            assembler,
            rescaler,
            solver,
            estimated_rotation,
        }
    }

    /// The pattern as it would look at `rotation`.
    ///
    /// `None` if the rescaler did not return one frequency per mode.
    pub fn rescaled(&self, pattern: &TheoreticalPattern, native_rotation: f64, rotation: f64) -> Option<TheoreticalPattern> {
        let frequencies = self
            .rescaler
            .rescale(pattern.frequencies(), native_rotation, rotation);
        pattern.with_frequencies(frequencies)
    }

    /// Residuals `selected - observed` for one trial rotation.
    ///
    /// Empty when the pattern cannot be rescaled to `rotation`.
    pub fn residuals(&self, pattern: &TheoreticalPattern, native_rotation: f64, rotation: f64) -> Vec<f64> {
        match self.rescaled(pattern, native_rotation, rotation) {
            Some(rescaled) => self.assembler.assemble(&rescaled).residuals(self.assembler.observed()),
            None => Vec::new(),
        }
    }

    fn assemble_at(&self, pattern: &TheoreticalPattern, native_rotation: f64, rotation: f64) -> AssembledPattern {
        match self.rescaled(pattern, native_rotation, rotation) {
            Some(rescaled) => self.assembler.assemble(&rescaled),
            None => self.assembler.assemble(pattern),
        }
    }

    /// Fit the rotation rate of one model, starting from the estimate.
    ///
    /// A solver that stops without converging still yields a fit, flagged
    /// [`RotationStatus::Failed`], at the best rotation it reached.
    pub fn optimise(&self, pattern: &TheoreticalPattern, native_rotation: f64) -> Result<RotationFit, SolverError> {
        let native = if native_rotation == 0.0 {
            ZERO_ROTATION_PLACEHOLDER
        } else {
            native_rotation
        };

        if !(self.estimated_rotation > MIN_ROTATION) {
            // At the bound the internal start is u = 0, where dx/du vanishes.
            let message = format!(
                "estimated rotation {} is not above the lower bound {MIN_ROTATION}",
                self.estimated_rotation
            );
            warn!("rotation fit failed: {message}");
            let assembled = self.assemble_at(pattern, native, self.estimated_rotation);
            let chisqr: f64 = assembled
                .residuals(self.assembler.observed())
                .iter()
                .map(|r| r * r)
                .sum();
            return Ok(RotationFit {
                rotation: self.estimated_rotation,
                rotation_error: None,
                status: RotationStatus::Failed(message),
                assembled,
                chisqr,
                evaluations: 0,
            });
        }

        let objective = |x: &[f64]| self.residuals(pattern, native, x[0]);
        let outcome = self.solver.minimize(
            &objective,
            &[Parameter::bounded_below(self.estimated_rotation, MIN_ROTATION)],
        )?;

        let rotation = outcome.values.first().copied().unwrap_or(self.estimated_rotation);
        let rotation_error = outcome.std_errors.first().copied().flatten();
        let status = if outcome.termination.is_success() {
            debug!(
                rotation,
                evaluations = outcome.evaluations,
                chisqr = outcome.chisqr,
                "rotation converged"
            );
            RotationStatus::Converged
        } else {
            let message = outcome.termination.message();
            warn!(rotation, evaluations = outcome.evaluations, "rotation fit failed: {message}");
            RotationStatus::Failed(message.to_string())
        };

        Ok(RotationFit {
            rotation,
            rotation_error,
            status,
            assembled: self.assemble_at(pattern, native, rotation),
            chisqr: outcome.chisqr,
            evaluations: outcome.evaluations,
        })
    }
}
