//! Grid-wide matching.
//!
//! Applies pattern assembly (and, if enabled, rotation optimisation) to every
//! row of the theoretical grid. Rows are independent, so they are evaluated in
//! parallel; the output keeps the grid's row order.

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::domain::{GridRow, ModelResult, RotationStatus};
use crate::pattern::PatternAssembler;

use super::rescale::RotationRescaler;
use super::rotation::RotationOptimizer;
use super::solver::LeastSquaresSolver;

/// How the rotation rate of each model is determined.
#[derive(Clone, Copy)]
pub enum RotationMode<'a> {
    /// Every model is matched at the estimated rotation, unscaled.
    Fixed,
    Optimised {
        rescaler: &'a dyn RotationRescaler,
        solver: &'a dyn LeastSquaresSolver,
    },
}

pub struct GridMatcher<'a> {
    assembler: &'a PatternAssembler,
    estimated_rotation: f64,
    mode: RotationMode<'a>,
}

impl<'a> GridMatcher<'a> {
    pub fn new(assembler: &'a PatternAssembler, estimated_rotation: f64, mode: RotationMode<'a>) -> Self {
        Self {
            assembler,
            estimated_rotation,
            mode,
        }
    }

    /// Match every grid row, in parallel, preserving row order.
    pub fn match_grid(&self, rows: &[GridRow]) -> Vec<ModelResult> {
        rows.par_iter().map(|row| self.match_row(row)).collect()
    }

    /// Match one grid row.
    pub fn match_row(&self, row: &GridRow) -> ModelResult {
        let (rotation, rotation_error, status, pulsations) = match self.mode {
            RotationMode::Fixed => {
                let assembled = self.assembler.assemble(&row.pattern);
                (self.estimated_rotation, None, RotationStatus::Fixed, assembled.values)
            }
            RotationMode::Optimised { rescaler, solver } => {
                let native = row.native_rotation.unwrap_or(self.estimated_rotation);
                let optimizer = RotationOptimizer::new(self.assembler, rescaler, solver, self.estimated_rotation);
                match optimizer.optimise(&row.pattern, native) {
                    Ok(fit) => (fit.rotation, fit.rotation_error, fit.status, fit.assembled.values),
                    Err(err) => {
                        warn!(row = row.index, "rotation fit not started: {err}");
                        let assembled = self.assembler.assemble(&row.pattern);
                        (
                            self.estimated_rotation,
                            None,
                            RotationStatus::Failed(err.to_string()),
                            assembled.values,
                        )
                    }
                }
            }
        };

        debug!(row = row.index, rotation, "model matched");
        ModelResult {
            row: row.index,
            rotation,
            rotation_error,
            status,
            parameters: row.parameters.clone(),
            surface: row.surface,
            pulsations,
        }
    }
}
