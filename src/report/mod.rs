//! Run summaries: tallies over the model results plus formatted terminal output.

pub mod format;

pub use format::*;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{ModelResult, Observable, RotationStatus, SelectionMethod};

/// How many rows ended in each rotation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub fixed: usize,
    pub converged: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn tally(results: &[ModelResult]) -> Self {
        results.iter().fold(Self::default(), |mut acc, r| {
            match r.status {
                RotationStatus::Fixed => acc.fixed += 1,
                RotationStatus::Converged => acc.converged += 1,
                RotationStatus::Failed(_) => acc.failed += 1,
            }
            acc
        })
    }
}

/// Spread of fitted rotation rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RotationStats {
    pub min: f64,
    pub median: f64,
    pub max: f64,
}

impl RotationStats {
    /// Over converged rows only; `None` if there are none.
    pub fn from_results(results: &[ModelResult]) -> Option<Self> {
        let mut rates: Vec<f64> = results
            .iter()
            .filter(|r| r.status == RotationStatus::Converged)
            .map(|r| r.rotation)
            .filter(|v| v.is_finite())
            .collect();
        if rates.is_empty() {
            return None;
        }
        rates.sort_by(f64::total_cmp);
        let n = rates.len();
        let median = if n % 2 == 1 {
            rates[n / 2]
        } else {
            0.5 * (rates[n / 2 - 1] + rates[n / 2])
        };
        Some(Self {
            min: rates[0],
            median,
            max: rates[n - 1],
        })
    }
}

/// Everything worth reporting about one `gmatch match` run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub grid: String,
    pub observations: String,
    pub output: String,
    pub observable: Observable,
    pub method: SelectionMethod,
    pub optimise_rotation: bool,
    /// Observed slots, gaps included.
    pub slots: usize,
    /// Observed pulsations per segment.
    pub segment_lengths: Vec<usize>,
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub statuses: StatusCounts,
    pub dropped_by_surface: usize,
    pub rows_written: usize,
    pub rotation: Option<RotationStats>,
    pub elapsed_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SurfaceProperties;

    fn result(rotation: f64, status: RotationStatus) -> ModelResult {
        ModelResult {
            row: 0,
            rotation,
            rotation_error: None,
            status,
            parameters: Vec::new(),
            surface: SurfaceProperties::default(),
            pulsations: Vec::new(),
        }
    }

    #[test]
    fn tallies_statuses() {
        let results = vec![
            result(0.5, RotationStatus::Converged),
            result(0.7, RotationStatus::Failed("limit".into())),
            result(0.6, RotationStatus::Converged),
        ];
        let counts = StatusCounts::tally(&results);
        assert_eq!(counts, StatusCounts { fixed: 0, converged: 2, failed: 1 });
    }

    #[test]
    fn rotation_stats_ignore_failed_rows() {
        let results = vec![
            result(0.9, RotationStatus::Converged),
            result(5.0, RotationStatus::Failed("limit".into())),
            result(0.5, RotationStatus::Converged),
            result(0.6, RotationStatus::Converged),
        ];
        let stats = RotationStats::from_results(&results).unwrap();
        assert_eq!(stats, RotationStats { min: 0.5, median: 0.6, max: 0.9 });
        assert!(RotationStats::from_results(&[result(0.5, RotationStatus::Fixed)]).is_none());
    }
}
