//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - parsed straight from CLI flags (`ValueEnum`)
//! - carried through the matching pipeline without re-interpretation per row
//! - exported to the output table and the JSON run summary

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::pattern::TheoreticalPattern;

/// Marker for an interruption in the observed pattern.
///
/// Used both in the observation table and in the assembled output, so gap slots
/// line up one-to-one between the two.
pub const GAP_MARKER: f64 = 0.0;

/// Value written for an observed slot that has no theoretical counterpart
/// (the theoretical pattern ran out at the grid boundary).
pub const MISSING_VALUE: f64 = -1.0;

/// Spacing chi-square reported when the theoretical pattern is shorter than the
/// observed segment.
pub const MISMATCH_CHI2: f64 = 1e16;

/// Stand-in for a native rotation rate of exactly zero when rescaling.
pub const ZERO_ROTATION_PLACEHOLDER: f64 = 1e-99;

/// Which observable the observation table (and the output pulsations) are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Observable {
    Frequency,
    Period,
}

impl Observable {
    /// Name of the observation table column holding this observable.
    pub fn column_name(self) -> &'static str {
        match self {
            Observable::Frequency => "frequency",
            Observable::Period => "period",
        }
    }

    /// Name of the matching error column.
    pub fn error_column_name(self) -> String {
        format!("{}_err", self.column_name())
    }
}

/// How the theoretical sequence is built for each observed segment (CLI flag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionMethod {
    /// Anchor on a user-supplied pulsation per segment (the highest-amplitude mode).
    HighestAmplitude,
    /// Anchor on the highest observed frequency of each segment.
    HighestFrequency,
    /// Longest run of consecutive radial orders among the per-mode best chi-square matches.
    ChisqLongestSequence,
}

impl SelectionMethod {
    pub fn display_name(self) -> &'static str {
        match self {
            SelectionMethod::HighestAmplitude => "highest amplitude",
            SelectionMethod::HighestFrequency => "highest frequency",
            SelectionMethod::ChisqLongestSequence => "chi-square longest sequence",
        }
    }
}

/// Resolved, validated selection strategy for a whole run.
///
/// Built once from [`SelectionMethod`] + anchors after the observed pattern has
/// been segmented, so no row ever re-checks the configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildStrategy {
    /// One anchor value per observed segment, each present in its segment.
    AnchorHighestAmplitude { anchors: Vec<f64> },
    AnchorHighestFrequency,
    ChiSquareLongestSequence,
}

/// Direction of radial orders along a theoretical pattern's storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    /// Each stored order is one less than the previous (e.g. `-1, -2, -3`).
    Descending,
    /// Anything else, including patterns too short to tell.
    Ascending,
}

impl OrderDirection {
    pub fn from_orders(orders: &[i32]) -> Self {
        match orders {
            [first, second, ..] if *second == *first - 1 => OrderDirection::Descending,
            _ => OrderDirection::Ascending,
        }
    }

    /// Signed step between consecutive stored orders.
    pub fn step(self) -> i32 {
        match self {
            OrderDirection::Descending => -1,
            OrderDirection::Ascending => 1,
        }
    }

    /// Whether two best matches of consecutive observations sit on consecutive orders.
    ///
    /// Compared on `|n|` so the test reads the same for negative g-mode orders.
    pub fn continues(self, current: i32, next: i32) -> bool {
        current.abs() == next.abs() + self.step()
    }
}

/// A measured quantity with its 1-sigma error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub error: f64,
}

/// Spectroscopic/photometric observations of the star, all optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceObservations {
    pub teff: Option<Measurement>,
    pub logg: Option<Measurement>,
    pub log_l: Option<Measurement>,
}

impl SurfaceObservations {
    pub fn is_empty(&self) -> bool {
        self.teff.is_none() && self.logg.is_none() && self.log_l.is_none()
    }
}

/// Surface properties of one grid model, as far as the grid table provides them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceProperties {
    pub log_teff: Option<f64>,
    pub logg: Option<f64>,
    pub log_l: Option<f64>,
}

/// Terminal state of the rotation fit for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "message")]
pub enum RotationStatus {
    /// Rotation was not optimised; the estimate was used as-is.
    Fixed,
    Converged,
    /// The solver stopped without success; the best-found rotation is still reported.
    Failed(String),
}

/// One grid row's outcome: rotation, model parameters and the matched pulsations.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResult {
    /// Index of the row in the grid table.
    pub row: usize,
    pub rotation: f64,
    /// Absent when rotation is fixed or the solver could not estimate it.
    pub rotation_error: Option<f64>,
    pub status: RotationStatus,
    /// Free parameter values, in the grid table's column order.
    pub parameters: Vec<f64>,
    pub surface: SurfaceProperties,
    /// One value per observed slot: matched theoretical value, [`GAP_MARKER`] at
    /// gaps, [`MISSING_VALUE`] where the pattern ran out.
    pub pulsations: Vec<f64>,
}

/// One model of the theoretical grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRow {
    pub index: usize,
    pub parameters: Vec<f64>,
    /// Rotation rate the pattern was computed at, if the grid records it.
    pub native_rotation: Option<f64>,
    pub surface: SurfaceProperties,
    pub pattern: TheoreticalPattern,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub grid_path: PathBuf,
    pub observations_path: PathBuf,
    pub output_path: PathBuf,

    pub observable: Observable,
    pub method: SelectionMethod,
    /// Anchor pulsations, one per observed segment (only for `highest-amplitude`).
    pub anchors: Vec<f64>,

    /// Initial guess for the rotation rate, and the rate used when it is not optimised.
    pub estimated_rotation: f64,
    pub optimise_rotation: bool,
    /// Azimuthal order `m` used by the frame-shift rescaler.
    pub azimuthal_order: i32,
    /// Cap on residual evaluations per row.
    pub max_evaluations: usize,

    /// Worker threads (None = rayon default).
    pub threads: Option<usize>,

    /// Drop models outside this many sigma of the surface observations.
    pub n_sigma: Option<f64>,
    pub summary_path: Option<PathBuf>,
}
