//! Shared "match pipeline" logic.
//!
//! observations -> build strategy -> grid ingest -> per-row matching -> surface box -> export
//!
//! `gmatch check` runs only the first two steps.

use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use crate::constraints::{SurfaceBox, apply_surface_box};
use crate::domain::{GridRow, MatchConfig, ModelResult, SurfaceObservations};
use crate::error::AppError;
use crate::fit::{FrameShift, GridMatcher, LevenbergMarquardt, RotationMode};
use crate::io::{GridLayout, GridTable, read_grid, read_observations, write_results_tsv};
use crate::pattern::PatternAssembler;
use crate::report::{RotationStats, RunSummary, StatusCounts};

/// All computed outputs of a single `gmatch match` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub parameter_names: Vec<String>,
    pub slot_labels: Vec<String>,
    /// Results that passed the surface box, in grid order.
    pub results: Vec<ModelResult>,
    pub summary: RunSummary,
}

/// Read the observations and resolve the build strategy against their segmentation.
///
/// Every configuration mismatch is reported here, before any grid row is touched.
pub fn prepare_observations(config: &MatchConfig) -> Result<(PatternAssembler, SurfaceObservations), AppError> {
    let table = read_observations(&config.observations_path, config.observable)?;
    let assembler = PatternAssembler::new(table.pattern, config.method, &config.anchors)?;

    info!(
        slots = assembler.observed().len(),
        segments = assembler.segments().len(),
        method = config.method.display_name(),
        "observations loaded"
    );
    Ok((assembler, table.surface))
}

/// Execute the full matching pipeline and write the output table.
pub fn run_match(config: &MatchConfig) -> Result<RunOutput, AppError> {
    let started = Instant::now();

    // 1) Observations + strategy (fails fast on configuration errors).
    let (assembler, surface) = prepare_observations(config)?;

    // 2) Grid.
    let grid = read_grid(&config.grid_path)?;
    info!(
        rows = grid.rows.len(),
        skipped = grid.row_errors.len(),
        parameters = grid.parameter_names.len(),
        "grid loaded"
    );

    // 3) Per-row matching.
    let results = match_rows(config, &assembler, &grid.rows)?;
    let statuses = StatusCounts::tally(&results);
    let rotation = RotationStats::from_results(&results);
    if statuses.failed > 0 {
        warn!(failed = statuses.failed, "rotation fit did not converge for some models");
    }

    // 4) Surface constraints, strictly after matching.
    let (results, dropped_by_surface) = match config.n_sigma {
        Some(n_sigma) => apply_surface_box(results, &surface_box(&surface, n_sigma, &grid)),
        None => (results, 0),
    };
    if results.is_empty() {
        warn!("no models left to write");
    }

    // 5) Export.
    let slot_labels = assembler.observed().slot_labels();
    write_results_tsv(&config.output_path, &grid.parameter_names, &slot_labels, &results)?;
    info!(rows = results.len(), path = %config.output_path.display(), "output written");

    let summary = RunSummary {
        generated_at: Utc::now(),
        grid: config.grid_path.display().to_string(),
        observations: config.observations_path.display().to_string(),
        output: config.output_path.display().to_string(),
        observable: config.observable,
        method: config.method,
        optimise_rotation: config.optimise_rotation,
        slots: assembler.observed().len(),
        segment_lengths: assembler.segments().iter().map(|s| s.len()).collect(),
        rows_read: grid.rows_read,
        rows_skipped: grid.row_errors.len(),
        statuses,
        dropped_by_surface,
        rows_written: results.len(),
        rotation,
        elapsed_seconds: started.elapsed().as_secs_f64(),
    };

    Ok(RunOutput {
        parameter_names: grid.parameter_names,
        slot_labels,
        results,
        summary,
    })
}

/// Run the grid matcher with the configured rotation mode and worker count.
pub fn match_rows(
    config: &MatchConfig,
    assembler: &PatternAssembler,
    rows: &[GridRow],
) -> Result<Vec<ModelResult>, AppError> {
    let rescaler = FrameShift {
        azimuthal_order: config.azimuthal_order,
    };
    let solver = LevenbergMarquardt::with_max_evaluations(config.max_evaluations);
    let mode = if config.optimise_rotation {
        RotationMode::Optimised {
            rescaler: &rescaler,
            solver: &solver,
        }
    } else {
        RotationMode::Fixed
    };
    let matcher = GridMatcher::new(assembler, config.estimated_rotation, mode);

    match config.threads {
        Some(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| AppError::new(2, format!("Failed to start {n} worker threads: {e}")))?;
            Ok(pool.install(|| matcher.match_grid(rows)))
        }
        None => Ok(matcher.match_grid(rows)),
    }
}

/// Surface box from the observations, minus quantities the grid does not carry.
fn surface_box(observed: &SurfaceObservations, n_sigma: f64, grid: &GridTable) -> SurfaceBox {
    let mut b = SurfaceBox::from_observations(observed, n_sigma);
    let GridLayout {
        log_teff_column,
        logg_column,
        log_l_column,
        ..
    } = &grid.layout;

    if b.log_teff.is_some() && log_teff_column.is_none() {
        warn!("Teff observed but the grid has no logTeff column; not constraining on it");
        b.log_teff = None;
    }
    if b.logg.is_some() && logg_column.is_none() {
        warn!("logg observed but the grid has no logg column; not constraining on it");
        b.logg = None;
    }
    if b.log_l.is_some() && log_l_column.is_none() {
        warn!("logL observed but the grid has no logL column; not constraining on it");
        b.log_l = None;
    }
    if b.is_unconstrained() {
        warn!("--n-sigma given but no usable surface observations; keeping every model");
    }
    b
}
