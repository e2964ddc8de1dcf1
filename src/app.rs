//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and installs logging
//! - validates the configuration
//! - runs the matching pipeline
//! - prints the run summary

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, MatchArgs};
use crate::domain::MatchConfig;
use crate::error::AppError;
use crate::fit::MIN_ROTATION;

pub mod pipeline;

/// Entry point for the `gmatch` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Match(args) => handle_match(&args),
        Command::Check(args) => handle_check(&args),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("gmode_match={level}")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_match(args: &MatchArgs) -> Result<(), AppError> {
    let config = match_config_from_args(args)?;
    let run = pipeline::run_match(&config)?;

    println!("{}", crate::report::format_run_summary(&run.summary));

    if let Some(path) = &config.summary_path {
        crate::io::export::write_summary_json(path, &run.summary)?;
    }
    Ok(())
}

fn handle_check(args: &MatchArgs) -> Result<(), AppError> {
    let config = match_config_from_args(args)?;
    let (assembler, surface) = pipeline::prepare_observations(&config)?;

    println!("{}", crate::report::format_segmentation(&assembler));
    if !surface.is_empty() {
        println!("Surface observations: {surface:?}");
    }
    Ok(())
}

/// Convert CLI flags into a validated [`MatchConfig`].
pub fn match_config_from_args(args: &MatchArgs) -> Result<MatchConfig, AppError> {
    if !(args.estimated_rotation.is_finite() && args.estimated_rotation >= 0.0) {
        return Err(AppError::new(
            2,
            format!("--estimated-rotation must be a non-negative number, got {}.", args.estimated_rotation),
        ));
    }
    if args.optimise_rotation && !(args.estimated_rotation > MIN_ROTATION) {
        return Err(AppError::new(
            2,
            format!(
                "--optimise-rotation needs --estimated-rotation above {MIN_ROTATION}, got {}.",
                args.estimated_rotation
            ),
        ));
    }
    if args.max_evaluations == 0 {
        return Err(AppError::new(2, "--max-evaluations must be at least 1."));
    }
    if args.threads == Some(0) {
        return Err(AppError::new(2, "--threads must be at least 1."));
    }
    if let Some(n) = args.n_sigma {
        if !(n.is_finite() && n > 0.0) {
            return Err(AppError::new(2, format!("--n-sigma must be positive, got {n}.")));
        }
    }

    Ok(MatchConfig {
        grid_path: args.grid.clone(),
        observations_path: args.observations.clone(),
        output_path: args.output.clone(),
        observable: args.observable,
        method: args.method,
        anchors: args.anchors.clone(),
        estimated_rotation: args.estimated_rotation,
        optimise_rotation: args.optimise_rotation,
        azimuthal_order: args.azimuthal_order,
        max_evaluations: args.max_evaluations,
        threads: args.threads,
        n_sigma: args.n_sigma,
        summary_path: args.summary.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> MatchArgs {
        let cli = Cli::parse_from(["gmatch", "match", "--grid", "g.tsv", "--observations", "o.tsv"]);
        match cli.command {
            Command::Match(a) => a,
            Command::Check(a) => a,
        }
    }

    #[test]
    fn defaults_convert_into_config() {
        let config = match_config_from_args(&args()).unwrap();
        assert_eq!(config.estimated_rotation, 0.0);
        assert!(!config.optimise_rotation);
        assert_eq!(config.max_evaluations, 4000);
        assert!(config.anchors.is_empty());
    }

    #[test]
    fn rejects_bad_numbers() {
        let mut a = args();
        a.estimated_rotation = -0.1;
        assert_eq!(match_config_from_args(&a).unwrap_err().exit_code(), 2);

        let mut a = args();
        a.n_sigma = Some(0.0);
        assert_eq!(match_config_from_args(&a).unwrap_err().exit_code(), 2);

        let mut a = args();
        a.threads = Some(0);
        assert!(match_config_from_args(&a).is_err());
    }

    #[test]
    fn optimisation_needs_an_estimate_above_the_bound() {
        let mut a = args();
        a.optimise_rotation = true;
        assert_eq!(match_config_from_args(&a).unwrap_err().exit_code(), 2);

        a.estimated_rotation = MIN_ROTATION;
        assert!(match_config_from_args(&a).is_err());

        a.estimated_rotation = 0.4;
        assert!(match_config_from_args(&a).unwrap().optimise_rotation);
    }
}
