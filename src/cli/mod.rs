//! Command-line parsing for the g-mode pattern matcher.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! matching code: flags are turned into a `MatchConfig` once, in `app`.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::domain::{Observable, SelectionMethod};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "gmatch", version, about = "Match theoretical g-mode patterns to an observed period spacing pattern")]
pub struct Cli {
    /// Increase log verbosity (-v = debug, -vv = trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Match every grid model against the observations and write the output table.
    Match(MatchArgs),
    /// Validate the configuration and print the observed segmentation, without reading the grid.
    Check(MatchArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct MatchArgs {
    /// Theoretical grid (tab-separated, `n_pg<k>` frequency columns).
    #[arg(long)]
    pub grid: PathBuf,

    /// Observed pattern (tab-separated, `<observable>` and `<observable>_err` columns).
    #[arg(long)]
    pub observations: PathBuf,

    /// Output table path.
    #[arg(short, long, default_value = "matched_patterns.tsv")]
    pub output: PathBuf,

    /// Observable the pattern is expressed in.
    #[arg(long, value_enum, default_value_t = Observable::Period)]
    pub observable: Observable,

    /// How to build the theoretical sequence for each segment.
    #[arg(long, value_enum, default_value_t = SelectionMethod::ChisqLongestSequence)]
    pub method: SelectionMethod,

    /// Anchor pulsation for `highest-amplitude`, once per segment, in the observable's unit.
    #[arg(long = "anchor", allow_negative_numbers = true)]
    pub anchors: Vec<f64>,

    /// Estimated rotation rate: starting point of the fit (must be above 1e-5), or the rate used when not optimising.
    #[arg(long, default_value_t = 0.0)]
    pub estimated_rotation: f64,

    /// Fit the rotation rate per model instead of keeping it fixed.
    #[arg(long)]
    pub optimise_rotation: bool,

    /// Azimuthal order `m` for the frame shift `f + m·ΔΩ` between rotation rates (not a TAR rescaling).
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub azimuthal_order: i32,

    /// Maximum residual evaluations per model during the rotation fit.
    #[arg(long, default_value_t = 4000)]
    pub max_evaluations: usize,

    /// Worker threads (default: one per core).
    #[arg(long)]
    pub threads: Option<usize>,

    /// Drop models outside this many sigma of the observed Teff / logg / logL.
    #[arg(long)]
    pub n_sigma: Option<f64>,

    /// Also write a JSON run summary here.
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_match_with_anchors() {
        let cli = Cli::parse_from([
            "gmatch",
            "-v",
            "match",
            "--grid",
            "g.tsv",
            "--observations",
            "o.tsv",
            "--method",
            "highest-amplitude",
            "--anchor",
            "1.25",
            "--anchor",
            "1.6",
            "--azimuthal-order",
            "-1",
            "--optimise-rotation",
        ]);
        assert_eq!(cli.verbose, 1);
        let Command::Match(args) = cli.command else {
            panic!("expected match");
        };
        assert_eq!(args.method, SelectionMethod::HighestAmplitude);
        assert_eq!(args.anchors, vec![1.25, 1.6]);
        assert_eq!(args.azimuthal_order, -1);
        assert!(args.optimise_rotation);
        assert_eq!(args.observable, Observable::Period);
        assert_eq!(args.output, PathBuf::from("matched_patterns.tsv"));
    }

    #[test]
    fn check_takes_the_same_flags() {
        let cli = Cli::parse_from(["gmatch", "check", "--grid", "g", "--observations", "o", "--observable", "frequency"]);
        assert!(matches!(cli.command, Command::Check(ref a) if a.observable == Observable::Frequency));
    }
}
