//! `gmode-match` library crate.
//!
//! The binary (`gmatch`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - pattern selection can be reused on its own (e.g. from a notebook bridge)
//!
//! Pipeline: observed pattern -> per-segment selection -> assembly ->
//! rotation fit -> grid-wide matching -> surface box -> export.

pub mod app;
pub mod cli;
pub mod constraints;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod pattern;
pub mod report;
