//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - run configuration enums (`Observable`, `SelectionMethod`, `BuildStrategy`)
//! - observed/theoretical patterns and per-segment matches (`pattern`)
//! - per-model outputs (`ModelResult`)

pub mod pattern;
pub mod types;

pub use pattern::*;
pub use types::*;
