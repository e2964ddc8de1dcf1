//! Pattern construction and sequence matching.
//!
//! Responsibilities:
//!
//! - period spacing series and their chi-square (`spacing`)
//! - per-segment selection strategies (`selector`)
//! - multi-segment assembly and residuals (`assembler`)

pub mod assembler;
pub mod selector;
pub mod spacing;

pub use assembler::*;
pub use selector::*;
pub use spacing::*;
