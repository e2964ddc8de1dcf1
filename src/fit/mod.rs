//! Rotation fitting and grid-wide matching.
//!
//! Responsibilities:
//!
//! - rescale theoretical frequencies to a trial rotation rate
//! - minimise pattern residuals over the rotation rate (bounded Levenberg–Marquardt)
//! - run every grid row through assembly and fitting (parallel)

pub mod matcher;
pub mod rescale;
pub mod rotation;
pub mod solver;

pub use matcher::*;
pub use rescale::*;
pub use rotation::*;
pub use solver::*;
