//! Linear least squares used by the nonlinear solver.

pub mod ols;

pub use ols::*;
