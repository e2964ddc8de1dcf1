//! Post-matching model constraints.

pub mod surface;

pub use surface::*;
