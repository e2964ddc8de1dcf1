//! Input/output helpers.
//!
//! - grid table ingest (`grid`)
//! - observation table ingest (`observations`)
//! - result table + JSON summary exports (`export`)

pub mod export;
pub mod grid;
pub mod observations;
pub mod table;

pub use export::*;
pub use grid::*;
pub use observations::*;
pub use table::RowError;
