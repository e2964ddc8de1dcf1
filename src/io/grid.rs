//! Theoretical grid ingest.
//!
//! The grid is a tab-separated table, one model per row:
//!
//! - `n_pg<k>` columns hold the frequency of radial order `k` (empty / NaN = not computed)
//! - `rot` is the rotation rate the frequencies were computed at
//! - `logTeff`, `logg`, `logL` are surface properties
//! - every other column is a free model parameter, kept in file order
//!
//! Rows that fail to parse are skipped and reported; they never abort the run.

use std::path::Path;

use tracing::{debug, warn};

use crate::domain::{GridRow, SurfaceProperties, TheoreticalPattern};
use crate::error::AppError;

use super::table::{RowError, clean_header_name, normalize_header_name, open_table, parse_cell, parse_finite};

/// Column roles resolved from the grid header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridLayout {
    /// `(column index, radial order)` for every `n_pg<k>` column.
    pub order_columns: Vec<(usize, i32)>,
    pub rotation_column: Option<usize>,
    pub log_teff_column: Option<usize>,
    pub logg_column: Option<usize>,
    pub log_l_column: Option<usize>,
    /// `(column index, name)` of the free parameters.
    pub parameter_columns: Vec<(usize, String)>,
}

impl GridLayout {
    pub fn from_headers<'h>(headers: impl IntoIterator<Item = &'h str>) -> Result<Self, AppError> {
        let mut layout = GridLayout::default();

        for (idx, raw) in headers.into_iter().enumerate() {
            let name = clean_header_name(raw);
            if let Some(order) = radial_order(name) {
                layout.order_columns.push((idx, order));
                continue;
            }
            match normalize_header_name(name).as_str() {
                "rot" => layout.rotation_column = Some(idx),
                "logteff" => layout.log_teff_column = Some(idx),
                "logg" => layout.logg_column = Some(idx),
                "logl" => layout.log_l_column = Some(idx),
                _ => layout.parameter_columns.push((idx, name.to_string())),
            }
        }

        if layout.order_columns.is_empty() {
            return Err(AppError::new(
                2,
                "Grid has no `n_pg<k>` pulsation columns.",
            ));
        }
        Ok(layout)
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.parameter_columns.iter().map(|(_, n)| n.clone()).collect()
    }
}

/// `n_pg-12` -> `-12`.
fn radial_order(name: &str) -> Option<i32> {
    name.strip_prefix("n_pg")?.trim().parse().ok()
}

/// Ingested grid: parsed rows plus whatever was skipped.
#[derive(Debug, Clone)]
pub struct GridTable {
    pub parameter_names: Vec<String>,
    pub layout: GridLayout,
    pub rows: Vec<GridRow>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

pub fn read_grid(path: &Path) -> Result<GridTable, AppError> {
    let (mut reader, headers) = open_table(path, "grid")?;
    let layout = GridLayout::from_headers(headers.iter())?;
    debug!(
        orders = layout.order_columns.len(),
        parameters = layout.parameter_columns.len(),
        native_rotation = layout.rotation_column.is_some(),
        "grid layout"
    );

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;

        let parsed = result
            .map_err(|e| format!("TSV parse error: {e}"))
            .and_then(|record| parse_row(&record, &layout, rows.len()));
        match parsed {
            Ok(row) => rows.push(row),
            Err(message) => {
                warn!(line, "skipping grid row: {message}");
                row_errors.push(RowError { line, message });
            }
        }
    }

    if rows.is_empty() {
        return Err(AppError::new(
            3,
            format!("Grid '{}' has no usable rows.", path.display()),
        ));
    }

    Ok(GridTable {
        parameter_names: layout.parameter_names(),
        layout,
        rows,
        row_errors,
        rows_read,
    })
}

fn parse_row(record: &csv::StringRecord, layout: &GridLayout, index: usize) -> Result<GridRow, String> {
    let parameters = layout
        .parameter_columns
        .iter()
        .map(|(idx, name)| parse_finite(record, *idx, name))
        .collect::<Result<Vec<_>, _>>()?;

    let native_rotation = layout
        .rotation_column
        .map(|idx| parse_finite(record, idx, "rot"))
        .transpose()?;

    let optional = |column: Option<usize>| -> Result<Option<f64>, String> {
        match column {
            Some(idx) => Ok(Some(parse_cell(record, idx)?).filter(|v| v.is_finite())),
            None => Ok(None),
        }
    };
    let surface = SurfaceProperties {
        log_teff: optional(layout.log_teff_column)?,
        logg: optional(layout.logg_column)?,
        log_l: optional(layout.log_l_column)?,
    };

    let modes = layout
        .order_columns
        .iter()
        .map(|&(idx, order)| Ok((order, parse_cell(record, idx)?)))
        .collect::<Result<Vec<_>, String>>()?;
    let pattern = TheoreticalPattern::from_modes(modes);
    if pattern.is_empty() {
        return Err("no computed pulsations".to_string());
    }

    Ok(GridRow {
        index,
        parameters,
        native_rotation,
        surface,
        pattern,
    })
}
