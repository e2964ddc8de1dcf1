//! Observation table ingest.
//!
//! Tab-separated, header row. Required: the observable column (`frequency` or
//! `period`) and its `_err` column, one pulsation per row, ordered increasing
//! in frequency, `0` in both columns marking an interruption of the pattern.
//!
//! Optional surface observations (`Teff`, `logg`, `logL`, each with `_err`)
//! are taken from the first row.

use std::path::Path;

use crate::domain::{Measurement, Observable, ObservedPattern, SurfaceObservations};
use crate::error::AppError;

use super::table::{build_header_map, open_table, parse_cell};

#[derive(Debug, Clone, PartialEq)]
pub struct ObservationTable {
    pub pattern: ObservedPattern,
    pub surface: SurfaceObservations,
}

pub fn read_observations(path: &Path, observable: Observable) -> Result<ObservationTable, AppError> {
    let (mut reader, headers) = open_table(path, "observations")?;
    let header_map = build_header_map(&headers);

    let value_name = observable.column_name();
    let error_name = observable.error_column_name();
    let (Some(&value_idx), Some(&error_idx)) = (header_map.get(value_name), header_map.get(error_name.as_str()))
    else {
        return Err(AppError::new(
            2,
            format!(
                "Observations '{}' need `{value_name}` and `{error_name}` columns.",
                path.display()
            ),
        ));
    };

    let surface_column = |name: &str| {
        let value = header_map.get(name).copied()?;
        let error = header_map.get(format!("{name}_err").as_str()).copied()?;
        Some((value, error))
    };
    let teff_cols = surface_column("teff");
    let logg_cols = surface_column("logg");
    let log_l_cols = surface_column("logl");

    let mut values = Vec::new();
    let mut errors = Vec::new();
    let mut surface = SurfaceObservations::default();

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record =
            result.map_err(|e| AppError::new(2, format!("Observations line {line}: TSV parse error: {e}")))?;
        let cell = |col: usize| {
            parse_cell(&record, col).map_err(|e| AppError::new(2, format!("Observations line {line}: {e}")))
        };

        let value = cell(value_idx)?;
        let error = cell(error_idx)?;
        if value.is_nan() && error.is_nan() {
            // Trailing rows that only carry surface columns.
            continue;
        }
        values.push(value);
        errors.push(error);

        if idx == 0 {
            let measurement = |cols: Option<(usize, usize)>| -> Result<Option<Measurement>, AppError> {
                let Some((v, e)) = cols else {
                    return Ok(None);
                };
                let (value, error) = (cell(v)?, cell(e)?);
                Ok((value.is_finite() && error.is_finite()).then_some(Measurement { value, error }))
            };
            surface = SurfaceObservations {
                teff: measurement(teff_cols)?,
                logg: measurement(logg_cols)?,
                log_l: measurement(log_l_cols)?,
            };
        }
    }

    if values.is_empty() {
        return Err(AppError::new(
            3,
            format!("Observations '{}' contain no pulsations.", path.display()),
        ));
    }

    let pattern = ObservedPattern::new(observable, values, errors)?;
    Ok(ObservationTable { pattern, surface })
}
