//! Shared tab-separated table plumbing.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::{Reader, StringRecord};

use crate::error::AppError;

/// A row-level problem encountered while reading a table.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// 1-based line number in the file (header is line 1).
    pub line: usize,
    pub message: String,
}

/// Open a tab-separated table and return its reader plus the raw header record.
pub fn open_table(path: &Path, what: &str) -> Result<(Reader<File>, StringRecord), AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open {what} '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read {what} headers: {e}")))?
        .clone();

    Ok((reader, headers))
}

pub fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

/// Header names as written, minus whitespace and a UTF-8 BOM.
pub fn clean_header_name(name: &str) -> &str {
    name.trim().trim_start_matches('\u{feff}').trim()
}

pub fn normalize_header_name(name: &str) -> String {
    clean_header_name(name).to_ascii_lowercase()
}

/// Parse one cell as a float. Empty cells and `nan` read as NaN.
pub fn parse_cell(record: &StringRecord, idx: usize) -> Result<f64, String> {
    let raw = record.get(idx).unwrap_or("").trim();
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>()
        .map_err(|_| format!("column {}: '{raw}' is not a number", idx + 1))
}

/// Parse a cell that must hold a finite number.
pub fn parse_finite(record: &StringRecord, idx: usize, name: &str) -> Result<f64, String> {
    let v = parse_cell(record, idx)?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("'{name}' is missing or not finite"))
    }
}
