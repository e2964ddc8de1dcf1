//! Result exports.
//!
//! - the per-model output table (tab-separated, one row per kept model)
//! - an optional JSON run summary

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::ModelResult;
use crate::error::AppError;
use crate::report::RunSummary;

/// Output header: `rot`, `rot_err`, the free parameters, then one column per observed slot.
pub fn results_header(parameter_names: &[String], slot_labels: &[String]) -> Vec<String> {
    let mut header = vec!["rot".to_string(), "rot_err".to_string()];
    header.extend(parameter_names.iter().cloned());
    header.extend(slot_labels.iter().cloned());
    header
}

/// Write one row per model result.
///
/// `rot_err` is left empty when it is undefined (fixed rotation, or no
/// covariance estimate).
pub fn write_results_tsv(
    path: &Path,
    parameter_names: &[String],
    slot_labels: &[String],
    results: &[ModelResult],
) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create output '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{}", results_header(parameter_names, slot_labels).join("\t"))
        .map_err(|e| AppError::new(2, format!("Failed to write output header: {e}")))?;

    for r in results {
        let mut fields = Vec::with_capacity(2 + r.parameters.len() + r.pulsations.len());
        fields.push(r.rotation.to_string());
        fields.push(r.rotation_error.map(|v| v.to_string()).unwrap_or_default());
        fields.extend(r.parameters.iter().map(|v| v.to_string()));
        fields.extend(r.pulsations.iter().map(|v| v.to_string()));

        writeln!(out, "{}", fields.join("\t"))
            .map_err(|e| AppError::new(2, format!("Failed to write output row {}: {e}", r.row)))?;
    }

    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush output '{}': {e}", path.display())))?;
    Ok(())
}

pub fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create summary JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, summary)
        .map_err(|e| AppError::new(2, format!("Failed to write summary JSON: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RotationStatus, SurfaceProperties};

    fn result(rotation_error: Option<f64>) -> ModelResult {
        ModelResult {
            row: 0,
            rotation: 0.6,
            rotation_error,
            status: RotationStatus::Converged,
            parameters: vec![1.5, 0.014],
            surface: SurfaceProperties::default(),
            pulsations: vec![1.1, 0.0, -1.0],
        }
    }

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        let params = vec!["M".to_string(), "Z".to_string()];
        let slots = vec!["f1".to_string(), "f_missing".to_string(), "f3".to_string()];

        write_results_tsv(&path, &params, &slots, &[result(Some(0.01)), result(None)]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "rot\trot_err\tM\tZ\tf1\tf_missing\tf3");
        assert_eq!(lines[1], "0.6\t0.01\t1.5\t0.014\t1.1\t0\t-1");
        assert_eq!(lines[2], "0.6\t\t1.5\t0.014\t1.1\t0\t-1");
    }
}
