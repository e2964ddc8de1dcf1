//! Formatted terminal output.
//!
//! Kept apart from the pipeline so wording and layout changes stay local.

use crate::pattern::PatternAssembler;

use super::RunSummary;

/// Format the end-of-run summary.
pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str("=== gmatch - g-mode pattern match ===\n");
    out.push_str(&format!("Generated: {}\n", summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC")));
    out.push_str(&format!("Grid: {}\n", summary.grid));
    out.push_str(&format!("Observations: {}\n", summary.observations));
    out.push_str(&format!(
        "Observable: {} | method: {} | rotation: {}\n",
        summary.observable.column_name(),
        summary.method.display_name(),
        if summary.optimise_rotation { "optimised" } else { "fixed" },
    ));
    out.push_str(&format!(
        "Pattern: {} slot(s) in {} segment(s) {}\n",
        summary.slots,
        summary.segment_lengths.len(),
        fmt_lengths(&summary.segment_lengths),
    ));

    out.push_str("\nRows:\n");
    out.push_str(&format!("- read      {:>8}\n", summary.rows_read));
    out.push_str(&format!("- skipped   {:>8}\n", summary.rows_skipped));
    if summary.optimise_rotation {
        out.push_str(&format!("- converged {:>8}\n", summary.statuses.converged));
        out.push_str(&format!("- failed    {:>8}\n", summary.statuses.failed));
    } else {
        out.push_str(&format!("- fixed     {:>8}\n", summary.statuses.fixed));
    }
    out.push_str(&format!("- filtered  {:>8}\n", summary.dropped_by_surface));
    out.push_str(&format!("- written   {:>8}\n", summary.rows_written));

    if let Some(rot) = &summary.rotation {
        out.push_str(&format!(
            "\nRotation (converged): min={:.6} median={:.6} max={:.6}\n",
            rot.min, rot.median, rot.max
        ));
    }

    out.push_str(&format!("\nOutput: {} ({:.2}s)\n", summary.output, summary.elapsed_seconds));
    out
}

/// Format the observed segmentation for `gmatch check`.
pub fn format_segmentation(assembler: &PatternAssembler) -> String {
    let observed = assembler.observed();
    let mut out = String::new();

    out.push_str(&format!(
        "Observed {} pattern: {} slot(s), {} gap(s)\n",
        observed.observable().column_name(),
        observed.len(),
        observed.gap_count(),
    ));
    out.push_str(&format!("Strategy: {:?}\n", assembler.strategy()));

    for (i, segment) in assembler.segments().iter().enumerate() {
        if segment.is_empty() {
            out.push_str(&format!("  segment {}: empty (slot {})\n", i + 1, segment.start + 1));
            continue;
        }
        out.push_str(&format!(
            "  segment {}: slots {}..={} ({} pulsation(s)) {}\n",
            i + 1,
            segment.start + 1,
            segment.start + segment.len(),
            segment.len(),
            fmt_vec(&segment.values),
        ));
    }
    out
}

fn fmt_lengths(v: &[usize]) -> String {
    let parts: Vec<String> = v.iter().map(|n| n.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}
