// Status Report - Plain-Text Table of Resolved and Unresolved Metrics

use crate::types::Resolution;
use crate::workflow::DocumentResolution;
use std::fmt::Write;

const HEADERS: [&str; 7] = [
    "METRIC",
    "PERIOD",
    "STATUS",
    "VALUE",
    "CONFIDENCE",
    "METHOD",
    "SOURCE / REASON",
];

fn row(document: &DocumentResolution, resolution: &Resolution) -> [String; 7] {
    let (status, value, confidence, detail) = if resolution.is_resolved() {
        let source = document
            .chosen(resolution)
            .map(|c| c.provenance().to_string())
            .unwrap_or_default();
        (
            "resolved",
            resolution.value.map(|v| v.to_string()).unwrap_or_default(),
            resolution
                .confidence
                .map(|c| format!("{:.2}", c))
                .unwrap_or_default(),
            source,
        )
    } else {
        let reason = resolution
            .unresolved_reason
            .map(|r| r.describe().to_string())
            .unwrap_or_else(|| resolution.rationale.clone());
        ("unresolved", "-".to_string(), "-".to_string(), reason)
    };

    [
        resolution.metric.to_string(),
        resolution.period_label(),
        status.to_string(),
        value,
        confidence,
        resolution.method.to_string(),
        detail,
    ]
}

/// Render every resolution of a document as an aligned text table
pub fn render_report(document: &DocumentResolution) -> String {
    let rows: Vec<[String; 7]> = document
        .resolutions
        .iter()
        .map(|r| row(document, r))
        .collect();

    let mut widths = HEADERS.map(str::len);
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Document {} (run {})",
        document.document_id, document.run_id
    );

    let header: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
    write_line(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    write_line(&mut out, &rule, &widths);
    for cells in &rows {
        write_line(&mut out, cells, &widths);
    }

    let resolved = document.resolved_count();
    let summary = &document.summary;
    let _ = writeln!(
        out,
        "\n{} resolved, {} unresolved | {} candidates | verdicts: {} pass, {} warning, {} fail",
        resolved,
        document.resolutions.len() - resolved,
        document.candidates.len(),
        summary.passed,
        summary.warnings,
        summary.failed
    );
    for issue in &summary.common_issues {
        let _ = writeln!(
            out,
            "  {} {:?}: {}",
            issue.rule, issue.outcome, issue.count
        );
    }

    let derived = document.derived_metrics();
    if !derived.is_empty() {
        let _ = writeln!(out, "\nDerived:");
        for metric in &derived {
            let _ = writeln!(
                out,
                "  {} {}: {}",
                metric.id,
                metric.period,
                metric.value.round_dp(4).normalize()
            );
        }
    }

    out
}

fn write_line(out: &mut String, cells: &[String], widths: &[usize; 7]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    let _ = writeln!(out, "{}", line.join("  ").trim_end());
}
