//! Output rendering for scan reports.

pub mod json;
pub mod pretty;

use crate::report::Report;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable colored text.
    Pretty,
    /// Machine-readable JSON (the serialization contract).
    Json,
    /// One line: `<RECOMMENDATION> <score>`.
    Quiet,
}

/// Renders a [`Report`] in the requested format.
pub fn format_report(report: &Report, format: OutputFormat) -> String {
    match format {
        OutputFormat::Pretty => pretty::format(report),
        OutputFormat::Json => json::format(report),
        OutputFormat::Quiet => format!("{} {}\n", report.score.recommendation, report.score.value),
    }
}
