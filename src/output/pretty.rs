//! Human-readable colored text rendering.

use colored::Colorize;

use crate::finding::Severity;
use crate::report::Report;
use crate::score::Recommendation;

/// Formats a [`Report`] as ANSI-colored terminal text.
///
/// Sections: header, per-analyzer counts, the score line, then every
/// finding with its location and recommendation.
pub fn format(report: &Report) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "\n{}\n",
        format!("  Scanning: {}  ", report.skill_ref.name)
            .bold()
            .on_blue()
            .white()
    ));
    out.push_str(&format!("  {}\n\n", report.scanned_at.dimmed()));

    out.push_str(&format!("{}\n", "Analyzers".bold().underline()));
    for entry in &report.analyzers_run {
        let (name, status) = match entry.strip_suffix("-skipped") {
            Some(name) => (name, "SKIP".dimmed().to_string()),
            None => match entry.strip_suffix("-errored") {
                Some(name) => (name, "ERR ".red().bold().to_string()),
                None => (entry.as_str(), " OK ".green().bold().to_string()),
            },
        };
        let count = report.findings.iter().filter(|f| f.analyzer == name).count();
        out.push_str(&format!("  [{status}] {name:<12} {count} findings\n"));
    }
    out.push('\n');

    let rec = report.score.recommendation;
    let rec_str = match rec {
        Recommendation::Pass => rec.to_string().green().bold().to_string(),
        Recommendation::Caution => rec.to_string().yellow().bold().to_string(),
        Recommendation::Review => rec.to_string().red().bold().to_string(),
        Recommendation::Block => rec.to_string().white().on_red().bold().to_string(),
    };
    out.push_str(&format!(
        "{} {}/100 ({}) — {}\n",
        "Trust score:".bold(),
        report.score.value,
        report.score.grade,
        rec_str
    ));
    out.push_str(&format!("{}\n\n", report.score.summary.dimmed()));

    for finding in &report.findings {
        let severity_str = match finding.severity {
            Severity::Critical => "CRIT".red().bold().to_string(),
            Severity::High => "HIGH".red().to_string(),
            Severity::Medium => " MED".yellow().bold().to_string(),
            Severity::Low => " LOW".cyan().to_string(),
            Severity::Info => "INFO".dimmed().to_string(),
        };
        out.push_str(&format!(
            "  [{severity_str}] {title} ({category})\n",
            title = finding.title,
            category = finding.category.to_string().dimmed(),
        ));
        match (&finding.file, finding.line) {
            (Some(file), Some(line)) => {
                out.push_str(&format!("         {}\n", format!("{file}:{line}").dimmed()))
            }
            (Some(file), None) => out.push_str(&format!("         {}\n", file.dimmed())),
            _ => {}
        }
        if let Some(ref evidence) = finding.evidence {
            out.push_str(&format!("         > {}\n", evidence.dimmed()));
        }
        if !finding.recommendation.is_empty() {
            out.push_str(&format!("         → {}\n", finding.recommendation.dimmed()));
        }
    }

    if !report.findings.is_empty() {
        out.push('\n');
    }
    out
}
