//! Scan orchestration.
//!
//! [`Pipeline`] owns the compiled rule library, the enabled analyzer set,
//! and a bounded worker pool. A scan parses the skill once, fans the
//! analyzers out over the pool, merges and deduplicates their findings,
//! scores the result, and assembles the [`Report`].
//!
//! Analyzers are independent, so the report is a deterministic function of
//! the parsed skill plus the rule library: permuting analyzer execution
//! order changes nothing but `scan_id`, `scanned_at`, and the duration.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::analyzers::{build_analyzers, Analyzer};
use crate::config::Config;
use crate::error::{AnalyzerError, RuleLoadError, ScanError};
use crate::finding::{Category, Finding, Severity};
use crate::parser::parse_skill;
use crate::report::{Report, SkillRef};
use crate::rules::RuleLibrary;
use crate::score::compute_trust_score;
use crate::skill::Skill;

/// Cooperative cancellation handle.
///
/// Cloning shares the underlying flag. Analyzers poll
/// [`is_cancelled`](CancelToken::is_cancelled) between files; once the flag
/// fires, the pipeline discards all findings and the scan returns
/// [`ScanError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; pending work stops at its next checkpoint.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The assembled scan engine.
pub struct Pipeline {
    analyzers: Vec<Box<dyn Analyzer>>,
    pool: rayon::ThreadPool,
}

impl Pipeline {
    /// Builds the pipeline: compiles the rule library (fail fast on any bad
    /// rule), instantiates the enabled analyzers, and sizes the worker
    /// pool.
    pub fn new(config: &Config) -> Result<Pipeline, RuleLoadError> {
        let library = Arc::new(RuleLibrary::load(config.rules_dir.as_deref())?);
        let analyzers = build_analyzers(config, &library);

        let threads = config.workers.effective_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("clawguard-worker-{i}"))
            .build()
            .map_err(|e| RuleLoadError::new("worker-pool", e.to_string()))?;

        debug!(
            analyzers = analyzers.len(),
            threads, "pipeline constructed"
        );

        Ok(Pipeline { analyzers, pool })
    }

    /// Parses the directory at `path` and runs the full scan.
    pub fn scan(&self, path: &Path, cancel: &CancelToken) -> Result<Report, ScanError> {
        let (skill, parse_warnings) = parse_skill(path)?;
        self.run(&skill, parse_warnings, cancel)
    }

    /// Runs every enabled analyzer over an already-parsed skill.
    pub fn run(
        &self,
        skill: &Skill,
        parse_warnings: Vec<Finding>,
        cancel: &CancelToken,
    ) -> Result<Report, ScanError> {
        let start = Instant::now();

        let outcomes: Vec<(&'static str, Result<Vec<Finding>, AnalyzerError>)> =
            self.pool.install(|| {
                self.analyzers
                    .par_iter()
                    .map(|analyzer| (analyzer.name(), analyzer.analyze(skill, cancel)))
                    .collect()
            });

        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        let mut findings = parse_warnings;
        let mut analyzers_run = Vec::with_capacity(outcomes.len());
        for (name, outcome) in outcomes {
            match outcome {
                Ok(produced) => {
                    analyzers_run.push(name.to_string());
                    findings.extend(produced);
                }
                Err(AnalyzerError::Skipped { reason }) => {
                    debug!(analyzer = name, %reason, "analyzer skipped");
                    analyzers_run.push(format!("{name}-skipped"));
                }
                Err(AnalyzerError::Failed { message }) => {
                    warn!(analyzer = name, %message, "analyzer errored");
                    analyzers_run.push(format!("{name}-errored"));
                    findings.push(degraded_analyzer_finding(name, &message));
                }
            }
        }

        let findings = dedup_and_sort(findings);
        let score = compute_trust_score(&findings);

        Ok(Report {
            scan_id: uuid::Uuid::new_v4().to_string(),
            skill_ref: SkillRef {
                name: skill.name.clone(),
                description: skill.description.clone(),
                path: skill.root_path.display().to_string(),
            },
            score,
            findings,
            analyzers_run,
            scan_duration_ms: start.elapsed().as_millis() as u64,
            scanned_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

fn degraded_analyzer_finding(name: &str, message: &str) -> Finding {
    Finding {
        analyzer: name.to_string(),
        category: Category::BestPractices,
        severity: Severity::Low,
        title: format!("Analyzer '{name}' failed"),
        detail: format!("The {name} analyzer encountered an error: {message}"),
        file: None,
        line: None,
        evidence: None,
        cwe: None,
        recommendation: "Findings from this analyzer are missing; re-run the scan.".to_string(),
    }
}

/// Collapses duplicates under `(analyzer, category, file, line, title)`,
/// keeping the highest-severity instance, then imposes the report order.
///
/// Severity ties keep the first-seen instance; because the analyzer name is
/// part of the key, within-key order only depends on one analyzer's own
/// discovery order and the result stays permutation-invariant.
fn dedup_and_sort(findings: Vec<Finding>) -> Vec<Finding> {
    let mut kept: Vec<Finding> = Vec::with_capacity(findings.len());
    let mut index: HashMap<(String, Category, Option<String>, Option<u32>, String), usize> =
        HashMap::new();

    for finding in findings {
        let key = (
            finding.analyzer.clone(),
            finding.category,
            finding.file.clone(),
            finding.line,
            finding.title.clone(),
        );
        match index.get(&key) {
            Some(&at) => {
                if finding.severity > kept[at].severity {
                    kept[at] = finding;
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(finding);
            }
        }
    }

    kept.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then(a.category.cmp(&b.category))
            .then(a.file.cmp(&b.file))
            .then(a.line.cmp(&b.line))
            .then(a.analyzer.cmp(&b.analyzer))
            .then(a.title.cmp(&b.title))
    });
    kept
}
