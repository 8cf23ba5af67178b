//! Error types for the scan engine.
//!
//! Parse and rule-load errors are fatal and surface to the caller; analyzer
//! errors are contained by the pipeline (see [`crate::pipeline`]); the
//! semantic analyzer's failures never propagate at all.

use std::path::PathBuf;

/// Fatal errors raised while parsing a skill directory.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The skill root does not contain a `SKILL.md` manifest.
    #[error("SKILL.md not found in {0}")]
    ManifestMissing(PathBuf),

    /// The manifest exists but its header is unusable (bad YAML, missing
    /// required fields).
    #[error("invalid manifest: {message}")]
    ManifestInvalid { message: String },

    /// The skill directory exceeds a traversal bound (depth, file count, or
    /// cumulative size).
    #[error("skill too large: {reason}")]
    TooLarge { reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal startup error: a bundled or user-supplied rule failed to compile.
///
/// The library refuses to run with a partially loaded rule set, so this
/// aborts pipeline construction.
#[derive(Debug, thiserror::Error)]
#[error("failed to load rule '{rule_id}': {message}")]
pub struct RuleLoadError {
    pub rule_id: String,
    pub message: String,
}

impl RuleLoadError {
    pub fn new(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        RuleLoadError {
            rule_id: rule_id.into(),
            message: message.into(),
        }
    }
}

/// Non-fatal analyzer outcome other than a finding list.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// The analyzer did not run (e.g. missing credentials). Recorded in the
    /// report as `<name>-skipped`; produces no findings.
    #[error("skipped: {reason}")]
    Skipped { reason: String },

    /// The analyzer started but failed. Converted by the pipeline into a
    /// `best_practices`/`low` finding and recorded as `<name>-errored`.
    #[error("{message}")]
    Failed { message: String },
}

/// Errors surfaced by [`Pipeline::scan`](crate::pipeline::Pipeline::scan).
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The cancellation token fired; partial findings are discarded.
    #[error("scan cancelled")]
    Cancelled,
}
