//! Pluggable analyzers.
//!
//! Anything implementing [`Analyzer`] can participate in a scan: the
//! contract is just `{name(), analyze(skill)}`. Analyzers are pure functions
//! of the immutable [`Skill`] — no analyzer reads another's output, which is
//! what lets the pipeline run them in parallel and makes the final report
//! independent of execution order.
//!
//! Built-in implementations:
//!
//! - [`static_rules::StaticAnalyzer`] — regex-dialect rules, per line.
//! - [`pattern_rules::PatternAnalyzer`] — pattern-dialect rules, per file.
//! - [`ast::AstAnalyzer`] — tree-sitter walks over Python and shell
//!   scripts, plus typosquat and permission heuristics.
//! - [`semantic::SemanticAnalyzer`] — optional LLM review; skipped when no
//!   API key is configured.

pub mod ast;
pub mod pattern_rules;
pub mod semantic;
pub mod static_rules;

use std::sync::Arc;

use crate::config::Config;
use crate::error::AnalyzerError;
use crate::finding::Finding;
use crate::pipeline::CancelToken;
use crate::rules::RuleLibrary;
use crate::skill::Skill;

/// A scan analyzer.
///
/// Implementers must be `Send + Sync`: the pipeline fans analyzers out over
/// a rayon pool, each holding a shared reference to the same `Skill`.
///
/// `analyze` should poll `cancel` between files; returning early with a
/// partial finding list is fine because the pipeline discards all findings
/// once the token has fired.
pub trait Analyzer: Send + Sync {
    /// Unique analyzer identifier, recorded in `analyzers_run`.
    fn name(&self) -> &'static str;

    /// Produces findings for the given skill.
    fn analyze(&self, skill: &Skill, cancel: &CancelToken) -> Result<Vec<Finding>, AnalyzerError>;
}

/// Builds the enabled analyzer set for a scan.
///
/// The rule library is constructed once by the caller and shared by
/// reference; there is no global rule state.
pub fn build_analyzers(config: &Config, library: &Arc<RuleLibrary>) -> Vec<Box<dyn Analyzer>> {
    let mut analyzers: Vec<Box<dyn Analyzer>> = Vec::new();
    if config.analyzers.static_rules {
        analyzers.push(Box::new(static_rules::StaticAnalyzer::new(Arc::clone(library))));
    }
    if config.analyzers.pattern {
        analyzers.push(Box::new(pattern_rules::PatternAnalyzer::new(Arc::clone(library))));
    }
    if config.analyzers.ast {
        analyzers.push(Box::new(ast::AstAnalyzer::new()));
    }
    if config.analyzers.semantic {
        analyzers.push(Box::new(semantic::SemanticAnalyzer::from_env(config)));
    }
    analyzers
}

/// Computes the 1-based line number of a byte offset within `text`.
pub(crate) fn line_of_offset(text: &str, offset: usize) -> u32 {
    let clamped = offset.min(text.len());
    (text[..clamped].bytes().filter(|&b| b == b'\n').count() + 1) as u32
}
