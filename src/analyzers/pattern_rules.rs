//! Pattern-rule analyzer.
//!
//! Evaluates every pattern-dialect rule against each file of the text
//! corpus as a whole. A rule fires at most once per file — the condition is
//! a property of the file, not of an individual string hit — which keeps
//! multi-string rules from flooding the report.

use std::sync::Arc;

use crate::error::AnalyzerError;
use crate::finding::{truncate_evidence, Finding};
use crate::pipeline::CancelToken;
use crate::rules::RuleLibrary;
use crate::skill::Skill;

use super::{line_of_offset, Analyzer};

pub struct PatternAnalyzer {
    library: Arc<RuleLibrary>,
}

impl PatternAnalyzer {
    pub fn new(library: Arc<RuleLibrary>) -> Self {
        PatternAnalyzer { library }
    }
}

impl Analyzer for PatternAnalyzer {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn analyze(&self, skill: &Skill, cancel: &CancelToken) -> Result<Vec<Finding>, AnalyzerError> {
        let mut findings = Vec::new();

        for (path, text) in skill.text_corpus() {
            if cancel.is_cancelled() {
                break;
            }

            for rule in self.library.pattern_rules() {
                let Some(first_offset) = rule.evaluate(text) else {
                    continue;
                };
                let line = line_of_offset(text, first_offset);
                let snippet = text.lines().nth(line as usize - 1).unwrap_or("").trim();

                findings.push(Finding {
                    analyzer: self.name().to_string(),
                    category: rule.category,
                    severity: rule.severity,
                    title: format!("{} in {}", rule.description, path),
                    detail: format!(
                        "Pattern rule '{}' satisfied its condition in {} (first match at line {}).",
                        rule.id, path, line
                    ),
                    file: Some(path.to_string()),
                    line: Some(line),
                    evidence: Some(truncate_evidence(snippet)),
                    cwe: rule.cwe.clone(),
                    recommendation: rule.recommendation.clone(),
                });
            }
        }

        Ok(findings)
    }
}
