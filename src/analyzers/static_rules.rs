//! Regex-rule analyzer.
//!
//! Applies every regex-dialect rule to every line of the text corpus (the
//! manifest body, each script, each readable extra file). Each qualifying
//! match emits one finding carrying the file, 1-based line, and the matched
//! substring as evidence.

use std::sync::Arc;

use crate::error::AnalyzerError;
use crate::finding::{truncate_evidence, Finding};
use crate::pipeline::CancelToken;
use crate::rules::RuleLibrary;
use crate::skill::Skill;

use super::Analyzer;

pub struct StaticAnalyzer {
    library: Arc<RuleLibrary>,
}

impl StaticAnalyzer {
    pub fn new(library: Arc<RuleLibrary>) -> Self {
        StaticAnalyzer { library }
    }
}

impl Analyzer for StaticAnalyzer {
    fn name(&self) -> &'static str {
        "static"
    }

    fn analyze(&self, skill: &Skill, cancel: &CancelToken) -> Result<Vec<Finding>, AnalyzerError> {
        let mut findings = Vec::new();

        for (path, text) in skill.text_corpus() {
            if cancel.is_cancelled() {
                break;
            }

            for (line_idx, line) in text.lines().enumerate() {
                for rule in self.library.regex_rules() {
                    if let Some((_, matched)) = rule.find(line) {
                        findings.push(Finding {
                            analyzer: self.name().to_string(),
                            category: rule.category,
                            severity: rule.severity,
                            title: format!("{} in {}", rule.description, path),
                            detail: format!(
                                "Rule '{}' matched at line {} of {}.",
                                rule.id,
                                line_idx + 1,
                                path
                            ),
                            file: Some(path.to_string()),
                            line: Some((line_idx + 1) as u32),
                            evidence: Some(truncate_evidence(matched)),
                            cwe: rule.cwe.clone(),
                            recommendation: rule.recommendation.clone(),
                        });
                    }
                }
            }
        }

        Ok(findings)
    }
}
