//! Declarative rule library.
//!
//! Rules come in two dialects:
//!
//! - **Regex rules** ([`RegexRule`]) — a single regular expression applied
//!   per line by the static analyzer.
//! - **Pattern rules** ([`PatternRule`](pattern::PatternRule)) — named
//!   string matchers combined by a boolean [`condition`] expression,
//!   evaluated per file by the pattern analyzer.
//!
//! The bundled rule set is compiled into the binary; `CLAWGUARD_RULES_DIR`
//! (or `rules_dir` in the config file) points the loader at replacement
//! files on disk. Loading fails fast: one bad rule aborts startup rather
//! than running with a partial library.

pub mod condition;
pub mod pattern;

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::error::RuleLoadError;
use crate::finding::{Category, Severity};
use self::pattern::{PatternRule, PatternRuleSpec};

/// Bundled regex-dialect rules.
const BUNDLED_REGEX_RULES: &str = include_str!("../../rules/regex.yml");
/// Bundled pattern-dialect rules.
const BUNDLED_PATTERN_RULES: &str = include_str!("../../rules/patterns.yml");

/// Environment variable overriding the rules directory.
pub const RULES_DIR_ENV: &str = "CLAWGUARD_RULES_DIR";

/// A compiled regex-dialect rule, applied per line.
#[derive(Debug)]
pub struct RegexRule {
    pub id: String,
    pub category: Category,
    pub severity: Severity,
    pub description: String,
    pub recommendation: String,
    pub cwe: Option<String>,
    regex: Regex,
    /// Literal match texts that do not count as hits (e.g. loopback
    /// addresses for the raw-IP rule).
    exclude: Vec<String>,
}

impl RegexRule {
    /// Returns the first qualifying match on `line`, as `(start, text)`.
    pub fn find<'a>(&self, line: &'a str) -> Option<(usize, &'a str)> {
        for m in self.regex.find_iter(line) {
            if !self.exclude.iter().any(|ex| ex == m.as_str()) {
                return Some((m.start(), m.as_str()));
            }
        }
        None
    }
}

#[derive(Debug, serde::Deserialize)]
struct RegexRuleSpec {
    id: String,
    category: Category,
    severity: Severity,
    description: String,
    #[serde(default)]
    recommendation: String,
    #[serde(default)]
    cwe: Option<String>,
    pattern: String,
    #[serde(default)]
    nocase: bool,
    #[serde(default)]
    exclude: Vec<String>,
}

#[derive(Debug, serde::Deserialize)]
struct RegexRuleFile {
    rules: Vec<RegexRuleSpec>,
}

#[derive(Debug, serde::Deserialize)]
struct PatternRuleFile {
    rules: Vec<PatternRuleSpec>,
}

/// The immutable, fully compiled rule set.
///
/// Constructed once at pipeline startup and shared by reference with the
/// analyzers; there is no process-global rule state.
#[derive(Debug)]
pub struct RuleLibrary {
    regex_rules: Vec<RegexRule>,
    pattern_rules: Vec<PatternRule>,
}

impl RuleLibrary {
    /// Loads the library, honoring `CLAWGUARD_RULES_DIR` and the optional
    /// config override (config wins over the environment).
    pub fn load(rules_dir: Option<&Path>) -> Result<RuleLibrary, RuleLoadError> {
        let env_dir = std::env::var_os(RULES_DIR_ENV).map(std::path::PathBuf::from);
        match rules_dir.or(env_dir.as_deref()) {
            Some(dir) => Self::load_from_dir(dir),
            None => Self::load_bundled(),
        }
    }

    /// Compiles the rule files embedded in the binary.
    pub fn load_bundled() -> Result<RuleLibrary, RuleLoadError> {
        Self::from_sources(BUNDLED_REGEX_RULES, BUNDLED_PATTERN_RULES)
    }

    /// Compiles `regex.yml` and `patterns.yml` from a directory on disk.
    pub fn load_from_dir(dir: &Path) -> Result<RuleLibrary, RuleLoadError> {
        let read = |name: &str| -> Result<String, RuleLoadError> {
            std::fs::read_to_string(dir.join(name))
                .map_err(|e| RuleLoadError::new(name, format!("cannot read {}: {e}", dir.display())))
        };
        let regex_src = read("regex.yml")?;
        let pattern_src = read("patterns.yml")?;
        Self::from_sources(&regex_src, &pattern_src)
    }

    fn from_sources(regex_src: &str, pattern_src: &str) -> Result<RuleLibrary, RuleLoadError> {
        let regex_file: RegexRuleFile = serde_yaml::from_str(regex_src)
            .map_err(|e| RuleLoadError::new("regex.yml", e.to_string()))?;
        let pattern_file: PatternRuleFile = serde_yaml::from_str(pattern_src)
            .map_err(|e| RuleLoadError::new("patterns.yml", e.to_string()))?;

        let mut seen: HashSet<String> = HashSet::new();

        let mut regex_rules = Vec::with_capacity(regex_file.rules.len());
        for spec in regex_file.rules {
            if !seen.insert(spec.id.clone()) {
                return Err(RuleLoadError::new(&spec.id, "duplicate rule id"));
            }
            let regex = regex::RegexBuilder::new(&spec.pattern)
                .case_insensitive(spec.nocase)
                .build()
                .map_err(|e| RuleLoadError::new(&spec.id, format!("bad regex: {e}")))?;
            regex_rules.push(RegexRule {
                id: spec.id,
                category: spec.category,
                severity: spec.severity,
                description: spec.description,
                recommendation: spec.recommendation,
                cwe: spec.cwe,
                regex,
                exclude: spec.exclude,
            });
        }

        let mut pattern_rules = Vec::with_capacity(pattern_file.rules.len());
        for spec in pattern_file.rules {
            if !seen.insert(spec.id.clone()) {
                return Err(RuleLoadError::new(&spec.id, "duplicate rule id"));
            }
            pattern_rules.push(spec.compile()?);
        }

        debug!(
            regex_rules = regex_rules.len(),
            pattern_rules = pattern_rules.len(),
            "rule library loaded"
        );

        Ok(RuleLibrary {
            regex_rules,
            pattern_rules,
        })
    }

    pub fn regex_rules(&self) -> &[RegexRule] {
        &self.regex_rules
    }

    pub fn pattern_rules(&self) -> &[PatternRule] {
        &self.pattern_rules
    }

    /// Total rule count across both dialects.
    pub fn len(&self) -> usize {
        self.regex_rules.len() + self.pattern_rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
