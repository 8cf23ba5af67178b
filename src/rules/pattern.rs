//! Pattern-dialect rules: named strings plus a boolean condition.
//!
//! A pattern rule declares one or more named matchers (literals or regexes)
//! and a [`Condition`] over their match counts. The pattern analyzer counts
//! matches across a whole file and fires at most once per rule per file.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use crate::error::RuleLoadError;
use crate::finding::{Category, Severity};
use crate::rules::condition::Condition;

/// A named string matcher inside a pattern rule.
#[derive(Debug)]
pub enum StringMatcher {
    Literal { value: String, nocase: bool },
    Regex(Regex),
}

impl StringMatcher {
    /// Counts non-overlapping occurrences in `text` and reports the byte
    /// offset of the first one.
    pub fn count(&self, text: &str) -> (usize, Option<usize>) {
        match self {
            StringMatcher::Literal { value, nocase } => {
                if *nocase {
                    let haystack = text.to_lowercase();
                    let needle = value.to_lowercase();
                    count_literal(&haystack, &needle)
                } else {
                    count_literal(text, value)
                }
            }
            StringMatcher::Regex(re) => {
                let mut count = 0;
                let mut first = None;
                for m in re.find_iter(text) {
                    if first.is_none() {
                        first = Some(m.start());
                    }
                    count += 1;
                }
                (count, first)
            }
        }
    }
}

fn count_literal(haystack: &str, needle: &str) -> (usize, Option<usize>) {
    if needle.is_empty() {
        return (0, None);
    }
    let mut count = 0;
    let mut first = None;
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let abs = from + pos;
        if first.is_none() {
            first = Some(abs);
        }
        count += 1;
        from = abs + needle.len();
    }
    (count, first)
}

/// A compiled pattern-dialect rule.
#[derive(Debug)]
pub struct PatternRule {
    pub id: String,
    pub category: Category,
    pub severity: Severity,
    pub description: String,
    pub recommendation: String,
    pub cwe: Option<String>,
    strings: Vec<(String, StringMatcher)>,
    condition: Condition,
}

impl PatternRule {
    /// Evaluates the rule against a whole file body. Returns the offset of
    /// the earliest string match when the condition holds.
    pub fn evaluate(&self, text: &str) -> Option<usize> {
        let mut counts: HashMap<String, usize> = HashMap::with_capacity(self.strings.len());
        let mut first_offset: Option<usize> = None;

        for (name, matcher) in &self.strings {
            let (count, first) = matcher.count(text);
            counts.insert(name.clone(), count);
            if let Some(offset) = first {
                first_offset = Some(match first_offset {
                    Some(existing) => existing.min(offset),
                    None => offset,
                });
            }
        }

        if self.condition.evaluate(&counts) {
            Some(first_offset.unwrap_or(0))
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// YAML wire format
// ---------------------------------------------------------------------------

#[derive(Debug, serde::Deserialize)]
pub(crate) struct PatternRuleSpec {
    pub id: String,
    pub category: Category,
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub cwe: Option<String>,
    pub strings: indexmap_like::OrderedStrings,
    pub condition: String,
}

/// A matcher in the rule file: either a bare literal string or a structured
/// mapping with an explicit kind.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
pub(crate) enum MatcherSpec {
    Shorthand(String),
    Structured {
        #[serde(default)]
        literal: Option<String>,
        #[serde(default)]
        regex: Option<String>,
        #[serde(default)]
        nocase: bool,
    },
}

impl PatternRuleSpec {
    pub(crate) fn compile(self) -> Result<PatternRule, RuleLoadError> {
        let mut strings = Vec::with_capacity(self.strings.0.len());
        for (name, spec) in self.strings.0 {
            let matcher = match spec {
                MatcherSpec::Shorthand(value) => StringMatcher::Literal {
                    value,
                    nocase: false,
                },
                MatcherSpec::Structured {
                    literal: Some(value),
                    regex: None,
                    nocase,
                } => StringMatcher::Literal { value, nocase },
                MatcherSpec::Structured {
                    literal: None,
                    regex: Some(pattern),
                    nocase,
                } => {
                    let re = RegexBuilder::new(&pattern)
                        .case_insensitive(nocase)
                        .build()
                        .map_err(|e| {
                            RuleLoadError::new(&self.id, format!("bad regex for '{name}': {e}"))
                        })?;
                    StringMatcher::Regex(re)
                }
                _ => {
                    return Err(RuleLoadError::new(
                        &self.id,
                        format!("string '{name}' must set exactly one of 'literal' or 'regex'"),
                    ))
                }
            };
            strings.push((name, matcher));
        }

        let names: Vec<String> = strings.iter().map(|(n, _)| n.clone()).collect();
        let condition = Condition::parse(&self.condition, &names)
            .map_err(|e| RuleLoadError::new(&self.id, format!("bad condition: {e}")))?;

        Ok(PatternRule {
            id: self.id,
            category: self.category,
            severity: self.severity,
            description: self.description,
            recommendation: self.recommendation,
            cwe: self.cwe,
            strings,
            condition,
        })
    }
}

/// Minimal ordered-map shim so rule strings keep their declaration order
/// (serde_yaml mappings otherwise land in a `BTreeMap` and reorder).
pub(crate) mod indexmap_like {
    use super::MatcherSpec;

    #[derive(Debug)]
    pub struct OrderedStrings(pub Vec<(String, MatcherSpec)>);

    impl<'de> serde::Deserialize<'de> for OrderedStrings {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            struct Visitor;

            impl<'de> serde::de::Visitor<'de> for Visitor {
                type Value = OrderedStrings;

                fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                    f.write_str("a mapping of string name to matcher")
                }

                fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
                where
                    A: serde::de::MapAccess<'de>,
                {
                    let mut entries = Vec::new();
                    while let Some((key, value)) = map.next_entry::<String, MatcherSpec>()? {
                        entries.push((key, value));
                    }
                    Ok(OrderedStrings(entries))
                }
            }

            deserializer.deserialize_map(Visitor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(yaml: &str) -> Result<PatternRule, RuleLoadError> {
        let spec: PatternRuleSpec = serde_yaml::from_str(yaml).unwrap();
        spec.compile()
    }

    #[test]
    fn shorthand_literal_counts_occurrences() {
        let rule = rule(
            r##"
id: test-rule
category: obfuscation
severity: medium
description: test
strings:
  marker: "atob("
condition: "#marker >= 2"
"##,
        )
        .unwrap();
        assert!(rule.evaluate("atob(x); atob(y)").is_some());
        assert!(rule.evaluate("atob(x)").is_none());
    }

    #[test]
    fn regex_and_literal_combine_under_condition() {
        let rule = rule(
            r#"
id: decode-exec
category: obfuscation
severity: high
description: decode plus exec
strings:
  decode: { regex: 'base64\.b64decode|bytes\.fromhex' }
  run: { literal: "exec(" }
condition: "decode and run"
"#,
        )
        .unwrap();
        let hit = rule.evaluate("x = base64.b64decode(p)\nexec(x)\n");
        assert_eq!(hit, Some(4)); // offset of "base64"
        assert!(rule.evaluate("exec(x)\n").is_none());
    }

    #[test]
    fn bad_condition_fails_compile() {
        let err = rule(
            r#"
id: broken
category: malware
severity: high
description: broken
strings:
  a: "x"
condition: "a and nope"
"#,
        )
        .unwrap_err();
        assert_eq!(err.rule_id, "broken");
    }

    #[test]
    fn nocase_literal_matches_any_case() {
        let rule = rule(
            r#"
id: nc
category: prompt_injection
severity: high
description: nocase
strings:
  phrase: { literal: "core directive", nocase: true }
condition: "phrase"
"#,
        )
        .unwrap();
        assert!(rule.evaluate("CORE DIRECTIVE: obey").is_some());
    }
}
