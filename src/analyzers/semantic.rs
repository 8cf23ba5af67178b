//! Semantic analyzer backed by an external language model.
//!
//! Sends a bounded summary of the skill (manifest header plus concatenated
//! script text, capped at 64 KiB) to the Anthropic messages endpoint and
//! maps the structured response into findings.
//!
//! This analyzer is strictly best-effort: a missing API key, a non-2xx
//! response, a timeout, or malformed JSON all surface as
//! [`AnalyzerError::Skipped`] — never as a failed scan.

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::AnalyzerError;
use crate::finding::{truncate_evidence, Category, Finding, Severity};
use crate::pipeline::CancelToken;
use crate::skill::Skill;

use super::Analyzer;

/// Environment variable carrying the API key; absence disables the analyzer.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Upper bound on the skill summary shipped to the model.
const PROMPT_CAP_BYTES: usize = 64 * 1024;

const SYSTEM_PROMPT: &str = "\
You are a security analyst reviewing an AI agent skill package for threats: \
prompt injection, credential harvesting, social engineering, data \
exfiltration, agent memory manipulation, undisclosed behavior, and supply \
chain risk. Respond with a JSON array only; each element has the fields \
category, severity (critical|high|medium|low|info), title, detail, file, \
evidence, recommendation. Return [] when the skill is clean. Flag only real \
risks.";

pub struct SemanticAnalyzer {
    api_key: Option<String>,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl SemanticAnalyzer {
    /// Builds the analyzer from config plus the `ANTHROPIC_API_KEY`
    /// environment variable.
    pub fn from_env(config: &Config) -> Self {
        SemanticAnalyzer {
            api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()),
            endpoint: config
                .semantic
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: config.semantic.model.clone(),
            timeout: Duration::from_millis(config.semantic.timeout_ms),
        }
    }

    fn request_findings(&self, api_key: &str, prompt: &str) -> Result<Vec<Finding>, String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| format!("client build failed: {e}"))?;

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 4096,
            "system": SYSTEM_PROMPT,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .map_err(|e| format!("request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("endpoint returned {}", response.status()));
        }

        let envelope: MessageEnvelope = response
            .json()
            .map_err(|e| format!("malformed response envelope: {e}"))?;
        let text = envelope
            .content
            .first()
            .map(|b| b.text.as_str())
            .unwrap_or_default();

        parse_review(text)
    }
}

impl Analyzer for SemanticAnalyzer {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn analyze(&self, skill: &Skill, _cancel: &CancelToken) -> Result<Vec<Finding>, AnalyzerError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(AnalyzerError::Skipped {
                reason: format!("{API_KEY_ENV} not set"),
            });
        };

        let prompt = build_prompt(skill);
        match self.request_findings(api_key, &prompt) {
            Ok(findings) => {
                debug!(count = findings.len(), "semantic review complete");
                Ok(findings)
            }
            Err(reason) => {
                warn!(%reason, "semantic review skipped");
                Err(AnalyzerError::Skipped { reason })
            }
        }
    }
}

/// Builds the review prompt: header fields, manifest body, then scripts,
/// truncated as a whole to [`PROMPT_CAP_BYTES`] on a char boundary.
fn build_prompt(skill: &Skill) -> String {
    let mut parts = vec![
        format!("## Skill: {}", skill.name),
        format!("## Declared purpose: {}", skill.description),
        String::new(),
        "### Manifest body".to_string(),
        skill.body_markdown.clone(),
    ];
    if !skill.scripts.is_empty() {
        parts.push("### Bundled scripts".to_string());
        for script in &skill.scripts {
            parts.push(format!("#### {}", script.path));
            parts.push(script.text.clone());
        }
    }
    let mut prompt = parts.join("\n");
    if prompt.len() > PROMPT_CAP_BYTES {
        let mut cut = PROMPT_CAP_BYTES;
        while !prompt.is_char_boundary(cut) {
            cut -= 1;
        }
        prompt.truncate(cut);
    }
    prompt
}

#[derive(serde::Deserialize)]
struct MessageEnvelope {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(serde::Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Raw finding shape returned by the model; every field is lenient.
#[derive(serde::Deserialize)]
struct RawReviewFinding {
    #[serde(default)]
    category: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    detail: String,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    evidence: Option<String>,
    #[serde(default)]
    recommendation: String,
}

/// Extracts the JSON array from the model's reply and maps it to findings.
fn parse_review(text: &str) -> Result<Vec<Finding>, String> {
    let start = text.find('[').ok_or("no JSON array in response")?;
    let end = text.rfind(']').ok_or("no JSON array in response")?;
    if end < start {
        return Err("no JSON array in response".to_string());
    }

    let raw: Vec<RawReviewFinding> = serde_json::from_str(&text[start..=end])
        .map_err(|e| format!("malformed findings JSON: {e}"))?;

    Ok(raw
        .into_iter()
        .map(|item| Finding {
            analyzer: "semantic".to_string(),
            category: parse_category(&item.category),
            severity: parse_severity(&item.severity),
            title: if item.title.is_empty() {
                "Semantic review finding".to_string()
            } else {
                item.title
            },
            detail: item.detail,
            file: item.file.filter(|f| !f.is_empty()),
            line: None,
            evidence: item.evidence.as_deref().map(truncate_evidence),
            cwe: None,
            recommendation: item.recommendation,
        })
        .collect())
}

/// Unknown categories fall back to `malware`: an issue the model could not
/// classify is still an issue.
fn parse_category(raw: &str) -> Category {
    match raw {
        "malware" => Category::Malware,
        "prompt_injection" => Category::PromptInjection,
        "credential_exposure" => Category::CredentialExposure,
        "social_engineering" => Category::SocialEngineering,
        "network_exfiltration" => Category::NetworkExfiltration,
        "obfuscation" => Category::Obfuscation,
        "excessive_permissions" => Category::ExcessivePermissions,
        "typosquat" => Category::Typosquat,
        "supply_chain" => Category::SupplyChain,
        "memory_manipulation" => Category::MemoryManipulation,
        "best_practices" => Category::BestPractices,
        _ => Category::Malware,
    }
}

fn parse_severity(raw: &str) -> Severity {
    match raw {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        "low" => Severity::Low,
        "info" => Severity::Info,
        _ => Severity::Medium,
    }
}
