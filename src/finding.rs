//! Core finding types shared by every analyzer.
//!
//! - [`Finding`] — a single security observation tied to one location.
//! - [`Severity`], [`Category`] — the closed classification sets.

use std::fmt;

/// Severity of a finding, ordered from least to most severe.
///
/// The derived [`Ord`] follows the declaration order, so
/// `Severity::Critical > Severity::Info` and findings can be sorted by
/// severity directly.
///
/// Serializes to lowercase strings (`"info"` … `"critical"`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational observation; never affects the score.
    Info,
    /// Best-practice violation or minor hygiene issue.
    Low,
    /// Suspicious pattern that warrants review.
    Medium,
    /// Credential exposure, injection attempts, dangerous execution.
    High,
    /// Active malware behavior, exfiltration, remote code execution.
    Critical,
}

impl Severity {
    /// All severities, most severe first.
    pub const ALL_DESC: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.pad(s)
    }
}

/// Domain classification of a finding.
///
/// The declaration order is the canonical category order: report sorting and
/// top-risk tie-breaking both use the derived [`Ord`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Malware,
    PromptInjection,
    CredentialExposure,
    SocialEngineering,
    NetworkExfiltration,
    Obfuscation,
    ExcessivePermissions,
    Typosquat,
    SupplyChain,
    MemoryManipulation,
    BestPractices,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Malware => "malware",
            Category::PromptInjection => "prompt_injection",
            Category::CredentialExposure => "credential_exposure",
            Category::SocialEngineering => "social_engineering",
            Category::NetworkExfiltration => "network_exfiltration",
            Category::Obfuscation => "obfuscation",
            Category::ExcessivePermissions => "excessive_permissions",
            Category::Typosquat => "typosquat",
            Category::SupplyChain => "supply_chain",
            Category::MemoryManipulation => "memory_manipulation",
            Category::BestPractices => "best_practices",
        };
        f.pad(s)
    }
}

/// Maximum length of the `evidence` snippet, in characters.
pub const EVIDENCE_MAX_CHARS: usize = 200;

/// A single security finding produced by one analyzer about one location.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Finding {
    /// Name of the analyzer that produced this finding (e.g. `"static"`).
    pub analyzer: String,
    /// Domain classification.
    pub category: Category,
    /// Severity level.
    pub severity: Severity,
    /// Short description, e.g. `"AWS access key ID in setup.sh"`.
    pub title: String,
    /// Full explanation.
    pub detail: String,
    /// Path of the offending file, relative to the skill root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// 1-based line number inside the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// The offending content, truncated to [`EVIDENCE_MAX_CHARS`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    /// CWE identifier, when one applies (e.g. `"CWE-798"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwe: Option<String>,
    /// Guidance on what to do about it.
    #[serde(default)]
    pub recommendation: String,
}

/// Truncates `text` to at most [`EVIDENCE_MAX_CHARS`] characters, cutting on
/// a char boundary so multi-byte UTF-8 sequences cannot be split.
pub fn truncate_evidence(text: &str) -> String {
    match text.char_indices().nth(EVIDENCE_MAX_CHARS) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
