//! Weighted trust score.
//!
//! A deterministic pure function of the finding list: severity deductions,
//! category multipliers, per-category diminishing returns, then fixed grade
//! and recommendation bands. The scorer cannot fail and is insensitive to
//! the input order of the findings.

use std::collections::BTreeMap;

use crate::finding::{Category, Finding, Severity};

/// Points deducted per severity level.
fn severity_deduction(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 40.0,
        Severity::High => 20.0,
        Severity::Medium => 10.0,
        Severity::Low => 3.0,
        Severity::Info => 0.0,
    }
}

/// Category multipliers: the more dangerous the class, the harder it hits.
fn category_multiplier(category: Category) -> f64 {
    match category {
        Category::Malware => 2.0,
        Category::PromptInjection => 1.5,
        Category::CredentialExposure => 1.5,
        Category::MemoryManipulation => 1.5,
        Category::SocialEngineering => 1.25,
        Category::SupplyChain => 1.25,
        Category::NetworkExfiltration => 1.0,
        Category::Obfuscation => 1.0,
        Category::ExcessivePermissions => 1.0,
        Category::Typosquat => 1.0,
        Category::BestPractices => 0.25,
    }
}

/// Diminishing returns within a category: the first finding counts in full,
/// the second at half, the third and beyond at a quarter.
fn diminishing_factor(index_in_category: usize) -> f64 {
    match index_in_category {
        0 => 1.0,
        1 => 0.5,
        _ => 0.25,
    }
}

/// Letter grade bands over the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: u8) -> Grade {
        match score {
            90..=100 => Grade::A,
            75..=89 => Grade::B,
            60..=74 => Grade::C,
            40..=59 => Grade::D,
            _ => Grade::F,
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = match self {
            Grade::A => 'A',
            Grade::B => 'B',
            Grade::C => 'C',
            Grade::D => 'D',
            Grade::F => 'F',
        };
        write!(f, "{c}")
    }
}

/// Categorical install verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Pass,
    Caution,
    Review,
    Block,
}

impl Recommendation {
    fn from_score(score: u8) -> Recommendation {
        match score {
            85..=100 => Recommendation::Pass,
            65..=84 => Recommendation::Caution,
            40..=64 => Recommendation::Review,
            _ => Recommendation::Block,
        }
    }

    /// Returns the stricter of the two verdicts.
    fn at_least(self, floor: Recommendation) -> Recommendation {
        // Block is the strictest; the enum declares them in loosening order,
        // so strictness is just the larger discriminant.
        if (floor as u8) > (self as u8) {
            floor
        } else {
            self
        }
    }

    /// Process exit code for the CLI contract.
    pub fn exit_code(self) -> i32 {
        match self {
            Recommendation::Pass => 0,
            Recommendation::Caution => 1,
            Recommendation::Review => 2,
            Recommendation::Block => 3,
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Recommendation::Pass => "PASS",
            Recommendation::Caution => "CAUTION",
            Recommendation::Review => "REVIEW",
            Recommendation::Block => "BLOCK",
        };
        write!(f, "{s}")
    }
}

/// Computed trust score block of the report.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrustScore {
    /// 0–100, higher is safer.
    pub value: u8,
    pub grade: Grade,
    /// Severity-count sentence, e.g. `"2 critical, 1 high findings"`.
    pub summary: String,
    /// Titles of the up-to-five most severe findings.
    pub top_risks: Vec<String>,
    pub recommendation: Recommendation,
}

/// Maximum number of entries in `top_risks`.
const TOP_RISKS_MAX: usize = 5;

/// Computes the trust score from a finding list.
///
/// The result is independent of the order of `findings`.
pub fn compute_trust_score(findings: &[Finding]) -> TrustScore {
    // Group per category, most severe first, for diminishing returns.
    let mut by_category: BTreeMap<Category, Vec<&Finding>> = BTreeMap::new();
    for finding in findings {
        by_category.entry(finding.category).or_default().push(finding);
    }

    let mut total_deduction = 0.0;
    for group in by_category.values_mut() {
        group.sort_by(|a, b| b.severity.cmp(&a.severity));
        for (idx, finding) in group.iter().enumerate() {
            total_deduction += severity_deduction(finding.severity)
                * category_multiplier(finding.category)
                * diminishing_factor(idx);
        }
    }

    let value = (100.0 - total_deduction).round().clamp(0.0, 100.0) as u8;
    let grade = Grade::from_score(value);

    let mut recommendation = Recommendation::from_score(value);
    let malware_high = findings
        .iter()
        .any(|f| f.category == Category::Malware && f.severity >= Severity::High);
    if malware_high {
        recommendation = recommendation.at_least(Recommendation::Block);
    }
    let critical_cred_or_injection = findings.iter().any(|f| {
        f.severity == Severity::Critical
            && matches!(
                f.category,
                Category::PromptInjection | Category::CredentialExposure
            )
    });
    if critical_cred_or_injection {
        recommendation = recommendation.at_least(Recommendation::Review);
    }

    TrustScore {
        value,
        grade,
        summary: build_summary(findings),
        top_risks: top_risks(findings),
        recommendation,
    }
}

fn build_summary(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return "No findings".to_string();
    }
    let mut parts = Vec::new();
    for severity in Severity::ALL_DESC {
        let count = findings.iter().filter(|f| f.severity == severity).count();
        if count > 0 {
            parts.push(format!("{count} {severity}"));
        }
    }
    let plural = if findings.len() == 1 { "" } else { "s" };
    format!("{} finding{plural}", parts.join(", "))
}

/// Up to five titles of the most severe findings; ties break on category
/// order, then file path.
fn top_risks(findings: &[Finding]) -> Vec<String> {
    let mut ranked: Vec<&Finding> = findings.iter().collect();
    ranked.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then(a.category.cmp(&b.category))
            .then(a.file.cmp(&b.file))
    });
    ranked
        .into_iter()
        .take(TOP_RISKS_MAX)
        .map(|f| f.title.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(category: Category, severity: Severity, title: &str) -> Finding {
        Finding {
            analyzer: "static".to_string(),
            category,
            severity,
            title: title.to_string(),
            detail: String::new(),
            file: None,
            line: None,
            evidence: None,
            cwe: None,
            recommendation: String::new(),
        }
    }

    #[test]
    fn empty_findings_score_perfect() {
        let score = compute_trust_score(&[]);
        assert_eq!(score.value, 100);
        assert_eq!(score.grade, Grade::A);
        assert_eq!(score.recommendation, Recommendation::Pass);
        assert_eq!(score.summary, "No findings");
        assert!(score.top_risks.is_empty());
    }

    #[test]
    fn single_typosquat_high_scores_eighty() {
        let score = compute_trust_score(&[finding(
            Category::Typosquat,
            Severity::High,
            "near miss",
        )]);
        assert_eq!(score.value, 80);
        assert_eq!(score.grade, Grade::B);
        assert_eq!(score.recommendation, Recommendation::Caution);
    }

    #[test]
    fn diminishing_returns_apply_within_category() {
        // Three obfuscation highs: 20 + 10 + 5 = 35 deduction.
        let findings = vec![
            finding(Category::Obfuscation, Severity::High, "a"),
            finding(Category::Obfuscation, Severity::High, "b"),
            finding(Category::Obfuscation, Severity::High, "c"),
        ];
        assert_eq!(compute_trust_score(&findings).value, 65);
    }

    #[test]
    fn malware_high_forces_block() {
        let score = compute_trust_score(&[finding(Category::Malware, Severity::High, "bad")]);
        // 20 * 2.0 = 40 deduction -> 60 would be REVIEW, floored to BLOCK.
        assert_eq!(score.value, 60);
        assert_eq!(score.recommendation, Recommendation::Block);
    }

    #[test]
    fn critical_credential_finding_floors_review() {
        let score = compute_trust_score(&[finding(
            Category::CredentialExposure,
            Severity::Critical,
            "ssh key",
        )]);
        // 40 * 1.5 = 60 deduction -> score 40 -> REVIEW band already.
        assert_eq!(score.value, 40);
        assert_eq!(score.recommendation, Recommendation::Review);
    }

    #[test]
    fn score_is_order_insensitive() {
        let mut findings = vec![
            finding(Category::Malware, Severity::Low, "a"),
            finding(Category::Obfuscation, Severity::Critical, "b"),
            finding(Category::Obfuscation, Severity::Medium, "c"),
            finding(Category::CredentialExposure, Severity::High, "d"),
        ];
        let forward = compute_trust_score(&findings);
        findings.reverse();
        let backward = compute_trust_score(&findings);
        assert_eq!(forward, backward);
    }

    #[test]
    fn grade_bands_are_total() {
        for value in 0..=100u8 {
            let grade = Grade::from_score(value);
            match value {
                90..=100 => assert_eq!(grade, Grade::A),
                75..=89 => assert_eq!(grade, Grade::B),
                60..=74 => assert_eq!(grade, Grade::C),
                40..=59 => assert_eq!(grade, Grade::D),
                _ => assert_eq!(grade, Grade::F),
            }
        }
    }

    #[test]
    fn adding_findings_never_raises_the_score() {
        let base = vec![finding(Category::Obfuscation, Severity::High, "a")];
        let base_score = compute_trust_score(&base).value;
        for category in [
            Category::Malware,
            Category::Obfuscation,
            Category::BestPractices,
        ] {
            for severity in Severity::ALL_DESC {
                let mut extended = base.clone();
                extended.push(finding(category, severity, "extra"));
                assert!(
                    compute_trust_score(&extended).value <= base_score,
                    "score rose after adding {category}/{severity}"
                );
            }
        }
    }

    #[test]
    fn top_risks_capped_at_five_and_ranked() {
        let findings: Vec<Finding> = (0..8)
            .map(|i| {
                finding(
                    Category::Obfuscation,
                    if i == 0 { Severity::Critical } else { Severity::Low },
                    &format!("risk-{i}"),
                )
            })
            .collect();
        let score = compute_trust_score(&findings);
        assert_eq!(score.top_risks.len(), 5);
        assert_eq!(score.top_risks[0], "risk-0");
    }

    #[test]
    fn summary_counts_by_severity() {
        let findings = vec![
            finding(Category::Malware, Severity::Critical, "a"),
            finding(Category::Obfuscation, Severity::Critical, "b"),
            finding(Category::Obfuscation, Severity::Low, "c"),
        ];
        assert_eq!(compute_trust_score(&findings).summary, "2 critical, 1 low findings");
    }
}
