//! Configuration loading.
//!
//! Settings come from an optional TOML file (`clawguard.toml` in the
//! working directory by default); every field has a sensible default so the
//! file can be omitted entirely. Environment variables layer on top:
//! `ANTHROPIC_API_KEY` enables the semantic analyzer and
//! `CLAWGUARD_RULES_DIR` overrides the bundled rule files.

use std::path::{Path, PathBuf};

/// Main configuration for the scan engine.
///
/// # Examples
///
/// ```toml
/// rules_dir = "/etc/clawguard/rules"
///
/// [analyzers]
/// semantic = false
///
/// [semantic]
/// timeout_ms = 10000
/// ```
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `regex.yml` and `patterns.yml`; `None` uses the
    /// bundled rules (or `CLAWGUARD_RULES_DIR` when set).
    pub rules_dir: Option<PathBuf>,
    /// Per-analyzer on/off toggles.
    pub analyzers: AnalyzersConfig,
    /// Semantic analyzer tuning.
    pub semantic: SemanticConfig,
    /// Worker pool sizing.
    pub workers: WorkersConfig,
}

/// Per-analyzer toggles. Everything defaults to enabled; the semantic
/// analyzer additionally requires an API key at runtime.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct AnalyzersConfig {
    /// Regex-rule analyzer.
    #[serde(rename = "static")]
    pub static_rules: bool,
    /// Pattern-rule analyzer.
    pub pattern: bool,
    /// Tree-sitter AST analyzer.
    pub ast: bool,
    /// LLM-backed semantic analyzer.
    pub semantic: bool,
}

impl Default for AnalyzersConfig {
    fn default() -> Self {
        AnalyzersConfig {
            static_rules: true,
            pattern: true,
            ast: true,
            semantic: true,
        }
    }
}

/// Semantic analyzer settings.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct SemanticConfig {
    /// Hard deadline for the review call.
    pub timeout_ms: u64,
    /// Model identifier sent to the endpoint.
    pub model: String,
    /// Endpoint override, mainly for tests.
    pub endpoint: Option<String>,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        SemanticConfig {
            timeout_ms: 30_000,
            model: "claude-sonnet-4-5".to_string(),
            endpoint: None,
        }
    }
}

/// Worker pool sizing.
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct WorkersConfig {
    /// Pool size; `None` means `min(available CPUs, 8)`.
    pub threads: Option<usize>,
}

impl WorkersConfig {
    /// Resolved pool size.
    pub fn effective_threads(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(8)
        })
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// Resolution order:
    /// 1. If `path` is `Some`, load from that file (error if missing).
    /// 2. Otherwise try `clawguard.toml` in the current directory.
    /// 3. Otherwise fall back to built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns `Err(String)` when an explicit path does not exist, the file
    /// cannot be read, or the TOML fails to parse.
    pub fn load(path: Option<&Path>) -> Result<Config, String> {
        let config_path = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(format!("config file not found: {}", p.display()));
                }
                Some(p.to_path_buf())
            }
            None => {
                let default_path = Path::new("clawguard.toml");
                default_path.exists().then(|| default_path.to_path_buf())
            }
        };

        match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
                toml::from_str(&content)
                    .map_err(|e| format!("failed to parse {}: {e}", path.display()))
            }
            None => Ok(Config::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_every_analyzer() {
        let config = Config::default();
        assert!(config.analyzers.static_rules);
        assert!(config.analyzers.pattern);
        assert!(config.analyzers.ast);
        assert!(config.analyzers.semantic);
        assert_eq!(config.semantic.timeout_ms, 30_000);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("[analyzers]\nsemantic = false\n").unwrap();
        assert!(!config.analyzers.semantic);
        assert!(config.analyzers.static_rules);
        assert_eq!(config.semantic.timeout_ms, 30_000);
    }

    #[test]
    fn worker_bound_defaults_to_at_most_eight() {
        let workers = WorkersConfig::default();
        let threads = workers.effective_threads();
        assert!(threads >= 1 && threads <= 8);
    }
}
