//! Normalized in-memory representation of a skill package.
//!
//! A [`Skill`] is produced once by the [`parser`](crate::parser), is
//! immutable for the duration of a scan, and is shared read-only across
//! analyzer tasks.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Language of a bundled script, inferred from the file extension or shebang.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLanguage {
    Python,
    Bash,
    Javascript,
    Typescript,
    Unknown,
}

impl ScriptLanguage {
    /// Maps a lowercase file extension to a language, if it denotes a script.
    pub fn from_extension(ext: &str) -> Option<ScriptLanguage> {
        match ext {
            "py" => Some(ScriptLanguage::Python),
            "sh" | "bash" => Some(ScriptLanguage::Bash),
            "js" => Some(ScriptLanguage::Javascript),
            "ts" => Some(ScriptLanguage::Typescript),
            _ => None,
        }
    }

    /// Maps an interpreter name from a shebang line (`python3`, `bash`, …).
    pub fn from_interpreter(interp: &str) -> Option<ScriptLanguage> {
        if interp.starts_with("python") {
            Some(ScriptLanguage::Python)
        } else if interp == "bash" || interp == "sh" || interp == "zsh" || interp == "ksh" {
            Some(ScriptLanguage::Bash)
        } else if interp == "node" || interp == "deno" || interp == "bun" {
            Some(ScriptLanguage::Javascript)
        } else {
            None
        }
    }
}

/// A script file bundled with the skill.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Script {
    /// Path relative to the skill root.
    pub path: String,
    pub language: ScriptLanguage,
    /// Full text of the script.
    pub text: String,
    pub size_bytes: u64,
}

/// A non-script file bundled with the skill.
///
/// `text` is populated only for non-binary files below the per-file size
/// cap; binary and oversized files keep an empty body.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FileEntry {
    /// Path relative to the skill root.
    pub path: String,
    pub size_bytes: u64,
    pub is_binary: bool,
    #[serde(default)]
    pub text: String,
}

/// Declared requirements from the manifest's `requires` key.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Requires {
    /// Binaries the skill expects on PATH.
    pub bins: Vec<String>,
    /// Environment variables the skill reads.
    pub env: Vec<String>,
    /// Free-form permission labels (`admin`, `network`, …).
    pub permissions: Vec<String>,
    /// Arbitrary configuration mapping.
    pub config: BTreeMap<String, serde_yaml::Value>,
}

/// One step from the manifest's `install` list.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct InstallStep {
    pub description: String,
    pub command: String,
}

/// Parsed and normalized skill package.
///
/// `root_path` is retained for diagnostic reporting only; the filesystem is
/// never touched again after parsing completes.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Skill {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    /// Free-form manifest metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub requires: Requires,
    #[serde(default)]
    pub install_steps: Vec<InstallStep>,
    /// Manifest body after the closing header delimiter.
    pub body_markdown: String,
    #[serde(default)]
    pub scripts: Vec<Script>,
    #[serde(default)]
    pub extra_files: Vec<FileEntry>,
    pub root_path: PathBuf,
}

impl Skill {
    /// Iterates over every text unit an analyzer should scan: the manifest
    /// body (as `SKILL.md`), each script, and each readable extra file.
    pub fn text_corpus(&self) -> impl Iterator<Item = (&str, &str)> {
        std::iter::once(("SKILL.md", self.body_markdown.as_str()))
            .chain(self.scripts.iter().map(|s| (s.path.as_str(), s.text.as_str())))
            .chain(
                self.extra_files
                    .iter()
                    .filter(|f| !f.is_binary && !f.text.is_empty())
                    .map(|f| (f.path.as_str(), f.text.as_str())),
            )
    }
}
