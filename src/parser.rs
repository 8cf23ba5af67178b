//! Skill directory parser.
//!
//! Converts a directory on disk into a normalized [`Skill`] plus a list of
//! parse warnings. This is the only component that reads the filesystem;
//! once parsing completes the scan never touches disk again.
//!
//! Fatal conditions ([`ParseError`]) are a missing manifest, an unusable
//! manifest header, and exceeded traversal bounds. Everything else (an
//! unreadable file, a non-UTF-8 body, an oversized text file) degrades to an
//! `info` finding so the scan can continue.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::ParseError;
use crate::finding::{Category, Finding, Severity};
use crate::skill::{FileEntry, InstallStep, Requires, Script, ScriptLanguage, Skill};

/// Manifest file name, looked up at the skill root.
pub const MANIFEST_NAME: &str = "SKILL.md";

/// Maximum directory depth below the skill root.
const MAX_DEPTH: usize = 8;
/// Maximum number of files in the package.
const MAX_FILES: usize = 2000;
/// Maximum cumulative size of the package.
const MAX_TOTAL_BYTES: u64 = 50 * 1024 * 1024;
/// Text bodies above this size are not loaded.
const MAX_TEXT_BYTES: u64 = 1024 * 1024;
/// How much of a file is sampled when sniffing for binary content.
const BINARY_SNIFF_BYTES: usize = 8 * 1024;

/// Directory names that are never descended into.
const SKIP_DIRS: &[&str] = &[".venv", "venv", "node_modules"];
/// Junk files that are skipped without a warning.
const SKIP_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];

/// Manifest header fields, deserialized from the YAML block.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct Frontmatter {
    name: Option<String>,
    description: Option<String>,
    version: Option<String>,
    author: Option<String>,
    license: Option<String>,
    metadata: BTreeMap<String, serde_yaml::Value>,
    requires: Requires,
    install: Vec<InstallItem>,
}

/// An `install` list item: either a full `{description, command}` mapping or
/// a bare command string.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum InstallItem {
    Step(InstallStep),
    Command(String),
}

impl From<InstallItem> for InstallStep {
    fn from(item: InstallItem) -> Self {
        match item {
            InstallItem::Step(step) => step,
            InstallItem::Command(command) => InstallStep {
                description: String::new(),
                command,
            },
        }
    }
}

/// Parses a skill directory into a [`Skill`] and any parse warnings.
///
/// Warnings carry `analyzer = "parser"` and are merged into the report by
/// the pipeline alongside analyzer findings.
///
/// # Errors
///
/// - [`ParseError::ManifestMissing`] when `SKILL.md` is absent.
/// - [`ParseError::ManifestInvalid`] when the header lacks a `name` or the
///   YAML is malformed.
/// - [`ParseError::TooLarge`] when a traversal bound is exceeded.
pub fn parse_skill(root: &Path) -> Result<(Skill, Vec<Finding>), ParseError> {
    let manifest_path = root.join(MANIFEST_NAME);
    if !manifest_path.is_file() {
        return Err(ParseError::ManifestMissing(root.to_path_buf()));
    }

    let raw = std::fs::read_to_string(&manifest_path).map_err(|source| ParseError::Io {
        path: manifest_path.clone(),
        source,
    })?;

    let (header, body) = split_header(&raw);
    let fm: Frontmatter = match header {
        Some(yaml) => serde_yaml::from_str(yaml).map_err(|e| ParseError::ManifestInvalid {
            message: format!("malformed manifest header: {e}"),
        })?,
        None => Frontmatter::default(),
    };

    let name = match fm.name {
        Some(n) if !n.trim().is_empty() => n,
        _ => {
            return Err(ParseError::ManifestInvalid {
                message: "missing required 'name' field".to_string(),
            })
        }
    };

    let mut warnings = Vec::new();
    let (scripts, extra_files) = walk_files(root, &mut warnings)?;

    debug!(
        skill = %name,
        scripts = scripts.len(),
        files = extra_files.len(),
        "parsed skill directory"
    );

    let skill = Skill {
        name,
        description: fm.description.unwrap_or_default(),
        version: fm.version,
        author: fm.author,
        license: fm.license,
        metadata: fm.metadata,
        requires: fm.requires,
        install_steps: fm.install.into_iter().map(InstallStep::from).collect(),
        body_markdown: body.to_string(),
        scripts,
        extra_files,
        root_path: root.to_path_buf(),
    };

    Ok((skill, warnings))
}

/// Splits the manifest into its YAML header and markdown body.
///
/// The header is the block between the leading `---` line and the next line
/// consisting only of `---`. Returns `None` for the header when the file
/// does not start with a delimiter or the block is never closed; the caller
/// then treats the whole document as body (and the mandatory `name` check
/// reports the manifest as invalid).
fn split_header(raw: &str) -> (Option<&str>, &str) {
    let stripped = raw.trim_start_matches('\n');
    let Some(rest) = stripped.strip_prefix("---") else {
        return (None, raw);
    };
    let rest = rest.strip_prefix('\n').unwrap_or(rest);

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches('\n').trim() == "---" {
            let header = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(header), body);
        }
        offset += line.len();
    }
    (None, raw)
}

/// Walks the skill directory, classifying every file as a script or an
/// extra file, enforcing the traversal bounds.
fn walk_files(
    root: &Path,
    warnings: &mut Vec<Finding>,
) -> Result<(Vec<Script>, Vec<FileEntry>), ParseError> {
    let mut scripts = Vec::new();
    let mut extra_files = Vec::new();
    let mut file_count = 0usize;
    let mut total_bytes = 0u64;

    let walker = WalkDir::new(root)
        .max_depth(MAX_DEPTH + 1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if entry.depth() > MAX_DEPTH {
            return Err(ParseError::TooLarge {
                reason: format!("directory depth exceeds {MAX_DEPTH}"),
            });
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if entry.depth() == 1 && file_name == MANIFEST_NAME {
            continue;
        }
        if file_name.starts_with('.') || SKIP_FILES.contains(&file_name.as_ref()) {
            continue;
        }

        file_count += 1;
        if file_count > MAX_FILES {
            return Err(ParseError::TooLarge {
                reason: format!("file count exceeds {MAX_FILES}"),
            });
        }

        let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
        total_bytes += size_bytes;
        if total_bytes > MAX_TOTAL_BYTES {
            return Err(ParseError::TooLarge {
                reason: format!("cumulative size exceeds {} bytes", MAX_TOTAL_BYTES),
            });
        }

        let rel_path = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");

        classify_file(entry.path(), &rel_path, size_bytes, &mut scripts, &mut extra_files, warnings);
    }

    Ok((scripts, extra_files))
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() || entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIP_DIRS.contains(&name.as_ref())
}

fn classify_file(
    path: &Path,
    rel_path: &str,
    size_bytes: u64,
    scripts: &mut Vec<Script>,
    extra_files: &mut Vec<FileEntry>,
    warnings: &mut Vec<Finding>,
) {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            warnings.push(parse_warning(
                rel_path,
                format!("Could not read {rel_path}: {e}"),
            ));
            extra_files.push(FileEntry {
                path: rel_path.to_string(),
                size_bytes,
                is_binary: false,
                text: String::new(),
            });
            return;
        }
    };

    let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];
    if sniff.contains(&0) {
        extra_files.push(FileEntry {
            path: rel_path.to_string(),
            size_bytes,
            is_binary: true,
            text: String::new(),
        });
        return;
    }

    if size_bytes > MAX_TEXT_BYTES {
        warnings.push(parse_warning(
            rel_path,
            format!("{rel_path} exceeds the {MAX_TEXT_BYTES}-byte text cap; body not analyzed"),
        ));
        extra_files.push(FileEntry {
            path: rel_path.to_string(),
            size_bytes,
            is_binary: false,
            text: String::new(),
        });
        return;
    }

    let text = match String::from_utf8(bytes) {
        Ok(t) => t,
        Err(_) => {
            warnings.push(parse_warning(
                rel_path,
                format!("{rel_path} is not valid UTF-8; body not analyzed"),
            ));
            extra_files.push(FileEntry {
                path: rel_path.to_string(),
                size_bytes,
                is_binary: false,
                text: String::new(),
            });
            return;
        }
    };

    match detect_language(rel_path, &text) {
        Some(language) => scripts.push(Script {
            path: rel_path.to_string(),
            language,
            text,
            size_bytes,
        }),
        None => extra_files.push(FileEntry {
            path: rel_path.to_string(),
            size_bytes,
            is_binary: false,
            text,
        }),
    }
}

/// Infers a script language from the file extension, falling back to the
/// shebang line for extensionless executables.
fn detect_language(rel_path: &str, text: &str) -> Option<ScriptLanguage> {
    let ext = Path::new(rel_path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());
    if let Some(ext) = ext {
        if let Some(lang) = ScriptLanguage::from_extension(&ext) {
            return Some(lang);
        }
    }

    let first_line = text.lines().next().unwrap_or("");
    let shebang = first_line.strip_prefix("#!")?;
    let mut tokens = shebang.split_whitespace();
    let program = tokens.next()?;
    let program_name = program.rsplit('/').next().unwrap_or(program);
    let interp = if program_name == "env" {
        tokens.next()?
    } else {
        program_name
    };
    Some(ScriptLanguage::from_interpreter(interp).unwrap_or(ScriptLanguage::Unknown))
}

fn parse_warning(rel_path: &str, detail: String) -> Finding {
    Finding {
        analyzer: "parser".to_string(),
        category: Category::BestPractices,
        severity: Severity::Info,
        title: format!("File skipped during parse: {rel_path}"),
        detail,
        file: Some(rel_path.to_string()),
        line: None,
        evidence: None,
        cwe: None,
        recommendation: "Keep bundled files small, readable, and UTF-8 encoded.".to_string(),
    }
}
