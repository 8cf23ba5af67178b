use std::path::Path;

use clawguard::error::ParseError;
use clawguard::parser::parse_skill;
use clawguard::skill::ScriptLanguage;

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

const MANIFEST: &str = "---\nname: demo\ndescription: A demo skill for tests.\n---\n# Demo\n";

#[test]
fn missing_manifest_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = parse_skill(dir.path()).unwrap_err();
    assert!(matches!(err, ParseError::ManifestMissing(_)));
}

#[test]
fn missing_name_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "SKILL.md", "---\ndescription: no name here\n---\nbody\n");
    let err = parse_skill(dir.path()).unwrap_err();
    assert!(matches!(err, ParseError::ManifestInvalid { .. }));
}

#[test]
fn manifest_without_header_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "SKILL.md", "# Just a markdown file\n");
    let err = parse_skill(dir.path()).unwrap_err();
    assert!(matches!(err, ParseError::ManifestInvalid { .. }));
}

#[test]
fn malformed_yaml_header_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "SKILL.md", "---\nname: [unclosed\n---\nbody\n");
    let err = parse_skill(dir.path()).unwrap_err();
    assert!(matches!(err, ParseError::ManifestInvalid { .. }));
}

#[test]
fn header_fields_populate_the_skill() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "SKILL.md",
        concat!(
            "---\n",
            "name: weather\n",
            "description: Fetches the forecast.\n",
            "version: \"1.2.0\"\n",
            "author: acme\n",
            "license: MIT\n",
            "metadata:\n  homepage: https://example.com\n",
            "requires:\n",
            "  bins: [curl, jq]\n",
            "  env: [WEATHER_API_KEY]\n",
            "  permissions: [network]\n",
            "install:\n",
            "  - description: fetch deps\n",
            "    command: make deps\n",
            "  - plain-command --now\n",
            "---\n",
            "# Weather\n",
            "Body text.\n",
        ),
    );

    let (skill, warnings) = parse_skill(dir.path()).unwrap();
    assert_eq!(skill.name, "weather");
    assert_eq!(skill.description, "Fetches the forecast.");
    assert_eq!(skill.version.as_deref(), Some("1.2.0"));
    assert_eq!(skill.author.as_deref(), Some("acme"));
    assert_eq!(skill.license.as_deref(), Some("MIT"));
    assert!(skill.metadata.contains_key("homepage"));
    assert_eq!(skill.requires.bins, vec!["curl", "jq"]);
    assert_eq!(skill.requires.env, vec!["WEATHER_API_KEY"]);
    assert_eq!(skill.requires.permissions, vec!["network"]);
    assert_eq!(skill.install_steps.len(), 2);
    assert_eq!(skill.install_steps[0].command, "make deps");
    // Bare-string install items normalize to a command with no description.
    assert_eq!(skill.install_steps[1].command, "plain-command --now");
    assert!(skill.install_steps[1].description.is_empty());
    assert_eq!(skill.body_markdown, "# Weather\nBody text.\n");
    assert!(warnings.is_empty());
}

#[test]
fn scripts_are_classified_by_extension_and_shebang() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "SKILL.md", MANIFEST);
    write(dir.path(), "scripts/setup.py", "print('hi')\n");
    write(dir.path(), "scripts/run.sh", "echo hi\n");
    write(dir.path(), "scripts/index.js", "console.log('hi')\n");
    write(dir.path(), "bin/tool", "#!/usr/bin/env python3\nprint('hi')\n");
    write(dir.path(), "README.txt", "plain notes\n");

    let (skill, _) = parse_skill(dir.path()).unwrap();
    let lang_of = |p: &str| {
        skill
            .scripts
            .iter()
            .find(|s| s.path == p)
            .map(|s| s.language)
    };
    assert_eq!(lang_of("scripts/setup.py"), Some(ScriptLanguage::Python));
    assert_eq!(lang_of("scripts/run.sh"), Some(ScriptLanguage::Bash));
    assert_eq!(lang_of("scripts/index.js"), Some(ScriptLanguage::Javascript));
    assert_eq!(lang_of("bin/tool"), Some(ScriptLanguage::Python));
    assert!(skill.extra_files.iter().any(|f| f.path == "README.txt"));
}

#[test]
fn manifest_itself_is_not_a_script_or_extra_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "SKILL.md", MANIFEST);
    let (skill, _) = parse_skill(dir.path()).unwrap();
    assert!(skill.scripts.is_empty());
    assert!(skill.extra_files.is_empty());
}

#[test]
fn binary_files_are_flagged_and_not_read() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "SKILL.md", MANIFEST);
    std::fs::write(dir.path().join("blob.bin"), [0u8, 159, 146, 150, 0, 1]).unwrap();

    let (skill, _) = parse_skill(dir.path()).unwrap();
    let blob = skill
        .extra_files
        .iter()
        .find(|f| f.path == "blob.bin")
        .unwrap();
    assert!(blob.is_binary);
    assert!(blob.text.is_empty());
}

#[test]
fn oversized_text_file_keeps_empty_body_and_warns() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "SKILL.md", MANIFEST);
    let big = "a".repeat(1024 * 1024 + 1);
    std::fs::write(dir.path().join("huge.txt"), big).unwrap();

    let (skill, warnings) = parse_skill(dir.path()).unwrap();
    let huge = skill
        .extra_files
        .iter()
        .find(|f| f.path == "huge.txt")
        .unwrap();
    assert!(!huge.is_binary);
    assert!(huge.text.is_empty());
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].analyzer, "parser");
    assert_eq!(
        warnings[0].severity,
        clawguard::finding::Severity::Info
    );
}

#[test]
fn hidden_and_vendor_directories_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "SKILL.md", MANIFEST);
    write(dir.path(), ".git/config", "[core]\n");
    write(dir.path(), "node_modules/pkg/index.js", "console.log(1)\n");
    write(dir.path(), ".venv/lib/site.py", "x = 1\n");
    write(dir.path(), "src/keep.py", "x = 1\n");

    let (skill, _) = parse_skill(dir.path()).unwrap();
    assert_eq!(skill.scripts.len(), 1);
    assert_eq!(skill.scripts[0].path, "src/keep.py");
}

#[test]
fn file_count_bound_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "SKILL.md", MANIFEST);
    for i in 0..2001 {
        std::fs::write(dir.path().join(format!("f{i}.txt")), "x").unwrap();
    }
    let err = parse_skill(dir.path()).unwrap_err();
    assert!(matches!(err, ParseError::TooLarge { .. }));
}

#[test]
fn walk_order_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "SKILL.md", MANIFEST);
    write(dir.path(), "b.txt", "b\n");
    write(dir.path(), "a.txt", "a\n");
    write(dir.path(), "c.txt", "c\n");

    let (skill, _) = parse_skill(dir.path()).unwrap();
    let paths: Vec<&str> = skill.extra_files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["a.txt", "b.txt", "c.txt"]);
}
