//! Syntactic analyzer.
//!
//! Parses Python scripts with the tree-sitter Python grammar and shell
//! scripts with the bash grammar, then walks the trees for dangerous call
//! shapes that line-oriented regexes cannot see reliably (keyword
//! arguments, pipelines, co-occurring primitives).
//!
//! Two skill-level checks also live here because they need the parsed
//! manifest rather than raw text: typosquat detection against a list of
//! popular skill names, and the excessive-permission heuristic over
//! `requires`.

use tree_sitter::{Node, Parser};

use crate::error::AnalyzerError;
use crate::finding::{truncate_evidence, Category, Finding, Severity};
use crate::pipeline::CancelToken;
use crate::skill::{Script, ScriptLanguage, Skill};

use super::Analyzer;

/// Well-known skill names used for typosquat detection.
const POPULAR_SKILL_NAMES: &[&str] = &[
    "github",
    "gitlab",
    "docker",
    "kubernetes",
    "slack",
    "discord",
    "notion",
    "linear",
    "jira",
    "figma",
    "stripe",
    "openai",
    "anthropic",
    "postgres",
    "mysql",
    "redis",
    "mongodb",
    "terraform",
    "ansible",
    "jenkins",
    "grafana",
    "datadog",
];

/// Env var names treated as sensitive by the permission heuristic.
fn is_sensitive_env(name: &str) -> bool {
    name.starts_with("AWS_") || name == "DATABASE_URL" || name == "GITHUB_TOKEN"
}

pub struct AstAnalyzer;

impl AstAnalyzer {
    pub fn new() -> Self {
        AstAnalyzer
    }
}

impl Default for AstAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for AstAnalyzer {
    fn name(&self) -> &'static str {
        "ast"
    }

    fn analyze(&self, skill: &Skill, cancel: &CancelToken) -> Result<Vec<Finding>, AnalyzerError> {
        let mut findings = Vec::new();

        check_typosquat(skill, &mut findings);
        check_excessive_permissions(skill, &mut findings);

        // Parsers are built per call: tree_sitter::Parser is Send but not
        // Sync, and the analyzer itself must be shareable across the pool.
        let mut python = language_parser(&tree_sitter_python::LANGUAGE.into())?;
        let mut bash = language_parser(&tree_sitter_bash::LANGUAGE.into())?;

        for script in &skill.scripts {
            if cancel.is_cancelled() {
                break;
            }
            match script.language {
                ScriptLanguage::Python => analyze_script(&mut python, script, &mut findings, walk_python),
                ScriptLanguage::Bash => analyze_script(&mut bash, script, &mut findings, walk_bash),
                _ => {}
            }
        }

        Ok(findings)
    }
}

fn language_parser(language: &tree_sitter::Language) -> Result<Parser, AnalyzerError> {
    let mut parser = Parser::new();
    parser
        .set_language(language)
        .map_err(|e| AnalyzerError::Failed {
            message: format!("tree-sitter language init failed: {e}"),
        })?;
    Ok(parser)
}

fn analyze_script(
    parser: &mut Parser,
    script: &Script,
    findings: &mut Vec<Finding>,
    walk: fn(Node, &Script, &mut ScriptFlags, &mut Vec<Finding>),
) {
    let Some(tree) = parser.parse(&script.text, None) else {
        findings.push(unparseable(script));
        return;
    };
    let root = tree.root_node();
    if root.has_error() {
        findings.push(unparseable(script));
    }

    // A partially erroneous tree still walks; dangerous calls in the valid
    // regions are reported either way.
    let mut flags = ScriptFlags::default();
    walk(root, script, &mut flags, findings);
    flags.emit_combinations(script, findings);
}

fn unparseable(script: &Script) -> Finding {
    Finding {
        analyzer: "ast".to_string(),
        category: Category::BestPractices,
        severity: Severity::Low,
        title: "Unparseable script".to_string(),
        detail: format!("{} could not be fully parsed; syntactic checks are incomplete.", script.path),
        file: Some(script.path.clone()),
        line: None,
        evidence: None,
        cwe: None,
        recommendation: "Fix the script's syntax so it can be reviewed.".to_string(),
    }
}

/// Per-script facts collected during a walk; combinations of them are what
/// make a behavior malicious rather than merely suspicious.
#[derive(Default)]
struct ScriptFlags {
    decode_line: Option<u32>,
    exec_eval_line: Option<u32>,
    fetch_line: Option<u32>,
    spawn_line: Option<u32>,
    chmod_exec_line: Option<u32>,
    imports_socket: bool,
    environ_line: Option<u32>,
}

impl ScriptFlags {
    fn emit_combinations(&self, script: &Script, findings: &mut Vec<Finding>) {
        if let (Some(decode), Some(exec)) = (self.decode_line, self.exec_eval_line) {
            findings.push(ast_finding(
                script,
                Category::Malware,
                Severity::Critical,
                format!("Decoded payload executed in {}", script.path),
                format!(
                    "An encoded payload is decoded (line {decode}) and handed to dynamic \
                     execution (line {exec}). This is the classic obfuscated-dropper shape."
                ),
                decode,
                Some("CWE-506"),
                "Do not install; decode-then-execute hides the real payload from review.",
            ));
        }

        if let (Some(fetch), Some(exec)) = (self.fetch_line, self.exec_eval_line) {
            findings.push(ast_finding(
                script,
                Category::Malware,
                Severity::Critical,
                format!("Remote content executed in {}", script.path),
                format!(
                    "An HTTP fetch (line {fetch}) feeds dynamic execution (line {exec}); the \
                     payload can change after review."
                ),
                fetch,
                Some("CWE-829"),
                "Do not install; remotely fetched code is unreviewable.",
            ));
        } else if let (Some(fetch), Some(spawn)) = (self.fetch_line, self.spawn_line) {
            findings.push(ast_finding(
                script,
                Category::Malware,
                Severity::High,
                format!("Fetched content may be executed in {}", script.path),
                format!(
                    "An HTTP fetch (line {fetch}) co-occurs with process execution (line \
                     {spawn}); downloaded content is likely run."
                ),
                fetch,
                Some("CWE-829"),
                "Verify what the spawned process runs; prefer pinned, checksummed artifacts.",
            ));
        }

        if self.imports_socket {
            if let Some(line) = self.environ_line {
                findings.push(ast_finding(
                    script,
                    Category::NetworkExfiltration,
                    Severity::High,
                    format!("Socket use combined with environment access in {}", script.path),
                    format!(
                        "The script imports socket and reads os.environ (line {line}); raw \
                         sockets beside environment access suggest exfiltration."
                    ),
                    line,
                    Some("CWE-201"),
                    "Review why a raw socket needs environment variables.",
                ));
            }
        }

        if let (Some(fetch), Some(chmod)) = (self.fetch_line, self.chmod_exec_line) {
            findings.push(ast_finding(
                script,
                Category::SocialEngineering,
                Severity::High,
                format!("Download made executable in {}", script.path),
                format!(
                    "A download (line {fetch}) is later marked executable (line {chmod}), the \
                     usual staging for running unreviewed binaries."
                ),
                fetch,
                Some("CWE-829"),
                "Install binaries through a package manager with checksums.",
            ));
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn ast_finding(
    script: &Script,
    category: Category,
    severity: Severity,
    title: String,
    detail: String,
    line: u32,
    cwe: Option<&str>,
    recommendation: &str,
) -> Finding {
    let evidence = script
        .text
        .lines()
        .nth(line as usize - 1)
        .map(|l| truncate_evidence(l.trim()));
    Finding {
        analyzer: "ast".to_string(),
        category,
        severity,
        title,
        detail,
        file: Some(script.path.clone()),
        line: Some(line),
        evidence,
        cwe: cwe.map(str::to_string),
        recommendation: recommendation.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------------

/// Builtin calls that are dangerous on sight.
const PY_BUILTIN_CALLS: &[(&str, Category, Severity, &str)] = &[
    ("eval", Category::Obfuscation, Severity::High, "eval() executes arbitrary code"),
    ("exec", Category::Obfuscation, Severity::High, "exec() executes arbitrary code"),
    ("compile", Category::Obfuscation, Severity::Medium, "compile() prepares code for execution"),
    ("__import__", Category::SupplyChain, Severity::High, "__import__() loads arbitrary modules"),
];

/// Dotted calls that are dangerous on sight.
const PY_ATTR_CALLS: &[(&str, Category, Severity, &str)] = &[
    ("os.system", Category::SupplyChain, Severity::High, "os.system runs shell commands"),
    ("os.popen", Category::SupplyChain, Severity::High, "os.popen runs shell commands"),
    ("os.dup2", Category::Malware, Severity::Critical, "os.dup2 is a reverse-shell staple"),
];

const PY_SUBPROCESS_FNS: &[&str] = &["call", "run", "Popen", "check_output"];

const PY_HTTP_FETCHES: &[&str] = &[
    "requests.get",
    "requests.post",
    "requests.put",
    "urllib.request.urlopen",
    "httpx.get",
    "httpx.post",
];

const PY_DECODE_CALLS: &[&str] = &["base64.b64decode", "bytes.fromhex"];

fn walk_python(node: Node, script: &Script, flags: &mut ScriptFlags, findings: &mut Vec<Finding>) {
    match node.kind() {
        "call" => check_python_call(node, script, flags, findings),
        "attribute" => {
            if node_text(node, script) == "os.environ" {
                flags.environ_line.get_or_insert(line_of(node));
            }
        }
        "import_statement" | "import_from_statement" => {
            let text = node_text(node, script);
            if text.split_whitespace().any(|w| w == "socket" || w.starts_with("socket.")) {
                flags.imports_socket = true;
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_python(child, script, flags, findings);
    }
}

fn check_python_call(
    node: Node,
    script: &Script,
    flags: &mut ScriptFlags,
    findings: &mut Vec<Finding>,
) {
    let Some(func) = node.child_by_field_name("function") else {
        return;
    };
    let func_text = node_text(func, script);
    let line = line_of(node);

    match func.kind() {
        "identifier" => {
            for (name, category, severity, desc) in PY_BUILTIN_CALLS {
                if func_text == *name {
                    if *name == "eval" || *name == "exec" {
                        flags.exec_eval_line.get_or_insert(line);
                    }
                    findings.push(ast_finding(
                        script,
                        *category,
                        *severity,
                        format!("Dangerous call: {name}() in {}", script.path),
                        format!("{desc} (line {line})."),
                        line,
                        None,
                        "Avoid dynamic execution, especially over untrusted input.",
                    ));
                }
            }
        }
        "attribute" => {
            for (name, category, severity, desc) in PY_ATTR_CALLS {
                if func_text == *name {
                    findings.push(ast_finding(
                        script,
                        *category,
                        *severity,
                        format!("Dangerous call: {name}() in {}", script.path),
                        format!("{desc} (line {line})."),
                        line,
                        Some("CWE-78"),
                        "Review whether this call is necessary for the skill's purpose.",
                    ));
                }
            }

            if let Some(fn_name) = func_text.strip_prefix("subprocess.") {
                if PY_SUBPROCESS_FNS.contains(&fn_name) {
                    flags.spawn_line.get_or_insert(line);
                    if call_has_shell_true(node, script) {
                        findings.push(ast_finding(
                            script,
                            Category::SupplyChain,
                            Severity::High,
                            format!("subprocess.{fn_name}(shell=True) in {}", script.path),
                            format!(
                                "subprocess.{fn_name} is invoked with shell=True (line {line}), \
                                 exposing the command line to injection."
                            ),
                            line,
                            Some("CWE-78"),
                            "Pass an argument vector instead of shell=True.",
                        ));
                    }
                }
            }
            if func_text == "os.system" || func_text == "os.popen" {
                flags.spawn_line.get_or_insert(line);
            }

            if PY_DECODE_CALLS.contains(&func_text.as_str()) {
                flags.decode_line.get_or_insert(line);
            }
            if PY_HTTP_FETCHES.contains(&func_text.as_str()) {
                flags.fetch_line.get_or_insert(line);
            }
        }
        _ => {}
    }
}

/// True when a call node carries a `shell=True` keyword argument.
fn call_has_shell_true(call: Node, script: &Script) -> bool {
    let Some(args) = call.child_by_field_name("arguments") else {
        return false;
    };
    let mut cursor = args.walk();
    for arg in args.children(&mut cursor) {
        if arg.kind() != "keyword_argument" {
            continue;
        }
        let name = arg.child_by_field_name("name").map(|n| node_text(n, script));
        let value = arg.child_by_field_name("value").map(|n| node_text(n, script));
        if name.as_deref() == Some("shell") && value.as_deref() == Some("True") {
            return true;
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Shell
// ---------------------------------------------------------------------------

fn walk_bash(node: Node, script: &Script, flags: &mut ScriptFlags, findings: &mut Vec<Finding>) {
    match node.kind() {
        "command" => check_bash_command(node, script, flags, findings),
        "pipeline" => check_bash_pipeline(node, script, findings),
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_bash(child, script, flags, findings);
    }
}

fn check_bash_command(
    node: Node,
    script: &Script,
    flags: &mut ScriptFlags,
    findings: &mut Vec<Finding>,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, script);
    let line = line_of(node);

    match name.as_str() {
        "sudo" => findings.push(ast_finding(
            script,
            Category::ExcessivePermissions,
            Severity::High,
            format!("Privilege escalation via sudo in {}", script.path),
            format!("sudo at line {line} runs part of the skill with elevated privileges."),
            line,
            Some("CWE-250"),
            "Skills should not require root; remove sudo or justify it in the manifest.",
        )),
        "env" | "printenv" => findings.push(ast_finding(
            script,
            Category::CredentialExposure,
            Severity::Medium,
            format!("Environment dump via {name} in {}", script.path),
            format!("{name} at line {line} exposes every environment variable at once."),
            line,
            Some("CWE-526"),
            "Read the specific variables the skill declares instead of dumping all of them.",
        )),
        "eval" => {
            if command_args_text(node, script).contains('$') {
                findings.push(ast_finding(
                    script,
                    Category::Obfuscation,
                    Severity::High,
                    format!("eval of interpolated string in {}", script.path),
                    format!("eval at line {line} executes dynamically assembled shell text."),
                    line,
                    Some("CWE-95"),
                    "Replace eval with explicit commands or a case statement.",
                ));
            }
        }
        "curl" | "wget" => {
            flags.fetch_line.get_or_insert(line);
        }
        "chmod" => {
            let args = command_args_text(node, script);
            if args.contains("+x") || args.contains("755") || args.contains("777") {
                flags.chmod_exec_line.get_or_insert(line);
            }
        }
        _ => {}
    }
}

fn check_bash_pipeline(node: Node, script: &Script, findings: &mut Vec<Finding>) {
    let mut cursor = node.walk();
    let commands: Vec<Node> = node
        .children(&mut cursor)
        .filter(|c| c.kind() == "command")
        .collect();
    if commands.len() < 2 {
        return;
    }

    let head = commands
        .first()
        .and_then(|c| c.child_by_field_name("name"))
        .map(|n| node_text(n, script));
    let tail = commands
        .last()
        .and_then(|c| c.child_by_field_name("name"))
        .map(|n| node_text(n, script));

    let (Some(head), Some(tail)) = (head, tail) else {
        return;
    };
    if matches!(head.as_str(), "curl" | "wget")
        && matches!(tail.as_str(), "bash" | "sh" | "zsh" | "sudo")
    {
        let line = line_of(node);
        findings.push(ast_finding(
            script,
            Category::SocialEngineering,
            Severity::Critical,
            format!("Remote content piped to {tail} in {}", script.path),
            format!("{head} output is piped straight into {tail} at line {line}."),
            line,
            Some("CWE-829"),
            "Never pipe remote content directly into a shell interpreter.",
        ));
    }
}

/// Concatenated text of a command's arguments (everything after the name).
fn command_args_text(node: Node, script: &Script) -> String {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .skip(1)
        .map(|c| node_text(c, script))
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Skill-level checks
// ---------------------------------------------------------------------------

fn check_typosquat(skill: &Skill, findings: &mut Vec<Finding>) {
    let name = skill.name.to_lowercase();
    if POPULAR_SKILL_NAMES.contains(&name.as_str()) {
        return;
    }
    for popular in POPULAR_SKILL_NAMES {
        if levenshtein(&name, popular) == 1 {
            findings.push(Finding {
                analyzer: "ast".to_string(),
                category: Category::Typosquat,
                severity: Severity::High,
                title: format!("Skill name '{}' is one edit away from '{popular}'", skill.name),
                detail: format!(
                    "The name '{}' differs from the popular skill '{popular}' by a single \
                     character, the signature of a typosquatting lure.",
                    skill.name
                ),
                file: Some("SKILL.md".to_string()),
                line: None,
                evidence: Some(skill.name.clone()),
                cwe: None,
                recommendation: "Verify the publisher; a near-miss name is usually impersonation."
                    .to_string(),
            });
            return;
        }
    }
}

fn check_excessive_permissions(skill: &Skill, findings: &mut Vec<Finding>) {
    let requires = &skill.requires;

    let sudo_bin = requires.bins.iter().any(|b| b == "sudo");
    let perms: Vec<String> = requires
        .permissions
        .iter()
        .map(|p| p.to_lowercase())
        .collect();
    let admin_perm = perms.iter().any(|p| p == "admin" || p == "root");
    let broad_combo = ["network", "shell", "filesystem"]
        .iter()
        .all(|needed| perms.iter().any(|p| p == needed));

    let sensitive_env = requires
        .env
        .iter()
        .filter(|e| is_sensitive_env(e))
        .count();

    let short_description = skill.description.chars().count() < 100;

    if (sudo_bin || admin_perm || broad_combo) && sensitive_env >= 3 && short_description {
        findings.push(Finding {
            analyzer: "ast".to_string(),
            category: Category::ExcessivePermissions,
            severity: Severity::High,
            title: format!("Permissions far exceed the stated purpose of '{}'", skill.name),
            detail: format!(
                "The skill requests elevated access and {sensitive_env} sensitive environment \
                 variables, yet its description ('{}') is too brief to justify them.",
                skill.description
            ),
            file: Some("SKILL.md".to_string()),
            line: None,
            evidence: Some(requires.env.join(", ")),
            cwe: Some("CWE-250".to_string()),
            recommendation: "Scope the requested permissions and variables to what the \
                             description actually needs."
                .to_string(),
        });
    }
}

/// Classic two-row Levenshtein distance.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn node_text(node: Node, script: &Script) -> String {
    node.utf8_text(script.text.as_bytes())
        .unwrap_or_default()
        .to_string()
}

fn line_of(node: Node) -> u32 {
    (node.start_position().row + 1) as u32
}
