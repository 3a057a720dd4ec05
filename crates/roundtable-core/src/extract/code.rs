//! Code-block extraction.
//!
//! Carves named source files out of free-form agent replies. Each raw block
//! is run through a first-match-wins naming cascade:
//!
//! 1. an explicit `# filename.ext` directive in the first lines,
//! 2. content heuristics for the well-known project files,
//! 3. the first class or function name,
//! 4. a generic sequence-numbered name.
//!
//! Extraction is pure. Persisting the artifacts is the writer's job.

use regex::Regex;
use roundtable_proto::{AgentId, Message};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

/// Blocks shorter than this (after trimming) are discarded.
pub const MIN_CONTENT_CHARS: usize = 30;

/// Number of leading lines searched for a filename directive.
const DIRECTIVE_SEARCH_LINES: usize = 5;

/// A loose (unfenced) code run must be longer than this to count.
const MIN_LOOSE_RUN_LINES: usize = 10;

/// Tokens that open a loose code run.
const DECLARATION_TOKENS: &[&str] = &["import ", "from ", "class ", "def ", "@"];

/// Characters that mark a line as code-like rather than prose.
const STRUCTURE_CHARS: &[char] = &['(', ')', ':', '=', '[', ']', '{', '}'];

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#\s*(?:output/)?([a-zA-Z0-9_]+\.(?:py|txt|md))").expect("directive pattern is valid")
});

static DIRECTIVE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*#\s*(?:output/)?[a-zA-Z0-9_]+\.(?:py|txt|md)\b").expect("directive line pattern is valid")
});

static SAFE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+\.(?:py|txt|md|json|yaml)$").expect("safe name pattern is valid")
});

static CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"class\s+([A-Za-z0-9_]+)").expect("class pattern is valid"));

static DEF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"def\s+([a-z_][a-z0-9_]*)").expect("def pattern is valid"));

static IMPORT_RANDOM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*import\s+random\b").expect("import pattern is valid"));

static IMPORT_ENUM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*from\s+enum\s+import\b.*\bEnum\b").expect("import pattern is valid")
});

static IMPORT_PYGAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*import\s+pygame\b").expect("import pattern is valid"));

static IMPORT_SYS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*import\s+sys\b").expect("import pattern is valid"));

static IMPORT_UNITTEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:import\s+unittest\b|from\s+unittest\s+import\b)")
        .expect("import pattern is valid")
});

/// How a filename was assigned to a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// A `# name.ext` comment inside the block.
    ExplicitDirective,
    /// A domain-signal rule matched the content.
    ContentHeuristic,
    /// Derived from the first class or function name.
    StructuralFallback,
    /// Sequence-numbered generic name.
    GenericFallback,
}

/// A named source file carved out of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeArtifact {
    pub filename: String,
    pub content: String,
    pub source_sender: AgentId,
    pub detection_method: DetectionMethod,
}

/// A block of text as found in a message, before naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    /// Info string of the opening fence, if any.
    pub language: Option<String>,
    pub body: String,
}

/// One rule of the content heuristic cascade.
struct NamingRule {
    filename: &'static str,
    applies: fn(&str) -> bool,
}

fn looks_like_python(content: &str) -> bool {
    ["import ", "class ", "def "].iter().any(|kw| content.contains(kw))
}

fn mentions_pygame(content: &str) -> bool {
    content.to_lowercase().contains("pygame")
}

fn is_logic_module(content: &str) -> bool {
    looks_like_python(content)
        && ["class Snake", "class Food", "class GameState"]
            .iter()
            .any(|c| content.contains(c))
        && !mentions_pygame(content)
}

fn is_interface_module(content: &str) -> bool {
    looks_like_python(content)
        && mentions_pygame(content)
        && (content.contains("class ") || content.contains("def "))
}

fn is_test_module(content: &str) -> bool {
    looks_like_python(content)
        && content.contains("unittest")
        && (content.contains("class Test") || content.contains("def test_"))
}

fn is_config_module(content: &str) -> bool {
    looks_like_python(content) && content.to_lowercase().contains("config") && content.contains("class")
}

fn is_utils_module(content: &str) -> bool {
    let lower = content.to_lowercase();
    looks_like_python(content) && ["helper", "util", "tool"].iter().any(|w| lower.contains(w))
}

fn is_readme(content: &str) -> bool {
    let lower = content.to_lowercase();
    !looks_like_python(content)
        && content.starts_with('#')
        && ["snake", "game", "project", "installation", "usage"]
            .iter()
            .any(|w| lower.contains(w))
}

fn is_requirements(content: &str) -> bool {
    let lower = content.to_lowercase();
    !looks_like_python(content)
        && ["pygame", "numpy", "pytest", "==", ">="]
            .iter()
            .any(|p| lower.contains(p))
}

fn is_config_document(content: &str) -> bool {
    !looks_like_python(content) && (content.trim_start().starts_with('{') || content.contains("version:"))
}

fn is_json_config(content: &str) -> bool {
    is_config_document(content) && content.contains('{')
}

fn is_yaml_config(content: &str) -> bool {
    is_config_document(content) && !content.contains('{')
}

/// Content heuristics, evaluated top to bottom.
static NAMING_RULES: &[NamingRule] = &[
    NamingRule { filename: "snake_logic.py", applies: is_logic_module },
    NamingRule { filename: "snake_game.py", applies: is_interface_module },
    NamingRule { filename: "test_snake.py", applies: is_test_module },
    NamingRule { filename: "config.py", applies: is_config_module },
    NamingRule { filename: "utils.py", applies: is_utils_module },
    NamingRule { filename: "README.md", applies: is_readme },
    NamingRule { filename: "requirements.txt", applies: is_requirements },
    NamingRule { filename: "config.json", applies: is_json_config },
    NamingRule { filename: "config.yaml", applies: is_yaml_config },
];

/// Returns true if the name is a bare file name with an allowed extension.
pub fn is_safe_filename(name: &str) -> bool {
    SAFE_NAME_RE.is_match(name)
}

/// Finds fenced (```) blocks. Unterminated fences are ignored.
pub fn fenced_blocks(text: &str) -> Vec<RawBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<(Option<String>, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        match current.take() {
            None => {
                if let Some(info) = trimmed.strip_prefix("```") {
                    let info = info.trim();
                    let language = (!info.is_empty()).then(|| info.to_lowercase());
                    current = Some((language, Vec::new()));
                }
            }
            Some((language, body)) if trimmed.starts_with("```") => {
                blocks.push(RawBlock {
                    language,
                    body: body.join("\n"),
                });
            }
            Some((language, mut body)) => {
                body.push(line);
                current = Some((language, body));
            }
        }
    }

    blocks
}

/// Finds unfenced code runs.
///
/// A run opens on a line starting with a declaration token and closes on a
/// blank line or a prose-like line (no structural characters, more than five
/// words). The closing line belongs to the run. Runs of more than ten lines
/// are kept, including one still open at the end of the text.
pub fn loose_blocks(text: &str) -> Vec<RawBlock> {
    let mut blocks = Vec::new();
    let mut run: Vec<&str> = Vec::new();
    let mut in_code = false;

    let mut flush = |run: &mut Vec<&str>| {
        if run.len() > MIN_LOOSE_RUN_LINES {
            blocks.push(RawBlock {
                language: None,
                body: run.join("\n"),
            });
        }
        run.clear();
    };

    for line in text.lines() {
        let stripped = line.trim();
        if DECLARATION_TOKENS.iter().any(|kw| stripped.starts_with(kw)) {
            in_code = true;
        }
        if !in_code {
            continue;
        }

        run.push(line);
        let prose = !stripped.contains(STRUCTURE_CHARS) && stripped.split_whitespace().count() > 5;
        if stripped.is_empty() || prose {
            flush(&mut run);
            in_code = false;
        }
    }
    flush(&mut run);

    blocks
}

/// Raw blocks for a message: fenced blocks, or loose runs if there are none.
pub fn raw_blocks(text: &str) -> Vec<RawBlock> {
    let fenced = fenced_blocks(text);
    if fenced.is_empty() { loose_blocks(text) } else { fenced }
}

/// Looks for a filename directive in the first lines of a block.
///
/// Returns the filename and the content with a whole-line directive removed.
fn explicit_directive(content: &str) -> Option<(String, String)> {
    for (i, line) in content.lines().take(DIRECTIVE_SEARCH_LINES).enumerate() {
        let Some(caps) = DIRECTIVE_RE.captures(line) else {
            continue;
        };
        let filename = caps[1].to_string();
        if !DIRECTIVE_LINE_RE.is_match(line) {
            return Some((filename, content.to_string()));
        }
        let stripped = content
            .lines()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, l)| l)
            .collect::<Vec<_>>()
            .join("\n");
        return Some((filename, stripped.trim().to_string()));
    }
    None
}

fn structural_name(content: &str) -> Option<String> {
    if !looks_like_python(content) {
        return None;
    }
    if let Some(caps) = CLASS_RE.captures(content) {
        return Some(format!("{}.py", caps[1].to_lowercase()));
    }
    DEF_RE.captures(content).map(|caps| format!("{}.py", &caps[1]))
}

fn generic_name(content: &str, index: usize) -> String {
    if ["import", "class", "def"].iter().any(|kw| content.contains(kw)) {
        format!("generated_code_{index}.py")
    } else if content.starts_with('#') {
        format!("document_{index}.md")
    } else {
        format!("file_{index}.txt")
    }
}

/// Assigns a filename to a trimmed block.
///
/// `index` is the block's position in its message and only feeds the generic
/// fallback. Returns the filename, the retained content and the method used.
pub fn assign_filename(content: &str, index: usize) -> (String, String, DetectionMethod) {
    if let Some((filename, stripped)) = explicit_directive(content) {
        return (filename, stripped, DetectionMethod::ExplicitDirective);
    }

    if let Some(rule) = NAMING_RULES.iter().find(|rule| (rule.applies)(content)) {
        return (
            rule.filename.to_string(),
            content.to_string(),
            DetectionMethod::ContentHeuristic,
        );
    }

    if let Some(filename) = structural_name(content) {
        return (filename, content.to_string(), DetectionMethod::StructuralFallback);
    }

    (
        generic_name(content, index),
        content.to_string(),
        DetectionMethod::GenericFallback,
    )
}

/// Prepends companion imports missing from well-known files.
///
/// Only whole import lines count as present, so applying this twice gives
/// the same result as applying it once.
pub fn augment_imports(filename: &str, content: &str) -> String {
    if !filename.ends_with(".py") {
        return content.to_string();
    }

    let mut prefix = String::new();
    if filename.contains("snake_logic") {
        if content.contains("Enum") && !IMPORT_ENUM_RE.is_match(content) {
            prefix.push_str("from enum import Enum\n");
        }
        if !IMPORT_RANDOM_RE.is_match(content) {
            prefix.push_str("import random\n");
        }
    } else if filename.to_lowercase().contains("game") {
        if mentions_pygame(content) && !IMPORT_PYGAME_RE.is_match(content) {
            prefix.push_str("import pygame\n");
            if !IMPORT_SYS_RE.is_match(content) {
                prefix.push_str("import sys\n");
            }
        }
    } else if filename.contains("test") && !IMPORT_UNITTEST_RE.is_match(content) {
        prefix.push_str("import unittest\n");
    }

    if prefix.is_empty() {
        content.to_string()
    } else {
        format!("{prefix}{content}")
    }
}

/// Extracts every code artifact from one message.
pub fn extract_artifacts(message: &Message) -> Vec<CodeArtifact> {
    let mut artifacts = Vec::new();

    for (index, block) in raw_blocks(&message.text).into_iter().enumerate() {
        let trimmed = block.body.trim();
        if trimmed.chars().count() < MIN_CONTENT_CHARS {
            debug!(sender = %message.sender, index, "Skipping block below minimum size");
            continue;
        }

        let (filename, content, detection_method) = assign_filename(trimmed, index);
        if !is_safe_filename(&filename) {
            debug!(sender = %message.sender, filename = %filename, "Skipping unsafe filename");
            continue;
        }

        debug!(
            sender = %message.sender,
            filename = %filename,
            language = block.language.as_deref().unwrap_or("none"),
            method = ?detection_method,
            "Extracted code block"
        );

        artifacts.push(CodeArtifact {
            content: augment_imports(&filename, &content),
            filename,
            source_sender: message.sender.clone(),
            detection_method,
        });
    }

    artifacts
}

/// Keeps the longest candidate per filename, in first-seen order.
///
/// Ties keep the earlier candidate.
pub fn resolve_conflicts(artifacts: Vec<CodeArtifact>) -> Vec<CodeArtifact> {
    let mut resolved: Vec<CodeArtifact> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for artifact in artifacts {
        match positions.get(&artifact.filename) {
            Some(&pos) => {
                if artifact.content.chars().count() > resolved[pos].content.chars().count() {
                    resolved[pos] = artifact;
                }
            }
            None => {
                positions.insert(artifact.filename.clone(), resolved.len());
                resolved.push(artifact);
            }
        }
    }

    resolved
}
