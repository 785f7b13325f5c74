//! Post-processing of a raw LLM completion into storable source:
//! strip code-fence markup, drop fenced blocks whose header pattern
//! names the wrong language, and strip Python imports that are never
//! referenced again in the body.

use crate::domain::Language;

/// Header patterns that identify a fenced block as belonging to a given
/// language, independent of the fence's own ```lang tag - a response
/// sometimes mislabels the fence but the body itself gives it away (a
/// stray `package main` in a fence tagged ```python, for instance).
fn language_markers(language: Language) -> &'static [&'static str] {
    match language {
        Language::Python => &["def ", "import ", "print("],
        Language::Go => &["package main", "func main("],
        Language::Javascript => &["require(", "console.log(", "const ", "function "],
        Language::Java => &["public class ", "public static void main"],
        Language::Cpp => &["#include <iostream>", "int main("],
        Language::C => &["#include <stdio.h>", "int main("],
        Language::Rust => &["fn main(", "use std::"],
        Language::McpTool | Language::Builtin => &[],
    }
}

fn other_language_markers(language: Language) -> Vec<&'static str> {
    [
        Language::Python,
        Language::Go,
        Language::Javascript,
        Language::Java,
        Language::Cpp,
        Language::C,
        Language::Rust,
    ]
    .into_iter()
    .filter(|&l| l != language)
    .flat_map(language_markers)
    .copied()
    .collect()
}

/// Extract fenced code blocks from a markdown-ish completion, falling
/// back to the whole trimmed response when no fence is present (some
/// models answer with bare source, no markdown at all).
pub fn strip_code_fences(raw: &str) -> String {
    let mut blocks = Vec::new();
    let mut lines = raw.lines().peekable();
    let mut current: Option<Vec<&str>> = None;

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            match current.take() {
                Some(block) => blocks.push(block.join("\n")),
                None => current = Some(Vec::new()),
            }
        } else if let Some(block) = current.as_mut() {
            block.push(line);
        }
    }
    if let Some(block) = current {
        blocks.push(block.join("\n"));
    }

    if blocks.is_empty() {
        raw.trim().to_string()
    } else {
        blocks.join("\n\n").trim().to_string()
    }
}

/// Drop any paragraph-separated chunk of `source` whose content matches
/// a marker belonging to a different language than `language` - the
/// defense against a response that includes a wrong-language aside
/// alongside the real answer ("a `package main` appearing in a
/// Python response is deleted").
pub fn filter_wrong_language_blocks(source: &str, language: Language) -> String {
    let foreign = other_language_markers(language);
    if foreign.is_empty() {
        return source.to_string();
    }
    source
        .split("\n\n")
        .filter(|chunk| !foreign.iter().any(|marker| chunk.contains(marker)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Modules that pull in a heavy dependency footprint; only stripped when
/// nothing in the rest of the body references the bound name.
const HEAVY_PYTHON_MODULES: &[&str] = &["pandas", "numpy", "scipy", "torch", "tensorflow", "sklearn"];

/// Remove top-level `import X` / `import X as Y` lines for heavy
/// modules that the generated body never actually uses ("the
/// post-processor strips provably unused heavy imports from Python
/// output"). Conservative: only strips a bare, unaliased or simply
/// aliased top-level import whose bound name has zero remaining uses.
pub fn strip_unused_heavy_imports(source: &str) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let mut bound_names = Vec::new();

    for line in &lines {
        let trimmed = line.trim();
        for module in HEAVY_PYTHON_MODULES {
            if let Some(bound) = import_binding(trimmed, module) {
                bound_names.push((trimmed.to_string(), bound));
            }
        }
    }

    let mut kept = Vec::with_capacity(lines.len());
    'outer: for line in &lines {
        let trimmed = line.trim();
        for (import_line, bound) in &bound_names {
            if trimmed == import_line {
                let uses = lines
                    .iter()
                    .filter(|other| other.trim() != *import_line)
                    .filter(|other| other.contains(bound.as_str()))
                    .count();
                if uses == 0 {
                    continue 'outer;
                }
            }
        }
        kept.push(*line);
    }
    kept.join("\n")
}

/// Returns the name a module import binds in the local namespace, if
/// `trimmed` is a top-level import of `module`.
fn import_binding(trimmed: &str, module: &str) -> Option<String> {
    if let Some(rest) = trimmed.strip_prefix(&format!("import {module} as ")) {
        return Some(rest.trim().to_string());
    }
    if trimmed == format!("import {module}") {
        return Some(module.to_string());
    }
    None
}
