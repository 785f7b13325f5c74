//! Per-language compile/run recipes. Each recipe writes whatever files
//! the container needs into the run's staging directory and returns the
//! argv the container should execute; resource caps and mounts are
//! layered on afterward by `Runner::run`, uniformly across languages.

use std::collections::HashSet;
use std::path::Path;

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::Language;

/// Base container image per language: a `docker run <image>` choice
/// baked into each recipe rather than passed in by the caller.
pub fn base_image(language: Language) -> &'static str {
    match language {
        Language::Python => "python:3.12-slim",
        Language::Javascript => "node:20-slim",
        Language::Go => "golang:1.22-bookworm",
        Language::Java => "eclipse-temurin:21-jdk",
        Language::Cpp => "gcc:13-bookworm",
        Language::C => "gcc:13-bookworm",
        Language::Rust => "rust:1.80-slim",
        Language::McpTool | Language::Builtin => {
            unreachable!("recipes only apply to sandboxed languages")
        }
    }
}

/// Known third-party import -> pinned pip requirement. Anything imported
/// but not in this map, and not in the standard-library set, is passed
/// through as its own name (best effort - only the well-known heavy
/// packages get a pinned version).
static KNOWN_PACKAGES: LazyLock<Vec<(&'static str, &'static str)>> = LazyLock::new(|| {
    vec![
        ("numpy", "numpy==1.26.4"),
        ("pandas", "pandas==2.2.2"),
        ("matplotlib", "matplotlib==3.9.0"),
        ("reportlab", "reportlab==4.2.0"),
        ("requests", "requests==2.32.3"),
        ("PIL", "Pillow==10.3.0"),
        ("bs4", "beautifulsoup4==4.12.3"),
        ("yaml", "PyYAML==6.0.1"),
        ("scipy", "scipy==1.13.1"),
        ("sklearn", "scikit-learn==1.5.0"),
    ]
});

/// The interpreter's own standard library - these import names never
/// become pip requirements even though they appear in `import` statements.
static STDLIB_MODULES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "os", "sys", "re", "json", "math", "random", "time", "datetime", "collections", "itertools",
        "functools", "pathlib", "typing", "dataclasses", "subprocess", "io", "csv", "sqlite3", "logging",
        "unittest", "abc", "enum", "string", "copy", "hashlib", "base64", "traceback", "argparse", "shutil",
        "textwrap", "decimal", "fractions", "uuid", "threading", "multiprocessing", "socket", "struct",
    ]
    .into_iter()
    .collect()
});

static IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:import\s+([\w\.]+)|from\s+([\w\.]+)\s+import)").unwrap());

/// Scan Python source for top-level imports, returning the pinned
/// requirement lines for every recognized third-party package. Unknown,
/// non-stdlib imports are passed through unpinned so `pip install` at
/// least attempts them.
pub fn python_requirements(source: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut requirements = Vec::new();
    for caps in IMPORT_RE.captures_iter(source) {
        let module = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let top_level = module.split('.').next().unwrap_or(module);
        if top_level.is_empty() || STDLIB_MODULES.contains(top_level) || !seen.insert(top_level.to_string()) {
            continue;
        }
        match KNOWN_PACKAGES.iter().find(|(name, _)| *name == top_level) {
            Some((_, pinned)) => requirements.push(pinned.to_string()),
            None => requirements.push(top_level.to_string()),
        }
    }
    requirements
}

/// Parse the first `public class Foo` or bare `class Foo` name out of Java
/// source, so the source file can be renamed to match before `javac` (which
/// requires the file name equal the public class name).
pub fn java_class_name(source: &str) -> Option<String> {
    static CLASS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?:public\s+)?class\s+(\w+)").unwrap());
    CLASS_RE.captures(source).map(|c| c[1].to_string())
}

/// The argv the container entrypoint runs, and the files to write into
/// the staging directory beforehand (relative paths, UTF-8 contents).
pub struct Recipe {
    pub files: Vec<(String, String)>,
    pub argv: Vec<String>,
}

/// Build the recipe for `language` given `source` and the already-staged
/// directory path (only used by recipes, like Go's, that need to probe
/// for an existing file before deciding whether to create one).
pub fn build(language: Language, source: &str, staging_dir: &Path) -> Recipe {
    match language {
        Language::Python => {
            let reqs = python_requirements(source);
            let mut files = vec![("main.py".to_string(), source.to_string())];
            let mut argv = vec!["sh".to_string(), "-c".to_string()];
            if reqs.is_empty() {
                argv.push("python3 main.py".to_string());
            } else {
                files.push(("requirements.txt".to_string(), reqs.join("\n")));
                argv.push(
                    "pip install --quiet --no-input -r requirements.txt 1>/dev/null && python3 main.py".to_string(),
                );
            }
            Recipe { files, argv }
        }
        Language::Javascript => Recipe {
            files: vec![("main.js".to_string(), source.to_string())],
            argv: vec!["node".to_string(), "main.js".to_string()],
        },
        Language::Go => {
            let has_mod = staging_dir.join("go.mod").exists();
            let mut files = vec![("main.go".to_string(), source.to_string())];
            if !has_mod {
                files.push(("go.mod".to_string(), "module sandboxed\n\ngo 1.22\n".to_string()));
            }
            Recipe {
                files,
                argv: vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    // Compilation diagnostics land on stdout (not just
                    // stderr) so the upstream repair loop sees them even
                    // through a wrapper that only captures stdout.
                    "go mod tidy >/dev/null 2>&1; go build -o /tmp/sandboxed_bin . 2>&1 && /tmp/sandboxed_bin"
                        .to_string(),
                ],
            }
        }
        Language::Java => {
            let class_name = java_class_name(source).unwrap_or_else(|| "Main".to_string());
            Recipe {
                files: vec![(format!("{class_name}.java"), source.to_string())],
                argv: vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    format!("javac {class_name}.java 2>&1 && java {class_name}"),
                ],
            }
        }
        Language::Rust => Recipe {
            files: vec![("main.rs".to_string(), source.to_string())],
            argv: vec![
                "sh".to_string(),
                "-c".to_string(),
                "rustc -O -o /tmp/sandboxed_bin main.rs 2>&1 && /tmp/sandboxed_bin".to_string(),
            ],
        },
        Language::Cpp => Recipe {
            files: vec![("main.cpp".to_string(), source.to_string())],
            argv: vec![
                "sh".to_string(),
                "-c".to_string(),
                "g++ -O2 -o /tmp/sandboxed_bin main.cpp 2>&1 && /tmp/sandboxed_bin".to_string(),
            ],
        },
        Language::C => Recipe {
            files: vec![("main.c".to_string(), source.to_string())],
            argv: vec![
                "sh".to_string(),
                "-c".to_string(),
                "gcc -O2 -o /tmp/sandboxed_bin main.c 2>&1 && /tmp/sandboxed_bin".to_string(),
            ],
        },
        Language::McpTool | Language::Builtin => {
            unreachable!("recipes only apply to sandboxed languages")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn python_requirements_maps_known_packages_and_skips_stdlib() {
        let source = "import os\nimport numpy as np\nfrom bs4 import BeautifulSoup\n";
        let reqs = python_requirements(source);
        assert_eq!(reqs, vec!["numpy==1.26.4".to_string(), "beautifulsoup4==4.12.3".to_string()]);
    }

    #[test]
    fn python_requirements_is_empty_when_only_stdlib_used() {
        let reqs = python_requirements("import os\nimport json\n");
        assert!(reqs.is_empty());
    }

    #[test]
    fn java_class_name_prefers_public_class() {
        let source = "package x;\npublic class Solver {\n  public static void main(String[] a) {}\n}\n";
        assert_eq!(java_class_name(source), Some("Solver".to_string()));
    }

    #[test]
    fn go_recipe_creates_go_mod_when_missing() {
        let dir = tempdir().unwrap();
        let recipe = build(Language::Go, "package main\nfunc main() {}\n", dir.path());
        assert!(recipe.files.iter().any(|(name, _)| name == "go.mod"));
    }

    #[test]
    fn go_recipe_skips_go_mod_when_present() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module x\n").unwrap();
        let recipe = build(Language::Go, "package main\nfunc main() {}\n", dir.path());
        assert!(!recipe.files.iter().any(|(name, _)| name == "go.mod"));
    }

    #[test]
    fn python_recipe_skips_requirements_file_with_no_imports() {
        let dir = tempdir().unwrap();
        let recipe = build(Language::Python, "print(2)\n", dir.path());
        assert!(!recipe.files.iter().any(|(name, _)| name == "requirements.txt"));
    }
}
