use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Language tag carried by a [`crate::domain::Capability`]/[`crate::domain::CachedCode`]
/// and consumed by the runner to pick a container recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Python,
    Javascript,
    Go,
    Java,
    Cpp,
    C,
    Rust,
    McpTool,
    Builtin,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Go => "go",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Rust => "rust",
            Language::McpTool => "mcp_tool",
            Language::Builtin => "builtin",
        }
    }

    /// Whether this language is actually dispatched to the sandboxed
    /// container runner, as opposed to being handled in-process (tools, MCP).
    pub fn is_sandboxed(&self) -> bool {
        !matches!(self, Language::McpTool | Language::Builtin)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "javascript" | "js" | "node" => Ok(Language::Javascript),
            "go" | "golang" => Ok(Language::Go),
            "java" => Ok(Language::Java),
            "cpp" | "c++" => Ok(Language::Cpp),
            "c" => Ok(Language::C),
            "rust" | "rs" => Ok(Language::Rust),
            "mcp_tool" | "mcp" => Ok(Language::McpTool),
            "builtin" => Ok(Language::Builtin),
            other => Err(format!("unknown language: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for lang in [
            Language::Python,
            Language::Javascript,
            Language::Go,
            Language::Java,
            Language::Cpp,
            Language::C,
            Language::Rust,
            Language::McpTool,
            Language::Builtin,
        ] {
            assert_eq!(lang.as_str().parse::<Language>().unwrap(), lang);
        }
    }

    #[test]
    fn sandboxed_excludes_tool_and_builtin() {
        assert!(Language::Python.is_sandboxed());
        assert!(!Language::McpTool.is_sandboxed());
        assert!(!Language::Builtin.is_sandboxed());
    }
}
