//! Resource caps and host paths for the sandboxed runner (`DOCKER_*`/
//! `INPUT_FILES_DIR`/`TOOL_BIN_DIR` env vars). Mirrors
//! `broker::BrokerConfig`'s plain-value-type-plus-`#[serde(default =
//! ...)]` shape: `RunnerConfig::from_env` is the one place that reads
//! the process environment, the `Runner` itself only ever sees the
//! resolved struct.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,

    #[serde(default = "default_cpu_limit")]
    pub cpu_limit: f64,

    #[serde(default = "default_pids_limit")]
    pub pids_limit: i64,

    #[serde(default = "default_tmpfs_size_mb")]
    pub tmpfs_size_mb: u64,

    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Grace period added on top of the in-container timer before the
    /// dispatcher force-kills a run (the "caller-specified... the
    /// dispatch adds a small grace period over the in-container timer").
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,

    /// Host directory mounted read-only at `/app/input_files`.
    pub input_files_dir: Option<PathBuf>,

    /// Host directory mounted read-only at `/app/tools`.
    pub tool_bin_dir: Option<PathBuf>,
}

fn default_memory_limit_mb() -> u64 {
    512
}
fn default_cpu_limit() -> f64 {
    1.0
}
fn default_pids_limit() -> i64 {
    256
}
fn default_tmpfs_size_mb() -> u64 {
    128
}
fn default_timeout_secs() -> u64 {
    600
}
fn default_grace_secs() -> u64 {
    10
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            memory_limit_mb: default_memory_limit_mb(),
            cpu_limit: default_cpu_limit(),
            pids_limit: default_pids_limit(),
            tmpfs_size_mb: default_tmpfs_size_mb(),
            default_timeout_secs: default_timeout_secs(),
            grace_secs: default_grace_secs(),
            input_files_dir: None,
            tool_bin_dir: None,
        }
    }
}

impl RunnerConfig {
    /// Resolve from the `DOCKER_*`/`INPUT_FILES_DIR`/`TOOL_BIN_DIR` env
    /// vars, falling back to the defaults above for any variable that's
    /// unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("DOCKER_MEMORY_LIMIT")
            && let Ok(parsed) = v.parse()
        {
            config.memory_limit_mb = parsed;
        }
        if let Ok(v) = std::env::var("DOCKER_CPU_LIMIT")
            && let Ok(parsed) = v.parse()
        {
            config.cpu_limit = parsed;
        }
        if let Ok(v) = std::env::var("DOCKER_PIDS_LIMIT")
            && let Ok(parsed) = v.parse()
        {
            config.pids_limit = parsed;
        }
        if let Ok(v) = std::env::var("DOCKER_TMPFS_SIZE")
            && let Ok(parsed) = v.parse()
        {
            config.tmpfs_size_mb = parsed;
        }
        config.input_files_dir = std::env::var("INPUT_FILES_DIR").ok().map(PathBuf::from);
        config.tool_bin_dir = std::env::var("TOOL_BIN_DIR").ok().map(PathBuf::from);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = RunnerConfig::default();
        assert_eq!(config.memory_limit_mb, 512);
        assert_eq!(config.cpu_limit, 1.0);
        assert_eq!(config.pids_limit, 256);
        assert_eq!(config.tmpfs_size_mb, 128);
        assert_eq!(config.default_timeout_secs, 600);
    }
}
