//! Root configuration. Every component's configuration is a plain value
//! type constructed from the environment; components never read the
//! process environment directly.
//!
//! Each subsystem owns its own `from_env()` (`BrokerConfig::from_env`,
//! `RunnerConfig::from_env`) so its defaults live next to the component
//! that uses them; `Config::from_env` is the one place that composes all
//! of them plus the handful of env vars no single component owns
//! (storage location, collaborator endpoints, the domain scope).

use eyre::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::broker::BrokerConfig;
use crate::runner::RunnerConfig;

/// LLM provider configuration. Only "anthropic" has a grounded client
/// (`llm::AnthropicClient`); `provider`/`model`/`base_url` stay
/// configurable so a future provider only has to extend
/// `llm::create_client`'s match, not this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    /// Name of the environment variable holding the API key - not the
    /// key itself, so config can be logged or checked into version
    /// control without leaking a secret.
    pub api_key_env: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 300_000,
        }
    }
}

/// Where durable state (the capability/code/workflow/episodic/metrics
/// records, all routed through `taskstore::Store`) lives on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { dir: PathBuf::from(".taskctl/store") }
    }
}

/// Thin-interface collaborator endpoints: the core never dials these
/// itself - no production `VectorStore`/`KnowledgeGraph`/
/// `PrinciplesService` implementation is provided (see `collab/`) - but
/// the URLs are still resolved here so a caller wiring up a real client
/// has them to hand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorConfig {
    pub redis_url: Option<String>,
    pub weaviate_url: Option<String>,
    pub neo4j_url: Option<String>,
    pub principles_url: Option<String>,
}

fn default_domain() -> String {
    crate::registry::default_domain().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub broker: BrokerConfig,
    pub runner: RunnerConfig,
    pub storage: StorageConfig,
    pub collaborators: CollaboratorConfig,
    /// The `(task_name, domain)`/`(type, domain)` scope every registry,
    /// planner, and orchestrator lookup is implicitly filtered to.
    pub domain: String,
    /// `USE_ASYNC_LLM_QUEUE`. The core has no synchronous legacy
    /// path to select away from - every completion goes through
    /// `Broker` regardless - so this is carried for config-surface
    /// parity with the env table and otherwise unread.
    pub use_async_queue: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            broker: BrokerConfig::default(),
            runner: RunnerConfig::default(),
            storage: StorageConfig::default(),
            collaborators: CollaboratorConfig::default(),
            domain: default_domain(),
            use_async_queue: true,
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("taskctl").join("taskctl.yml"))
}

impl Config {
    /// Load configuration: an explicit `--config` path if given, else
    /// `~/.config/taskctl/taskctl.yml` if it exists, else pure env/default
    /// resolution. A YAML file only needs to set the fields it wants to
    /// override - anything else falls back through `#[serde(default)]`.
    pub fn load(explicit_path: Option<&std::path::Path>) -> Result<Self> {
        let path = explicit_path.map(PathBuf::from).or_else(default_config_path);
        let Some(path) = path.filter(|p| p.exists()) else {
            return Ok(Self::from_env());
        };
        let contents = std::fs::read_to_string(&path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve every subsystem's config from the process environment
    ///. This is the only function in the crate that calls
    /// `std::env::var` outside of a subsystem's own `from_env`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.broker = BrokerConfig::from_env();
        config.runner = RunnerConfig::from_env();
        if let Ok(dir) = std::env::var("TASKCTL_STORE_DIR") {
            config.storage.dir = PathBuf::from(dir);
        }
        if let Ok(domain) = std::env::var("TASKCTL_DOMAIN") {
            config.domain = domain;
        }
        config.collaborators.redis_url = std::env::var("REDIS_URL").ok();
        config.collaborators.weaviate_url = std::env::var("WEAVIATE_URL").ok();
        config.collaborators.neo4j_url = std::env::var("NEO4J_URL").ok();
        config.collaborators.principles_url = std::env::var("PRINCIPLES_URL").ok();
        config.use_async_queue = std::env::var("USE_ASYNC_LLM_QUEUE")
            .map(|v| !matches!(v.trim(), "0" | "false" | "FALSE" | "no"))
            .unwrap_or(true);
        config
    }

    /// Fail fast on a config that can't possibly work - today, just that
    /// the LLM API key env var it names is actually set. Called from
    /// `main` before anything is constructed so a missing key surfaces
    /// as one clear message instead of the first `AnthropicClient` call
    /// erroring deep inside a workflow.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            bail!(
                "LLM API key environment variable '{}' is not set",
                self.llm.api_key_env
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let config = Config::default();
        assert_eq!(config.broker.worker_slots, 2);
        assert_eq!(config.broker.high_capacity, 100);
        assert_eq!(config.broker.low_capacity, 50);
        assert_eq!(config.runner.memory_limit_mb, 512);
        assert_eq!(config.domain, "default");
        assert!(config.use_async_queue);
    }

    #[test]
    fn validate_fails_without_api_key() {
        let mut config = Config::default();
        config.llm.api_key_env = "NONEXISTENT_TASKCTL_TEST_KEY".to_string();
        // SAFETY: single-threaded test, and this var is never set by the
        // environment this suite runs in.
        unsafe { std::env::remove_var(&config.llm.api_key_env) };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("NONEXISTENT_TASKCTL_TEST_KEY"));
    }

    #[test]
    fn from_env_reads_broker_overrides() {
        // SAFETY: single-threaded test; vars are scoped to this test only.
        unsafe {
            std::env::set_var("LLM_MAX_CONCURRENT_REQUESTS", "7");
            std::env::set_var("DISABLE_BACKGROUND_LLM", "true");
        }
        let config = Config::from_env();
        unsafe {
            std::env::remove_var("LLM_MAX_CONCURRENT_REQUESTS");
            std::env::remove_var("DISABLE_BACKGROUND_LLM");
        }
        assert_eq!(config.broker.worker_slots, 7);
        assert!(config.broker.disable_low_priority);
    }
}
