//! Broker configuration (, env-var table).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Cooperative worker slots serving both classes.
    #[serde(default = "default_worker_slots")]
    pub worker_slots: usize,

    #[serde(default = "default_high_capacity")]
    pub high_capacity: usize,

    #[serde(default = "default_low_capacity")]
    pub low_capacity: usize,

    /// LOW utilization at/above which new LOW tickets are rejected and
    /// queued ones skipped.
    #[serde(default = "default_throttle_disable")]
    pub throttle_disable: f64,

    /// LOW utilization at/below which the throttle flag clears.
    #[serde(default = "default_throttle_enable")]
    pub throttle_enable: f64,

    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,

    /// TTL for token-usage accounting records, in seconds.
    #[serde(default = "default_token_usage_ttl_secs")]
    pub token_usage_ttl_secs: i64,

    /// `DISABLE_BACKGROUND_LLM`: a hard-off switch for the LOW class,
    /// independent of the utilization-driven auto-throttle. Starts the
    /// broker with LOW already throttled and never lets the monitor clear
    /// it.
    #[serde(default)]
    pub disable_low_priority: bool,
}

fn default_worker_slots() -> usize {
    2
}

fn default_high_capacity() -> usize {
    100
}

fn default_low_capacity() -> usize {
    50
}

fn default_throttle_disable() -> f64 {
    0.90
}

fn default_throttle_enable() -> f64 {
    0.50
}

fn default_sample_interval_secs() -> u64 {
    10
}

fn default_token_usage_ttl_secs() -> i64 {
    24 * 60 * 60
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            worker_slots: default_worker_slots(),
            high_capacity: default_high_capacity(),
            low_capacity: default_low_capacity(),
            throttle_disable: default_throttle_disable(),
            throttle_enable: default_throttle_enable(),
            sample_interval_secs: default_sample_interval_secs(),
            token_usage_ttl_secs: default_token_usage_ttl_secs(),
            disable_low_priority: false,
        }
    }
}

impl BrokerConfig {
    /// Resolve from the `LLM_*`/`DISABLE_BACKGROUND_LLM` env vars,
    /// falling back to the defaults above for anything unset or
    /// unparseable. The one place that reads the process environment for
    /// this component.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("LLM_MAX_CONCURRENT_REQUESTS")
            && let Ok(parsed) = v.parse()
        {
            config.worker_slots = parsed;
        }
        if let Ok(v) = std::env::var("LLM_MAX_HIGH_PRIORITY_QUEUE")
            && let Ok(parsed) = v.parse()
        {
            config.high_capacity = parsed;
        }
        if let Ok(v) = std::env::var("LLM_MAX_LOW_PRIORITY_QUEUE")
            && let Ok(parsed) = v.parse()
        {
            config.low_capacity = parsed;
        }
        if let Ok(v) = std::env::var("LLM_AUTO_DISABLE_THRESHOLD")
            && let Ok(parsed) = v.parse()
        {
            config.throttle_disable = parsed;
        }
        if let Ok(v) = std::env::var("LLM_AUTO_ENABLE_THRESHOLD")
            && let Ok(parsed) = v.parse()
        {
            config.throttle_enable = parsed;
        }
        config.disable_low_priority = std::env::var("DISABLE_BACKGROUND_LLM")
            .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(false);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = BrokerConfig::default();
        assert_eq!(config.worker_slots, 2);
        assert_eq!(config.high_capacity, 100);
        assert_eq!(config.low_capacity, 50);
        assert_eq!(config.throttle_disable, 0.90);
        assert_eq!(config.throttle_enable, 0.50);
        assert_eq!(config.sample_interval_secs, 10);
    }
}
