//! Per-`(task_name, language)` moving averages the planner's scoring
//! function reads back as its feedback multiplier.
//!
//! Stored as one JSON blob per key rather than individual `kv_incr`
//! counters, since `mean_latency_ms` isn't itself incrementable - it has
//! to be recomputed from the running sum each write, the same reason
//! `llm::TokenUsage::cost_usd` derives its result from stored components
//! instead of storing the derived value directly.

use serde::{Deserialize, Serialize};
use taskstore::{now_ms, Store};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackStats {
    pub total_executions: u64,
    pub successes: u64,
    pub total_elapsed_ms: u64,
    pub total_violations: u64,
    pub last_execution_ms: i64,
}

impl FeedbackStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_executions == 0 {
            return 0.0;
        }
        self.successes as f64 / self.total_executions as f64
    }

    pub fn mean_latency_ms(&self) -> f64 {
        if self.total_executions == 0 {
            return 0.0;
        }
        self.total_elapsed_ms as f64 / self.total_executions as f64
    }

    pub fn violation_rate(&self) -> f64 {
        if self.total_executions == 0 {
            return 0.0;
        }
        (self.total_violations as f64 / self.total_executions as f64).min(1.0)
    }

    /// The scoring term: recent success rate x mean inverse
    /// execution time x (1 - violation rate). A brand-new `(task_name,
    /// language)` pair with no history yet is neutral (`1.0`) rather
    /// than zero - untried capabilities would otherwise never be
    /// selectable over anything with a track record, which would starve
    /// every freshly-registered capability (including a pre-seeded
    /// cached-code entry that has never run).
    pub fn feedback_multiplier(&self) -> f64 {
        if self.total_executions == 0 {
            return 1.0;
        }
        let mean_latency_secs = (self.mean_latency_ms() / 1000.0).max(0.001);
        self.success_rate() * (1.0 / mean_latency_secs).min(10.0) * (1.0 - self.violation_rate())
    }
}

fn feedback_key(task_name: &str, language: &str) -> String {
    format!("metrics:feedback:{task_name}:{language}")
}

/// Read the current moving averages for `(task_name, language)`,
/// defaulting to all-zero stats when nothing has been recorded yet.
pub fn load_feedback_stats(store: &Store, task_name: &str, language: &str) -> Result<FeedbackStats> {
    let key = feedback_key(task_name, language);
    match store.kv_get(&key).map_err(|e| Error::Internal(e.to_string()))? {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| Error::Internal(e.to_string())),
        None => Ok(FeedbackStats::default()),
    }
}

/// Fold one more execution outcome into `(task_name, language)`'s
/// moving averages and persist the result. After every execution,
/// regardless of outcome, this updates the moving-average aggregates
/// and also bumps the global `metrics:*` scalars.
pub fn record_feedback(
    store: &Store,
    task_name: &str,
    language: &str,
    success: bool,
    elapsed_ms: u64,
    violations: u32,
) -> Result<FeedbackStats> {
    let mut stats = load_feedback_stats(store, task_name, language)?;
    stats.total_executions += 1;
    if success {
        stats.successes += 1;
    }
    stats.total_elapsed_ms += elapsed_ms;
    stats.total_violations += violations as u64;
    stats.last_execution_ms = now_ms();

    let raw = serde_json::to_string(&stats).map_err(|e| Error::Internal(e.to_string()))?;
    store
        .kv_set(&feedback_key(task_name, language), &raw, None)
        .map_err(|e| Error::Internal(e.to_string()))?;

    record_global_metrics(store, success, elapsed_ms)?;
    Ok(stats)
}

fn record_global_metrics(store: &Store, success: bool, elapsed_ms: u64) -> Result<()> {
    let total = store
        .kv_incr("metrics:total_executions", 1)
        .map_err(|e| Error::Internal(e.to_string()))?;
    if success {
        store
            .kv_incr("metrics:successful_executions", 1)
            .map_err(|e| Error::Internal(e.to_string()))?;
    }
    // Recompute the running mean from the running sum rather than
    // incrementing, same reasoning as `FeedbackStats::mean_latency_ms`.
    let sum = store
        .kv_incr("metrics:total_execution_time_ms", elapsed_ms as i64)
        .map_err(|e| Error::Internal(e.to_string()))?;
    let avg = sum as f64 / total.max(1) as f64;
    store
        .kv_set("metrics:avg_execution_time", &avg.to_string(), None)
        .map_err(|e| Error::Internal(e.to_string()))?;
    store
        .kv_set("metrics:last_execution", &now_ms().to_string(), None)
        .map_err(|e| Error::Internal(e.to_string()))?;
    Ok(())
}
