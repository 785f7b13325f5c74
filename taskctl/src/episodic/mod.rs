//! The episodic/feedback recorder. Durable, idempotent
//! per-step outcome records plus the `(task_name, language)` moving
//! averages the planner's scoring function reads back.
//!
//! Grounded in the same thin-wrapper-over-`taskstore::Store`-plus-a-
//! dedup-guard-applied-at-write-time shape `registry::Registry` uses -
//! here the guard keys on [`crate::domain::EpisodicRecord::dedup_key`]
//! instead of description overlap, so `record(outcome)` applied twice
//! for the same stable `(episode_id, step_index)` produces a single
//! feedback update.

mod embedding;
mod feedback;

pub use embedding::{fallback_embedding, FALLBACK_EMBEDDING_DIM};
pub use feedback::FeedbackStats;

use std::sync::Arc;

use taskstore::{Filter, Store};
use tracing::debug;

use crate::collab::{InMemoryVectorStore, VectorMatch, VectorStore};
use crate::domain::EpisodicRecord;
use crate::error::{Error, Result};

pub struct EpisodicRecorder {
    store: Arc<Store>,
    vector_store: Arc<dyn VectorStore>,
}

impl EpisodicRecorder {
    pub fn new(store: Arc<Store>, vector_store: Arc<dyn VectorStore>) -> Self {
        Self { store, vector_store }
    }

    /// Convenience constructor for callers with no real vector backend
    /// configured yet - the in-memory double is fine at single-control-
    /// plane scale.
    pub fn with_in_memory_vectors(store: Arc<Store>) -> Self {
        Self::new(store, Arc::new(InMemoryVectorStore::new()))
    }

    fn find_by_dedup_key(&self, dedup_key: &str) -> Result<Option<EpisodicRecord>> {
        let filters = [Filter::eq("dedup_key", dedup_key)];
        let mut matches: Vec<EpisodicRecord> =
            self.store.list(&filters).map_err(|e| Error::Internal(e.to_string()))?;
        Ok(matches.pop())
    }

    /// Persist one outcome observation. Idempotent on `(plan_id,
    /// step_index)`: a second `record()` call for the same pair
    /// returns the already-stored record unchanged instead of writing a
    /// duplicate or double-counting anything derived from it.
    pub fn record(&self, record: EpisodicRecord) -> Result<EpisodicRecord> {
        if let Some(existing) = self.find_by_dedup_key(&record.dedup_key())? {
            debug!(dedup_key = %record.dedup_key(), "EpisodicRecorder::record: idempotent hit");
            return Ok(existing);
        }
        self.store.put(&record).map_err(|e| Error::Internal(e.to_string()))?;
        Ok(record)
    }

    /// Index a record's free-form text for similarity search. Uses the
    /// caller-supplied embedding when given (a real embedder wired up
    /// through `VectorStore`'s caller), otherwise falls back to the
    /// deterministic hash projection.
    pub async fn index(&self, record: &EpisodicRecord, embedding: Option<Vec<f32>>) -> Result<()> {
        let vector = embedding.unwrap_or_else(|| fallback_embedding(&record.text));
        self.vector_store.upsert(&record.id, vector).await
    }

    /// `Record` + `Index` in one call, the common path for a fresh
    /// outcome observation.
    pub async fn record_and_index(&self, record: EpisodicRecord, embedding: Option<Vec<f32>>) -> Result<EpisodicRecord> {
        let stored = self.record(record)?;
        self.index(&stored, embedding).await?;
        Ok(stored)
    }

    pub async fn search_similar(&self, query_text: &str, limit: usize) -> Result<Vec<VectorMatch>> {
        let embedding = fallback_embedding(query_text);
        self.vector_store.search(&embedding, limit).await
    }

    pub fn get(&self, id: &str) -> Result<Option<EpisodicRecord>> {
        self.store.get(id).map_err(|e| Error::Internal(e.to_string()))
    }

    pub fn by_plan(&self, plan_id: &str) -> Result<Vec<EpisodicRecord>> {
        let filters = [Filter::eq("plan_id", plan_id)];
        self.store.list(&filters).map_err(|e| Error::Internal(e.to_string()))
    }

    /// The planner's feedback write: `(task_name, language,
    /// success, elapsed, violation count)`, folded into that pair's
    /// moving averages regardless of outcome.
    pub fn record_feedback(
        &self,
        task_name: &str,
        language: &str,
        success: bool,
        elapsed_ms: u64,
        violations: u32,
    ) -> Result<FeedbackStats> {
        feedback::record_feedback(&self.store, task_name, language, success, elapsed_ms, violations)
    }

    pub fn feedback_stats(&self, task_name: &str, language: &str) -> Result<FeedbackStats> {
        feedback::load_feedback_stats(&self.store, task_name, language)
    }
}
