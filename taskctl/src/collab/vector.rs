//! `VectorStore` - the similarity-search collaborator behind the episodic
//! recorder's indexing step. Production vector backends are out of
//! scope; the in-memory double does brute-force cosine similarity, which
//! is fine at the scale a single control plane's episodic memory reaches.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub score: f64,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, id: &str, embedding: Vec<f32>) -> Result<(), Error>;
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<VectorMatch>, Error>;
}

#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    vectors: Mutex<Vec<(String, Vec<f32>)>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, id: &str, embedding: Vec<f32>) -> Result<(), Error> {
        let mut vectors = self.vectors.lock().await;
        if let Some(entry) = vectors.iter_mut().find(|(existing, _)| existing == id) {
            entry.1 = embedding;
        } else {
            vectors.push((id.to_string(), embedding));
        }
        Ok(())
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<VectorMatch>, Error> {
        let vectors = self.vectors.lock().await;
        let mut scored: Vec<VectorMatch> = vectors
            .iter()
            .map(|(id, vec)| VectorMatch { id: id.clone(), score: cosine_similarity(embedding, vec) })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}
