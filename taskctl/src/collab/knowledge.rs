//! `KnowledgeGraph` - the collaborator behind the "MCP-proxied knowledge
//! queries" seed tool. A production implementation would proxy to an
//! external MCP knowledge server; that's out of scope here, so only the
//! trait and a conservative in-memory double are provided.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Error;

#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    /// Answer a free-text question, returning zero or more relevant facts.
    /// An empty result means "no knowledge available", not an error.
    async fn query(&self, question: &str) -> Result<Vec<String>, Error>;
}

/// Exact keyword-indexed lookup. Never fabricates an answer: a question
/// whose words don't match any seeded fact returns an empty vec.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKnowledgeGraph {
    facts: HashMap<String, Vec<String>>,
}

impl InMemoryKnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&mut self, keyword: impl Into<String>, fact: impl Into<String>) -> &mut Self {
        self.facts.entry(keyword.into().to_lowercase()).or_default().push(fact.into());
        self
    }
}

#[async_trait]
impl KnowledgeGraph for InMemoryKnowledgeGraph {
    async fn query(&self, question: &str) -> Result<Vec<String>, Error> {
        let lower = question.to_lowercase();
        let mut matches = Vec::new();
        for (keyword, facts) in &self.facts {
            if lower.contains(keyword.as_str()) {
                matches.extend(facts.iter().cloned());
            }
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unseeded_question_returns_nothing() {
        let kg = InMemoryKnowledgeGraph::new();
        let result = kg.query("what is the airspeed velocity of a swallow").await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn seeded_keyword_is_matched_case_insensitively() {
        let mut kg = InMemoryKnowledgeGraph::new();
        kg.seed("rust", "Rust 1.0 shipped in 2015.");
        let result = kg.query("When did RUST ship?").await.unwrap();
        assert_eq!(result, vec!["Rust 1.0 shipped in 2015.".to_string()]);
    }
}
