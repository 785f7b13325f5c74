//! CachedCode: a previously generated and verified code artifact,
//! keyed by content hash so the code generator can short-circuit
//! generation when a dedupe-equivalent capability already exists in
//! the registry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use taskstore::{now_ms, IndexValue, Record};

use super::id::generate_id;
use super::language::Language;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedCode {
    pub id: String,
    pub task_name: String,
    pub description: String,
    pub language: Language,
    pub source: String,
    pub content_hash: String,
    pub tags: Vec<String>,
    /// False once a capability built from this source has been marked
    /// unsafe or superseded; excluded from future cache lookups.
    pub executable: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CachedCode {
    pub fn new(task_name: impl Into<String>, language: Language, source: impl Into<String>) -> Self {
        let task_name = task_name.into();
        let source = source.into();
        let content_hash = hash_source(&source);
        let now = now_ms();
        Self {
            id: generate_id("cached-code", &task_name),
            description: String::new(),
            content_hash,
            source,
            tags: Vec::new(),
            executable: true,
            created_at: now,
            updated_at: now,
            task_name,
            language,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn mark_unexecutable(&mut self) {
        self.executable = false;
        self.updated_at = now_ms();
    }
}

fn hash_source(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Record for CachedCode {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "cached_code"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("task_name".to_string(), IndexValue::Str(self.task_name.clone()));
        fields.insert(
            "language".to_string(),
            IndexValue::Str(self.language.as_str().to_string()),
        );
        fields.insert(
            "content_hash".to_string(),
            IndexValue::Str(self.content_hash.clone()),
        );
        fields.insert("tags".to_string(), IndexValue::Tags(self.tags.clone()));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_cached_code_derives_stable_content_hash() {
        let a = CachedCode::new("first_primes", Language::Python, "print(2)");
        let b = CachedCode::new("first_primes", Language::Python, "print(2)");
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.content_hash.len(), 64);
    }

    #[test]
    fn different_source_yields_different_hash() {
        let a = CachedCode::new("x", Language::Python, "print(1)");
        let b = CachedCode::new("x", Language::Python, "print(2)");
        assert_ne!(a.content_hash, b.content_hash);
    }

    #[test]
    fn mark_unexecutable_flips_flag() {
        let mut cc = CachedCode::new("x", Language::Go, "package main");
        assert!(cc.executable);
        cc.mark_unexecutable();
        assert!(!cc.executable);
    }
}
