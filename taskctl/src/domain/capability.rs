//! Capability: anything invocable the planner may schedule.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskstore::{now_ms, IndexValue, Record};

use super::id::generate_id;
use super::language::Language;

/// Safety classification carried alongside a capability so the router's
/// safety gate can reason about it without re-deriving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyLevel {
    Safe,
    Caution,
    Restricted,
}

impl Default for SafetyLevel {
    fn default() -> Self {
        SafetyLevel::Safe
    }
}

/// How a capability is actually invoked: a closed tagged-variant shape
/// (`{CachedCode, Tool, LearnedMethod}`), dispatched on at the
/// orchestrator's step boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapabilityKind {
    CachedCode {
        source: String,
        content_hash: String,
    },
    Tool {
        /// Shell command or container image the tool dispatches to.
        invocation: String,
    },
    LearnedMethod {
        /// Ordered subtask names; expanded recursively by the planner.
        subtasks: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub id: String,
    pub task_name: String,
    pub description: String,
    pub language: Language,
    pub entrypoint: String,
    /// Named parameters to their declared type (e.g. `"n" -> "int"`).
    pub input_signature: HashMap<String, String>,
    /// Named effects the capability produces.
    pub outputs: HashMap<String, String>,
    pub preconditions: Vec<String>,
    pub effects: HashMap<String, Value>,
    pub confidence: f64,
    pub tags: Vec<String>,
    pub safety_level: SafetyLevel,
    pub kind: CapabilityKind,
    pub created_at: i64,
    pub last_used_at: i64,
    pub updated_at: i64,
}

impl Capability {
    pub fn new(task_name: impl Into<String>, language: Language, kind: CapabilityKind) -> Self {
        let task_name = task_name.into();
        let now = now_ms();
        Self {
            id: generate_id("capability", &task_name),
            description: String::new(),
            entrypoint: String::new(),
            input_signature: HashMap::new(),
            outputs: HashMap::new(),
            preconditions: Vec::new(),
            effects: HashMap::new(),
            confidence: 0.5,
            tags: Vec::new(),
            safety_level: SafetyLevel::default(),
            kind,
            created_at: now,
            last_used_at: now,
            updated_at: now,
            task_name,
            language,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.entrypoint = entrypoint.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn mark_used(&mut self) {
        self.last_used_at = now_ms();
        self.updated_at = self.last_used_at;
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self.kind, CapabilityKind::LearnedMethod { .. })
    }

    pub fn subtasks(&self) -> &[String] {
        match &self.kind {
            CapabilityKind::LearnedMethod { subtasks } => subtasks,
            _ => &[],
        }
    }
}

impl Record for Capability {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "capabilities"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("task_name".to_string(), IndexValue::Str(self.task_name.clone()));
        fields.insert(
            "language".to_string(),
            IndexValue::Str(self.language.as_str().to_string()),
        );
        fields.insert(
            "kind".to_string(),
            IndexValue::Str(
                match &self.kind {
                    CapabilityKind::CachedCode { .. } => "cached_code",
                    CapabilityKind::Tool { .. } => "tool",
                    CapabilityKind::LearnedMethod { .. } => "learned_method",
                }
                .to_string(),
            ),
        );
        fields.insert("tags".to_string(), IndexValue::Tags(self.tags.clone()));
        fields
    }
}
