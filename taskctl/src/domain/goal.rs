//! Goal: the transient input to the planner. Goals are never
//! persisted on their own — they exist only for the duration of a
//! `GeneratePlans` call and are folded into the resulting [`super::plan::Plan`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub description: String,
    pub context: HashMap<String, Value>,
    /// Optional hint steering hierarchical-template matching.
    pub template_hint: Option<String>,
}

impl Goal {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            context: HashMap::new(),
            template_hint: None,
        }
    }

    pub fn with_context_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn with_template_hint(mut self, hint: impl Into<String>) -> Self {
        self.template_hint = Some(hint.into());
        self
    }
}
