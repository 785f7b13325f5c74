//! EpisodicRecord: one outcome observation fed back to the episodic
//! recorder after a plan step or workflow finishes. The planner's feedback
//! multiplier and the episodic moving averages are both computed
//! over these records, never over raw workflow state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskstore::{now_ms, IndexValue, Record};

use super::id::generate_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Partial,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Partial => write!(f, "partial"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicRecord {
    pub id: String,
    pub session_id: String,
    pub plan_id: String,
    pub step_index: usize,
    pub outcome: Outcome,
    /// Scalar reward signal consumed by the feedback multiplier; sign and
    /// magnitude convention is left to the planner's scoring function.
    pub reward: f64,
    pub tags: Vec<String>,
    pub text: String,
    pub metadata: HashMap<String, Value>,
    pub timestamp: i64,
}

impl EpisodicRecord {
    pub fn new(session_id: impl Into<String>, plan_id: impl Into<String>, step_index: usize, outcome: Outcome) -> Self {
        let session_id = session_id.into();
        let plan_id = plan_id.into();
        Self {
            id: generate_id("episode", &format!("{}-{}", plan_id, step_index)),
            reward: match outcome {
                Outcome::Success => 1.0,
                Outcome::Partial => 0.5,
                Outcome::Failure => 0.0,
            },
            tags: Vec::new(),
            text: String::new(),
            metadata: HashMap::new(),
            timestamp: now_ms(),
            session_id,
            plan_id,
            step_index,
            outcome,
        }
    }

    pub fn with_reward(mut self, reward: f64) -> Self {
        self.reward = reward;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Stable dedup key for the idempotent-write guarantee: repeated
    /// writes for the same `(episode_id, step_index)` must not double
    /// count toward the moving averages.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.plan_id, self.step_index)
    }
}

impl Record for EpisodicRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.timestamp
    }

    fn collection_name() -> &'static str {
        "episodic_records"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("plan_id".to_string(), IndexValue::Str(self.plan_id.clone()));
        fields.insert(
            "outcome".to_string(),
            IndexValue::Str(self.outcome.to_string()),
        );
        fields.insert("tags".to_string(), IndexValue::Tags(self.tags.clone()));
        // Lets the recorder look up an existing write by `(plan_id, step_index)`
        // before inserting, which is what makes `record()` idempotent: applying
        // the same outcome twice produces a single feedback update.
        fields.insert("dedup_key".to_string(), IndexValue::Str(self.dedup_key()));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_derives_default_reward_from_outcome() {
        let success = EpisodicRecord::new("sess-1", "plan-1", 0, Outcome::Success);
        assert_eq!(success.reward, 1.0);

        let failure = EpisodicRecord::new("sess-1", "plan-1", 1, Outcome::Failure);
        assert_eq!(failure.reward, 0.0);
    }

    #[test]
    fn dedup_key_is_stable_per_plan_and_step() {
        let a = EpisodicRecord::new("sess-1", "plan-1", 2, Outcome::Partial);
        let b = EpisodicRecord::new("sess-2", "plan-1", 2, Outcome::Success);
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn with_reward_overrides_the_default() {
        let rec = EpisodicRecord::new("sess-1", "plan-1", 0, Outcome::Partial).with_reward(0.75);
        assert_eq!(rec.reward, 0.75);
    }
}
