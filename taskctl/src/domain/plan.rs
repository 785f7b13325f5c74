//! Plan: a scored, ordered sequence of capability invocations produced by
//! the planner and handed to the orchestrator as-is. Plans are
//! immutable once selected — the orchestrator executes the exact step
//! sequence a plan was selected with, never mutates it mid-flight.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskstore::{now_ms, IndexValue, Record};

use super::id::generate_id;

/// One invocation within a plan: which capability, with what inputs, and
/// which earlier steps (by index) it depends on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub capability_id: String,
    pub inputs: HashMap<String, Value>,
    pub depends_on: Vec<usize>,
}

impl PlanStep {
    pub fn new(capability_id: impl Into<String>) -> Self {
        Self {
            capability_id: capability_id.into(),
            inputs: HashMap::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn with_input(mut self, key: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(key.into(), value);
        self
    }

    pub fn depending_on(mut self, indices: Vec<usize>) -> Self {
        self.depends_on = indices;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub goal_description: String,
    pub steps: Vec<PlanStep>,
    /// Aggregate score: confidence x feedback multiplier x principles
    /// compliance, per the `SelectBest` ordering.
    pub score: f64,
    pub selected: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Plan {
    pub fn new(goal_description: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        let goal_description = goal_description.into();
        let now = now_ms();
        Self {
            id: generate_id("plan", &goal_description),
            goal_description,
            steps,
            score: 0.0,
            selected: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    /// Marks this plan as the one chosen to execute. No field may change
    /// after this without constructing a fresh `Plan`.
    pub fn select(&mut self) {
        self.selected = true;
        self.updated_at = now_ms();
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Steps whose dependencies are all in `completed`, in declaration order.
    pub fn ready_steps(&self, completed: &[usize]) -> Vec<usize> {
        self.steps
            .iter()
            .enumerate()
            .filter(|(i, step)| {
                !completed.contains(i) && step.depends_on.iter().all(|d| completed.contains(d))
            })
            .map(|(i, _)| i)
            .collect()
    }
}

impl Record for Plan {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "plans"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert(
            "selected".to_string(),
            IndexValue::Str(self.selected.to_string()),
        );
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_plan_has_generated_id_and_is_unselected() {
        let plan = Plan::new("summarize the quarterly report", vec![PlanStep::new("cap-1")]);
        assert!(plan.id.contains("-plan-"));
        assert!(!plan.selected);
        assert_eq!(plan.step_count(), 1);
    }

    #[test]
    fn select_flips_flag_and_bumps_updated_at() {
        let mut plan = Plan::new("x", vec![]);
        let before = plan.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(1));
        plan.select();
        assert!(plan.selected);
        assert!(plan.updated_at >= before);
    }

    #[test]
    fn ready_steps_respects_dependencies() {
        let plan = Plan::new(
            "build then deploy",
            vec![
                PlanStep::new("cap-build"),
                PlanStep::new("cap-deploy").depending_on(vec![0]),
            ],
        );
        assert_eq!(plan.ready_steps(&[]), vec![0]);
        assert_eq!(plan.ready_steps(&[0]), vec![1]);
    }
}
