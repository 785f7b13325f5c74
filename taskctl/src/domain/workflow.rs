//! WorkflowExecution: the orchestrator's runtime record of a plan being
//! carried out. One `WorkflowExecution` tracks exactly one
//! selected [`super::plan::Plan`] through `pending -> running ->
//! {completed | failed | cancelled}`, with `running <-> paused` as the
//! only reversible edge.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskstore::{now_ms, IndexValue, Record};

use super::id::generate_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result recorded for a single completed plan step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_index: usize,
    pub succeeded: bool,
    pub output: Value,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: String,
    pub plan_id: String,
    pub status: WorkflowStatus,
    pub step_results: Vec<StepResult>,
    pub context: Value,
    pub terminal_error: Option<String>,
    /// Whether `terminal_error` is worth a repair-retry at the router
    /// (a code-generation or transport-class failure) versus a terminal
    /// failure reported as-is (e.g. a tool invocation error). Set by
    /// whatever called `fail()`; never inferred from the error text.
    pub terminal_retryable: bool,
    /// Opaque token a `Resume` call hands back to the orchestrator to
    /// continue a paused workflow from the right step.
    pub resume_token: Option<String>,
    pub started_at: i64,
    pub last_activity: i64,
    pub updated_at: i64,
}

impl WorkflowExecution {
    pub fn new(plan_id: impl Into<String>) -> Self {
        let plan_id = plan_id.into();
        let now = now_ms();
        Self {
            id: generate_id("workflow", &plan_id),
            plan_id,
            status: WorkflowStatus::Pending,
            step_results: Vec::new(),
            context: Value::Null,
            terminal_error: None,
            terminal_retryable: false,
            resume_token: None,
            started_at: now,
            last_activity: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        let now = now_ms();
        self.last_activity = now;
        self.updated_at = now;
    }

    pub fn start(&mut self) {
        self.status = WorkflowStatus::Running;
        self.touch();
    }

    pub fn pause(&mut self, resume_token: impl Into<String>) {
        self.status = WorkflowStatus::Paused;
        self.resume_token = Some(resume_token.into());
        self.touch();
    }

    pub fn resume(&mut self) {
        self.status = WorkflowStatus::Running;
        self.resume_token = None;
        self.touch();
    }

    pub fn record_step(&mut self, result: StepResult) {
        self.step_results.push(result);
        self.touch();
    }

    pub fn fail(&mut self, error: impl Into<String>, retryable: bool) {
        self.status = WorkflowStatus::Failed;
        self.terminal_error = Some(error.into());
        self.terminal_retryable = retryable;
        self.touch();
    }

    pub fn cancel(&mut self) {
        self.status = WorkflowStatus::Cancelled;
        self.touch();
    }

    pub fn complete(&mut self) {
        self.status = WorkflowStatus::Completed;
        self.touch();
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }

    pub fn is_resumable(&self) -> bool {
        self.status == WorkflowStatus::Paused
    }
}

impl Record for WorkflowExecution {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "workflow_executions"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), IndexValue::Str(self.status.to_string()));
        fields.insert("plan_id".to_string(), IndexValue::Str(self.plan_id.clone()));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_workflow_is_pending() {
        let wf = WorkflowExecution::new("plan-1");
        assert_eq!(wf.status, WorkflowStatus::Pending);
        assert!(wf.step_results.is_empty());
    }

    #[test]
    fn pause_resume_round_trips_status_and_token() {
        let mut wf = WorkflowExecution::new("plan-1");
        wf.start();
        wf.pause("resume-token-abc");
        assert!(wf.is_resumable());
        assert_eq!(wf.resume_token.as_deref(), Some("resume-token-abc"));

        wf.resume();
        assert_eq!(wf.status, WorkflowStatus::Running);
        assert!(wf.resume_token.is_none());
    }

    #[test]
    fn terminal_states_cannot_be_resumed() {
        let mut wf = WorkflowExecution::new("plan-1");
        wf.start();
        wf.fail("runner exited non-zero", false);
        assert!(wf.is_terminal());
        assert!(!wf.is_resumable());
        assert_eq!(wf.terminal_error.as_deref(), Some("runner exited non-zero"));
        assert!(!wf.terminal_retryable);
    }

    #[test]
    fn record_step_appends_results() {
        let mut wf = WorkflowExecution::new("plan-1");
        wf.record_step(StepResult {
            step_index: 0,
            succeeded: true,
            output: Value::Null,
            error: None,
        });
        assert_eq!(wf.step_results.len(), 1);
    }
}
