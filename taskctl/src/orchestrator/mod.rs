//! The workflow orchestrator. Drives a selected `Plan`
//! through its step DAG, dispatching each step to the sandboxed runner
//! (cached-code capabilities) or the tool executor (tool capabilities),
//! persisting every state transition to `taskstore::Store` before
//! returning, and folding each step's outcome back into the episodic
//! feedback store.
//!
//! Grounded in `runner::Runner`'s "stage, dispatch, classify" shape for
//! step execution and in `broker::dispatcher`'s `CancellationToken`-style
//! cooperative control for pause/cancel, generalized here to a per-
//! workflow flag checked at step boundaries since a workflow's steps run
//! sequentially rather than behind a worker-slot semaphore.

mod control;

pub use control::{ControlRequest, WorkflowControl, WorkflowEvent};

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::{Capability, CapabilityKind, Plan, PlanStep, StepResult, WorkflowExecution, WorkflowStatus};
use crate::error::{Error, Result};
use crate::llm::ToolCall;
use crate::planner::Planner;
use crate::registry::{default_domain, Registry};
use crate::runner::{RunRequest, Runner};
use crate::tools::{ToolContext, ToolExecutor};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Retries attempted for a single step before the workflow is failed,
    /// applied only to `Error::is_retryable` step failures.
    pub max_retries: u32,
    /// Working directory tool-kind steps execute against.
    pub workspace_root: PathBuf,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            workspace_root: std::env::temp_dir().join("taskctl-workflows"),
        }
    }
}

struct StepOutcome {
    success: bool,
    output: Value,
    error: Option<String>,
    elapsed_ms: u64,
    /// Whether this failure is worth a repair-retry at the router (a
    /// code-generation failure) rather than a terminal report. Never
    /// set for a tool invocation failure - only the code generator has
    /// a repair path.
    retryable: bool,
}

impl StepOutcome {
    fn failed(error: impl Into<String>, elapsed_ms: u64, retryable: bool) -> Self {
        Self {
            success: false,
            output: Value::Null,
            error: Some(error.into()),
            elapsed_ms,
            retryable,
        }
    }
}

pub struct Orchestrator {
    store: Arc<taskstore::Store>,
    registry: Arc<Registry>,
    runner: Arc<Runner>,
    tools: Arc<ToolExecutor>,
    planner: Arc<Planner>,
    domain: String,
    config: OrchestratorConfig,
    controls: Mutex<std::collections::HashMap<String, Arc<WorkflowControl>>>,
    active: Mutex<HashSet<String>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<taskstore::Store>,
        registry: Arc<Registry>,
        runner: Arc<Runner>,
        tools: Arc<ToolExecutor>,
        planner: Arc<Planner>,
    ) -> Self {
        Self {
            store,
            registry,
            runner,
            tools,
            planner,
            domain: default_domain().to_string(),
            config: OrchestratorConfig::default(),
            controls: Mutex::new(std::collections::HashMap::new()),
            active: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Create a `pending` workflow execution for `plan` and persist it,
    /// without driving any steps. Returns the concrete workflow id
    /// callers need for `pause`/`cancel`/`subscribe`.
    pub fn enqueue(&self, plan: &Plan) -> Result<WorkflowExecution> {
        let wf = WorkflowExecution::new(plan.id.clone());
        self.persist(&wf)?;
        debug!(workflow_id = %wf.id, plan_id = %plan.id, "Orchestrator::enqueue: created pending workflow");
        Ok(wf)
    }

    /// `Start`: enqueue then drive to completion, pause, or failure.
    pub async fn start(&self, plan: &Plan) -> Result<WorkflowExecution> {
        let wf = self.enqueue(plan)?;
        self.run(plan, &wf.id).await
    }

    /// `Status`.
    pub fn status(&self, workflow_id: &str) -> Result<WorkflowStatus> {
        Ok(self.details(workflow_id)?.status)
    }

    /// `Details`.
    pub fn details(&self, workflow_id: &str) -> Result<WorkflowExecution> {
        self.store
            .get(workflow_id)
            .map_err(|e| Error::Internal(e.to_string()))?
            .ok_or_else(|| Error::not_found("workflow_execution", workflow_id))
    }

    /// `Pause`: request cooperative pause. Takes effect at the next step
    /// boundary of whichever `run`/`start`/`resume` call is driving this
    /// workflow - including the very next one, if none is driving it yet.
    pub fn pause(&self, workflow_id: &str) -> Result<()> {
        self.ensure_not_terminal(workflow_id)?;
        self.control_for(workflow_id).request_pause();
        Ok(())
    }

    /// `Cancel`: same cooperative contract as `pause`.
    pub fn cancel(&self, workflow_id: &str) -> Result<()> {
        self.ensure_not_terminal(workflow_id)?;
        self.control_for(workflow_id).request_cancel();
        Ok(())
    }

    fn ensure_not_terminal(&self, workflow_id: &str) -> Result<WorkflowExecution> {
        let wf = self.details(workflow_id)?;
        if wf.is_terminal() {
            return Err(Error::validation(format!("workflow {workflow_id} is already terminal")));
        }
        Ok(wf)
    }

    /// `Resume`: only valid from `paused`.
    pub async fn resume(&self, plan: &Plan, workflow_id: &str) -> Result<WorkflowExecution> {
        let wf = self.details(workflow_id)?;
        if wf.status != WorkflowStatus::Paused {
            return Err(Error::validation(format!("workflow {workflow_id} is not paused")));
        }
        self.run(plan, workflow_id).await
    }

    /// `Resume` for a caller that only has the workflow id, e.g. the CLI:
    /// looks up the paused workflow's `plan_id` and loads that plan from
    /// the store before resuming.
    pub async fn resume_by_id(&self, workflow_id: &str) -> Result<WorkflowExecution> {
        let wf = self.details(workflow_id)?;
        let plan: Plan = self
            .store
            .get(&wf.plan_id)
            .map_err(|e| Error::Internal(e.to_string()))?
            .ok_or_else(|| Error::not_found("plan", &wf.plan_id))?;
        self.resume(&plan, workflow_id).await
    }

    /// `Subscribe`: an event stream for a workflow's state transitions.
    pub fn subscribe(&self, workflow_id: &str) -> broadcast::Receiver<WorkflowEvent> {
        self.control_for(workflow_id).subscribe()
    }

    /// Shared entry point for `start`/`resume`: transitions a `pending`
    /// or `paused` workflow to `running` and drives it. A no-op on an
    /// already-terminal workflow (e.g. cancelled before its driver ever
    /// ran), returned as-is.
    async fn run(&self, plan: &Plan, workflow_id: &str) -> Result<WorkflowExecution> {
        let mut wf = self.details(workflow_id)?;
        if wf.is_terminal() {
            return Ok(wf);
        }

        let _guard = self.acquire_drive_guard(workflow_id)?;

        match wf.status {
            WorkflowStatus::Pending => wf.start(),
            WorkflowStatus::Paused => wf.resume(),
            WorkflowStatus::Running => {}
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled => unreachable!(),
        }
        self.persist(&wf)?;
        self.control_for(workflow_id)
            .publish(WorkflowEvent::StatusChanged { status: wf.status });

        self.drive(plan, wf).await
    }

    fn acquire_drive_guard(&self, workflow_id: &str) -> Result<DriveGuard<'_>> {
        let mut active = self.active.lock().unwrap();
        if !active.insert(workflow_id.to_string()) {
            return Err(Error::validation(format!("workflow {workflow_id} already has an active driver")));
        }
        Ok(DriveGuard { orchestrator: self, workflow_id: workflow_id.to_string() })
    }

    fn control_for(&self, workflow_id: &str) -> Arc<WorkflowControl> {
        let mut controls = self.controls.lock().unwrap();
        controls.entry(workflow_id.to_string()).or_insert_with(|| Arc::new(WorkflowControl::new())).clone()
    }

    /// The step loop: repeatedly executes whatever steps `plan.ready_steps`
    /// reports, persisting the workflow after each transition, until the
    /// plan completes, a step fails past its retry budget, or a pause/
    /// cancel request is observed.
    async fn drive(&self, plan: &Plan, mut wf: WorkflowExecution) -> Result<WorkflowExecution> {
        let control = self.control_for(&wf.id);
        let mut completed: Vec<usize> = wf.step_results.iter().filter(|r| r.succeeded).map(|r| r.step_index).collect();

        loop {
            let ready = plan.ready_steps(&completed);
            if ready.is_empty() {
                if completed.len() == plan.step_count() {
                    wf.complete();
                } else {
                    wf.fail("no ready steps remain but the plan is not fully completed", false);
                }
                self.persist(&wf)?;
                control.publish(WorkflowEvent::StatusChanged { status: wf.status });
                return Ok(wf);
            }

            for idx in ready {
                match control.take_request() {
                    ControlRequest::Cancel => {
                        wf.cancel();
                        self.persist(&wf)?;
                        control.publish(WorkflowEvent::StatusChanged { status: wf.status });
                        return Ok(wf);
                    }
                    ControlRequest::Pause => {
                        wf.pause(wf.id.clone());
                        self.persist(&wf)?;
                        control.publish(WorkflowEvent::StatusChanged { status: wf.status });
                        return Ok(wf);
                    }
                    ControlRequest::None => {}
                }

                control.publish(WorkflowEvent::StepStarted { step_index: idx });
                let step = plan.steps[idx].clone();
                let outcome = self.execute_step_with_retry(&step).await;
                wf.record_step(StepResult {
                    step_index: idx,
                    succeeded: outcome.success,
                    output: outcome.output.clone(),
                    error: outcome.error.clone(),
                });
                self.persist(&wf)?;
                control.publish(WorkflowEvent::StepCompleted { step_index: idx, succeeded: outcome.success });
                self.record_feedback(&step, &outcome);

                if !outcome.success {
                    let retryable = outcome.retryable;
                    wf.fail(outcome.error.unwrap_or_else(|| "step failed".to_string()), retryable);
                    self.persist(&wf)?;
                    control.publish(WorkflowEvent::StatusChanged { status: wf.status });
                    return Ok(wf);
                }
                completed.push(idx);
            }
        }
    }

    fn record_feedback(&self, step: &PlanStep, outcome: &StepOutcome) {
        let Ok(cap) = self.registry.get_capability(&self.domain, &step.capability_id) else {
            return;
        };
        if let Err(e) = self.planner.record_feedback(&cap.task_name, cap.language.as_str(), outcome.success, outcome.elapsed_ms, 0) {
            warn!(task_name = %cap.task_name, error = %e, "Orchestrator::record_feedback: failed to record");
        }
    }

    /// Drives one step to a final `StepOutcome`. A `CodeError`-class
    /// failure (non-zero exit from generated source) or a `Tool`
    /// failure is returned immediately, not retried here: the former
    /// needs fresh source from the code generator - rerunning the exact
    /// same source would just fail the same way - and the latter has no
    /// repair path at all. Only an actual infrastructure error out of
    /// the runner (`Error::is_retryable()`, e.g. a transport blip) gets
    /// a bounded number of bare retries of the same request.
    async fn execute_step_with_retry(&self, step: &PlanStep) -> StepOutcome {
        let cap = match self.registry.get_capability(&self.domain, &step.capability_id) {
            Ok(cap) => cap,
            Err(e) => return StepOutcome::failed(e.to_string(), 0, false),
        };

        let mut attempts = 0u32;
        loop {
            match self.execute_step(&cap, step).await {
                Ok(outcome) => return outcome,
                Err(e) => {
                    if !e.is_retryable() || attempts >= self.config.max_retries {
                        return StepOutcome::failed(e.to_string(), 0, e.is_retryable());
                    }
                    attempts += 1;
                    warn!(task_name = %cap.task_name, attempt = attempts, error = %e, "Orchestrator: retrying failed step");
                }
            }
        }
    }

    async fn execute_step(&self, cap: &Capability, step: &PlanStep) -> Result<StepOutcome> {
        match &cap.kind {
            CapabilityKind::CachedCode { source, .. } => {
                let request = RunRequest::new(cap.task_name.clone(), cap.language, source.clone());
                let outcome = self.runner.run(request).await?;
                let diagnostics = [outcome.stdout.as_str(), outcome.stderr.as_str()]
                    .into_iter()
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(StepOutcome {
                    success: outcome.success,
                    output: serde_json::json!({
                        "stdout": outcome.stdout,
                        "stderr": outcome.stderr,
                        "exit_code": outcome.exit_code,
                    }),
                    error: if outcome.success { None } else { Some(diagnostics) },
                    elapsed_ms: outcome.elapsed_ms,
                    retryable: !outcome.success,
                })
            }
            CapabilityKind::Tool { invocation } => {
                let ctx = ToolContext::new(self.config.workspace_root.clone(), step.capability_id.clone());
                let call = ToolCall {
                    id: step.capability_id.clone(),
                    name: invocation.clone(),
                    input: serde_json::to_value(&step.inputs).unwrap_or(Value::Null),
                };
                let started = Instant::now();
                let result = self.tools.execute(&call, &ctx).await;
                Ok(StepOutcome {
                    success: !result.is_error,
                    output: serde_json::json!({ "content": result.content.clone() }),
                    error: if result.is_error { Some(result.content) } else { None },
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    retryable: false,
                })
            }
            CapabilityKind::LearnedMethod { .. } => Err(Error::Internal(format!(
                "orchestrator received an unexpanded learned-method step for '{}' - the planner must expand learned methods before handing a plan to the orchestrator",
                cap.task_name
            ))),
        }
    }

    fn persist(&self, wf: &WorkflowExecution) -> Result<()> {
        self.store.put(wf).map_err(|e| Error::Internal(e.to_string()))
    }
}

struct DriveGuard<'a> {
    orchestrator: &'a Orchestrator,
    workflow_id: String,
}

impl Drop for DriveGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.active.lock().unwrap().remove(&self.workflow_id);
    }
}
