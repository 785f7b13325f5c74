//! The intelligent router. Every external execution request funnels
//! through here; the router decides whether it needs a full
//! plan-and-orchestrate cycle, a direct tool invocation, or a single
//! completion, runs the safety gate before anything executes, and
//! retries a `CodeError` failure by asking the code generator for a
//! repair before giving up.
//!
//! Dispatch is the fixed-order predicate chain `classify` implements,
//! with the safety-context synthesis step built as its own enumerated
//! classification pass over the request.

mod classify;
mod safety;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::broker::{Broker, Priority};
use crate::codegen::{CodeGenerator, GenerateRequest};
use crate::collab::PrinciplesService;
use crate::domain::{Capability, CapabilityKind, EpisodicRecord, Goal, Language, Outcome, Plan, PlanStep, WorkflowStatus};
use crate::episodic::EpisodicRecorder;
use crate::error::{Error, Result};
use crate::llm::{CompletionRequest, Message, ToolCall};
use crate::orchestrator::Orchestrator;
use crate::planner::Planner;
use crate::registry::Registry;
use crate::tools::{ToolContext, ToolExecutor};

pub use classify::{InternalTask, RouteDecision};

pub(crate) const fn default_max_retries() -> u32 {
    2
}

fn default_domain() -> String {
    crate::registry::default_domain().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Repair-retry attempts on a `CodeError`, distinct from the
    /// orchestrator's own per-step retry budget.
    pub max_retries: u32,
    pub domain: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { max_retries: default_max_retries(), domain: default_domain() }
    }
}

/// One execution request arriving at the router.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub task_name: String,
    pub description: String,
    pub context: HashMap<String, Value>,
    pub language: Option<Language>,
    pub session_id: Option<String>,
}

impl ExecutionRequest {
    pub fn new(task_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            description: description.into(),
            context: HashMap::new(),
            language: None,
            session_id: None,
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_context_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// What a caller gets back, regardless of which path the router took:
/// always success/error and an elapsed time; `workflow_id` is
/// only set when a workflow actually ran, `reasons` only when the
/// safety gate blocked the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub execution_time_ms: u64,
    pub workflow_id: Option<String>,
    pub reasons: Option<Vec<String>>,
    pub retries: u32,
}

impl ExecutionResult {
    fn success(result: Value, elapsed: Duration, workflow_id: Option<String>, retries: u32) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            execution_time_ms: elapsed.as_millis() as u64,
            workflow_id,
            reasons: None,
            retries,
        }
    }

    fn failure(error: impl Into<String>, elapsed: Duration, workflow_id: Option<String>, retries: u32) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            execution_time_ms: elapsed.as_millis() as u64,
            workflow_id,
            reasons: None,
            retries,
        }
    }

    fn blocked(reasons: Vec<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            result: None,
            error: Some("blocked by safety gate".to_string()),
            execution_time_ms: elapsed.as_millis() as u64,
            workflow_id: None,
            reasons: Some(reasons),
            retries: 0,
        }
    }
}

const SIMPLE_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

pub struct Router {
    broker: Arc<Broker>,
    planner: Arc<Planner>,
    orchestrator: Arc<Orchestrator>,
    registry: Arc<Registry>,
    codegen: Arc<CodeGenerator>,
    tools: Arc<ToolExecutor>,
    principles: Arc<dyn PrinciplesService>,
    episodic: Arc<EpisodicRecorder>,
    config: RouterConfig,
}

impl Router {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        broker: Arc<Broker>,
        planner: Arc<Planner>,
        orchestrator: Arc<Orchestrator>,
        registry: Arc<Registry>,
        codegen: Arc<CodeGenerator>,
        tools: Arc<ToolExecutor>,
        principles: Arc<dyn PrinciplesService>,
        episodic: Arc<EpisodicRecorder>,
    ) -> Self {
        Self {
            broker,
            planner,
            orchestrator,
            registry,
            codegen,
            tools,
            principles,
            episodic,
            config: RouterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Entry point: classify, gate, execute, record.
    pub async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult> {
        let started = Instant::now();
        let tool_names = self.tools.tool_names();
        let decision = classify::classify(
            &request.task_name,
            &request.description,
            request.language.is_some(),
            &tool_names,
        );

        let result = match decision {
            RouteDecision::Internal(internal) => self.handle_internal(internal, &request, started).await,
            RouteDecision::Summarization => self.handle_summarization(&request, started).await,
            RouteDecision::SimpleInformational => self.handle_summarization(&request, started).await,
            RouteDecision::ExplicitTool(tool_id) => self.handle_explicit_tool(&tool_id, &request, started).await,
            RouteDecision::HypothesisTesting | RouteDecision::WebGathering | RouteDecision::TraditionalCode => {
                self.handle_planned(&request, started).await
            }
        };

        let result = result.unwrap_or_else(|e| ExecutionResult::failure(e.to_string(), started.elapsed(), None, 0));
        self.record_outcome(&request, &result).await;
        Ok(result)
    }

    async fn handle_internal(
        &self,
        internal: InternalTask,
        request: &ExecutionRequest,
        started: Instant,
    ) -> Result<ExecutionResult> {
        match internal {
            InternalTask::CodeGeneration => self.handle_code_generation(request, started).await,
            InternalTask::CodeTest | InternalTask::GoalExecution | InternalTask::ArtifactTask => {
                self.handle_planned(request, started).await
            }
        }
    }

    async fn handle_code_generation(&self, request: &ExecutionRequest, started: Instant) -> Result<ExecutionResult> {
        let language = request.language.unwrap_or(Language::Python);
        let generated = self
            .codegen
            .generate(GenerateRequest::new(&request.task_name, &request.description, language))
            .await?;
        Ok(ExecutionResult::success(
            serde_json::json!({ "content_hash": generated.content_hash, "language": generated.language.as_str() }),
            started.elapsed(),
            None,
            0,
        ))
    }

    /// A single HIGH-priority completion, no planning or orchestration
    /// involved.
    async fn handle_summarization(&self, request: &ExecutionRequest, started: Instant) -> Result<ExecutionResult> {
        let completion_request = CompletionRequest {
            system_prompt: "Respond directly and concisely. Do not write code.".to_string(),
            messages: vec![Message::user(request.description.clone())],
            tools: vec![],
            max_tokens: 1024,
        };
        let ticket_id = self.broker.enqueue(completion_request, Priority::High, "router").await?;
        let response = self
            .broker
            .await_completion(&ticket_id, SIMPLE_COMPLETION_TIMEOUT, CancellationToken::new())
            .await?;
        let content = response.content.ok_or_else(|| Error::transport("empty completion from summarizer"))?;
        Ok(ExecutionResult::success(serde_json::json!({ "content": content }), started.elapsed(), None, 0))
    }

    /// Invoke the registered tool directly, bypassing planning entirely.
    async fn handle_explicit_tool(
        &self,
        tool_id: &str,
        request: &ExecutionRequest,
        started: Instant,
    ) -> Result<ExecutionResult> {
        let ctx = ToolContext::new(std::env::temp_dir(), request.task_name.clone());
        let input = serde_json::to_value(&request.context).unwrap_or(Value::Null);
        let call = ToolCall { id: request.task_name.clone(), name: tool_id.to_string(), input };
        let result = self.tools.execute(&call, &ctx).await;
        if result.is_error {
            return Ok(ExecutionResult::failure(result.content, started.elapsed(), None, 0));
        }
        Ok(ExecutionResult::success(serde_json::json!({ "content": result.content }), started.elapsed(), None, 0))
    }

    /// Plan, gate, orchestrate, repair-retry on `CodeError`.
    async fn handle_planned(&self, request: &ExecutionRequest, started: Instant) -> Result<ExecutionResult> {
        if let Some(reasons) = self.safety_check(request).await? {
            return Ok(ExecutionResult::blocked(reasons, started.elapsed()));
        }

        let goal = self.build_goal(request);
        let mut plans = self.planner.generate_plans(&goal).await?;

        if plans.is_empty() {
            let language = request.language.unwrap_or(Language::Python);
            let generated = self
                .codegen
                .generate(GenerateRequest::new(&request.task_name, &request.description, language))
                .await?;
            let capability = self.materialize_capability(&request.task_name, &request.description, &generated)?;
            plans = vec![Plan::new(request.description.clone(), vec![PlanStep::new(capability.id)])];
        }

        let Some(plan) = self.planner.select_best_plan(plans) else {
            return Ok(ExecutionResult::failure(
                "no capability or generated code could satisfy this request",
                started.elapsed(),
                None,
                0,
            ));
        };

        self.drive_with_repair(plan, request, started).await
    }

    /// Runs a plan through the orchestrator; on a retryable `CodeError`
    /// terminal failure, asks the code generator for a repair (feeding
    /// the previous error back in) and retries with a fresh single-step
    /// plan, up to `config.max_retries` times.
    async fn drive_with_repair(
        &self,
        mut plan: crate::domain::Plan,
        request: &ExecutionRequest,
        started: Instant,
    ) -> Result<ExecutionResult> {
        let mut attempts = 0;
        loop {
            let workflow = self.orchestrator.start(&plan).await?;
            match workflow.status {
                WorkflowStatus::Completed => {
                    let output = workflow.step_results.last().map(|r| r.output.clone()).unwrap_or(Value::Null);
                    return Ok(ExecutionResult::success(output, started.elapsed(), Some(workflow.id), attempts));
                }
                WorkflowStatus::Failed => {
                    let terminal_error = workflow.terminal_error.clone().unwrap_or_default();
                    if !workflow.terminal_retryable || attempts >= self.config.max_retries {
                        return Ok(ExecutionResult::failure(
                            terminal_error,
                            started.elapsed(),
                            Some(workflow.id),
                            attempts,
                        ));
                    }
                    attempts += 1;
                    plan = self.repair_plan(&plan, request, &terminal_error).await?;
                }
                other => {
                    return Ok(ExecutionResult::failure(
                        format!("workflow ended in unexpected state: {other}"),
                        started.elapsed(),
                        Some(workflow.id),
                        attempts,
                    ));
                }
            }
        }
    }

    /// Regenerates code for the plan's first step capability with the
    /// previous error fed back into the prompt, and builds a fresh
    /// single-step plan around the repaired cached code.
    async fn repair_plan(&self, plan: &Plan, request: &ExecutionRequest, previous_error: &str) -> Result<Plan> {
        let step = plan.steps.first().ok_or_else(|| Error::Internal("plan has no steps to repair".to_string()))?;
        let capability = self.registry.get_capability(&self.config.domain, &step.capability_id)?;
        let language = capability.language;
        let repaired = self
            .codegen
            .generate(
                GenerateRequest::new(&capability.task_name, &request.description, language)
                    .with_previous_error(previous_error.to_string()),
            )
            .await?;
        let fresh = self.materialize_capability(&capability.task_name, &capability.description, &repaired)?;
        Ok(Plan::new(request.description.clone(), vec![PlanStep::new(fresh.id)]))
    }

    /// Wraps a generated `CachedCode` artifact in a registered
    /// `Capability` so the planner can schedule it like any other
    /// primitive - `CodeGenerator` only owns the code cache, not the
    /// capability graph.
    fn materialize_capability(
        &self,
        task_name: &str,
        description: &str,
        code: &crate::domain::CachedCode,
    ) -> Result<Capability> {
        let capability = Capability::new(
            task_name,
            code.language,
            CapabilityKind::CachedCode { source: code.source.clone(), content_hash: code.content_hash.clone() },
        )
        .with_description(description)
        .with_confidence(0.6);
        self.registry.create_capability(&self.config.domain, capability)
    }

    /// Synthesize a safety context and ask the principles service
    /// whether this request is allowed to proceed. Returns `Some(reasons)`
    /// when blocked.
    async fn safety_check(&self, request: &ExecutionRequest) -> Result<Option<Vec<String>>> {
        let context = safety::synthesize(&request.task_name, &request.description);
        let verdict = self.principles.check_action(&request.task_name, &context).await;
        if verdict.is_allowed() {
            Ok(None)
        } else {
            Ok(Some(verdict.reasons()))
        }
    }

    fn build_goal(&self, request: &ExecutionRequest) -> Goal {
        let mut goal = Goal::new(request.description.clone()).with_template_hint(request.task_name.clone());
        for (key, value) in &request.context {
            goal = goal.with_context_value(key.clone(), value.clone());
        }
        goal
    }

    async fn record_outcome(&self, request: &ExecutionRequest, result: &ExecutionResult) {
        let session_id = request.session_id.clone().unwrap_or_else(|| "router".to_string());
        let plan_id = result.workflow_id.clone().unwrap_or_else(|| request.task_name.clone());
        let outcome = if result.success { Outcome::Success } else { Outcome::Failure };
        let record = EpisodicRecord::new(session_id, plan_id, 0, outcome)
            .with_text(result.error.clone().unwrap_or_else(|| "ok".to_string()));
        if let Err(e) = self.episodic.record_and_index(record, None).await {
            tracing::warn!(error = %e, "router: failed to record episodic outcome");
        }
    }
}
