//! taskctl - an AI task-execution control plane.
//!
//! Every completion an agentic workflow needs funnels through the
//! admission broker before it ever reaches a model; every piece of
//! work a workflow can run - cached code in a sandboxed container, a
//! built-in tool - is a capability in the registry that the planner
//! composes into a plan and the orchestrator drives step by
//! step. The router is the single entry point external callers use;
//! it classifies a request, runs it through the safety gate, and records
//! the outcome to the episodic store regardless of which path it
//! took.
//!
//! # Modules
//!
//! - [`broker`] - LLM admission broker
//! - [`runner`] - sandboxed code runner
//! - [`registry`] - capability registry
//! - [`planner`] - planner
//! - [`orchestrator`] - workflow orchestrator
//! - [`router`] - intelligent router
//! - [`codegen`] - code generator and cache
//! - [`episodic`] - episodic/feedback recorder
//! - [`llm`] - LLM client trait and Anthropic implementation
//! - [`tools`] - built-in tool implementations
//! - [`collab`] - thin-interface collaborator traits (vector/knowledge/principles)
//! - [`domain`] - persisted entity types
//! - [`config`] - configuration types and env-based loading
//! - [`cli`] - command-line interface

pub mod broker;
pub mod cli;
pub mod codegen;
pub mod collab;
pub mod config;
pub mod domain;
pub mod episodic;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod planner;
pub mod registry;
pub mod router;
pub mod runner;
pub mod tools;

// Re-export commonly used types
pub use broker::{Broker, BrokerConfig, BrokerError, Priority, Ticket};
pub use codegen::{CodeGenerator, GenerateRequest};
pub use collab::{
    AlwaysAllowPrinciples, InMemoryKnowledgeGraph, InMemoryVectorStore, KnowledgeGraph, PrinciplesService, VectorStore,
};
pub use config::{Config, LlmConfig};
pub use domain::{
    Capability, CapabilityKind, CachedCode, DomainId, EpisodicRecord, Filter, FilterOp, Goal, IndexValue, Language,
    Outcome, Plan, PlanStep, Record, SafetyLevel, Store, StepResult, WorkflowExecution, WorkflowStatus,
};
pub use episodic::EpisodicRecorder;
pub use error::{Error, Result};
pub use llm::{AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use planner::Planner;
pub use registry::Registry;
pub use router::{ExecutionRequest, ExecutionResult, Router, RouterConfig};
pub use runner::{Runner, RunnerConfig};
pub use tools::{Tool, ToolContext, ToolError, ToolExecutor, ToolResult};
