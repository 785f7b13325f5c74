//! taskctl - CLI entry point wiring together the control plane.

use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use taskctl::cli::{Cli, Command, OutputFormat, RegistryCommand, WorkflowCommand};
use taskctl::collab::{AlwaysAllowPrinciples, InMemoryKnowledgeGraph, InMemoryVectorStore};
use taskctl::config::Config;
use taskctl::domain::{Language, Store};
use taskctl::llm::AnthropicClient;
use taskctl::router::ExecutionRequest;
use taskctl::runner::{ContainerEngine, Runner};
use taskctl::tools::ToolExecutor;
use taskctl::{Broker, CodeGenerator, EpisodicRecorder, Orchestrator, Planner, Registry, Router};

fn setup_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
    Ok(())
}

/// Picks the sandboxed runner's container backend: the real `bollard`
/// client when the `containers` feature is on, a no-op engine otherwise
/// so a headless build still has something to wire up.
#[cfg(feature = "containers")]
fn container_engine() -> Result<Arc<dyn ContainerEngine>> {
    let engine = taskctl::runner::BollardEngine::connect().context("failed to connect to the Docker daemon")?;
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "containers"))]
fn container_engine() -> Result<Arc<dyn ContainerEngine>> {
    use async_trait::async_trait;
    use taskctl::runner::{ContainerOutcome, ContainerSpec};

    struct DisabledEngine;

    #[async_trait]
    impl ContainerEngine for DisabledEngine {
        async fn run(&self, _spec: ContainerSpec) -> Result<ContainerOutcome, taskctl::runner::RunnerError> {
            Err(taskctl::runner::RunnerError::Transport(
                "container execution is disabled: build with --features containers".to_string(),
            ))
        }
    }

    Ok(Arc::new(DisabledEngine))
}

struct Stack {
    registry: Arc<Registry>,
    orchestrator: Arc<Orchestrator>,
    router: Arc<Router>,
}

fn build_stack(config: &Config) -> Result<Stack> {
    let store = Arc::new(Store::open(&config.storage.dir).context("failed to open taskstore")?);

    let llm_client = Arc::new(AnthropicClient::from_config(&config.llm).context("failed to construct LLM client")?);
    let broker = Broker::new(config.broker.clone(), llm_client, store.clone());

    let engine = container_engine()?;
    let runner = Arc::new(Runner::new(config.runner.clone(), engine));

    let knowledge_graph = Arc::new(InMemoryKnowledgeGraph::new());
    let tools = Arc::new(ToolExecutor::standard_with_knowledge(knowledge_graph));

    let registry = Arc::new(Registry::new(store.clone()));
    registry.seed_tools(&config.domain).context("failed to seed tool capabilities")?;

    let vector_store = Arc::new(InMemoryVectorStore::new());
    let episodic = Arc::new(EpisodicRecorder::new(store.clone(), vector_store));

    let principles = Arc::new(AlwaysAllowPrinciples) as Arc<dyn taskctl::collab::PrinciplesService>;

    let planner = Arc::new(
        Planner::new(registry.clone(), episodic.clone(), principles.clone()).with_domain(config.domain.clone()),
    );

    let orchestrator = Arc::new(
        Orchestrator::new(store.clone(), registry.clone(), runner, tools.clone(), planner.clone())
            .with_domain(config.domain.clone()),
    );

    let codegen =
        Arc::new(CodeGenerator::new(registry.clone(), broker.clone(), tools.clone()).with_domain(config.domain.clone()));

    let router = Arc::new(
        Router::new(broker, planner, orchestrator.clone(), registry.clone(), codegen, tools, principles, episodic)
            .with_config(taskctl::router::RouterConfig { domain: config.domain.clone(), ..Default::default() }),
    );

    Ok(Stack { registry, orchestrator, router })
}

fn print(value: &impl serde::Serialize, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => println!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging().context("failed to set up logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    info!(provider = %config.llm.provider, model = %config.llm.model, domain = %config.domain, "taskctl starting");

    let Some(command) = cli.command else {
        println!("taskctl v{}", env!("CARGO_PKG_VERSION"));
        println!("  LLM: {} ({})", config.llm.provider, config.llm.model);
        println!("  Domain: {}", config.domain);
        return Ok(());
    };

    let stack = build_stack(&config)?;

    match command {
        Command::Run { task_name, description, language, format } => {
            let mut request = ExecutionRequest::new(task_name, description);
            if let Some(language) = language {
                request = request.with_language(parse_language(&language)?);
            }
            let result = stack.router.execute(request).await.context("router execution failed")?;
            print(&result, &format)?;
        }
        Command::Registry { command } => match command {
            RegistryCommand::List { format } => {
                let capabilities = stack.registry.list_capabilities(&config.domain)?;
                print(&capabilities, &format)?;
            }
            RegistryCommand::Search { query, kind, format } => {
                let capabilities = stack.registry.search(&config.domain, &query, kind.as_deref(), &[])?;
                print(&capabilities, &format)?;
            }
            RegistryCommand::Seed => {
                let inserted = stack.registry.seed_tools(&config.domain)?;
                println!("seeded {inserted} tool capabilities");
            }
        },
        Command::Workflow { command } => match command {
            WorkflowCommand::Status { workflow_id, format } => {
                let details = stack.orchestrator.details(&workflow_id)?;
                print(&details, &format)?;
            }
            WorkflowCommand::Pause { workflow_id } => {
                stack.orchestrator.pause(&workflow_id)?;
                println!("pause requested for {workflow_id}");
            }
            WorkflowCommand::Cancel { workflow_id } => {
                stack.orchestrator.cancel(&workflow_id)?;
                println!("cancel requested for {workflow_id}");
            }
            WorkflowCommand::Resume { workflow_id, format } => {
                let details = stack.orchestrator.resume_by_id(&workflow_id).await.context("resume failed")?;
                print(&details, &format)?;
            }
        },
    }

    Ok(())
}

fn parse_language(value: &str) -> Result<Language> {
    match value.to_lowercase().as_str() {
        "python" | "py" => Ok(Language::Python),
        "javascript" | "js" => Ok(Language::Javascript),
        "go" => Ok(Language::Go),
        "java" => Ok(Language::Java),
        "cpp" | "c++" => Ok(Language::Cpp),
        "c" => Ok(Language::C),
        "rust" | "rs" => Ok(Language::Rust),
        "mcp_tool" | "mcptool" => Ok(Language::McpTool),
        "builtin" => Ok(Language::Builtin),
        other => eyre::bail!("unknown language: {other}"),
    }
}
