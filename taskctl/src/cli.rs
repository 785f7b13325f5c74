//! CLI command definitions and subcommands.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// taskctl - an AI task-execution control plane.
#[derive(Parser)]
#[command(
    name = "taskctl",
    about = "Admission-controlled, sandboxed, plan-and-orchestrate control plane for AI task execution",
    version = env!("GIT_DESCRIBE")
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Submit one request through the router end to end
    Run {
        /// Task name, used for capability lookup/caching
        task_name: String,

        /// Task description, fed to the planner/codegen/classifier
        description: String,

        /// Language hint for code generation
        #[arg(short, long)]
        language: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Capability registry operations
    Registry {
        #[command(subcommand)]
        command: RegistryCommand,
    },

    /// Workflow lifecycle operations (status is readable cross-process;
    /// pause/resume/cancel only take effect against a workflow whose
    /// driver is still live in this process)
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommand,
    },
}

#[derive(Subcommand)]
pub enum RegistryCommand {
    /// List every capability in the domain
    List {
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Free-text search over task name and description
    Search {
        query: String,

        /// Restrict to one capability kind (cached_code, tool, learned_method)
        #[arg(short, long)]
        kind: Option<String>,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Register the standard tool set as capabilities (idempotent)
    Seed,
}

#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// Show a workflow's persisted status and step results
    Status {
        workflow_id: String,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Request a cooperative pause at the next step boundary
    Pause { workflow_id: String },

    /// Request a cooperative cancel at the next step boundary
    Cancel { workflow_id: String },

    /// Resume a paused workflow, driving it from its next pending step
    Resume {
        workflow_id: String,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for status/list/search commands
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
