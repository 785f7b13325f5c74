//! The sandboxed code runner. Given a language, source text, and
//! execution context, stages the run, dispatches it to a
//! [`ContainerEngine`], reclassifies the raw exit code against known
//! failure markers, and harvests any artifacts the run produced.
//!
//! `ContainerEngine` lives here rather than in `collab::` since nothing
//! outside this module calls it - the same reasoning `collab::mod` gives for
//! drawing that line.

mod artifacts;
mod error;
mod engine;
mod recipe;

pub use artifacts::Artifact;
pub use config::RunnerConfig;
pub use engine::{BollardEngine, ContainerEngine, ContainerOutcome, ContainerSpec, Mount, ResourceLimits};
pub use error::RunnerError;
pub use recipe::{base_image, java_class_name, python_requirements};

#[cfg(test)]
pub use engine::mock::MockContainerEngine;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::domain::Language;
use crate::runner::config::RunnerConfig;

pub mod config;

/// What to run, and the context it runs in.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub task_name: String,
    pub language: Language,
    pub source: String,
    pub stdin: Option<String>,
    pub env: HashMap<String, String>,
    pub timeout: Option<Duration>,
    pub workflow_id: Option<String>,
    pub step_id: Option<String>,
}

impl RunRequest {
    pub fn new(task_name: impl Into<String>, language: Language, source: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            language,
            source: source.into(),
            stdin: None,
            env: HashMap::new(),
            timeout: None,
            workflow_id: None,
            step_id: None,
        }
    }
}

/// The fully classified result of one sandboxed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
    pub elapsed_ms: u64,
    pub artifacts: Vec<Artifact>,
}

/// Combined-output substrings that mean "failed" regardless of exit
/// code - some toolchains (notably `go build`, piped through `&&`) exit
/// non-zero correctly, but a handful of interpreters exit 0 after
/// printing a traceback to stdout under `sh -c`. Checked in addition to,
/// never instead of, the exit code.
const FAILURE_MARKERS: &[&str] = &[
    "Traceback (most recent call last)",
    "panic: ",
    "Exception in thread",
    "# command-line-arguments",
    "cannot find package",
    "SyntaxError:",
    "NameError:",
];

pub struct Runner {
    config: RunnerConfig,
    engine: Arc<dyn ContainerEngine>,
}

impl Runner {
    pub fn new(config: RunnerConfig, engine: Arc<dyn ContainerEngine>) -> Self {
        Self { config, engine }
    }

    /// Stage the recipe's files, dispatch to the container engine, then
    /// classify and harvest the result. The ephemeral staging directory
    /// (and everything written into it) is removed once the run
    /// completes, success or failure.
    pub async fn run(&self, request: RunRequest) -> Result<RunOutcome, RunnerError> {
        let staging = TempDir::new().map_err(|e| RunnerError::Staging(e.to_string()))?;
        let recipe = recipe::build(request.language, &request.source, staging.path());

        for (name, contents) in &recipe.files {
            let path = staging.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| RunnerError::Staging(e.to_string()))?;
            }
            std::fs::write(&path, contents).map_err(|e| RunnerError::Staging(e.to_string()))?;
        }

        let mut mounts = vec![Mount {
            host_path: staging.path().to_path_buf(),
            container_path: "/app".to_string(),
            read_only: false,
        }];
        if let Some(dir) = &self.config.input_files_dir {
            mounts.push(Mount { host_path: dir.clone(), container_path: "/app/input_files".to_string(), read_only: true });
        }
        if let Some(dir) = &self.config.tool_bin_dir {
            mounts.push(Mount { host_path: dir.clone(), container_path: "/app/tools".to_string(), read_only: true });
        }

        let timeout = request.timeout.unwrap_or(Duration::from_secs(self.config.default_timeout_secs));
        let spec = ContainerSpec {
            image: recipe::base_image(request.language).to_string(),
            argv: recipe.argv,
            mounts,
            env: request.env,
            limits: ResourceLimits {
                memory_mb: self.config.memory_limit_mb,
                cpu_limit: self.config.cpu_limit,
                pids_limit: self.config.pids_limit,
                tmpfs_size_mb: self.config.tmpfs_size_mb,
            },
            workdir: "/app".to_string(),
            stdin: request.stdin,
            timeout,
        };

        let grace = timeout + Duration::from_secs(self.config.grace_secs);
        let outcome = match tokio::time::timeout(grace, self.engine.run(spec)).await {
            Ok(result) => result?,
            Err(_) => return Err(RunnerError::Timeout(grace)),
        };

        let combined = format!("{}\n{}", outcome.stdout, outcome.stderr);
        let marker_hit = FAILURE_MARKERS.iter().any(|marker| combined.contains(marker));
        let success = outcome.exit_code == 0 && !marker_hit;
        if outcome.exit_code == 0 && marker_hit {
            debug!(task = %request.task_name, "exit code 0 but failure marker found in output, reclassifying as failed");
        }

        let artifacts = match artifacts::harvest(staging.path()) {
            Ok(found) => found,
            Err(e) => {
                warn!(task = %request.task_name, error = %e, "artifact harvest failed");
                Vec::new()
            }
        };

        if let Err(e) = std::fs::write(staging.path().join("output.txt"), &outcome.stdout) {
            warn!(error = %e, "failed to persist output.txt");
        }
        if let Err(e) = std::fs::write(staging.path().join("stderr.txt"), &outcome.stderr) {
            warn!(error = %e, "failed to persist stderr.txt");
        }

        Ok(RunOutcome {
            success,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            exit_code: outcome.exit_code,
            elapsed_ms: outcome.elapsed_ms,
            artifacts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::engine::mock::MockContainerEngine;

    fn runner_with(outcomes: Vec<ContainerOutcome>) -> Runner {
        Runner::new(RunnerConfig::default(), Arc::new(MockContainerEngine::new(outcomes)))
    }

    #[tokio::test]
    async fn successful_run_is_classified_success() {
        let runner = runner_with(vec![ContainerOutcome {
            exit_code: 0,
            stdout: "2\n3\n5\n".to_string(),
            stderr: String::new(),
            elapsed_ms: 42,
        }]);
        let outcome = runner
            .run(RunRequest::new("first_primes", Language::Python, "print(2)\n"))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.exit_code, 0);
    }

    #[tokio::test]
    async fn nonzero_exit_is_classified_failure() {
        let runner = runner_with(vec![ContainerOutcome {
            exit_code: 1,
            stdout: String::new(),
            stderr: "boom".to_string(),
            elapsed_ms: 10,
        }]);
        let outcome = runner
            .run(RunRequest::new("x", Language::Python, "raise ValueError()\n"))
            .await
            .unwrap();
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn zero_exit_with_traceback_marker_is_reclassified_as_failure() {
        // A wrapper shell can swallow a python exit code; the traceback
        // text in stdout is the only remaining signal.
        let runner = runner_with(vec![ContainerOutcome {
            exit_code: 0,
            stdout: "Traceback (most recent call last):\n  File \"main.py\"\nNameError: x".to_string(),
            stderr: String::new(),
            elapsed_ms: 10,
        }]);
        let outcome = runner
            .run(RunRequest::new("x", Language::Python, "print(x)\n"))
            .await
            .unwrap();
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn engine_spec_carries_resource_limits_and_staging_mount() {
        let engine = Arc::new(MockContainerEngine::new(vec![ContainerOutcome {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            elapsed_ms: 1,
        }]));
        let runner = Runner::new(RunnerConfig::default(), engine.clone());
        runner.run(RunRequest::new("x", Language::Python, "print(1)\n")).await.unwrap();
        let calls = engine.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].limits.memory_mb, 512);
        assert_eq!(calls[0].mounts[0].container_path, "/app");
    }
}
