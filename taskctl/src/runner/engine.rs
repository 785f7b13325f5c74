//! `ContainerEngine` - the thin trait over the container runtime:
//! `Run(image, argv, mounts, limits, stdin) -> (exitCode, stdout, stderr,
//! runtime)`. `BollardEngine` is the production implementation;
//! `#[cfg(test)] mod mock` follows the same fixed-response-double shape
//! as `llm::client::mock::MockLlmClient`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use super::error::RunnerError;

#[derive(Debug, Clone)]
pub struct Mount {
    pub host_path: PathBuf,
    pub container_path: String,
    pub read_only: bool,
}

#[derive(Debug, Clone)]
pub struct ResourceLimits {
    pub memory_mb: u64,
    pub cpu_limit: f64,
    pub pids_limit: i64,
    pub tmpfs_size_mb: u64,
}

#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    pub argv: Vec<String>,
    pub mounts: Vec<Mount>,
    pub env: HashMap<String, String>,
    pub limits: ResourceLimits,
    pub workdir: String,
    /// Non-empty stdin means the container is started with an attached
    /// interactive stream - some tools behave differently when stdin is
    /// a TTY vs. closed.
    pub stdin: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ContainerOutcome {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub elapsed_ms: u64,
}

#[async_trait]
pub trait ContainerEngine: Send + Sync {
    async fn run(&self, spec: ContainerSpec) -> Result<ContainerOutcome, RunnerError>;
}

/// Production engine: talks to the local Docker daemon over its default
/// socket via `bollard`. Images are pulled (if absent) before the
/// container is created; the container, once it exits or its timeout
/// elapses, is always removed - nothing is left behind for the next run
/// to collide with.
///
/// Only built under the `containers` feature (on by default), which
/// gates the `bollard` dependency, so a headless build of
/// `taskctl` can still link without a Docker client library present.
#[cfg(feature = "containers")]
pub struct BollardEngine {
    docker: bollard::Docker,
}

#[cfg(feature = "containers")]
impl BollardEngine {
    pub fn connect() -> Result<Self, RunnerError> {
        let docker = bollard::Docker::connect_with_socket_defaults()
            .map_err(|e| RunnerError::Transport(e.to_string()))?;
        Ok(Self { docker })
    }
}

#[cfg(feature = "containers")]
#[async_trait]
impl ContainerEngine for BollardEngine {
    async fn run(&self, spec: ContainerSpec) -> Result<ContainerOutcome, RunnerError> {
        use bollard::container::{
            Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions, WaitContainerOptions,
        };
        use bollard::image::CreateImageOptions;
        use bollard::models::{HostConfig, Mount as BollardMount, MountTypeEnum};
        use futures::StreamExt;

        let started = std::time::Instant::now();

        // Best effort - if the image is already present, this still
        // round-trips to the daemon but returns immediately.
        let mut pull = self.docker.create_image(
            Some(CreateImageOptions { from_image: spec.image.as_str(), ..Default::default() }),
            None,
            None,
        );
        while let Some(chunk) = pull.next().await {
            chunk.map_err(|e| RunnerError::Transport(e.to_string()))?;
        }

        let mounts: Vec<BollardMount> = spec
            .mounts
            .iter()
            .map(|m| BollardMount {
                target: Some(m.container_path.clone()),
                source: Some(m.host_path.to_string_lossy().to_string()),
                typ: Some(MountTypeEnum::BIND),
                read_only: Some(m.read_only),
                ..Default::default()
            })
            .collect();

        let host_config = HostConfig {
            memory: Some((spec.limits.memory_mb * 1024 * 1024) as i64),
            nano_cpus: Some((spec.limits.cpu_limit * 1_000_000_000.0) as i64),
            pids_limit: Some(spec.limits.pids_limit),
            tmpfs: Some(HashMap::from([(
                "/tmp".to_string(),
                format!("size={}m", spec.limits.tmpfs_size_mb),
            )])),
            cap_drop: Some(vec!["ALL".to_string()]),
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            network_mode: Some("bridge".to_string()),
            mounts: Some(mounts),
            ..Default::default()
        };

        let env: Vec<String> = spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.argv.clone()),
            env: Some(env),
            working_dir: Some(spec.workdir.clone()),
            host_config: Some(host_config),
            attach_stdin: Some(spec.stdin.is_some()),
            open_stdin: Some(spec.stdin.is_some()),
            tty: Some(false),
            ..Default::default()
        };

        let name = format!("sandboxed-run-{}", uuid::Uuid::now_v7());
        let created = self
            .docker
            .create_container(Some(CreateContainerOptions { name: name.as_str(), ..Default::default() }), config)
            .await
            .map_err(|e| RunnerError::Transport(e.to_string()))?;

        self.docker
            .start_container::<String>(&created.id, None)
            .await
            .map_err(|e| RunnerError::Transport(e.to_string()))?;

        let wait = self.docker.wait_container(&created.id, None::<WaitContainerOptions<String>>);
        let grace = spec.timeout + Duration::from_secs(5);
        let exit_code = match tokio::time::timeout(grace, wait.collect::<Vec<_>>()).await {
            Ok(results) => results
                .into_iter()
                .next()
                .and_then(|r| r.ok())
                .map(|r| r.status_code)
                .unwrap_or(-1),
            Err(_) => {
                let _ = self.docker.stop_container(&created.id, None).await;
                -1
            }
        };

        let mut logs = self.docker.logs::<String>(
            &created.id,
            Some(LogsOptions {
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );
        let mut stdout = String::new();
        let mut stderr = String::new();
        while let Some(chunk) = logs.next().await {
            match chunk {
                Ok(bollard::container::LogOutput::StdOut { message }) => {
                    stdout.push_str(&String::from_utf8_lossy(&message))
                }
                Ok(bollard::container::LogOutput::StdErr { message }) => {
                    stderr.push_str(&String::from_utf8_lossy(&message))
                }
                _ => {}
            }
        }

        let _ = self
            .docker
            .remove_container(&created.id, Some(RemoveContainerOptions { force: true, ..Default::default() }))
            .await;

        Ok(ContainerOutcome {
            exit_code,
            stdout,
            stderr,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Replays one canned outcome per `run()` call, in order - the same
    /// shape as `llm::client::mock::MockLlmClient`. Records every spec it
    /// was called with so tests can assert on mount/limit/argv shape
    /// without a real daemon.
    pub struct MockContainerEngine {
        outcomes: Mutex<Vec<ContainerOutcome>>,
        pub calls: Mutex<Vec<ContainerSpec>>,
    }

    impl MockContainerEngine {
        pub fn new(outcomes: Vec<ContainerOutcome>) -> Self {
            Self { outcomes: Mutex::new(outcomes), calls: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ContainerEngine for MockContainerEngine {
        async fn run(&self, spec: ContainerSpec) -> Result<ContainerOutcome, RunnerError> {
            self.calls.lock().unwrap().push(spec);
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                return Err(RunnerError::Transport("mock engine exhausted".to_string()));
            }
            Ok(outcomes.remove(0))
        }
    }
}
