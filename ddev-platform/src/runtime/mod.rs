//! The only contact surface with the container engine.
//!
//! The engine is the source of truth for what is running. Nothing here keeps
//! state between calls; callers locate containers by label every time.

use anyhow::Result;
use async_trait::async_trait;
use ddev_core::labels::{self, Selector};
use ddev_core::{ContainerHealth, DdevError};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

pub mod docker;
#[cfg(test)]
pub mod fake;

pub use docker::DockerRuntime;

/// Interval between health polls.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// How long each service gets to report healthy.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(35);

/// A container as listed by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub names: Vec<String>,
    /// `created`, `running`, `restarting`, `paused`, `exited`.
    pub state: String,
    /// Free-form status, e.g. `Up 3 minutes (healthy)`.
    pub status: String,
    pub labels: BTreeMap<String, String>,
    /// Private port to host port.
    pub ports: BTreeMap<u16, u16>,
}

impl ContainerInfo {
    pub fn health(&self) -> ContainerHealth {
        ContainerHealth::parse(&self.state, &self.status)
    }

    pub fn is_running(&self) -> bool {
        self.state == "running"
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn name(&self) -> &str {
        self.names
            .first()
            .map_or(self.id.as_str(), |n| n.trim_start_matches('/'))
    }

    /// The host port published for `private`.
    pub fn published_port(&self, private: u16) -> Result<u16, DdevError> {
        self.ports.get(&private).copied().ok_or_else(|| {
            DdevError::NotFound(format!(
                "container {} does not publish port {private}",
                self.name()
            ))
        })
    }
}

/// An ordered set of compose files run under one project name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeProject {
    pub name: String,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeAction {
    /// Create and start in the background.
    Up,
    /// Stop and remove containers and anonymous volumes.
    Down,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogsRequest {
    pub follow: bool,
    pub timestamps: bool,
    /// Line count, or `all`.
    pub tail: String,
}

impl Default for LogsRequest {
    fn default() -> Self {
        Self {
            follow: false,
            timestamps: false,
            tail: "all".to_string(),
        }
    }
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync + std::fmt::Debug {
    /// Every container whose labels are a superset of `selector`.
    async fn find_containers(&self, selector: &Selector) -> Result<Vec<ContainerInfo>>;

    /// Creates a bridge network unless it already exists.
    async fn ensure_network(&self, name: &str) -> Result<()>;

    async fn compose(&self, project: &ComposeProject, action: ComposeAction) -> Result<()>;

    /// Runs `argv` in `service`. Without a tty the output is captured and returned;
    /// with one, it goes straight to the terminal and the result is empty.
    async fn compose_exec(
        &self,
        project: &ComposeProject,
        service: &str,
        tty: bool,
        argv: &[String],
    ) -> Result<String>;

    async fn stop_container(&self, id: &str) -> Result<()>;

    async fn remove_container(&self, id: &str, force: bool, remove_volumes: bool) -> Result<()>;

    /// Copies the container's output to this process's stdout and stderr.
    async fn logs(&self, id: &str, request: &LogsRequest) -> Result<()>;
}

/// Exactly one container matching `selector`.
pub async fn find_one(runtime: &dyn ContainerRuntime, selector: &Selector) -> Result<ContainerInfo> {
    let mut found = runtime.find_containers(selector).await?;
    match found.len() {
        0 => Err(DdevError::NotFound(format!("no container found matching {selector}")).into()),
        1 => Ok(found.remove(0)),
        n => Err(DdevError::NotFound(format!(
            "expected one container matching {selector}, found {n}"
        ))
        .into()),
    }
}

/// Polls until every container matching `selector` reports healthy.
pub async fn wait_healthy(
    runtime: &dyn ContainerRuntime,
    selector: &Selector,
    timeout: Duration,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    let service = selector
        .iter()
        .find(|(k, _)| k.as_str() == labels::CONTAINER_TYPE)
        .map_or_else(|| selector.to_string(), |(_, v)| v.clone());

    loop {
        let containers = runtime.find_containers(selector).await?;
        let last = containers
            .iter()
            .map(ContainerInfo::health)
            .find(|h| *h != ContainerHealth::Healthy);
        if !containers.is_empty() && last.is_none() {
            debug!("{service} is healthy");
            return Ok(());
        }

        if tokio::time::Instant::now() >= deadline {
            let last = if containers.is_empty() {
                "no container".to_string()
            } else {
                last.map_or_else(String::new, |h| h.to_string())
            };
            return Err(DdevError::HealthTimeout(format!(
                "{service} did not become healthy within {}s (last status: {last})",
                timeout.as_secs()
            ))
            .into());
        }
        tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
    }
}
