use super::{ComposeAction, ComposeProject, ContainerInfo, ContainerRuntime, LogsRequest};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    ListContainersOptions, LogOutput, LogsOptions, RemoveContainerOptions, StopContainerOptions,
};
use bollard::models::ContainerSummary;
use bollard::network::{CreateNetworkOptions, ListNetworksOptions};
use ddev_core::DdevError;
use ddev_core::labels::Selector;
use ddev_utils::env::which;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Talks to the engine API through bollard and to the compose tool through its CLI.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    client: Docker,
    compose: ComposeCli,
}

impl DockerRuntime {
    /// Connects using `DOCKER_HOST` or the platform's default socket.
    pub fn connect() -> Result<Self> {
        let client =
            Docker::connect_with_defaults().context("Failed to connect to the container engine")?;
        Ok(Self {
            client,
            compose: ComposeCli::detect()?,
        })
    }
}

fn into_info(summary: ContainerSummary) -> ContainerInfo {
    ContainerInfo {
        id: summary.id.unwrap_or_default(),
        names: summary.names.unwrap_or_default(),
        state: summary.state.unwrap_or_default(),
        status: summary.status.unwrap_or_default(),
        labels: summary.labels.unwrap_or_default().into_iter().collect(),
        ports: summary
            .ports
            .unwrap_or_default()
            .into_iter()
            .filter_map(|port| port.public_port.map(|public| (port.private_port, public)))
            .collect(),
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn find_containers(&self, selector: &Selector) -> Result<Vec<ContainerInfo>> {
        let options = ListContainersOptions::<String> {
            all: true,
            filters: HashMap::from([("label".to_string(), selector.to_filters())]),
            ..Default::default()
        };
        let summaries = self
            .client
            .list_containers(Some(options))
            .await
            .context("Failed to list containers")?;
        Ok(summaries.into_iter().map(into_info).collect())
    }

    async fn ensure_network(&self, name: &str) -> Result<()> {
        let options = ListNetworksOptions::<String> {
            filters: HashMap::from([("name".to_string(), vec![name.to_string()])]),
        };
        let existing = self
            .client
            .list_networks(Some(options))
            .await
            .context("Failed to list networks")?;
        if existing.iter().any(|n| n.name.as_deref() == Some(name)) {
            return Ok(());
        }

        info!("Creating network {}", name);
        self.client
            .create_network(CreateNetworkOptions::<String> {
                name: name.to_string(),
                driver: "bridge".to_string(),
                check_duplicate: true,
                ..Default::default()
            })
            .await
            .with_context(|| format!("Failed to create network {name}"))?;
        Ok(())
    }

    async fn compose(&self, project: &ComposeProject, action: ComposeAction) -> Result<()> {
        let verb: &[&str] = match action {
            ComposeAction::Up => &["up", "-d"],
            ComposeAction::Down => &["down", "-v"],
            ComposeAction::Stop => &["stop"],
        };
        let output = self
            .compose
            .command(project)
            .args(verb)
            .output()
            .await
            .context("Failed to run the compose tool")?;
        check(&output, &format!("{} {}", verb.join(" "), project.name))?;
        Ok(())
    }

    async fn compose_exec(
        &self,
        project: &ComposeProject,
        service: &str,
        tty: bool,
        argv: &[String],
    ) -> Result<String> {
        let mut cmd = self.compose.command(project);
        cmd.arg("exec");
        if !tty {
            cmd.arg("-T");
        }
        cmd.arg(service).args(argv);
        let what = format!("exec in {service}");

        if tty {
            let status = cmd
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await
                .context("Failed to run the compose tool")?;
            if !status.success() {
                return Err(DdevError::Compose(format!("{what} exited with {status}")).into());
            }
            return Ok(String::new());
        }

        let output = cmd.output().await.context("Failed to run the compose tool")?;
        check(&output, &what)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        info!("Stopping container {}", id);
        self.client
            .stop_container(id, Some(StopContainerOptions { t: 10 }))
            .await
            .with_context(|| format!("Failed to stop container {id}"))
    }

    async fn remove_container(&self, id: &str, force: bool, remove_volumes: bool) -> Result<()> {
        info!("Removing container {}", id);
        self.client
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force,
                    v: remove_volumes,
                    ..Default::default()
                }),
            )
            .await
            .with_context(|| format!("Failed to remove container {id}"))
    }

    async fn logs(&self, id: &str, request: &LogsRequest) -> Result<()> {
        let options = LogsOptions::<String> {
            follow: request.follow,
            stdout: true,
            stderr: true,
            timestamps: request.timestamps,
            tail: request.tail.clone(),
            ..Default::default()
        };
        let mut stream = self.client.logs(id, Some(options));
        let mut stdout = tokio::io::stdout();
        let mut stderr = tokio::io::stderr();

        while let Some(frame) = stream.next().await {
            match frame.context("Failed to read container logs")? {
                LogOutput::StdErr { message } => stderr.write_all(&message).await?,
                LogOutput::StdOut { message } | LogOutput::Console { message } => {
                    stdout.write_all(&message).await?;
                }
                LogOutput::StdIn { .. } => {}
            }
        }
        stdout.flush().await?;
        stderr.flush().await?;
        Ok(())
    }
}

fn check(output: &Output, what: &str) -> Result<(), DdevError> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!("compose {what}: stdout={stdout:?} stderr={stderr:?}");
    if output.status.success() {
        return Ok(());
    }
    let detail = stderr
        .lines()
        .chain(stdout.lines())
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("; ");
    Err(DdevError::Compose(format!(
        "{what} exited with {}: {detail}",
        output.status
    )))
}

/// `docker-compose`, or `docker compose` where only the plugin is installed.
#[derive(Debug, Clone)]
struct ComposeCli {
    program: PathBuf,
    prefix: Vec<String>,
}

impl ComposeCli {
    fn detect() -> Result<Self> {
        if let Some(program) = which("docker-compose") {
            return Ok(Self {
                program,
                prefix: Vec::new(),
            });
        }
        if let Some(program) = which("docker") {
            return Ok(Self {
                program,
                prefix: vec!["compose".to_string()],
            });
        }
        Err(DdevError::Compose("neither docker-compose nor docker was found in PATH".into()).into())
    }

    fn command(&self, project: &ComposeProject) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix).arg("-p").arg(&project.name);
        for file in &project.files {
            cmd.arg("-f").arg(file);
        }
        cmd
    }
}
