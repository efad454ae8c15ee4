//! In-memory engine for tests. `compose up` reads the manifests it is given
//! and materializes one healthy container per service, carrying the labels
//! and port mappings the manifest declares.

use super::{ComposeAction, ComposeProject, ContainerInfo, ContainerRuntime, LogsRequest};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use ddev_core::DdevError;
use ddev_core::labels::Selector;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

type ExecHandler = Box<dyn Fn(&str, &[String]) -> Result<String> + Send + Sync>;

#[derive(Debug, Clone)]
struct FakeContainer {
    info: ContainerInfo,
    project: String,
}

#[derive(Default)]
struct State {
    containers: Vec<FakeContainer>,
    networks: Vec<String>,
    calls: Vec<String>,
    next_id: u32,
    next_port: u16,
    fail_down: Vec<String>,
    health_override: BTreeMap<String, String>,
}

#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<State>,
    on_exec: Mutex<Option<ExecHandler>>,
}

impl std::fmt::Debug for FakeRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeRuntime").finish_non_exhaustive()
    }
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Every call made so far, e.g. `up ddev-wp1` or `exec ddev-wp1 db bash -c ...`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn networks(&self) -> Vec<String> {
        self.state().networks.clone()
    }

    /// Makes `compose down` of `project` fail from now on.
    pub fn fail_compose_down(&self, project: &str) {
        self.state().fail_down.push(project.to_string());
    }

    /// Status string reported by containers of `container_name` from now on.
    pub fn set_status(&self, container_name: &str, status: &str) {
        let mut state = self.state();
        state
            .health_override
            .insert(container_name.to_string(), status.to_string());
        for c in &mut state.containers {
            if c.info.name() == container_name {
                c.info.status = status.to_string();
            }
        }
    }

    pub fn on_exec(&self, handler: impl Fn(&str, &[String]) -> Result<String> + Send + Sync + 'static) {
        *self.on_exec.lock().unwrap() = Some(Box::new(handler));
    }

    /// Adds a container directly, as if another tool had created it.
    pub fn insert(&self, project: &str, info: ContainerInfo) {
        self.state().containers.push(FakeContainer {
            info,
            project: project.to_string(),
        });
    }

    pub fn containers(&self) -> Vec<ContainerInfo> {
        self.state().containers.iter().map(|c| c.info.clone()).collect()
    }

    fn up(&self, project: &ComposeProject) -> Result<()> {
        let mut services: BTreeMap<String, Value> = BTreeMap::new();
        for file in &project.files {
            let content = std::fs::read_to_string(file)
                .map_err(|e| DdevError::Compose(format!("{}: {e}", file.display())))?;
            let doc: Value = serde_yaml::from_str(&content)
                .map_err(|e| DdevError::Compose(format!("{}: {e}", file.display())))?;
            if let Some(map) = doc.get("services").and_then(Value::as_mapping) {
                for (name, service) in map {
                    if let Some(name) = name.as_str() {
                        services.insert(name.to_string(), service.clone());
                    }
                }
            }
        }

        let mut state = self.state();
        for (service, spec) in services {
            let container_name = spec
                .get("container_name")
                .and_then(Value::as_str)
                .map_or_else(|| format!("{}_{service}_1", project.name), str::to_string);

            let labels: BTreeMap<String, String> = spec
                .get("labels")
                .and_then(Value::as_mapping)
                .map(|m| {
                    m.iter()
                        .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
                        .collect()
                })
                .unwrap_or_default();

            let mut ports = BTreeMap::new();
            for port in spec
                .get("ports")
                .and_then(Value::as_sequence)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
            {
                let (host, private) = match port.split_once(':') {
                    Some((host, private)) => (host.parse::<u16>()?, private.parse::<u16>()?),
                    None => {
                        state.next_port += 1;
                        (32768 + state.next_port, port.parse::<u16>()?)
                    }
                };
                ports.insert(private, host);
            }

            let status = state
                .health_override
                .get(&container_name)
                .cloned()
                .unwrap_or_else(|| "Up 1 second (healthy)".to_string());

            if let Some(existing) = state
                .containers
                .iter_mut()
                .find(|c| c.info.name() == container_name)
            {
                existing.info.state = "running".into();
                existing.info.status = status;
                existing.info.labels = labels;
                existing.info.ports = ports;
                continue;
            }

            state.next_id += 1;
            let id = format!("fake{:04}", state.next_id);
            state.containers.push(FakeContainer {
                info: ContainerInfo {
                    id,
                    names: vec![format!("/{container_name}")],
                    state: "running".into(),
                    status,
                    labels,
                    ports,
                },
                project: project.name.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn find_containers(&self, selector: &Selector) -> Result<Vec<ContainerInfo>> {
        Ok(self
            .state()
            .containers
            .iter()
            .filter(|c| selector.matches(&c.info.labels))
            .map(|c| c.info.clone())
            .collect())
    }

    async fn ensure_network(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        if !state.networks.iter().any(|n| n == name) {
            state.networks.push(name.to_string());
        }
        Ok(())
    }

    async fn compose(&self, project: &ComposeProject, action: ComposeAction) -> Result<()> {
        let verb = match action {
            ComposeAction::Up => "up",
            ComposeAction::Down => "down",
            ComposeAction::Stop => "stop",
        };
        self.state().calls.push(format!("{verb} {}", project.name));

        match action {
            ComposeAction::Up => self.up(project),
            ComposeAction::Stop => {
                for c in &mut self.state().containers {
                    if c.project == project.name {
                        c.info.state = "exited".into();
                        c.info.status = "Exited (0) 1 second ago".into();
                    }
                }
                Ok(())
            }
            ComposeAction::Down => {
                let mut state = self.state();
                if state.fail_down.contains(&project.name) {
                    return Err(DdevError::Compose(format!("down {} exited with 1", project.name)).into());
                }
                state.containers.retain(|c| c.project != project.name);
                Ok(())
            }
        }
    }

    async fn compose_exec(
        &self,
        project: &ComposeProject,
        service: &str,
        _tty: bool,
        argv: &[String],
    ) -> Result<String> {
        self.state()
            .calls
            .push(format!("exec {} {service} {}", project.name, argv.join(" ")));
        match &*self.on_exec.lock().unwrap() {
            Some(handler) => handler(service, argv),
            None => Ok(String::new()),
        }
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("stop-container {id}"));
        let container = state
            .containers
            .iter_mut()
            .find(|c| c.info.id == id)
            .ok_or_else(|| anyhow!("no such container {id}"))?;
        container.info.state = "exited".into();
        Ok(())
    }

    async fn remove_container(&self, id: &str, _force: bool, _remove_volumes: bool) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("remove-container {id}"));
        state.containers.retain(|c| c.info.id != id);
        Ok(())
    }

    async fn logs(&self, id: &str, request: &LogsRequest) -> Result<()> {
        self.state()
            .calls
            .push(format!("logs {id} follow={} tail={}", request.follow, request.tail));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{find_one, wait_healthy};
    use ddev_core::labels;
    use std::time::Duration;

    fn container(name: &str, site: &str, kind: &str, status: &str) -> ContainerInfo {
        ContainerInfo {
            id: name.to_string(),
            names: vec![format!("/{name}")],
            state: "running".into(),
            status: status.into(),
            labels: [
                (labels::SITE_NAME.to_string(), site.to_string()),
                (labels::CONTAINER_TYPE.to_string(), kind.to_string()),
            ]
            .into_iter()
            .collect(),
            ports: BTreeMap::from([(3306, 32801)]),
        }
    }

    #[tokio::test]
    async fn find_one_requires_exactly_one() {
        let rt = FakeRuntime::new();
        let selector = Selector::service("wp1", labels::DB);
        let err = find_one(&rt, &selector).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<DdevError>(), Some(DdevError::NotFound(_))));

        rt.insert("ddev-wp1", container("ddev-wp1-db", "wp1", "db", "Up (healthy)"));
        let db = find_one(&rt, &selector).await.unwrap();
        assert_eq!(db.published_port(3306).unwrap(), 32801);
        assert!(db.published_port(80).is_err());

        rt.insert("ddev-wp1", container("ddev-wp1-db2", "wp1", "db", "Up (healthy)"));
        assert!(find_one(&rt, &selector).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_healthy_times_out() {
        let rt = FakeRuntime::new();
        rt.insert(
            "ddev-wp1",
            container("ddev-wp1-web", "wp1", "web", "Up 1 second (health: starting)"),
        );
        let selector = Selector::service("wp1", labels::WEB);

        let err = wait_healthy(&rt, &selector, Duration::from_secs(35))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DdevError>(),
            Some(DdevError::HealthTimeout(_))
        ));
        assert!(err.to_string().contains("web did not become healthy within 35s"));
        assert!(err.to_string().contains("starting"));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_healthy_succeeds_once_healthy() {
        let rt = std::sync::Arc::new(FakeRuntime::new());
        rt.insert(
            "ddev-wp1",
            container("ddev-wp1-db", "wp1", "db", "Up 1 second (health: starting)"),
        );
        let flipper = rt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            flipper.set_status("ddev-wp1-db", "Up 4 seconds (healthy)");
        });

        wait_healthy(rt.as_ref(), &Selector::service("wp1", labels::DB), Duration::from_secs(35))
            .await
            .unwrap();
    }
}
