//! The shared reverse proxy in front of every running project.
//!
//! The router runs iff at least one project container is running. Its published
//! ports are the union of the host sides of every running container's
//! `HTTP_EXPOSE` label, recomputed from the engine on each transition.

use crate::manifest::{self, NETWORK, ROUTER_PROJECT};
use crate::runtime::{ComposeAction, ComposeProject, ContainerInfo, ContainerRuntime};
use anyhow::Result;
use ddev_core::config::parse_http_expose;
use ddev_core::labels::{self, Selector};
use ddev_core::DdevHome;
use ddev_utils::lock::FileLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Port the router always publishes when nothing else is declared.
pub const DEFAULT_ROUTER_PORT: u16 = 80;

#[derive(Debug, Clone)]
pub struct Router {
    runtime: Arc<dyn ContainerRuntime>,
    home: DdevHome,
}

fn is_router(container: &ContainerInfo) -> bool {
    container.label(labels::CONTAINER_TYPE) == Some(labels::ROUTER)
}

impl Router {
    pub const fn new(runtime: Arc<dyn ContainerRuntime>, home: DdevHome) -> Self {
        Self { runtime, home }
    }

    fn compose_project(&self) -> ComposeProject {
        ComposeProject {
            name: ROUTER_PROJECT.to_string(),
            files: vec![self.home.router_compose_path()],
        }
    }

    /// Running containers of every project, router excluded.
    async fn project_containers(&self) -> Result<Vec<ContainerInfo>> {
        Ok(self
            .runtime
            .find_containers(&Selector::platform())
            .await?
            .into_iter()
            .filter(|c| c.is_running() && !is_router(c))
            .collect())
    }

    /// Host ports the router must publish for the currently running projects.
    pub async fn required_ports(&self) -> Result<BTreeSet<u16>> {
        let mut ports = BTreeSet::new();
        for container in self.project_containers().await? {
            let Some(expose) = container.label(labels::HTTP_EXPOSE) else {
                continue;
            };
            match parse_http_expose(expose) {
                Ok(mappings) => ports.extend(mappings.iter().map(|m| m.host)),
                Err(e) => warn!("Ignoring {} on {}: {}", labels::HTTP_EXPOSE, container.name(), e),
            }
        }
        if ports.is_empty() {
            ports.insert(DEFAULT_ROUTER_PORT);
        }
        Ok(ports)
    }

    pub async fn is_running(&self) -> Result<bool> {
        let selector = Selector::platform().with(labels::CONTAINER_TYPE, labels::ROUTER);
        Ok(self
            .runtime
            .find_containers(&selector)
            .await?
            .iter()
            .any(ContainerInfo::is_running))
    }

    /// Brings the router up with the current port set. A no-op when it is
    /// already running with an identical manifest.
    pub async fn start(&self) -> Result<()> {
        let _lock = FileLock::acquire(&self.home.router_lock_path()).await?;
        self.reconcile_up().await
    }

    async fn reconcile_up(&self) -> Result<()> {
        let path = self.home.router_compose_path();
        let rendered = manifest::render_router(&self.required_ports().await?);
        let current = std::fs::read_to_string(&path).ok();

        if current.as_deref() == Some(rendered.as_str()) && self.is_running().await? {
            debug!("Router is up to date");
            return Ok(());
        }

        manifest::write_manifest(&path, &rendered)?;
        self.runtime.ensure_network(NETWORK).await?;
        info!("Starting router");
        self.runtime
            .compose(&self.compose_project(), ComposeAction::Up)
            .await
    }

    /// Takes the router down once no project is running; otherwise refreshes
    /// its port set.
    pub async fn stop(&self) -> Result<()> {
        let _lock = FileLock::acquire(&self.home.router_lock_path()).await?;

        let remaining = self.project_containers().await?.len();
        if remaining > 0 {
            debug!("{} project container(s) still running; keeping router", remaining);
            return self.reconcile_up().await;
        }
        if !self.home.router_compose_path().exists() {
            return Ok(());
        }
        info!("Stopping router");
        self.runtime
            .compose(&self.compose_project(), ComposeAction::Down)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fake::FakeRuntime;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn web(name: &str, site: &str, expose: &str, state: &str) -> ContainerInfo {
        ContainerInfo {
            id: name.to_string(),
            names: vec![format!("/{name}")],
            state: state.to_string(),
            status: "Up 1 second (healthy)".into(),
            labels: BTreeMap::from([
                (labels::PLATFORM.to_string(), labels::PLATFORM_TAG.to_string()),
                (labels::SITE_NAME.to_string(), site.to_string()),
                (labels::CONTAINER_TYPE.to_string(), labels::WEB.to_string()),
                (labels::HTTP_EXPOSE.to_string(), expose.to_string()),
            ]),
            ports: BTreeMap::new(),
        }
    }

    fn router(dir: &TempDir) -> (Arc<FakeRuntime>, Router) {
        let rt = Arc::new(FakeRuntime::new());
        let router = Router::new(rt.clone(), DdevHome::new(dir.path().to_path_buf()));
        (rt, router)
    }

    #[tokio::test]
    async fn ports_are_the_union_of_running_projects() {
        let dir = TempDir::new().unwrap();
        let (rt, router) = router(&dir);
        assert_eq!(router.required_ports().await.unwrap(), BTreeSet::from([80]));

        rt.insert("ddev-wp1", web("ddev-wp1-web", "wp1", "80:80,8025:8025", "running"));
        rt.insert("ddev-wp2", web("ddev-wp2-web", "wp2", "8080:80", "running"));
        rt.insert("ddev-wp3", web("ddev-wp3-web", "wp3", "9090:80", "exited"));
        assert_eq!(
            router.required_ports().await.unwrap(),
            BTreeSet::from([80, 8025, 8080])
        );
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (rt, router) = router(&dir);
        rt.insert("ddev-wp1", web("ddev-wp1-web", "wp1", "80:80", "running"));

        router.start().await.unwrap();
        router.start().await.unwrap();
        assert_eq!(rt.calls(), vec!["up ddev-router"]);
        assert!(router.is_running().await.unwrap());
        assert_eq!(rt.networks(), vec![NETWORK]);

        rt.insert("ddev-wp2", web("ddev-wp2-web", "wp2", "8080:80", "running"));
        router.start().await.unwrap();
        assert_eq!(rt.calls(), vec!["up ddev-router", "up ddev-router"]);
        let manifest = std::fs::read_to_string(dir.path().join("router-compose.yaml")).unwrap();
        assert!(manifest.contains("\"8080:8080\""));
    }

    #[tokio::test]
    async fn stop_waits_for_the_last_project() {
        let dir = TempDir::new().unwrap();
        let (rt, router) = router(&dir);
        rt.insert("ddev-wp1", web("ddev-wp1-web", "wp1", "80:80", "running"));
        router.start().await.unwrap();

        router.stop().await.unwrap();
        assert!(router.is_running().await.unwrap());

        for c in rt.containers() {
            if c.label(labels::SITE_NAME) == Some("wp1") {
                rt.stop_container(&c.id).await.unwrap();
            }
        }
        router.stop().await.unwrap();
        assert!(!router.is_running().await.unwrap());
        assert_eq!(rt.calls().last().unwrap(), "down ddev-router");
    }
}
