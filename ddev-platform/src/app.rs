//! The per-project lifecycle.

use crate::hooks::run_hooks;
use crate::hostname::HostsManager;
use crate::manifest::{self, NETWORK};
use crate::router::Router;
use crate::runtime::{
    self, ComposeAction, ComposeProject, ContainerInfo, ContainerRuntime, DockerRuntime,
    HEALTH_TIMEOUT, LogsRequest,
};
use crate::settings::{self, DB_NAME, DB_PASSWORD, DB_USER, HOST_DB_HOST};
use anyhow::Result;
use ddev_core::config::{DB_PORT, DBA_PORT, HookName, MAILHOG_PORT};
use ddev_core::labels::{self, Selector};
use ddev_core::{DdevError, DdevHome, Project, SiteStatus};
use ddev_utils::fs::remove_dir;
use ddev_utils::prompt::{self, Prompt};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Host-wide services shared by every project in one invocation.
#[derive(Debug, Clone)]
pub struct Platform {
    pub(crate) runtime: Arc<dyn ContainerRuntime>,
    pub(crate) home: DdevHome,
    pub(crate) hosts: HostsManager,
    pub(crate) prompt: Arc<dyn Prompt>,
    pub(crate) router: Router,
    health_timeout: Duration,
}

impl Platform {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        home: DdevHome,
        hosts: HostsManager,
        prompt: Arc<dyn Prompt>,
    ) -> Self {
        Self {
            router: Router::new(runtime.clone(), home.clone()),
            runtime,
            home,
            hosts,
            prompt,
            health_timeout: HEALTH_TIMEOUT,
        }
    }

    /// Connects to the engine and reads the state directory, hosts file and
    /// prompt mode from the environment.
    pub fn from_env() -> Result<Self> {
        let runtime = Arc::new(DockerRuntime::connect()?);
        Ok(Self::new(
            runtime,
            ddev_utils::env::ddev_home()?,
            HostsManager::from_env(),
            prompt::from_env(),
        ))
    }

    #[must_use]
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub const fn home(&self) -> &DdevHome {
        &self.home
    }

    pub const fn router(&self) -> &Router {
        &self.router
    }

    /// Loads the project at `app_root` and makes sure no other app root
    /// already owns its name.
    pub async fn init(&self, app_root: &Path) -> Result<LocalApp> {
        let project = Project::load(app_root, &self.home)?;
        let approot = project.app_root.display().to_string();

        let webs = self
            .runtime
            .find_containers(&Selector::service(project.name(), labels::WEB))
            .await?;
        if let Some(other) = webs
            .iter()
            .filter_map(|c| c.label(labels::APPROOT))
            .find(|root| *root != approot)
        {
            return Err(DdevError::NameConflict(format!(
                "a project named {} already exists at {other}; change the name in {} or remove the other project",
                project.name(),
                ddev_core::ProjectConfig::config_path(&project.app_root).display()
            ))
            .into());
        }

        debug!("Loaded project {} from {}", project.name(), approot);
        Ok(LocalApp {
            project,
            platform: self.clone(),
        })
    }
}

/// One project bound to the host services.
#[derive(Debug, Clone)]
pub struct LocalApp {
    pub(crate) project: Project,
    pub(crate) platform: Platform,
}

impl LocalApp {
    pub const fn project(&self) -> &Project {
        &self.project
    }

    pub(crate) fn runtime(&self) -> &dyn ContainerRuntime {
        self.platform.runtime.as_ref()
    }

    /// The project's compose files in the order the compose tool sees them.
    pub fn compose(&self) -> Result<ComposeProject> {
        Ok(ComposeProject {
            name: self.project.compose_project(),
            files: manifest::compose_files(&self.project.config_dir())?,
        })
    }

    pub(crate) async fn run_hooks(&self, hook: HookName) -> Result<()> {
        run_hooks(self.runtime(), &self.project, &self.compose()?, hook).await
    }

    fn selector(&self, service: &str) -> Selector {
        Selector::service(self.project.name(), service)
    }

    async fn container(&self, service: &str) -> Result<Option<ContainerInfo>> {
        Ok(self
            .runtime()
            .find_containers(&self.selector(service))
            .await?
            .into_iter()
            .next())
    }

    pub async fn site_status(&self) -> Result<SiteStatus> {
        let web = self.container(labels::WEB).await?.map(|c| c.health());
        let db = self.container(labels::DB).await?.map(|c| c.health());
        Ok(SiteStatus::derive(web, db))
    }

    /// Host port published for the db container's MySQL port.
    pub async fn db_published_port(&self) -> Result<u16> {
        let db = runtime::find_one(self.runtime(), &self.selector(labels::DB)).await?;
        Ok(db.published_port(DB_PORT)?)
    }

    pub async fn start(&self) -> Result<()> {
        let project = &self.project;
        manifest::write_manifest(&project.compose_yaml_path(), &manifest::render_project(project))?;
        for dir in [&project.data_dir, &project.import_dir] {
            std::fs::create_dir_all(dir)
                .map_err(|e| DdevError::Io(format!("failed to create {}: {e}", dir.display())))?;
        }

        self.run_hooks(HookName::PreStart).await?;
        self.platform.hosts.add_entry(&project.hostname()).await?;

        let compose = self.compose()?;
        self.runtime().ensure_network(NETWORK).await?;
        info!("Starting {}", project.name());
        self.runtime().compose(&compose, ComposeAction::Up).await?;
        self.platform.router.start().await?;

        for service in [labels::WEB, labels::DB] {
            runtime::wait_healthy(
                self.runtime(),
                &self.selector(service),
                self.platform.health_timeout,
            )
            .await?;
        }

        self.run_hooks(HookName::PostStart).await
    }

    pub async fn stop(&self) -> Result<()> {
        if self.site_status().await? == SiteStatus::NotFound {
            return Err(DdevError::NotFound(format!(
                "no containers found for {}; nothing to stop",
                self.project.name()
            ))
            .into());
        }
        info!("Stopping {}", self.project.name());
        self.runtime()
            .compose(&self.compose()?, ComposeAction::Stop)
            .await?;
        self.platform.router.stop().await
    }

    pub async fn down(&self, remove_data: bool) -> Result<()> {
        let project = &self.project;
        let down = match self.compose() {
            Ok(compose) => self.runtime().compose(&compose, ComposeAction::Down).await,
            Err(e) => Err(e),
        };
        if let Err(e) = down {
            warn!("compose down failed for {}: {:#}; removing containers directly", project.name(), e);
            self.remove_containers().await?;
        }

        if remove_data {
            for path in settings::remove_owned_settings(project)? {
                debug!("Removed owned settings file {}", path.display());
            }
            for dir in [&project.data_dir, &project.import_dir] {
                remove_dir(dir).map_err(|e| DdevError::Io(format!("{e:#}")))?;
            }
            info!("Removed data for {}", project.name());
        }

        self.platform.router.stop().await
    }

    async fn remove_containers(&self) -> Result<()> {
        let containers = self
            .runtime()
            .find_containers(&Selector::site(self.project.name()))
            .await?;
        for container in containers {
            if container.is_running()
                && let Err(e) = self.runtime().stop_container(&container.id).await
            {
                warn!("Failed to stop {}: {:#}", container.name(), e);
            }
            if let Err(e) = self.runtime().remove_container(&container.id, true, true).await {
                warn!("Failed to remove {}: {:#}", container.name(), e);
            }
        }
        Ok(())
    }

    pub async fn describe(&self) -> Result<Description> {
        let status = self.site_status().await?;
        if status == SiteStatus::NotFound {
            return Err(DdevError::NotFound(format!(
                "no containers found for {}; run start first",
                self.project.name()
            ))
            .into());
        }
        let db_port = if status.is_running() {
            Some(self.db_published_port().await?)
        } else {
            None
        };
        Ok(Description {
            name: self.project.name().to_string(),
            app_type: self.project.app_type().to_string(),
            app_root: self.project.app_root.clone(),
            url: self.project.url(),
            status,
            db_port,
        })
    }

    pub async fn exec(&self, service: &str, tty: bool, argv: &[String]) -> Result<String> {
        self.runtime()
            .compose_exec(&self.compose()?, service, tty, argv)
            .await
    }

    pub async fn logs(&self, service: &str, request: &LogsRequest) -> Result<()> {
        let container = runtime::find_one(self.runtime(), &self.selector(service)).await?;
        self.runtime().logs(&container.id, request).await
    }
}

/// What `describe` reports about a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
    pub name: String,
    pub app_type: String,
    pub app_root: PathBuf,
    pub url: String,
    pub status: SiteStatus,
    /// Published MySQL port; only known while running.
    pub db_port: Option<u16>,
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = self.app_root.display().to_string();
        let status = self.status.to_string();
        let widths = [
            self.name.len().max(4),
            self.app_type.len().max(4),
            location.len().max(8),
            self.url.len().max(3),
        ];
        writeln!(
            f,
            "{:<w0$}  {:<w1$}  {:<w2$}  {:<w3$}  STATUS",
            "NAME",
            "TYPE",
            "LOCATION",
            "URL",
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
        )?;
        writeln!(
            f,
            "{:<w0$}  {:<w1$}  {:<w2$}  {:<w3$}  {status}",
            self.name,
            self.app_type,
            location,
            self.url,
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
        )?;

        let Some(port) = self.db_port else {
            return Ok(());
        };
        writeln!(f)?;
        writeln!(f, "MySQL Credentials")?;
        writeln!(f, "-----------------")?;
        writeln!(f, "{:<15}{DB_USER}", "Username:")?;
        writeln!(f, "{:<15}{DB_PASSWORD}", "Password:")?;
        writeln!(f, "{:<15}{DB_NAME}", "Database name:")?;
        writeln!(f, "{:<15}{}", "Host:", settings::DB_HOST)?;
        writeln!(f, "{:<15}{DB_PORT}", "Port:")?;
        writeln!(
            f,
            "To connect to mysql from your host machine, use port {port} on {HOST_DB_HOST}."
        )?;
        writeln!(
            f,
            "For example: mysql --host={HOST_DB_HOST} --port={port} --user={DB_USER} --password={DB_PASSWORD} --database={DB_NAME}"
        )?;
        writeln!(f)?;
        writeln!(f, "Other Services")?;
        writeln!(f, "--------------")?;
        writeln!(f, "{:<15}{}:{MAILHOG_PORT}", "MailHog:", self.url)?;
        writeln!(f, "{:<15}{}:{DBA_PORT}", "phpMyAdmin:", self.url)
    }
}
