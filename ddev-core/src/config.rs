//! Project configuration: `<AppRoot>/.ddev/config.yaml` and the paths derived from it.

use crate::error::DdevError;
use crate::home::DdevHome;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

pub const CONFIG_DIR: &str = ".ddev";
pub const CONFIG_FILE: &str = "config.yaml";
pub const COMPOSE_FILE: &str = "docker-compose.yaml";

/// Top-level domain every project hostname lives under.
pub const DDEV_TLD: &str = "ddev.local";

pub const DEFAULT_WEB_IMAGE: &str = "drud/nginx-php-fpm-local:v0.6.0";
pub const DEFAULT_DB_IMAGE: &str = "drud/mysql-local-57:v0.4.0";
pub const DEFAULT_DBA_IMAGE: &str = "drud/phpmyadmin:v0.1.0";
pub const DEFAULT_ROUTER_IMAGE: &str = "drud/ddev-router:v0.3.0";

/// Web and MailHog, routed through the shared router.
pub const DEFAULT_WEB_HTTP_EXPOSE: &str = "80:80,8025:8025";
/// phpMyAdmin, routed through the shared router.
pub const DBA_HTTP_EXPOSE: &str = "8036:80";

pub const MAILHOG_PORT: u16 = 8025;
pub const DBA_PORT: u16 = 8036;
pub const DB_PORT: u16 = 3306;

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    Drupal7,
    Drupal8,
    Wordpress,
}

impl AppType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drupal7 => "drupal7",
            Self::Drupal8 => "drupal8",
            Self::Wordpress => "wordpress",
        }
    }

    pub const fn is_drupal(self) -> bool {
        matches!(self, Self::Drupal7 | Self::Drupal8)
    }

    /// Uploaded-files directory, relative to the docroot.
    pub const fn upload_dir(self) -> &'static str {
        match self {
            Self::Drupal7 | Self::Drupal8 => "sites/default/files",
            Self::Wordpress => "wp-content/uploads",
        }
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Points in the lifecycle where user hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookName {
    PreStart,
    PostStart,
    PreImportDb,
    PostImportDb,
    PreImportFiles,
    PostImportFiles,
}

impl HookName {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreStart => "pre-start",
            Self::PostStart => "post-start",
            Self::PreImportDb => "pre-import-db",
            Self::PostImportDb => "post-import-db",
            Self::PreImportFiles => "pre-import-files",
            Self::PostImportFiles => "post-import-files",
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hook entry as written in YAML: exactly one of `exec` / `exec-host`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<String>,
    #[serde(rename = "exec-host", default, skip_serializing_if = "Option::is_none")]
    pub exec_host: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookTask {
    /// Shell line run inside the web container.
    Exec(String),
    /// Command line run on the host from the app root.
    ExecHost(String),
}

impl HookEntry {
    pub fn task(&self) -> Result<HookTask, String> {
        match (&self.exec, &self.exec_host) {
            (Some(cmd), None) => Ok(HookTask::Exec(cmd.clone())),
            (None, Some(cmd)) => Ok(HookTask::ExecHost(cmd.clone())),
            (Some(_), Some(_)) => Err("hook entry sets both exec and exec-host".into()),
            (None, None) => Err("hook entry sets neither exec nor exec-host".into()),
        }
    }
}

/// A single `hostPort:containerPort` pair from an `HTTP_EXPOSE` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

/// Parses a comma-separated `HTTP_EXPOSE` value. A bare port means `port:port`.
pub fn parse_http_expose(value: &str) -> Result<Vec<PortMapping>, String> {
    let mut mappings = Vec::new();
    for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (host, container) = pair.split_once(':').unwrap_or((pair, pair));
        let host = host
            .trim()
            .parse::<u16>()
            .map_err(|_| format!("invalid host port in {pair:?}"))?;
        let container = container
            .trim()
            .parse::<u16>()
            .map_err(|_| format!("invalid container port in {pair:?}"))?;
        mappings.push(PortMapping { host, container });
    }
    Ok(mappings)
}

/// The contents of `.ddev/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(rename = "APIVersion", default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub app_type: AppType,
    #[serde(default)]
    pub docroot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webimage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dbimage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dbaimage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_expose: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hooks: BTreeMap<HookName, Vec<HookEntry>>,
}

impl ProjectConfig {
    pub fn config_path(app_root: &Path) -> PathBuf {
        app_root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    pub fn from_yaml(content: &str) -> Result<Self, DdevError> {
        serde_yaml::from_str(content).map_err(|e| DdevError::ConfigInvalid(e.to_string()))
    }

    /// Reads and validates the config file of `app_root`.
    pub fn load(app_root: &Path) -> Result<Self> {
        let path = Self::config_path(app_root);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            DdevError::ConfigInvalid(format!("unable to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| DdevError::ConfigInvalid(format!("{}: {e}", path.display())))?;
        config.validate(app_root)?;
        Ok(config)
    }

    pub fn validate(&self, app_root: &Path) -> Result<(), DdevError> {
        if !is_valid_name(&self.name) {
            return Err(DdevError::ConfigInvalid(format!(
                "project name {:?} must match [a-z0-9-]+",
                self.name
            )));
        }

        let docroot = Path::new(&self.docroot);
        if docroot
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(DdevError::ConfigInvalid(format!(
                "docroot {:?} must be a relative path inside the app root",
                self.docroot
            )));
        }
        if !app_root.join(docroot).is_dir() {
            return Err(DdevError::ConfigInvalid(format!(
                "docroot {:?} does not exist in {}",
                self.docroot,
                app_root.display()
            )));
        }

        if let Some(expose) = &self.http_expose {
            parse_http_expose(expose)
                .map_err(|e| DdevError::ConfigInvalid(format!("http_expose: {e}")))?;
        }

        for (hook, entries) in &self.hooks {
            for entry in entries {
                entry
                    .task()
                    .map_err(|e| DdevError::ConfigInvalid(format!("{hook}: {e}")))?;
            }
        }
        Ok(())
    }
}

/// Walks `start` and its parents looking for `.ddev/config.yaml`.
pub fn find_app_root(start: &Path) -> Result<PathBuf, DdevError> {
    start
        .ancestors()
        .find(|dir| ProjectConfig::config_path(dir).is_file())
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            DdevError::ConfigInvalid(format!(
                "no {CONFIG_DIR}/{CONFIG_FILE} found in {} or any parent directory",
                start.display()
            ))
        })
}

/// A validated project bound to its absolute app root and state directory.
#[derive(Debug, Clone)]
pub struct Project {
    pub config: ProjectConfig,
    pub app_root: PathBuf,
    pub data_dir: PathBuf,
    pub import_dir: PathBuf,
    pub import_lock: PathBuf,
}

impl Project {
    pub fn load(app_root: &Path, home: &DdevHome) -> Result<Self> {
        let app_root = app_root.canonicalize().map_err(|e| {
            DdevError::ConfigInvalid(format!("unable to resolve {}: {e}", app_root.display()))
        })?;
        let config = ProjectConfig::load(&app_root)?;
        Ok(Self::new(config, app_root, home))
    }

    pub fn new(config: ProjectConfig, app_root: PathBuf, home: &DdevHome) -> Self {
        Self {
            data_dir: home.data_dir(&config.name),
            import_dir: home.import_dir(&config.name),
            import_lock: home.import_lock_path(&config.name),
            config,
            app_root,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub const fn app_type(&self) -> AppType {
        self.config.app_type
    }

    pub fn hostname(&self) -> String {
        format!("{}.{DDEV_TLD}", self.config.name)
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.hostname())
    }

    pub fn docroot(&self) -> PathBuf {
        self.app_root.join(&self.config.docroot)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.app_root.join(CONFIG_DIR)
    }

    pub fn compose_yaml_path(&self) -> PathBuf {
        self.config_dir().join(COMPOSE_FILE)
    }

    /// Compose project name, which scopes container and network names.
    pub fn compose_project(&self) -> String {
        format!("ddev-{}", self.config.name)
    }

    /// The CMS settings file the application reads.
    pub fn site_settings_path(&self) -> PathBuf {
        match self.app_type() {
            AppType::Drupal7 | AppType::Drupal8 => {
                self.docroot().join("sites/default/settings.php")
            }
            AppType::Wordpress => self.docroot().join("wp-config.php"),
        }
    }

    /// Settings for host-side tooling, where the CMS has one.
    pub fn site_local_settings_path(&self) -> Option<PathBuf> {
        self.app_type()
            .is_drupal()
            .then(|| self.app_root.join("drush.settings.php"))
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.docroot().join(self.app_type().upload_dir())
    }

    pub fn web_image(&self) -> &str {
        self.config.webimage.as_deref().unwrap_or(DEFAULT_WEB_IMAGE)
    }

    pub fn db_image(&self) -> &str {
        self.config.dbimage.as_deref().unwrap_or(DEFAULT_DB_IMAGE)
    }

    pub fn dba_image(&self) -> &str {
        self.config.dbaimage.as_deref().unwrap_or(DEFAULT_DBA_IMAGE)
    }

    pub fn http_expose(&self) -> &str {
        self.config
            .http_expose
            .as_deref()
            .unwrap_or(DEFAULT_WEB_HTTP_EXPOSE)
    }

    pub fn hooks(&self, hook: HookName) -> &[HookEntry] {
        self.config.hooks.get(&hook).map_or(&[], Vec::as_slice)
    }
}
