//! Container label conventions.
//!
//! Every container this system creates carries these labels; the container
//! runtime is the source of truth, so lookups go through them.

use std::collections::BTreeMap;

pub const SITE_NAME: &str = "com.ddev.site-name";
pub const APPROOT: &str = "com.ddev.approot";
pub const PLATFORM: &str = "com.ddev.platform";
pub const CONTAINER_TYPE: &str = "com.ddev.container-type";
pub const APP_TYPE: &str = "com.ddev.app-type";
pub const APP_URL: &str = "com.ddev.app-url";
pub const COMPOSE_SERVICE: &str = "com.docker.compose.service";
/// Comma-separated `hostPort:containerPort` pairs the router should publish.
pub const HTTP_EXPOSE: &str = "HTTP_EXPOSE";

/// Value of the platform label.
pub const PLATFORM_TAG: &str = "ddev";

/// Container types.
pub const WEB: &str = "web";
pub const DB: &str = "db";
pub const DBA: &str = "dba";
pub const ROUTER: &str = "router";

/// A label selector. A container matches when its labels are a superset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector(BTreeMap<String, String>);

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every container owned by this system.
    pub fn platform() -> Self {
        Self::new().with(PLATFORM, PLATFORM_TAG)
    }

    /// Every container belonging to the named project.
    pub fn site(name: &str) -> Self {
        Self::new().with(SITE_NAME, name)
    }

    /// One service of the named project.
    pub fn service(name: &str, container_type: &str) -> Self {
        Self::site(name).with(CONTAINER_TYPE, container_type)
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0.iter().all(|(k, v)| labels.get(k) == Some(v))
    }

    /// `key=value` strings in the shape the engine's label filter expects.
    pub fn to_filters(&self) -> Vec<String> {
        self.0.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_filters().join(","))
    }
}
