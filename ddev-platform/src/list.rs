//! Every project known to the container engine, read back from labels.

use crate::app::Platform;
use crate::runtime::ContainerInfo;
use crate::settings::HOST_DB_HOST;
use anyhow::Result;
use ddev_core::SiteStatus;
use ddev_core::config::DB_PORT;
use ddev_core::labels::{self, Selector};
use std::collections::BTreeMap;
use std::fmt;

/// One row of `ddev list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteSummary {
    pub name: String,
    pub app_type: String,
    pub url: String,
    /// Host port of the db container, when it publishes one.
    pub db_port: Option<u16>,
    pub status: SiteStatus,
}

impl SiteSummary {
    fn from_containers(name: String, containers: &[ContainerInfo]) -> Self {
        let service = |kind: &str| {
            containers
                .iter()
                .find(|c| c.label(labels::CONTAINER_TYPE) == Some(kind))
        };
        let web = service(labels::WEB);
        let db = service(labels::DB);
        let label = |key: &str| {
            web.into_iter()
                .chain(containers)
                .find_map(|c| c.label(key))
                .unwrap_or_default()
                .to_string()
        };

        Self {
            app_type: label(labels::APP_TYPE),
            url: label(labels::APP_URL),
            db_port: db.and_then(|c| c.ports.get(&DB_PORT).copied()),
            status: SiteStatus::derive(web.map(ContainerInfo::health), db.map(ContainerInfo::health)),
            name,
        }
    }

    pub fn db_url(&self) -> String {
        self.db_port
            .map_or_else(String::new, |port| format!("{HOST_DB_HOST}:{port}"))
    }
}

/// Renders as the table `ddev list` prints.
#[derive(Debug, Clone, Default)]
pub struct SiteList(pub Vec<SiteSummary>);

impl SiteList {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteSummary> {
        self.0.iter()
    }
}

impl fmt::Display for SiteList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No Applications Found.");
        }
        let plural = if self.0.len() == 1 { "site" } else { "sites" };
        writeln!(f, "{} {plural} found.", self.0.len())?;

        let rows: Vec<[String; 5]> = self
            .iter()
            .map(|s| {
                [
                    s.name.clone(),
                    s.app_type.clone(),
                    s.url.clone(),
                    s.db_url(),
                    s.status.to_string(),
                ]
            })
            .collect();
        let header = ["NAME", "TYPE", "URL", "DATABASE URL", "STATUS"].map(str::to_string);
        let mut widths = header.clone().map(|h| h.len());
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }

        for row in std::iter::once(&header).chain(&rows) {
            let line = row
                .iter()
                .zip(widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ");
            writeln!(f, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

impl Platform {
    /// Groups every platform container by site name. The router is skipped.
    pub async fn list(&self) -> Result<SiteList> {
        let mut sites: BTreeMap<String, Vec<ContainerInfo>> = BTreeMap::new();
        for container in self.runtime.find_containers(&Selector::platform()).await? {
            if container.label(labels::CONTAINER_TYPE) == Some(labels::ROUTER) {
                continue;
            }
            let Some(name) = container.label(labels::SITE_NAME).map(str::to_string) else {
                continue;
            };
            sites.entry(name).or_default().push(container);
        }

        Ok(SiteList(
            sites
                .into_iter()
                .map(|(name, containers)| SiteSummary::from_containers(name, &containers))
                .collect(),
        ))
    }
}
