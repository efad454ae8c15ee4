//! The ddev project lifecycle: compose manifests, the shared router, hosts
//! entries, CMS settings, imports and hooks, all driven through a
//! [`runtime::ContainerRuntime`].

pub mod app;
pub use app::{Description, LocalApp, Platform};
pub mod hooks;
pub mod hostname;
pub use hostname::{Elevation, HostsManager, HostsOutcome};
pub mod import;
pub use import::{BackupProvider, ImportReport, import_from_provider};
pub mod list;
pub use list::{SiteList, SiteSummary};
pub mod manifest;
pub mod router;
pub use router::Router;
pub mod runtime;
pub use runtime::{ContainerRuntime, DockerRuntime, LogsRequest};
pub mod settings;
