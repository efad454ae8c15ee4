//! Project model shared by the ddev crates.

pub mod config;
pub use config::{AppType, HookEntry, HookName, HookTask, Project, ProjectConfig};
pub mod error;
pub use error::{DdevError, ErrorKind};
pub mod home;
pub use home::DdevHome;
pub mod hosts;
pub use hosts::HostsFile;
pub mod labels;
pub mod state;
pub use state::{ContainerHealth, SiteStatus};
