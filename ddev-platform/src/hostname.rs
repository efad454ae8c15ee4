//! Hosts-file integration: make `<name>.ddev.local` resolve to the engine.

use anyhow::{Context, Result};
use ddev_core::{DdevError, HostsFile};
use ddev_utils::env;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Name of the privileged helper binary.
pub const HELPER_BIN: &str = "ddev-hostname";

/// How an entry gets into the hosts file when it is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Elevation {
    /// Already privileged; write directly.
    InProcess,
    /// Re-invoke the helper through `sudo`.
    Helper { sudo: PathBuf, helper: PathBuf },
    /// Tell the user what to add.
    PrintOnly,
}

impl Elevation {
    pub fn detect() -> Self {
        if nix::unistd::geteuid().is_root() {
            return Self::InProcess;
        }
        if env::is_noninteractive() {
            return Self::PrintOnly;
        }
        match (env::which("sudo"), env::find_helper(HELPER_BIN)) {
            (Some(sudo), Some(helper)) => Self::Helper { sudo, helper },
            _ => Self::PrintOnly,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostsOutcome {
    AlreadyPresent,
    Added,
    /// The entry was not written; the user was shown this line instead.
    Printed(String),
}

/// Shared by every project on the host. Entries are added, never removed.
#[derive(Debug, Clone)]
pub struct HostsManager {
    hosts: HostsFile,
    ip: String,
    elevation: Elevation,
}

impl HostsManager {
    pub fn from_env() -> Self {
        Self::new(HostsFile::new(), env::loopback_target(), Elevation::detect())
    }

    pub const fn new(hosts: HostsFile, ip: String, elevation: Elevation) -> Self {
        Self {
            hosts,
            ip,
            elevation,
        }
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn hosts(&self) -> &HostsFile {
        &self.hosts
    }

    pub async fn add_entry(&self, hostname: &str) -> Result<HostsOutcome> {
        let content = self.hosts.read().await.map_err(|e| {
            DdevError::Io(format!(
                "failed to read hosts file {}: {e}",
                self.hosts.path().display()
            ))
        })?;
        if HostsFile::has_entry(&content, &self.ip, hostname) {
            debug!("{} already maps {}", self.hosts.path().display(), hostname);
            return Ok(HostsOutcome::AlreadyPresent);
        }

        match &self.elevation {
            Elevation::InProcess => {
                self.hosts
                    .write(&HostsFile::with_entry(&content, &self.ip, hostname))
                    .await
                    .map_err(|e| {
                        DdevError::Io(format!(
                            "failed to write hosts file {}: {e}",
                            self.hosts.path().display()
                        ))
                    })?;
                info!("Added {} to {}", hostname, self.hosts.path().display());
                Ok(HostsOutcome::Added)
            }
            Elevation::Helper { sudo, helper } => {
                info!("Running sudo to add {} to {}", hostname, self.hosts.path().display());
                let status = Command::new(sudo)
                    .arg("--preserve-env=HOME")
                    .arg(helper)
                    .args(["hostname", hostname, &self.ip])
                    .status()
                    .await
                    .with_context(|| format!("Failed to run {}", sudo.display()))?;
                if status.success() {
                    Ok(HostsOutcome::Added)
                } else {
                    warn!("{} exited with {}", HELPER_BIN, status);
                    Ok(self.print_instruction(hostname))
                }
            }
            Elevation::PrintOnly => Ok(self.print_instruction(hostname)),
        }
    }

    fn print_instruction(&self, hostname: &str) -> HostsOutcome {
        let line = HostsFile::entry_line(&self.ip, hostname);
        println!(
            "Add the following line to {} so {} resolves:\n{}",
            self.hosts.path().display(),
            hostname,
            line
        );
        HostsOutcome::Printed(line)
    }
}
