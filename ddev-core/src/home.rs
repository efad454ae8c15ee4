//! Layout of the per-user state directory.

use std::path::{Path, PathBuf};

pub const ROUTER_COMPOSE_FILE: &str = "router-compose.yaml";

/// The per-user state directory (normally `~/.ddev`).
///
/// Holds the router manifest and one subdirectory per project name with the
/// project's `data` and `import` directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdevHome {
    root: PathBuf,
}

impl DdevHome {
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn router_compose_path(&self) -> PathBuf {
        self.root.join(ROUTER_COMPOSE_FILE)
    }

    pub fn router_lock_path(&self) -> PathBuf {
        self.root.join(format!("{ROUTER_COMPOSE_FILE}.lock"))
    }

    pub fn project_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn data_dir(&self, name: &str) -> PathBuf {
        self.project_dir(name).join("data")
    }

    pub fn import_dir(&self, name: &str) -> PathBuf {
        self.project_dir(name).join("import")
    }

    /// Lives beside the import directory so purging it never drops the lock.
    pub fn import_lock_path(&self, name: &str) -> PathBuf {
        self.project_dir(name).join("import.lock")
    }
}
