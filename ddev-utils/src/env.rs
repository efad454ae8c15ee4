//! Environment variable and path utilities.

use anyhow::{Context, Result};
use ddev_core::DdevHome;
use std::path::PathBuf;
use tracing::debug;
use url::Url;

/// Overrides the per-user state directory.
pub const DDEV_HOME: &str = "DDEV_HOME";
/// Disables prompts and privilege escalation.
pub const DDEV_NONINTERACTIVE: &str = "DDEV_NONINTERACTIVE";
/// Raises log verbosity.
pub const DDEV_DEBUG: &str = "DDEV_DEBUG";
pub const DOCKER_HOST: &str = "DOCKER_HOST";

const LOOPBACK: &str = "127.0.0.1";

pub fn is_noninteractive() -> bool {
    std::env::var_os(DDEV_NONINTERACTIVE).is_some()
}

pub fn is_debug() -> bool {
    std::env::var_os(DDEV_DEBUG).is_some()
}

/// Returns the user's home directory.
pub fn get_home_dir() -> Option<PathBuf> {
    directories::UserDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
}

/// The per-user state directory: `$DDEV_HOME`, else `~/.ddev`.
pub fn ddev_home() -> Result<DdevHome> {
    if let Some(root) = std::env::var_os(DDEV_HOME).filter(|v| !v.is_empty()) {
        return Ok(DdevHome::new(PathBuf::from(root)));
    }
    let home = get_home_dir().context("could not determine the home directory for the current user")?;
    Ok(DdevHome::new(home.join(".ddev")))
}

/// Looks `bin` up on `PATH`.
pub fn which(bin: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(bin))
        .find(|candidate| candidate.is_file())
}

/// Finds a companion binary: beside the current executable, one level up
/// (test binaries live in `deps/`), then on `PATH`.
pub fn find_helper(bin: &str) -> Option<PathBuf> {
    if let Ok(exe_path) = std::env::current_exe()
        && let Some(dir) = exe_path.parent()
    {
        for candidate in [Some(dir.join(bin)), dir.parent().map(|p| p.join(bin))]
            .into_iter()
            .flatten()
        {
            if candidate.is_file() {
                debug!("Found {bin} at {}", candidate.display());
                return Some(candidate);
            }
        }
    }
    which(bin)
}

/// The address project hostnames should resolve to.
pub fn loopback_target() -> String {
    docker_host_ip(std::env::var(DOCKER_HOST).ok().as_deref())
}

/// `127.0.0.1`, or the host portion of a network `DOCKER_HOST` URL.
pub fn docker_host_ip(docker_host: Option<&str>) -> String {
    docker_host
        .filter(|value| !value.is_empty())
        .and_then(|value| Url::parse(value).ok())
        .filter(|url| url.scheme() != "unix" && url.scheme() != "npipe")
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| LOOPBACK.to_string())
}
