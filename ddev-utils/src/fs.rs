use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolves an archive entry name under `root`.
///
/// Entry names are always `/`-separated. Absolute names and `./` segments are
/// taken relative to `root`, and `..` may only cancel a segment the name
/// itself introduced.
///
/// # Errors
///
/// Returns an error when `..` would climb out of `root`.
pub fn safe_join(root: &Path, entry_name: &str) -> Result<PathBuf> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in entry_name.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(anyhow!("path traversal detected: {entry_name}"));
                }
            }
            segment => segments.push(segment),
        }
    }
    Ok(segments.iter().fold(root.to_path_buf(), |path, s| path.join(s)))
}

/// Empties `dir`, creating it if absent. The directory itself survives.
pub fn purge_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()));
    }
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let path = entry?.path();
        let result = if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.with_context(|| format!("failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Removes `dir` and everything below it. Missing directories are fine.
pub fn remove_dir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", dir.display())),
    }
}

/// Recursively copies the regular files and directories of `src` into `dest`.
/// Symlinks and special files are skipped.
pub fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).with_context(|| format!("failed to create {}", dest.display()))?;

    for entry in fs::read_dir(src).with_context(|| format!("failed to read {}", src.display()))? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target = dest.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
        } else {
            debug!("Skipping non-regular file {}", entry.path().display());
        }
    }
    Ok(())
}

#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("failed to chmod {:o} {}", mode, path.display()))
}

#[cfg(not(unix))]
pub fn set_mode(path: &Path, _mode: u32) -> Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(false);
    fs::set_permissions(path, perms)
        .with_context(|| format!("failed to update permissions of {}", path.display()))
}
