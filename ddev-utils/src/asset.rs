//! Validation of user-supplied import paths.

use crate::archive::ArchiveKind;
use crate::env::get_home_dir;
use anyhow::{Context, Result};
use ddev_core::DdevError;
use std::fmt;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetType {
    Db,
    Files,
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Db => "database",
            Self::Files => "files",
        })
    }
}

/// A validated import source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Absolute, lexically clean path.
    pub path: PathBuf,
    /// Set when the path names an archive; the caller picks the extractor.
    pub archive: Option<ArchiveKind>,
}

impl Asset {
    pub const fn is_archive(&self) -> bool {
        self.archive.is_some()
    }
}

/// Resolves `raw` against the current directory and the user's home.
pub fn validate_asset(raw: &str, asset_type: AssetType) -> Result<Asset> {
    let cwd = std::env::current_dir().context("failed to determine working directory")?;
    validate_asset_in(raw, asset_type, get_home_dir().as_deref(), &cwd)
}

pub fn validate_asset_in(
    raw: &str,
    asset_type: AssetType,
    home: Option<&Path>,
    cwd: &Path,
) -> Result<Asset> {
    let expanded = expand_tilde(raw.trim(), home);
    let path = clean(&cwd.join(expanded));

    if !path.exists() {
        return Err(DdevError::AssetInvalid(format!(
            "{asset_type} import path {} does not exist",
            path.display()
        ))
        .into());
    }

    if let Some(kind) = ArchiveKind::from_path(&path) {
        return Ok(Asset {
            path,
            archive: Some(kind),
        });
    }

    match asset_type {
        AssetType::Files if !path.is_dir() => Err(DdevError::AssetInvalid(format!(
            "{} is not a directory or archive",
            path.display()
        ))
        .into()),
        AssetType::Db if !(path.is_file() && has_sql_suffix(&path)) => {
            Err(DdevError::AssetInvalid(format!(
                "{} is not a .sql file or archive",
                path.display()
            ))
            .into())
        }
        AssetType::Files | AssetType::Db => Ok(Asset {
            path,
            archive: None,
        }),
    }
}

pub fn has_sql_suffix(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"))
}

fn expand_tilde(raw: &str, home: Option<&Path>) -> PathBuf {
    match (raw, home) {
        ("~", Some(home)) => home.to_path_buf(),
        (_, Some(home)) if raw.starts_with("~/") => home.join(&raw[2..]),
        _ => PathBuf::from(raw),
    }
}

/// Resolves `.` and `..` without touching the filesystem.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}
