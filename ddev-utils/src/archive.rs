//! Archive extraction for database and files imports.
//!
//! Only regular files and directories are ever materialized. Symlinks, hard
//! links, devices and fifos are dropped, and any entry whose cleaned path
//! would land outside the destination fails the extraction.
//!
//! An extraction path selects a subtree of the archive: entries under it are
//! emitted with the prefix stripped. When nothing in the archive starts with
//! the requested path but the archive wraps everything in a single top-level
//! directory, the path is resolved relative to that directory instead.

use crate::fs::safe_join;
use anyhow::{Context, Result, anyhow};
use bzip2::read::BzDecoder;
use ddev_core::DdevError;
use flate2::read::GzDecoder;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use xz2::read::XzDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Tar,
    TarGz,
    TarBz2,
    TarXz,
    /// A single gzipped file, such as `dump.sql.gz`.
    Gzip,
    Bzip2,
    Xz,
    Zip,
}

impl ArchiveKind {
    /// Classifies by the suffix after the last `.`, so `foo.targz` is not an archive.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        let (stem, ext) = name.rsplit_once('.')?;
        let tarball = stem.ends_with(".tar");
        match ext {
            "tar" => Some(Self::Tar),
            "tgz" => Some(Self::TarGz),
            "gz" if tarball => Some(Self::TarGz),
            "gz" => Some(Self::Gzip),
            "tbz2" | "tbz" => Some(Self::TarBz2),
            "bz2" if tarball => Some(Self::TarBz2),
            "bz2" => Some(Self::Bzip2),
            "txz" => Some(Self::TarXz),
            "xz" if tarball => Some(Self::TarXz),
            "xz" => Some(Self::Xz),
            "zip" => Some(Self::Zip),
            _ => None,
        }
    }

    /// Whether an extraction sub-path means anything for this format.
    pub const fn has_entries(self) -> bool {
        matches!(
            self,
            Self::Tar | Self::TarGz | Self::TarBz2 | Self::TarXz | Self::Zip
        )
    }

    /// Wraps `reader` in the decompressor for this kind's outer layer.
    fn decoder<'a>(self, reader: impl Read + 'a) -> Box<dyn Read + 'a> {
        match self {
            Self::TarGz | Self::Gzip => Box::new(GzDecoder::new(reader)),
            Self::TarBz2 | Self::Bzip2 => Box::new(BzDecoder::new(reader)),
            Self::TarXz | Self::Xz => Box::new(XzDecoder::new(reader)),
            Self::Tar | Self::Zip => Box::new(reader),
        }
    }
}

/// Unpacks `src` into `dest_dir` with the extractor its suffix calls for.
pub fn extract(src: &Path, dest_dir: &Path, extraction_dir: &str) -> Result<()> {
    match ArchiveKind::from_path(src) {
        Some(ArchiveKind::Tar | ArchiveKind::TarGz | ArchiveKind::TarBz2 | ArchiveKind::TarXz) => {
            untar(src, dest_dir, extraction_dir)
        }
        Some(ArchiveKind::Zip) => unzip(src, dest_dir, extraction_dir),
        Some(ArchiveKind::Gzip | ArchiveKind::Bzip2 | ArchiveKind::Xz) => {
            decompress(src, dest_dir).map(|_| ())
        }
        None => Err(DdevError::Extraction(format!(
            "unsupported archive format: {}",
            src.display()
        ))
        .into()),
    }
}

/// Decompresses a single `.gz`, `.bz2` or `.xz` file into `dest_dir`,
/// dropping the compression suffix.
pub fn decompress(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    decompress_inner(src, dest_dir).map_err(|e| extraction_error(src, &e))
}

fn decompress_inner(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let kind = ArchiveKind::from_path(src)
        .filter(|k| matches!(k, ArchiveKind::Gzip | ArchiveKind::Bzip2 | ArchiveKind::Xz))
        .ok_or_else(|| anyhow!("not a compressed file"))?;
    let file_name = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("no file name"))?;
    let base = file_name
        .rsplit_once('.')
        .map(|(base, _)| base)
        .filter(|b| !b.is_empty())
        .ok_or_else(|| anyhow!("no base name in {file_name}"))?;

    let mut decoder = kind.decoder(BufReader::new(File::open(src)?));
    fs::create_dir_all(dest_dir)?;
    let dest = dest_dir.join(base);
    let mut out = File::create(&dest).with_context(|| format!("cannot create {}", dest.display()))?;
    io::copy(&mut decoder, &mut out)?;
    debug!("Decompressed {} to {}", src.display(), dest.display());
    Ok(dest)
}

/// Extracts a tar archive, decompressing it first when the name carries a
/// `.gz`, `.bz2` or `.xz` suffix.
pub fn untar(src: &Path, dest_dir: &Path, extraction_dir: &str) -> Result<()> {
    untar_inner(src, dest_dir, extraction_dir).map_err(|e| extraction_error(src, &e))
}

fn open_tar(src: &Path) -> Result<tar::Archive<Box<dyn Read>>> {
    let file = BufReader::new(File::open(src)?);
    let kind = ArchiveKind::from_path(src).unwrap_or(ArchiveKind::Tar);
    Ok(tar::Archive::new(kind.decoder(file)))
}

fn untar_inner(src: &Path, dest_dir: &Path, extraction_dir: &str) -> Result<()> {
    let names = {
        let mut archive = open_tar(src)?;
        let mut names = Vec::new();
        for entry in archive.entries()? {
            let entry = entry?;
            // pax headers and other metadata records are not part of the tree
            let entry_type = entry.header().entry_type();
            if entry_type.is_file() || entry_type.is_dir() {
                names.push(entry.path()?.to_string_lossy().into_owned());
            }
        }
        names
    };
    let prefix = Prefix::resolve(extraction_dir, &names);

    let mut archive = open_tar(src)?;
    let mut matched = false;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        let Some(rel) = prefix.strip(&name) else {
            continue;
        };
        matched = true;

        let entry_type = entry.header().entry_type();
        let kind = if entry_type.is_dir() {
            EntryKind::Dir
        } else if entry_type.is_file() {
            EntryKind::File
        } else {
            debug!("Skipping {name}: unsupported entry type {entry_type:?}");
            continue;
        };
        if let Some(dest) = destination(dest_dir, &rel, &name, kind)? {
            materialize(&dest, kind, &mut entry)?;
        }
    }

    prefix.ensure_matched(matched)
}

/// Extracts a zip archive. Entries whose names end in `/` become directories.
pub fn unzip(src: &Path, dest_dir: &Path, extraction_dir: &str) -> Result<()> {
    unzip_inner(src, dest_dir, extraction_dir).map_err(|e| extraction_error(src, &e))
}

fn unzip_inner(src: &Path, dest_dir: &Path, extraction_dir: &str) -> Result<()> {
    let mut archive = zip::ZipArchive::new(BufReader::new(File::open(src)?))?;
    let names: Vec<String> = archive
        .file_names()
        .filter(|name| !is_metadata_name(name))
        .map(str::to_string)
        .collect();
    let prefix = Prefix::resolve(extraction_dir, &names);

    let mut matched = false;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = file.name().to_string();
        if is_metadata_name(&name) {
            continue;
        }
        let Some(rel) = prefix.strip(&name) else {
            continue;
        };
        matched = true;

        let kind = if file.is_dir() {
            EntryKind::Dir
        } else if file.unix_mode().is_some_and(|mode| mode & 0o170_000 == 0o120_000) {
            debug!("Skipping {name}: symlink");
            continue;
        } else {
            EntryKind::File
        };
        if let Some(dest) = destination(dest_dir, &rel, &name, kind)? {
            materialize(&dest, kind, &mut file)?;
        }
    }

    prefix.ensure_matched(matched)
}

/// macOS resource forks that Finder adds to zips.
fn is_metadata_name(name: &str) -> bool {
    normalize(name)
        .split('/')
        .next()
        .is_some_and(|top| top == "__MACOSX")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
}

/// Where an emitted entry lands. The extraction root itself produces nothing
/// when it is a directory, and its base name when it is a single file.
fn destination(dest_dir: &Path, rel: &str, name: &str, kind: EntryKind) -> Result<Option<PathBuf>> {
    let rel = if rel.is_empty() {
        match kind {
            EntryKind::Dir => return Ok(None),
            EntryKind::File => name.rsplit('/').find(|s| !s.is_empty()).unwrap_or(name),
        }
    } else {
        rel
    };
    safe_join(dest_dir, rel).map(Some)
}

fn materialize(dest: &Path, kind: EntryKind, reader: &mut impl Read) -> Result<()> {
    match kind {
        EntryKind::Dir => {
            fs::create_dir_all(dest).with_context(|| format!("cannot create {}", dest.display()))?;
        }
        EntryKind::File => {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("cannot create {}", parent.display()))?;
            }
            let mut out =
                File::create(dest).with_context(|| format!("cannot create {}", dest.display()))?;
            io::copy(reader, &mut out)
                .with_context(|| format!("cannot write {}", dest.display()))?;
        }
    }
    Ok(())
}

fn extraction_error(src: &Path, err: &anyhow::Error) -> anyhow::Error {
    DdevError::Extraction(format!("{}: {err:#}", src.display())).into()
}

fn normalize(name: &str) -> &str {
    let mut name = name;
    while let Some(rest) = name.strip_prefix("./") {
        name = rest;
    }
    name.trim_start_matches('/').trim_end_matches('/')
}

#[derive(Debug)]
struct Prefix {
    requested: String,
    value: String,
}

impl Prefix {
    fn resolve(extraction_dir: &str, names: &[String]) -> Self {
        let requested = normalize(extraction_dir).to_string();
        let mut prefix = Self {
            requested: requested.clone(),
            value: requested,
        };
        if prefix.value.is_empty() || names.iter().any(|n| prefix.strip(n).is_some()) {
            return prefix;
        }

        let tops: BTreeSet<&str> = names
            .iter()
            .filter_map(|n| normalize(n).split('/').next())
            .filter(|top| !top.is_empty())
            .collect();
        if let (1, Some(top)) = (tops.len(), tops.first()) {
            let candidate = format!("{top}/{}", prefix.value);
            if names.iter().any(|n| {
                let n = normalize(n);
                n == candidate || n.starts_with(&format!("{candidate}/"))
            }) {
                debug!("Resolved extraction path {} under {top}/", prefix.value);
                prefix.value = candidate;
            }
        }
        prefix
    }

    /// The entry name relative to the prefix, or `None` if it is outside.
    fn strip(&self, name: &str) -> Option<String> {
        let name = normalize(name);
        if self.value.is_empty() {
            return Some(name.to_string());
        }
        if name == self.value {
            return Some(String::new());
        }
        name.strip_prefix(&self.value)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string)
    }

    fn ensure_matched(&self, matched: bool) -> Result<()> {
        if matched || self.value.is_empty() {
            Ok(())
        } else {
            Err(anyhow!(
                "failed to find files in extraction path: {}",
                self.requested
            ))
        }
    }
}
