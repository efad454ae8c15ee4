//! Failure kinds surfaced by the lifecycle engine.

use thiserror::Error;

/// Classified failures. Every variant renders as a single lowercase line that
/// names the affected project, service, path or asset.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DdevError {
    /// The project configuration is missing, unparseable or invalid.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    /// A container with this project's name belongs to another app root.
    #[error("{0}")]
    NameConflict(String),
    /// The operation needs a project or container that does not exist.
    #[error("{0}")]
    NotFound(String),
    /// An import asset failed validation.
    #[error("{0}")]
    AssetInvalid(String),
    /// An archive could not be unpacked.
    #[error("failed to extract provided archive: {0}")]
    Extraction(String),
    /// The import staging area holds no `*.sql` file.
    #[error("no .sql files found to import in {0}")]
    NoSql(String),
    /// The in-container `mysql` pipeline failed.
    #[error("failed to import database: {0}")]
    ImportExecFailed(String),
    /// A service did not report healthy in time.
    #[error("{0}")]
    HealthTimeout(String),
    /// A user hook exited non-zero.
    #[error("hook failed: {0}")]
    HookFailed(String),
    /// A CMS settings file could not be written.
    #[error("failed to write settings file: {0}")]
    Settings(String),
    /// The compose tool returned a non-zero status.
    #[error("compose command failed: {0}")]
    Compose(String),
    /// Host I/O failure (hosts file, manifests, locks).
    #[error("{0}")]
    Io(String),
}

/// The kind of a [`DdevError`], used for exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConfigInvalid,
    NameConflict,
    NotFound,
    AssetInvalid,
    Extraction,
    NoSql,
    ImportExecFailed,
    HealthTimeout,
    HookFailed,
    Settings,
    Compose,
    Io,
}

impl DdevError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigInvalid(_) => ErrorKind::ConfigInvalid,
            Self::NameConflict(_) => ErrorKind::NameConflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AssetInvalid(_) => ErrorKind::AssetInvalid,
            Self::Extraction(_) => ErrorKind::Extraction,
            Self::NoSql(_) => ErrorKind::NoSql,
            Self::ImportExecFailed(_) => ErrorKind::ImportExecFailed,
            Self::HealthTimeout(_) => ErrorKind::HealthTimeout,
            Self::HookFailed(_) => ErrorKind::HookFailed,
            Self::Settings(_) => ErrorKind::Settings,
            Self::Compose(_) => ErrorKind::Compose,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

impl ErrorKind {
    /// Finds the first classified error in an `anyhow` chain.
    pub fn of(err: &anyhow::Error) -> Option<Self> {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<DdevError>())
            .map(DdevError::kind)
    }

    /// Process exit code for this kind. Unclassified failures use 1.
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::ConfigInvalid => 2,
            Self::NameConflict => 3,
            Self::NotFound => 4,
            Self::AssetInvalid => 5,
            Self::Extraction => 6,
            Self::NoSql => 7,
            Self::ImportExecFailed => 8,
            Self::HealthTimeout => 9,
            Self::HookFailed => 10,
            Self::Settings => 11,
            Self::Compose => 12,
            Self::Io => 13,
        }
    }
}

/// Exit code for any error, classified or not.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    ErrorKind::of(err).map_or(1, ErrorKind::exit_code)
}
