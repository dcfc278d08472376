use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the reconciliation engine.
/// Every module returns `Result<T, ModSyncError>`.
#[derive(Debug, Error)]
pub enum ModSyncError {
    // ── Config ──────────────────────────────────────────
    #[error("Manifest not found at {0:?}")]
    ManifestNotFound(PathBuf),

    #[error("Manifest at {path:?} is malformed: {source}")]
    ManifestMalformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Manifest lists {namespace}-{name} more than once")]
    DuplicateEntry { namespace: String, name: String },

    #[error("Manifest has no entry for {namespace}-{name}")]
    EntryNotFound { namespace: String, name: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry request to {url} failed: HTTP {status}")]
    RegistryStatus { url: String, status: u16 },

    // ── Parse ───────────────────────────────────────────
    #[error("Registry response from {url} is not valid JSON: {source}")]
    InvalidResponse {
        url: String,
        source: serde_json::Error,
    },

    #[error("Registry response from {url} is missing `{field}`")]
    MissingField { url: String, field: &'static str },

    #[error("Registry response from {url} has unusable version `{version}`")]
    InvalidVersion { url: String, version: String },

    // ── Filesystem ──────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Archive entry escapes the install directory: {0}")]
    UnsafeArchiveEntry(String),

    #[error("Archive is empty")]
    EmptyArchive,

    #[error("Manifest serialization failed: {0}")]
    Serialize(serde_json::Error),
}

/// The four failure classes the orchestrator distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal: the run cannot start or the manifest cannot be read.
    Config,
    /// Registry unreachable or answered with a non-2xx status.
    Network,
    /// Registry answered but the payload is unusable.
    Parse,
    /// Extraction or move failure.
    Filesystem,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => write!(f, "config"),
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Parse => write!(f, "parse"),
            ErrorKind::Filesystem => write!(f, "filesystem"),
        }
    }
}

impl ModSyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModSyncError::ManifestNotFound(_)
            | ModSyncError::ManifestMalformed { .. }
            | ModSyncError::DuplicateEntry { .. }
            | ModSyncError::EntryNotFound { .. }
            | ModSyncError::InvalidConfig(_) => ErrorKind::Config,
            ModSyncError::Http(_) | ModSyncError::RegistryStatus { .. } => ErrorKind::Network,
            ModSyncError::InvalidResponse { .. }
            | ModSyncError::MissingField { .. }
            | ModSyncError::InvalidVersion { .. } => ErrorKind::Parse,
            ModSyncError::Io { .. }
            | ModSyncError::Zip(_)
            | ModSyncError::UnsafeArchiveEntry(_)
            | ModSyncError::EmptyArchive
            | ModSyncError::Serialize(_) => ErrorKind::Filesystem,
        }
    }

    /// Only configuration failures abort a run.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Config
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ModSyncError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type ModSyncResult<T> = Result<T, ModSyncError>;

impl From<std::io::Error> for ModSyncError {
    fn from(source: std::io::Error) -> Self {
        ModSyncError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
