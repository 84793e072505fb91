use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop a single tool from being installed.
///
/// The installer catches these at the per-tool boundary, so one failing tool
/// never aborts the rest of a batch.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The requested name is not in the registry.
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    /// Download failed: connection error, timeout, or non-success status.
    #[error("failed to download {url}: {reason}")]
    Network { url: String, reason: String },

    /// The downloaded bytes do not hash to the pinned digest.
    #[error("sha256 mismatch\n  expected: {expected}\n  actual:   {actual}")]
    HashMismatch { expected: String, actual: String },

    /// The artifact could not be read as the container its descriptor claims.
    #[error("malformed archive: {0}")]
    ArchiveFormat(String),

    /// Writing a file to its final (or staging) location failed.
    #[error("failed to place {}: {reason}", path.display())]
    Placement { path: PathBuf, reason: String },

    /// The registry itself is invalid.
    #[error("invalid registry: {0}")]
    Registry(String),
}

impl InstallError {
    pub(crate) fn placement(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        InstallError::Placement {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn archive(reason: impl ToString) -> Self {
        InstallError::ArchiveFormat(reason.to_string())
    }
}

pub type Result<T, E = InstallError> = std::result::Result<T, E>;
