//! Error types shared by listing, search and file operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while touching the filesystem.
#[derive(Debug, Error)]
pub enum FsError {
    /// Permission denied, or the object is locked / in use.
    #[error("Access denied: {path}")]
    AccessDenied { path: PathBuf },

    /// Path not found (it may have vanished since it was listed).
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Path exists where a new object was expected.
    #[error("Already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// Path is not a directory.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Destination lies inside the source being copied or moved.
    #[error("Cannot place {source_path} inside itself ({destination})")]
    InsideSource {
        source_path: PathBuf,
        destination: PathBuf,
    },

    /// A file name failed validation.
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// A path cannot be represented in an exchange format.
    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    /// A cross-volume move copied the data but the source could not be removed.
    #[error("Copied, but could not remove the source {path}: {source}")]
    SourceKept {
        path: PathBuf,
        #[source]
        source: Box<FsError>,
    },

    /// The user asked to stop.
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FsError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::AccessDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            _ => Self::Io { path, source },
        }
    }

    /// Classify this error for batch reporting.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::AccessDenied { .. } => FailureKind::AccessDenied,
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::AlreadyExists { .. } => FailureKind::AlreadyExists,
            Self::InsideSource { .. } => FailureKind::InvalidDestination,
            Self::SourceKept { .. } => FailureKind::CrossVolumeDeleteFailed,
            Self::Cancelled => FailureKind::Cancelled,
            Self::NotADirectory { .. }
            | Self::InvalidName { .. }
            | Self::InvalidPath { .. }
            | Self::Io { .. } => FailureKind::Unknown,
        }
    }

    /// Whether this error is a user cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Failure classes surfaced in batch summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The path vanished between listing and operation.
    NotFound,
    /// Locked, in use, or permission denied.
    AccessDenied,
    /// Destination name collision that unique naming could not resolve.
    AlreadyExists,
    /// Cross-volume move copied the data but could not remove the source.
    CrossVolumeDeleteFailed,
    /// Stopped by the user.
    Cancelled,
    /// Destination is the source itself or inside it.
    InvalidDestination,
    /// Anything else.
    Unknown,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::AccessDenied => write!(f, "locked, in use, or permission denied"),
            Self::AlreadyExists => write!(f, "destination already exists"),
            Self::CrossVolumeDeleteFailed => {
                write!(f, "copied, but the source could not be removed")
            }
            Self::Cancelled => write!(f, "cancelled"),
            Self::InvalidDestination => write!(f, "cannot copy or move a folder into itself"),
            Self::Unknown => write!(f, "I/O error"),
        }
    }
}

/// Kind of listing warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Error reading a directory entry.
    ReadError,
    /// Error reading metadata.
    MetadataError,
}

/// Non-fatal problem with a single child during listing or search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a warning from an I/O error, classifying permission problems.
    pub fn from_io(path: impl Into<PathBuf>, error: &std::io::Error, kind: WarningKind) -> Self {
        let path = path.into();
        let kind = if error.kind() == std::io::ErrorKind::PermissionDenied {
            WarningKind::PermissionDenied
        } else {
            kind
        };
        Self {
            message: format!("{}: {error}", path.display()),
            path,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_error_io_classification() {
        let err = FsError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, FsError::AccessDenied { .. }));
        assert_eq!(err.kind(), FailureKind::AccessDenied);

        let err = FsError::io("/gone", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(err.kind(), FailureKind::NotFound);

        let err = FsError::io("/x", std::io::Error::other("boom"));
        assert_eq!(err.kind(), FailureKind::Unknown);
    }

    #[test]
    fn test_warning_from_io_promotes_permission() {
        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let warning = ScanWarning::from_io("/secret", &err, WarningKind::ReadError);
        assert_eq!(warning.kind, WarningKind::PermissionDenied);
        assert!(warning.message.contains("/secret"));
    }

    #[test]
    fn test_access_denied_names_condition_class() {
        assert_eq!(
            FailureKind::AccessDenied.to_string(),
            "locked, in use, or permission denied"
        );
    }
}
