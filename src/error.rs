//! Error types shared across the engine.
//!
//! Component-specific errors live next to their component
//! ([`PathError`](crate::services::paths::PathError),
//! [`LookupError`](crate::adapters::LookupError),
//! [`BackupError`](crate::services::backup::BackupError)). The two here are
//! raised from several places: filesystem failures and malformed file
//! content.

use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use thiserror::Error;

/// Filesystem failure, always tagged with the path that caused it.
///
/// Mapped from [`io::ErrorKind`] so callers can branch on the cause without
/// inspecting OS error codes.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("Access denied: {path}")]
    AccessDenied {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Not found: {path}")]
    NotFound {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Expected a file but found a directory: {path}")]
    IsDirectory {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("A path component is not a directory: {path}")]
    NotDirectory {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Other {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

impl IoError {
    /// Wrap an [`io::Error`] with the path it occurred on.
    pub fn new(path: &Utf8Path, source: io::Error) -> Self {
        let path = path.to_path_buf();
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::AccessDenied { path, source },
            io::ErrorKind::NotFound => Self::NotFound { path, source },
            io::ErrorKind::IsADirectory => Self::IsDirectory { path, source },
            io::ErrorKind::NotADirectory => Self::NotDirectory { path, source },
            _ => Self::Other { path, source },
        }
    }

    /// The path the failure happened on.
    pub fn path(&self) -> &Utf8Path {
        match self {
            Self::AccessDenied { path, .. }
            | Self::NotFound { path, .. }
            | Self::IsDirectory { path, .. }
            | Self::NotDirectory { path, .. }
            | Self::Other { path, .. } => path,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Content of a file does not have the expected format.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Unexpected file extension for {path}: expected .{expected}")]
    WrongExtension { path: Utf8PathBuf, expected: String },

    #[error("Malformed JSON in {path}: {source}")]
    MalformedJson {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown or unsupported encoding: {0}")]
    UnknownEncoding(String),

    #[error("Text contains characters that {encoding} cannot represent")]
    Unencodable { encoding: String },

    #[error("Malformed tag file: {0}")]
    MalformedTag(String),
}

/// Read a whole file, mapping the failure to [`IoError`].
pub async fn read_file(path: &Utf8Path) -> Result<Vec<u8>, IoError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| IoError::new(path, e))
}

/// Write a whole file, creating missing parent directories first.
pub async fn write_file(path: &Utf8Path, contents: &[u8]) -> Result<(), IoError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| IoError::new(parent, e))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| IoError::new(path, e))
}
