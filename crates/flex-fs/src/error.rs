//! Error types for flex-fs

use std::path::PathBuf;

/// Result type for flex-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in flex-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt archive {path}: {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    /// Entry would be written outside the destination root.
    #[error("Unsafe archive entry '{entry}'")]
    UnsafeArchiveEntry { entry: String },

    #[error("Working directory {path} already exists and is not empty")]
    WorkingDirOccupied { path: PathBuf },

    #[error("Invalid working directory name '{name}'")]
    InvalidDirName { name: String },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
