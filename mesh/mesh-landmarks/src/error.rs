//! Error types for landmark file operations.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while reading or writing landmark files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LandmarkError {
    /// The landmarks file does not exist.
    #[error("landmarks file not found: {path}")]
    FileNotFound {
        /// Path that was not found.
        path: PathBuf,
    },

    /// The CSV reader or writer failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LandmarkError {
    pub(crate) fn from_open(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io(err)
        }
    }
}

/// Result type for landmark file operations.
pub type LandmarkResult<T> = Result<T, LandmarkError>;
