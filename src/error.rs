//! Error types for tag reading and writing.
//!
//! Library modules return [`Result`] over [`TagError`], while the CLI in
//! `main` uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`TagError`]: what went wrong, with the path that caused it
//! - [`ErrorCode`]: the flat status code reported to callers, `Success`
//!   included, derived from a `TagError`
//!
//! # Example
//!
//! ```text
//! let mut song = SongMetadata::default();
//! let code = ErrorCode::from_result(&metadata::read_file(path, &mut song));
//! ```

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Result type for all tag operations.
pub type Result<T> = std::result::Result<T, TagError>;

/// Failure of a tag operation.
#[derive(Debug, thiserror::Error)]
pub enum TagError {
    /// The request carried no filename
    #[error("No filename given")]
    FilenameMissing,

    /// The path could not be stat'ed
    #[error("File does not exist: {0}")]
    FileDoesNotExist(PathBuf),

    /// The codec could not open or parse the file
    #[error("Could not open {path}: {message}")]
    FileOpenError { path: PathBuf, message: String },

    /// The container or operation has no handler for this format
    #[error("Unsupported file {path}: {reason}")]
    Unsupported { path: PathBuf, reason: String },

    /// Writing the modified tags back failed
    #[error("Could not save {path}: {message}")]
    FileSaveError { path: PathBuf, message: String },
}

impl TagError {
    /// Create an open error.
    pub fn open(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::FileOpenError {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create an unsupported-format error.
    pub fn unsupported(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a save error.
    pub fn save(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::FileSaveError {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// The status code this error is reported as.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::FilenameMissing => ErrorCode::FilenameMissing,
            Self::FileDoesNotExist(_) => ErrorCode::FileDoesNotExist,
            Self::FileOpenError { .. } => ErrorCode::FileOpenError,
            Self::Unsupported { .. } => ErrorCode::Unsupported,
            Self::FileSaveError { .. } => ErrorCode::FileSaveError,
        }
    }
}

/// Status code returned by every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    Success,
    FilenameMissing,
    FileDoesNotExist,
    FileOpenError,
    Unsupported,
    FileSaveError,
}

impl ErrorCode {
    /// Collapse an operation result into its status code.
    pub fn from_result<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(e) => e.code(),
        }
    }
}

/// Reject empty paths before touching the filesystem.
pub(crate) fn require_filename(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        Err(TagError::FilenameMissing)
    } else {
        Ok(())
    }
}

/// Confirm the path exists, returning its filesystem metadata.
pub(crate) fn require_existing(path: &Path) -> Result<std::fs::Metadata> {
    std::fs::metadata(path).map_err(|_| TagError::FileDoesNotExist(path.to_path_buf()))
}
