//! Error types for loading and exporting scenes.
//!
//! Only file-level failures are errors. A malformed record inside an otherwise
//! readable file is reported as a `Diagnostic` and skipped.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that abort a load.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be opened or read.
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The record count at the start of a binary file is missing or truncated.
    #[error("Invalid header in {}: {source}", path.display())]
    Header {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("No reconstruction found in {}", .0.display())]
    NoReconstruction(PathBuf),
}

/// Errors that abort an export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// An image name the target format cannot store and read back unchanged.
    /// Checked before any file is created.
    #[error("Image {image_id} name {name:?} cannot be written: {reason}")]
    InvalidImageName {
        image_id: u32,
        name: String,
        reason: &'static str,
    },
}

impl LoadError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn header(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| LoadError::Header {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl ExportError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
