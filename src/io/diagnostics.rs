//! Non-fatal problems found while loading or exporting.
//!
//! Codecs collect these into a `Diagnostics` list returned with the result
//! instead of aborting. Each entry is also logged at warn level.

use std::fmt;
use std::path::PathBuf;

/// A single non-fatal problem.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A record could not be parsed and was skipped.
    SkippedRecord {
        file: PathBuf,
        /// Zero-based record index (binary) or one-based line number (text)
        record: usize,
        reason: String,
    },
    /// A binary stream ended before all declared records were read.
    TruncatedStream {
        file: PathBuf,
        declared: u64,
        read: u64,
    },
    /// A camera used a model tag or name this crate does not know.
    UnknownCameraModel { camera_id: u32, model: String },
    /// A text camera line carried more parameters than its model uses.
    ExtraCameraParams {
        camera_id: u32,
        expected: usize,
        found: usize,
    },
    /// A companion file (cameras or images) was not found.
    MissingCompanion { path: PathBuf },
    /// An image references a camera id that is not in the scene.
    MissingCamera { image_id: u32, camera_id: u32 },
    /// No image directory was found; the points file's directory is used.
    ImageDirFallback { path: PathBuf },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::SkippedRecord {
                file,
                record,
                reason,
            } => write!(
                f,
                "Skipped malformed record {} in {}: {}",
                record,
                file.display(),
                reason
            ),
            Diagnostic::TruncatedStream {
                file,
                declared,
                read,
            } => write!(
                f,
                "{} declares {} records but only {} could be read",
                file.display(),
                declared,
                read
            ),
            Diagnostic::UnknownCameraModel { camera_id, model } => write!(
                f,
                "Unknown camera model {} for camera {}; stored without parameters",
                model, camera_id
            ),
            Diagnostic::ExtraCameraParams {
                camera_id,
                expected,
                found,
            } => write!(
                f,
                "Camera {} has {} parameters, model uses {}; extra values ignored",
                camera_id, found, expected
            ),
            Diagnostic::MissingCompanion { path } => {
                write!(f, "{} not found; cameras and poses not loaded", path.display())
            }
            Diagnostic::MissingCamera {
                image_id,
                camera_id,
            } => write!(
                f,
                "Image {} references missing camera {}; default intrinsics apply",
                image_id, camera_id
            ),
            Diagnostic::ImageDirFallback { path } => write!(
                f,
                "Could not find an images directory. Defaulting to: {}",
                path.display()
            ),
        }
    }
}

/// Ordered list of diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and log it.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::warn!("{}", diagnostic);
        self.entries.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Whether any entry matches `predicate`.
    pub fn any(&self, predicate: impl Fn(&Diagnostic) -> bool) -> bool {
        self.entries.iter().any(predicate)
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
