//! COLMAP sparse reconstructions.
//!
//! A reconstruction is three companion files in one directory, in either
//! binary or text form:
//!
//! ```text
//! sparse/0/
//!   cameras.bin    images.bin    points3D.bin
//! ```
//!
//! The points file is required. Missing camera or image files are tolerated:
//! the scene loads with an empty camera/pose set and a diagnostic.
//!
//! Format reference: https://colmap.github.io/format.html

pub mod binary;
pub mod text;

use crate::core::Scene;
use crate::io::export::{ExportPlan, ExportSummary};
use crate::io::{CodecOptions, Diagnostic, Diagnostics, ExportError, LoadError, Loaded};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure inside a single record.
#[derive(Debug, Error)]
pub(crate) enum RecordError {
    /// The stream ended or could not be read mid-record.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The record was read but its contents are invalid.
    #[error("{0}")]
    Invalid(String),
}

/// Binary or text encoding of a reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColmapFormat {
    Binary,
    Text,
}

impl ColmapFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ColmapFormat::Binary => "bin",
            ColmapFormat::Text => "txt",
        }
    }
}

/// Paths of the three companion files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColmapPaths {
    pub dir: PathBuf,
    pub cameras: PathBuf,
    pub images: PathBuf,
    pub points: PathBuf,
}

impl ColmapPaths {
    /// Standard file names inside `dir`.
    pub fn in_dir(dir: &Path, format: ColmapFormat) -> Self {
        let ext = format.extension();
        Self {
            dir: dir.to_path_buf(),
            cameras: dir.join(format!("cameras.{}", ext)),
            images: dir.join(format!("images.{}", ext)),
            points: dir.join(format!("points3D.{}", ext)),
        }
    }

    /// Companion paths for a user-supplied file.
    ///
    /// `cameras.*` and `images.*` resolve to the standard points file next to
    /// them; any other name is taken as the points file itself.
    pub fn for_file(path: &Path, format: ColmapFormat) -> Self {
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        let mut paths = Self::in_dir(dir, format);

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if stem != "cameras" && stem != "images" {
            paths.points = path.to_path_buf();
        }
        paths
    }
}

/// Find a reconstruction in `dir`, or in the conventional `sparse/0` and
/// `sparse` subdirectories. Binary files win over text.
pub fn probe_dir(dir: &Path) -> Option<(ColmapPaths, ColmapFormat)> {
    let candidates = [dir.to_path_buf(), dir.join("sparse").join("0"), dir.join("sparse")];
    for candidate in &candidates {
        for format in [ColmapFormat::Binary, ColmapFormat::Text] {
            let paths = ColmapPaths::in_dir(candidate, format);
            if paths.points.is_file() {
                log::info!("Located points file at: {}", paths.points.display());
                return Some((paths, format));
            }
        }
    }
    None
}

fn open_companion(path: &Path, diagnostics: &mut Diagnostics) -> Option<BufReader<File>> {
    match File::open(path) {
        Ok(file) => Some(BufReader::new(file)),
        Err(err) => {
            log::debug!("Cannot open {}: {}", path.display(), err);
            diagnostics.push(Diagnostic::MissingCompanion {
                path: path.to_path_buf(),
            });
            None
        }
    }
}

fn check_camera_references(scene: &Scene, diagnostics: &mut Diagnostics) {
    for pose in scene.images.values() {
        if !scene.cameras.contains_key(&pose.camera_id) {
            diagnostics.push(Diagnostic::MissingCamera {
                image_id: pose.id,
                camera_id: pose.camera_id,
            });
        }
    }
}

/// Load a reconstruction from its companion files.
///
/// `Scene::image_base_path` is left empty; the dispatcher fills it in.
pub fn load(
    paths: &ColmapPaths,
    format: ColmapFormat,
    options: &CodecOptions,
) -> Result<Loaded, LoadError> {
    let mut diagnostics = Diagnostics::new();
    let mut scene = Scene::new();
    let normalize = options.normalize_quaternions;

    let points_file = File::open(&paths.points).map_err(LoadError::io(&paths.points))?;
    let mut reader = BufReader::new(points_file);
    let (points, metadata) = match format {
        ColmapFormat::Binary => binary::read_points(&mut reader, &paths.points, &mut diagnostics)?,
        ColmapFormat::Text => text::read_points(reader, &paths.points, &mut diagnostics)?,
    };
    scene.points = points;
    scene.metadata = metadata;

    if let Some(mut reader) = open_companion(&paths.cameras, &mut diagnostics) {
        scene.cameras = match format {
            ColmapFormat::Binary => {
                binary::read_cameras(&mut reader, &paths.cameras, &mut diagnostics)?
            }
            ColmapFormat::Text => text::read_cameras(reader, &paths.cameras, &mut diagnostics)?,
        };
    }

    if let Some(mut reader) = open_companion(&paths.images, &mut diagnostics) {
        scene.images = match format {
            ColmapFormat::Binary => {
                binary::read_images(&mut reader, &paths.images, normalize, &mut diagnostics)?
            }
            ColmapFormat::Text => {
                text::read_images(reader, &paths.images, normalize, &mut diagnostics)?
            }
        };
    }

    check_camera_references(&scene, &mut diagnostics);

    log::info!(
        "Loaded {} points, {} cameras, {} images from {}",
        scene.points.len(),
        scene.cameras.len(),
        scene.images.len(),
        paths.dir.display()
    );

    Ok(Loaded { scene, diagnostics })
}

fn write_file(
    path: &Path,
    body: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
) -> Result<(), ExportError> {
    let file = File::create(path).map_err(ExportError::io(path))?;
    let mut writer = BufWriter::new(file);
    body(&mut writer).map_err(ExportError::io(path))?;
    writer.flush().map_err(ExportError::io(path))
}

fn check_image_names(scene: &Scene, format: ColmapFormat) -> Result<(), ExportError> {
    for pose in scene.images.values() {
        let problem = match format {
            ColmapFormat::Binary => binary::unwritable_name(&pose.name),
            ColmapFormat::Text => text::unwritable_name(&pose.name),
        };
        if let Some(reason) = problem {
            return Err(ExportError::InvalidImageName {
                image_id: pose.id,
                name: pose.name.clone(),
                reason,
            });
        }
    }
    Ok(())
}

/// Write a reconstruction's three companion files.
///
/// Deleted points are dropped and references to them become sentinels.
/// The scene is not modified. Image names that would not read back fail the
/// export before anything is written.
pub fn write(
    paths: &ColmapPaths,
    format: ColmapFormat,
    scene: &Scene,
) -> Result<ExportSummary, ExportError> {
    check_image_names(scene, format)?;
    let plan = ExportPlan::new(scene);

    write_file(&paths.cameras, |w| match format {
        ColmapFormat::Binary => binary::write_cameras(w, &scene.cameras),
        ColmapFormat::Text => text::write_cameras(w, &scene.cameras),
    })?;
    write_file(&paths.images, |w| match format {
        ColmapFormat::Binary => binary::write_images(w, &plan),
        ColmapFormat::Text => text::write_images(w, &plan),
    })?;
    write_file(&paths.points, |w| match format {
        ColmapFormat::Binary => binary::write_points(w, &plan),
        ColmapFormat::Text => text::write_points(w, &plan),
    })?;

    let mut diagnostics = Diagnostics::new();
    check_camera_references(scene, &mut diagnostics);
    let summary = plan.summary(diagnostics);

    log::info!(
        "Exported COLMAP {:?} to {}: {} points ({} deleted dropped), {} references cleared",
        format,
        paths.dir.display(),
        summary.points_written,
        summary.points_dropped,
        summary.references_rewritten
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_companion_paths_from_any_file() {
        let dir = Path::new("/data/sparse/0");
        let from_points = ColmapPaths::for_file(&dir.join("points3D.bin"), ColmapFormat::Binary);
        let from_cameras = ColmapPaths::for_file(&dir.join("cameras.bin"), ColmapFormat::Binary);

        assert_eq!(from_points, from_cameras);
        assert_eq!(from_points.images, dir.join("images.bin"));
    }

    #[test]
    fn test_custom_points_name_is_kept() {
        let paths = ColmapPaths::for_file(Path::new("/out/edited.txt"), ColmapFormat::Text);
        assert_eq!(paths.points, PathBuf::from("/out/edited.txt"));
        assert_eq!(paths.cameras, PathBuf::from("/out/cameras.txt"));
    }

    #[test]
    fn test_probe_prefers_binary_and_descends_into_sparse() {
        let root = tempfile::tempdir().unwrap();
        let sparse = root.path().join("sparse").join("0");
        std::fs::create_dir_all(&sparse).unwrap();
        std::fs::write(sparse.join("points3D.txt"), "").unwrap();
        std::fs::write(sparse.join("points3D.bin"), [0u8; 8]).unwrap();

        let (paths, format) = probe_dir(root.path()).unwrap();
        assert_eq!(format, ColmapFormat::Binary);
        assert_eq!(paths.dir, sparse);
    }

    #[test]
    fn test_probe_empty_dir() {
        let root = tempfile::tempdir().unwrap();
        assert!(probe_dir(root.path()).is_none());
    }
}
