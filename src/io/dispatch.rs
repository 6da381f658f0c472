//! Format selection by file extension.
//!
//! | Extension | Format                                         |
//! |-----------|------------------------------------------------|
//! | `.bin`    | COLMAP binary (cameras, images, points3D)      |
//! | `.txt`    | COLMAP text, or an XYZ list (sniffed on load)  |
//! | `.ply`    | ASCII PLY point cloud                          |
//! | `.obj`    | OBJ vertex list                                |
//! | `.xyz`    | XYZ point list                                 |
//!
//! An unrecognized extension fails before any file is touched.

use crate::core::Scene;
use crate::io::colmap::{self, ColmapFormat, ColmapPaths};
use crate::io::export::ExportSummary;
use crate::io::image_dir::locate_image_dir;
use crate::io::{obj, ply, xyz};
use crate::io::{CodecOptions, Diagnostic, Diagnostics, ExportError, LoadError};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A loaded scene and everything that went wrong short of failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Loaded {
    pub scene: Scene,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneFormat {
    ColmapBinary,
    ColmapText,
    Ply,
    Obj,
    Xyz,
}

impl SceneFormat {
    /// Format implied by `path`'s extension. `.txt` maps to COLMAP text.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "bin" => Some(SceneFormat::ColmapBinary),
            "txt" => Some(SceneFormat::ColmapText),
            "ply" => Some(SceneFormat::Ply),
            "obj" => Some(SceneFormat::Obj),
            "xyz" => Some(SceneFormat::Xyz),
            _ => None,
        }
    }

    /// The COLMAP encoding, if this is a reconstruction format.
    pub fn colmap(self) -> Option<ColmapFormat> {
        match self {
            SceneFormat::ColmapBinary => Some(ColmapFormat::Binary),
            SceneFormat::ColmapText => Some(ColmapFormat::Text),
            _ => None,
        }
    }
}

fn unsupported(path: &Path) -> String {
    format!("unrecognized extension on {}", path.display())
}

fn is_companion_name(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case("cameras") || s.eq_ignore_ascii_case("images"))
        .unwrap_or(false)
}

/// Decide between COLMAP text and XYZ for a `.txt` file.
///
/// A first line that is a comment without "3D point" in it marks an XYZ list.
fn sniff_txt(path: &Path) -> Result<SceneFormat, LoadError> {
    if is_companion_name(path) {
        return Ok(SceneFormat::ColmapText);
    }
    let file = File::open(path).map_err(LoadError::io(path))?;
    let mut first = Vec::new();
    BufReader::new(file)
        .read_until(b'\n', &mut first)
        .map_err(LoadError::io(path))?;

    // The codecs report undecodable lines themselves.
    let first = String::from_utf8_lossy(&first);
    let first = first.trim();
    if first.starts_with('#') && !first.contains("3D point") {
        log::debug!("Treating {} as an XYZ point list", path.display());
        Ok(SceneFormat::Xyz)
    } else {
        Ok(SceneFormat::ColmapText)
    }
}

/// Format to use when loading `path`.
pub fn detect_format(path: &Path) -> Result<SceneFormat, LoadError> {
    match SceneFormat::from_path(path) {
        Some(SceneFormat::ColmapText) => sniff_txt(path),
        Some(format) => Ok(format),
        None => Err(LoadError::UnsupportedFormat(unsupported(path))),
    }
}

fn attach_image_dir(loaded: &mut Loaded, points_path: &Path, options: &CodecOptions) {
    let image_dir = locate_image_dir(
        points_path,
        &options.image_dir_name,
        options.image_dir_search_depth,
    );
    if image_dir.fallback {
        loaded.diagnostics.push(Diagnostic::ImageDirFallback {
            path: image_dir.path.clone(),
        });
    }
    loaded.scene.image_base_path = image_dir.path;
}

fn load_point_list(path: &Path, format: SceneFormat) -> Result<Loaded, LoadError> {
    let file = File::open(path).map_err(LoadError::io(path))?;
    let reader = BufReader::new(file);
    let mut loaded = Loaded::default();

    loaded.scene.points = match format {
        SceneFormat::Ply => ply::read_points(reader, path, &mut loaded.diagnostics)?,
        SceneFormat::Obj => obj::read_points(reader, path, &mut loaded.diagnostics)?,
        _ => xyz::read_points(reader, path, &mut loaded.diagnostics)?,
    };

    log::info!("Loaded {} points from {}", loaded.scene.points.len(), path.display());
    Ok(loaded)
}

/// Load a scene with default options.
pub fn load_scene(path: &Path) -> Result<Loaded, LoadError> {
    load_scene_with(path, &CodecOptions::default())
}

/// Load a scene from any supported file.
///
/// For COLMAP input, `path` may be any of the three companion files.
pub fn load_scene_with(path: &Path, options: &CodecOptions) -> Result<Loaded, LoadError> {
    let format = detect_format(path)?;

    match format.colmap() {
        Some(colmap_format) => {
            let paths = ColmapPaths::for_file(path, colmap_format);
            let mut loaded = colmap::load(&paths, colmap_format, options)?;
            attach_image_dir(&mut loaded, &paths.points, options);
            Ok(loaded)
        }
        None => {
            let mut loaded = load_point_list(path, format)?;
            attach_image_dir(&mut loaded, path, options);
            Ok(loaded)
        }
    }
}

/// Load a reconstruction from a directory with default options.
pub fn load_scene_from_dir(dir: &Path) -> Result<Loaded, LoadError> {
    load_scene_from_dir_with(dir, &CodecOptions::default())
}

/// Load the reconstruction in `dir` (or its `sparse/0`). Binary wins over text.
pub fn load_scene_from_dir_with(dir: &Path, options: &CodecOptions) -> Result<Loaded, LoadError> {
    let (paths, format) =
        colmap::probe_dir(dir).ok_or_else(|| LoadError::NoReconstruction(dir.to_path_buf()))?;
    let mut loaded = colmap::load(&paths, format, options)?;
    attach_image_dir(&mut loaded, &paths.points, options);
    Ok(loaded)
}

fn write_point_list(
    scene: &Scene,
    path: &Path,
    format: SceneFormat,
) -> Result<ExportSummary, ExportError> {
    let file = File::create(path).map_err(ExportError::io(path))?;
    let mut writer = BufWriter::new(file);
    let written = match format {
        SceneFormat::Ply => ply::write_points(&mut writer, &scene.points),
        SceneFormat::Obj => obj::write_points(&mut writer, &scene.points),
        _ => xyz::write_points(&mut writer, &scene.points),
    }
    .map_err(ExportError::io(path))?;
    writer.flush().map_err(ExportError::io(path))?;

    if !scene.images.is_empty() || !scene.cameras.is_empty() {
        log::info!(
            "{} holds points only; {} cameras and {} images not written",
            path.display(),
            scene.cameras.len(),
            scene.images.len()
        );
    }

    Ok(ExportSummary {
        points_written: written,
        points_dropped: scene.points.len() - written,
        references_rewritten: 0,
        diagnostics: Diagnostics::new(),
    })
}

/// Write `scene` in the format implied by `path`'s extension.
///
/// COLMAP output writes all three companion files; `path` names the points
/// file and its directory must exist. Deleted points are never written.
pub fn write_scene(scene: &Scene, path: &Path) -> Result<ExportSummary, ExportError> {
    let format = SceneFormat::from_path(path)
        .ok_or_else(|| ExportError::UnsupportedFormat(unsupported(path)))?;

    match format.colmap() {
        Some(colmap_format) => {
            let paths = ColmapPaths::for_file(path, colmap_format);
            colmap::write(&paths, colmap_format, scene)
        }
        None => write_point_list(scene, path, format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_extension_is_rejected_without_io() {
        let missing = Path::new("/definitely/not/here/scene.foo");
        assert!(matches!(load_scene(missing), Err(LoadError::UnsupportedFormat(_))));
        assert!(matches!(
            write_scene(&Scene::new(), missing),
            Err(ExportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        assert_eq!(SceneFormat::from_path(Path::new("a.BIN")), Some(SceneFormat::ColmapBinary));
        assert_eq!(SceneFormat::from_path(Path::new("a.Ply")), Some(SceneFormat::Ply));
        assert_eq!(SceneFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_txt_sniffing() {
        let dir = tempfile::tempdir().unwrap();
        let xyz_path = dir.path().join("cloud.txt");
        std::fs::write(&xyz_path, "# x y z r g b\n0 0 0 1 2 3\n").unwrap();
        let colmap_path = dir.path().join("points3D.txt");
        std::fs::write(&colmap_path, "# 3D point list with one line of data per point:\n").unwrap();

        assert_eq!(detect_format(&xyz_path).unwrap(), SceneFormat::Xyz);
        assert_eq!(detect_format(&colmap_path).unwrap(), SceneFormat::ColmapText);
        // Companion names are never sniffed; their headers are comments too.
        assert_eq!(
            detect_format(&dir.path().join("cameras.txt")).unwrap(),
            SceneFormat::ColmapText
        );
    }

    #[test]
    fn test_missing_dir_has_no_reconstruction() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_scene_from_dir(dir.path()),
            Err(LoadError::NoReconstruction(_))
        ));
    }
}
