//! Locating the directory that holds a reconstruction's source images.
//!
//! Reconstructions usually live a few levels below the project root, e.g.
//!
//! ```text
//! proj/
//!   images/
//!   sparse/0/points3D.bin
//! ```
//!
//! so the search walks up from the points file's directory.

use std::path::{Path, PathBuf};

/// Result of an image directory search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDir {
    pub path: PathBuf,
    /// True when nothing was found and `path` is the reconstruction directory.
    pub fallback: bool,
}

/// Search `depth` directories, starting at `points_path`'s parent and moving
/// up, for a child directory called `dir_name`.
pub fn locate_image_dir(points_path: &Path, dir_name: &str, depth: usize) -> ImageDir {
    let start = points_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let mut current: Option<&Path> = Some(start.as_path());
    for _ in 0..depth {
        let Some(dir) = current else {
            break;
        };
        let candidate = dir.join(dir_name);
        if candidate.is_dir() {
            log::info!("Found images directory at: {}", candidate.display());
            return ImageDir {
                path: candidate,
                fallback: false,
            };
        }
        current = dir.parent();
    }

    ImageDir {
        path: start,
        fallback: true,
    }
}
