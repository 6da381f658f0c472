//! Reading and writing scenes.
//!
//! This module handles all file format parsing and export:
//! - COLMAP reconstructions, binary and text (cameras, images, points3D)
//! - Plain point lists: ASCII PLY, OBJ vertices, XYZ
//!
//! Use `load_scene`/`write_scene` to pick the format from the extension, or
//! the per-format modules directly.

pub mod colmap;
mod diagnostics;
mod dispatch;
mod error;
pub mod export;
pub mod image_dir;
pub mod obj;
mod options;
pub mod ply;
pub mod xyz;

// Re-export public types and functions
pub use diagnostics::{Diagnostic, Diagnostics};
pub use dispatch::{
    detect_format, load_scene, load_scene_from_dir, load_scene_from_dir_with, load_scene_with,
    write_scene, Loaded, SceneFormat,
};
pub use error::{ExportError, LoadError};
pub use export::{ExportPlan, ExportSummary};
pub use options::{CodecOptions, OptionsError};
