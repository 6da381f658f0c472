//! # sfm-rs: Structure-from-Motion scene I/O
//!
//! Loads and saves sparse 3D reconstructions: a point cloud, the cameras
//! that observed it, and where each photo was taken from.
//!
//! ## Architecture
//!
//! - `core`: the in-memory scene (points, camera models, poses)
//! - `io`: COLMAP binary/text codecs, plain point lists, format dispatch
//!
//! Poses are held camera-to-world in memory and converted to COLMAP's
//! world-to-camera convention at the file boundary. Points marked deleted
//! are dropped on export, and image features that referenced them are
//! rewritten as untriangulated.
//!
//! ```no_run
//! use std::path::Path;
//!
//! let loaded = sfm_rs::load_scene(Path::new("proj/sparse/0/points3D.bin"))?;
//! for d in &loaded.diagnostics {
//!     eprintln!("{}", d);
//! }
//! sfm_rs::write_scene(&loaded.scene, Path::new("out/points3D.txt")).ok();
//! # Ok::<(), sfm_rs::LoadError>(())
//! ```

// In-memory scene
pub mod core;

// File formats
pub mod io;

// Re-export commonly used types at crate root for convenience
pub use crate::core::{CameraModel, CameraPose, Point, PointState, Scene};
pub use crate::io::{
    load_scene, load_scene_from_dir, load_scene_with, write_scene, CodecOptions, Diagnostic,
    Diagnostics, ExportError, ExportSummary, LoadError, Loaded,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
