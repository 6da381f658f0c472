//! In-memory reconstruction: points, per-point metadata, cameras and posed images.
//!
//! Points are never removed mid-session. Deleting a point marks it
//! `PointState::Deleted` so indices stay stable; the exporter drops deleted
//! points and rewrites any feature that still references them.

use crate::core::camera_model::{CameraModel, Intrinsics};
use crate::core::transform::CameraToWorld;
use nalgebra::{Vector2, Vector3};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Value written in place of a 3D point reference for untriangulated features.
pub const POINT3D_SENTINEL: u64 = u64::MAX;

/// Width/height substituted for a pose whose camera is missing.
pub const FALLBACK_RESOLUTION: (u64, u64) = (1920, 1080);

/// Liveness of a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointState {
    #[default]
    Active,
    Selected,
    /// Tombstoned: excluded from export and from spatial queries.
    Deleted,
}

impl PointState {
    /// Decode the packed float encoding (`> 0.5` selected, `< -0.5` deleted).
    pub fn from_liveness(value: f32) -> Self {
        if value < -0.5 {
            PointState::Deleted
        } else if value > 0.5 {
            PointState::Selected
        } else {
            PointState::Active
        }
    }

    /// Packed float encoding: -1 deleted, 0 active, 1 selected.
    pub fn liveness(self) -> f32 {
        match self {
            PointState::Active => 0.0,
            PointState::Selected => 1.0,
            PointState::Deleted => -1.0,
        }
    }

    pub fn is_deleted(self) -> bool {
        self == PointState::Deleted
    }
}

/// A 3D point with color (0..1 per channel).
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub position: Vector3<f32>,
    pub color: Vector3<f32>,
    pub state: PointState,
}

impl Point {
    pub fn new(position: Vector3<f32>, color: Vector3<f32>) -> Self {
        Self {
            position,
            color,
            state: PointState::Active,
        }
    }

    /// Build from 8-bit RGB.
    pub fn from_rgb8(position: Vector3<f32>, rgb: [u8; 3]) -> Self {
        Self::new(
            position,
            Vector3::new(
                rgb[0] as f32 / 255.0,
                rgb[1] as f32 / 255.0,
                rgb[2] as f32 / 255.0,
            ),
        )
    }

    /// Color quantized to 8 bits. Rounds so that `from_rgb8` round-trips exactly.
    pub fn rgb8(&self) -> [u8; 3] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.color.x), q(self.color.y), q(self.color.z)]
    }

    pub fn is_deleted(&self) -> bool {
        self.state.is_deleted()
    }
}

/// One observation of a 3D point: image and index into that image's features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Observation {
    pub image_id: u32,
    pub point2d_idx: u32,
}

/// Reconstruction metadata for a point, index-aligned with `Scene::points`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointMetadata {
    /// Identifier from the source file; re-used on export so ids stay stable.
    pub original_id: u64,
    /// Mean reprojection error (pixels)
    pub error: f64,
    /// Visibility track, in file order.
    pub track: Vec<Observation>,
}

/// Intrinsic sensor definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub id: u32,
    pub model: CameraModel,
    pub width: u64,
    pub height: u64,
}

/// A 2D keypoint, optionally triangulated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feature {
    pub xy: Vector2<f64>,
    /// `None` when the feature has no 3D point.
    pub point3d_id: Option<u64>,
}

impl Feature {
    pub fn new(xy: Vector2<f64>, point3d_id: Option<u64>) -> Self {
        Self { xy, point3d_id }
    }

    /// Decode a raw on-disk reference, mapping the sentinel to `None`.
    pub fn from_raw(xy: Vector2<f64>, raw_id: u64) -> Self {
        let point3d_id = (raw_id != POINT3D_SENTINEL).then_some(raw_id);
        Self { xy, point3d_id }
    }
}

/// A posed image.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPose {
    pub id: u32,
    pub camera_id: u32,
    /// File name, relative to `Scene::image_base_path`.
    pub name: String,
    pub pose: CameraToWorld,
    pub features: Vec<Feature>,
}

/// Intrinsics and resolution resolved for a pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedCamera {
    pub width: u64,
    pub height: u64,
    pub intrinsics: Intrinsics,
    /// True when the pose's camera was missing or had an unknown model.
    pub substituted: bool,
}

/// A complete sparse reconstruction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    /// Directory expected to hold the source images.
    pub image_base_path: PathBuf,
    pub points: Vec<Point>,
    /// Index-aligned with `points`; may be shorter.
    pub metadata: Vec<PointMetadata>,
    pub cameras: BTreeMap<u32, Camera>,
    pub images: BTreeMap<u32, CameraPose>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Identifier a point is exported under: its original id, or `index + 1`
    /// when no metadata exists for it.
    pub fn point_id(&self, index: usize) -> u64 {
        self.metadata
            .get(index)
            .map(|m| m.original_id)
            .unwrap_or(index as u64 + 1)
    }

    pub fn live_point_count(&self) -> usize {
        self.points.iter().filter(|p| !p.is_deleted()).count()
    }

    /// Tombstone a point. Returns false if the index is out of range.
    pub fn mark_deleted(&mut self, index: usize) -> bool {
        match self.points.get_mut(index) {
            Some(point) => {
                point.state = PointState::Deleted;
                true
            }
            None => false,
        }
    }

    pub fn camera_for(&self, pose: &CameraPose) -> Option<&Camera> {
        self.cameras.get(&pose.camera_id)
    }

    /// Resolve intrinsics for a pose, substituting `Intrinsics::FALLBACK` and
    /// `FALLBACK_RESOLUTION` when the camera is missing. A camera with an
    /// unknown model keeps its own resolution.
    pub fn intrinsics_for(&self, pose: &CameraPose) -> ResolvedCamera {
        match self.camera_for(pose) {
            Some(camera) => match camera.model.intrinsics() {
                Some(intrinsics) => ResolvedCamera {
                    width: camera.width,
                    height: camera.height,
                    intrinsics,
                    substituted: false,
                },
                None => ResolvedCamera {
                    width: camera.width,
                    height: camera.height,
                    intrinsics: Intrinsics::FALLBACK,
                    substituted: true,
                },
            },
            None => ResolvedCamera {
                width: FALLBACK_RESOLUTION.0,
                height: FALLBACK_RESOLUTION.1,
                intrinsics: Intrinsics::FALLBACK,
                substituted: true,
            },
        }
    }

    /// Full path of a pose's image file.
    pub fn image_path(&self, pose: &CameraPose) -> PathBuf {
        self.image_base_path.join(&pose.name)
    }
}
