//! Core data structures.
//!
//! This module contains the in-memory scene:
//! - `Scene`: points, cameras and image poses
//! - `CameraModel`: intrinsics as a tagged sum type
//! - `WorldToCamera`/`CameraToWorld`: the two pose conventions
//!
//! All types here are "pure data" - no I/O.

mod camera_model;
mod scene;
mod transform;

// Re-export public types
pub use camera_model::{
    CameraModel, CameraModelError, Intrinsics, UNKNOWN_MODEL_NAME, UNKNOWN_MODEL_TAG,
};
pub use scene::{
    Camera, CameraPose, Feature, Observation, Point, PointMetadata, PointState, ResolvedCamera,
    Scene, FALLBACK_RESOLUTION, POINT3D_SENTINEL,
};
pub use transform::{CameraToWorld, WorldToCamera};
