//! Pose conventions and the conversion between them.
//!
//! On disk a pose is stored world-to-camera:
//!
//! ```text
//! X_camera = R(q) * X_world + t
//! ```
//!
//! In memory each image is placed camera-to-world, as a center `C` and an
//! orientation `q'` that can be dropped straight into a scene graph:
//!
//! ```text
//! C  = -R^T * t
//! q' = quaternion(R^T)        (the conjugate of q)
//! ```
//!
//! Both directions are exact inverses up to floating-point rounding. Neither
//! direction re-normalizes; quaternions are normalized once when they are read.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// World-to-camera pose, as stored in reconstruction files.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldToCamera {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

/// Camera-to-world pose, as held in memory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraToWorld {
    /// Camera center in world coordinates
    pub center: Vector3<f64>,
    /// Rotation from camera axes to world axes
    pub orientation: UnitQuaternion<f64>,
}

impl WorldToCamera {
    pub fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Build from raw `(qw, qx, qy, qz)` and `(tx, ty, tz)` values.
    ///
    /// With `normalize` the quaternion is rescaled to unit length; otherwise it
    /// is trusted as-is, which keeps bit-exact values for already-normalized input.
    pub fn from_raw(q: [f64; 4], t: [f64; 3], normalize: bool) -> Self {
        let quat = Quaternion::new(q[0], q[1], q[2], q[3]);
        let rotation = if normalize {
            UnitQuaternion::from_quaternion(quat)
        } else {
            UnitQuaternion::new_unchecked(quat)
        };
        Self::new(rotation, Vector3::new(t[0], t[1], t[2]))
    }

    /// Quaternion in `(qw, qx, qy, qz)` order.
    pub fn qvec(&self) -> [f64; 4] {
        let q = self.rotation.quaternion();
        [q.w, q.i, q.j, q.k]
    }

    pub fn tvec(&self) -> [f64; 3] {
        [self.translation.x, self.translation.y, self.translation.z]
    }

    /// `C = -R^T t`, `q' = q^-1`.
    pub fn to_camera_to_world(&self) -> CameraToWorld {
        let inverse = self.rotation.inverse();
        CameraToWorld {
            center: -(inverse * self.translation),
            orientation: inverse,
        }
    }

    /// Transform a world point into this camera's frame.
    pub fn transform_point(&self, point_world: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * point_world + self.translation
    }
}

impl CameraToWorld {
    pub fn new(center: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            center,
            orientation,
        }
    }

    /// `R = R(q')^T`, `t = -R C`.
    pub fn to_world_to_camera(&self) -> WorldToCamera {
        let rotation = self.orientation.inverse();
        WorldToCamera {
            rotation,
            translation: -(rotation * self.center),
        }
    }
}

impl From<WorldToCamera> for CameraToWorld {
    fn from(pose: WorldToCamera) -> Self {
        pose.to_camera_to_world()
    }
}

impl From<CameraToWorld> for WorldToCamera {
    fn from(pose: CameraToWorld) -> Self {
        pose.to_world_to_camera()
    }
}

impl Default for CameraToWorld {
    fn default() -> Self {
        Self::new(Vector3::zeros(), UnitQuaternion::identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_rotation_center() {
        let w2c = WorldToCamera::from_raw([1.0, 0.0, 0.0, 0.0], [0.0, 0.0, 5.0], true);
        let c2w = w2c.to_camera_to_world();

        assert_relative_eq!(c2w.center, Vector3::new(0.0, 0.0, -5.0), epsilon = 1e-12);
        assert_relative_eq!(c2w.orientation.quaternion().w, 1.0, epsilon = 1e-12);

        let back = c2w.to_world_to_camera();
        assert_relative_eq!(back.translation, Vector3::new(0.0, 0.0, 5.0), epsilon = 1e-12);
    }

    #[test]
    fn test_center_maps_to_camera_origin() {
        // The camera center must land on the origin of the camera frame.
        let rotation = UnitQuaternion::from_euler_angles(0.3, -1.1, 2.0);
        let w2c = WorldToCamera::new(rotation, Vector3::new(1.0, -2.0, 3.5));
        let c2w = w2c.to_camera_to_world();

        let origin = w2c.transform_point(&c2w.center);
        assert_relative_eq!(origin, Vector3::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn test_roundtrip_preserves_quaternion_sign() {
        let w2c = WorldToCamera::from_raw([-0.5, 0.5, -0.5, 0.5], [0.1, 0.2, 0.3], true);
        let back = w2c.to_camera_to_world().to_world_to_camera();

        let a = w2c.qvec();
        let b = back.qvec();
        for i in 0..4 {
            assert_relative_eq!(a[i], b[i], epsilon = 1e-12);
        }
        assert_relative_eq!(back.translation, w2c.translation, epsilon = 1e-12);
    }

    #[test]
    fn test_from_raw_normalizes_on_request() {
        let w2c = WorldToCamera::from_raw([2.0, 0.0, 0.0, 0.0], [0.0; 3], true);
        assert_relative_eq!(w2c.rotation.quaternion().norm(), 1.0, epsilon = 1e-12);
    }
}
