//! Deletion-consistent export.
//!
//! Deleted points are dropped from the points stream, and every feature in
//! every image that still references a dropped point is rewritten to the
//! "not triangulated" sentinel. Without the second step, images triangulated
//! before a deletion would keep pointing at ids that no longer exist.
//!
//! `ExportPlan` computes the kept/dropped partition once; the binary and text
//! writers both pull points and features through it.

use crate::core::{CameraPose, Feature, Observation, Scene};
use crate::io::Diagnostics;
use nalgebra::Vector3;
use std::collections::HashSet;

/// A point as it will be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPoint<'a> {
    pub id: u64,
    pub position: Vector3<f32>,
    pub rgb: [u8; 3],
    pub error: f64,
    pub track: &'a [Observation],
}

/// Kept/dropped partition of a scene's points.
#[derive(Debug)]
pub struct ExportPlan<'a> {
    scene: &'a Scene,
    deleted_ids: HashSet<u64>,
    kept: usize,
}

impl<'a> ExportPlan<'a> {
    pub fn new(scene: &'a Scene) -> Self {
        let mut deleted_ids = HashSet::new();
        let mut kept = 0;
        for (index, point) in scene.points.iter().enumerate() {
            if point.is_deleted() {
                deleted_ids.insert(scene.point_id(index));
            } else {
                kept += 1;
            }
        }

        Self {
            scene,
            deleted_ids,
            kept,
        }
    }

    pub fn scene(&self) -> &'a Scene {
        self.scene
    }

    pub fn kept_count(&self) -> usize {
        self.kept
    }

    pub fn dropped_count(&self) -> usize {
        self.scene.points.len() - self.kept
    }

    /// Ids of deleted points.
    pub fn deleted_ids(&self) -> &HashSet<u64> {
        &self.deleted_ids
    }

    /// Points to write, in scene order.
    pub fn points(&self) -> impl Iterator<Item = ExportPoint<'a>> + '_ {
        let scene = self.scene;
        scene
            .points
            .iter()
            .enumerate()
            .filter(|(_, point)| !point.is_deleted())
            .map(move |(index, point)| {
                let meta = scene.metadata.get(index);
                ExportPoint {
                    id: scene.point_id(index),
                    position: point.position,
                    rgb: point.rgb8(),
                    error: meta.map(|m| m.error).unwrap_or(0.0),
                    track: meta.map(|m| m.track.as_slice()).unwrap_or(&[]),
                }
            })
    }

    /// Rewrite a reference to a deleted point as `None`.
    pub fn remap(&self, point3d_id: Option<u64>) -> Option<u64> {
        point3d_id.filter(|id| !self.deleted_ids.contains(id))
    }

    /// Features of `pose` with references remapped.
    pub fn features<'p>(&'p self, pose: &'p CameraPose) -> impl Iterator<Item = Feature> + 'p {
        pose.features
            .iter()
            .map(move |feature| Feature::new(feature.xy, self.remap(feature.point3d_id)))
    }

    /// Number of feature references across all images that will be rewritten.
    pub fn rewritten_reference_count(&self) -> usize {
        if self.deleted_ids.is_empty() {
            return 0;
        }
        self.scene
            .images
            .values()
            .flat_map(|pose| pose.features.iter())
            .filter(|f| matches!(f.point3d_id, Some(id) if self.deleted_ids.contains(&id)))
            .count()
    }

    pub(crate) fn summary(&self, diagnostics: Diagnostics) -> ExportSummary {
        ExportSummary {
            points_written: self.kept_count(),
            points_dropped: self.dropped_count(),
            references_rewritten: self.rewritten_reference_count(),
            diagnostics,
        }
    }
}

/// What an export wrote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportSummary {
    pub points_written: usize,
    pub points_dropped: usize,
    /// Feature references replaced by the sentinel because their point was deleted.
    pub references_rewritten: usize,
    pub diagnostics: Diagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CameraToWorld, Point, PointMetadata, PointState};
    use nalgebra::Vector2;

    fn scene_with_deleted_seven() -> Scene {
        let mut scene = Scene::new();
        for id in [5u64, 7, 9] {
            scene
                .points
                .push(Point::new(Vector3::new(id as f32, 0.0, 0.0), Vector3::zeros()));
            scene.metadata.push(PointMetadata {
                original_id: id,
                error: 0.5,
                track: vec![Observation {
                    image_id: 1,
                    point2d_idx: 0,
                }],
            });
        }
        scene.points[1].state = PointState::Deleted;
        scene.images.insert(
            1,
            CameraPose {
                id: 1,
                camera_id: 1,
                name: "img.png".into(),
                pose: CameraToWorld::default(),
                features: vec![
                    Feature::new(Vector2::new(1.0, 1.0), Some(7)),
                    Feature::new(Vector2::new(2.0, 2.0), Some(9)),
                    Feature::new(Vector2::new(3.0, 3.0), None),
                ],
            },
        );
        scene
    }

    #[test]
    fn test_deleted_points_are_dropped() {
        let scene = scene_with_deleted_seven();
        let plan = ExportPlan::new(&scene);

        let ids: Vec<u64> = plan.points().map(|p| p.id).collect();
        assert_eq!(ids, vec![5, 9]);
        assert_eq!(plan.kept_count(), 2);
        assert_eq!(plan.dropped_count(), 1);
        assert!(plan.deleted_ids().contains(&7));
    }

    #[test]
    fn test_references_to_deleted_points_become_sentinels() {
        let scene = scene_with_deleted_seven();
        let plan = ExportPlan::new(&scene);

        let refs: Vec<Option<u64>> = plan
            .features(&scene.images[&1])
            .map(|f| f.point3d_id)
            .collect();
        assert_eq!(refs, vec![None, Some(9), None]);
        assert_eq!(plan.rewritten_reference_count(), 1);
    }

    #[test]
    fn test_points_without_metadata_use_index_ids() {
        let mut scene = Scene::new();
        scene.points = vec![Point::new(Vector3::zeros(), Vector3::zeros()); 3];
        scene.points[0].state = PointState::Deleted;

        let plan = ExportPlan::new(&scene);
        let exported: Vec<ExportPoint> = plan.points().collect();
        assert_eq!(exported.iter().map(|p| p.id).collect::<Vec<_>>(), vec![2, 3]);
        assert!(exported.iter().all(|p| p.error == 0.0 && p.track.is_empty()));
        assert!(plan.deleted_ids().contains(&1));
    }
}
