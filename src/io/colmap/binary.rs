//! COLMAP binary streams (little-endian).
//!
//! ```text
//! cameras.bin   u64 count
//!               { u32 id, i32 model, u64 width, u64 height, f64 params[n(model)] }
//! images.bin    u64 count
//!               { u32 id, f64 qw qx qy qz, f64 tx ty tz, u32 camera_id, name\0,
//!                 u64 n, n x { f64 x, f64 y, u64 point3d_id | u64::MAX } }
//! points3D.bin  u64 count
//!               { u64 id, f64 x y z, u8 r g b, f64 error,
//!                 u64 n, n x { u32 image_id, u32 point2d_idx } }
//! ```
//!
//! A truncated count is a header error. A record cut short ends the stream:
//! records already read are kept and a `TruncatedStream` diagnostic is
//! recorded, since there is no way to resynchronize a binary stream.

use super::RecordError;
use crate::core::{
    Camera, CameraModel, CameraPose, Feature, Observation, Point, PointMetadata, WorldToCamera,
    POINT3D_SENTINEL,
};
use crate::io::export::ExportPlan;
use crate::io::{Diagnostic, Diagnostics, LoadError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use nalgebra::{Vector2, Vector3};
use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::path::Path;

// Upper bound on pre-allocation from an untrusted count field.
const MAX_PREALLOC: u64 = 1 << 16;

fn read_count<R: Read>(reader: &mut R, path: &Path) -> Result<u64, LoadError> {
    reader
        .read_u64::<LittleEndian>()
        .map_err(LoadError::header(path))
}

fn read_records<R, T>(
    reader: &mut R,
    path: &Path,
    diagnostics: &mut Diagnostics,
    mut read_one: impl FnMut(&mut R) -> Result<T, RecordError>,
    mut accept: impl FnMut(T, &mut Diagnostics),
) -> Result<u64, LoadError>
where
    R: Read,
{
    let declared = read_count(reader, path)?;
    let mut read = 0;

    for index in 0..declared {
        match read_one(reader) {
            Ok(record) => {
                accept(record, diagnostics);
                read += 1;
            }
            Err(RecordError::Invalid(reason)) => {
                diagnostics.push(Diagnostic::SkippedRecord {
                    file: path.to_path_buf(),
                    record: index as usize,
                    reason,
                });
            }
            Err(RecordError::Io(err)) => {
                log::debug!("{}: record {} unreadable: {}", path.display(), index, err);
                diagnostics.push(Diagnostic::TruncatedStream {
                    file: path.to_path_buf(),
                    declared,
                    read,
                });
                break;
            }
        }
    }

    Ok(declared)
}

/// Read `cameras.bin`.
///
/// A model tag outside the known table is read with zero parameters. Files
/// from other writers that store parameters for such a model lose alignment
/// at that record.
pub fn read_cameras<R: Read>(
    reader: &mut R,
    path: &Path,
    diagnostics: &mut Diagnostics,
) -> Result<BTreeMap<u32, Camera>, LoadError> {
    let mut cameras = BTreeMap::new();
    read_records(reader, path, diagnostics, read_camera, |camera, diagnostics| {
        if camera.model.is_unknown() {
            diagnostics.push(Diagnostic::UnknownCameraModel {
                camera_id: camera.id,
                model: camera.model.tag().to_string(),
            });
        }
        cameras.insert(camera.id, camera);
    })?;
    Ok(cameras)
}

fn read_camera<R: Read>(reader: &mut R) -> Result<Camera, RecordError> {
    let id = reader.read_u32::<LittleEndian>()?;
    let tag = reader.read_i32::<LittleEndian>()?;
    let width = reader.read_u64::<LittleEndian>()?;
    let height = reader.read_u64::<LittleEndian>()?;

    // Unknown models carry no parameters in files this crate writes. A foreign
    // file with an unlisted model that does carry them desyncs here, and the
    // loss surfaces as skipped or truncated records after this one.
    let num_params = CameraModel::num_params(tag).unwrap_or(0);
    let mut params = vec![0.0; num_params];
    reader.read_f64_into::<LittleEndian>(&mut params)?;

    let model = CameraModel::from_params(tag, &params)
        .map_err(|err| RecordError::Invalid(err.to_string()))?;

    Ok(Camera {
        id,
        model,
        width,
        height,
    })
}

/// Read `images.bin`, converting each pose to camera-to-world.
pub fn read_images<R: Read>(
    reader: &mut R,
    path: &Path,
    normalize: bool,
    diagnostics: &mut Diagnostics,
) -> Result<BTreeMap<u32, CameraPose>, LoadError> {
    let mut images = BTreeMap::new();
    read_records(
        reader,
        path,
        diagnostics,
        |r| read_image(r, normalize),
        |pose, _| {
            images.insert(pose.id, pose);
        },
    )?;
    Ok(images)
}

fn read_image<R: Read>(reader: &mut R, normalize: bool) -> Result<CameraPose, RecordError> {
    let id = reader.read_u32::<LittleEndian>()?;

    let mut q = [0.0; 4];
    reader.read_f64_into::<LittleEndian>(&mut q)?;
    let mut t = [0.0; 3];
    reader.read_f64_into::<LittleEndian>(&mut t)?;

    let camera_id = reader.read_u32::<LittleEndian>()?;

    // Null-terminated image name
    let mut name_bytes = Vec::new();
    loop {
        let byte = reader.read_u8()?;
        if byte == 0 {
            break;
        }
        name_bytes.push(byte);
    }

    let num_points2d = reader.read_u64::<LittleEndian>()?;
    let mut features = Vec::with_capacity(num_points2d.min(MAX_PREALLOC) as usize);
    for _ in 0..num_points2d {
        let x = reader.read_f64::<LittleEndian>()?;
        let y = reader.read_f64::<LittleEndian>()?;
        let point3d_id = reader.read_u64::<LittleEndian>()?;
        features.push(Feature::from_raw(Vector2::new(x, y), point3d_id));
    }

    // The whole record has been consumed, so a bad name only skips this image.
    let name = String::from_utf8(name_bytes)
        .map_err(|e| RecordError::Invalid(format!("Invalid UTF-8 in image name: {}", e)))?;

    Ok(CameraPose {
        id,
        camera_id,
        name,
        pose: WorldToCamera::from_raw(q, t, normalize).to_camera_to_world(),
        features,
    })
}

/// Read `points3D.bin` into index-aligned points and metadata.
pub fn read_points<R: Read>(
    reader: &mut R,
    path: &Path,
    diagnostics: &mut Diagnostics,
) -> Result<(Vec<Point>, Vec<PointMetadata>), LoadError> {
    let mut points = Vec::new();
    let mut metadata = Vec::new();
    let declared = read_records(
        reader,
        path,
        diagnostics,
        read_point,
        |(point, meta), _| {
            points.push(point);
            metadata.push(meta);
        },
    )?;
    log::debug!(
        "{}: {} of {} points read",
        path.display(),
        points.len(),
        declared
    );
    Ok((points, metadata))
}

fn read_point<R: Read>(reader: &mut R) -> Result<(Point, PointMetadata), RecordError> {
    let original_id = reader.read_u64::<LittleEndian>()?;

    let mut xyz = [0.0; 3];
    reader.read_f64_into::<LittleEndian>(&mut xyz)?;

    let mut rgb = [0u8; 3];
    reader.read_exact(&mut rgb)?;

    let error = reader.read_f64::<LittleEndian>()?;

    let track_length = reader.read_u64::<LittleEndian>()?;
    let mut track = Vec::with_capacity(track_length.min(MAX_PREALLOC) as usize);
    for _ in 0..track_length {
        let image_id = reader.read_u32::<LittleEndian>()?;
        let point2d_idx = reader.read_u32::<LittleEndian>()?;
        track.push(Observation {
            image_id,
            point2d_idx,
        });
    }

    let position = Vector3::new(xyz[0] as f32, xyz[1] as f32, xyz[2] as f32);
    Ok((
        Point::from_rgb8(position, rgb),
        PointMetadata {
            original_id,
            error,
            track,
        },
    ))
}

/// Why `name` cannot be stored as a null-terminated string, if it cannot.
pub(crate) fn unwritable_name(name: &str) -> Option<&'static str> {
    name.contains('\0').then_some("interior NUL byte")
}

/// Write `cameras.bin`.
pub fn write_cameras<W: Write>(writer: &mut W, cameras: &BTreeMap<u32, Camera>) -> io::Result<()> {
    writer.write_u64::<LittleEndian>(cameras.len() as u64)?;
    for camera in cameras.values() {
        writer.write_u32::<LittleEndian>(camera.id)?;
        writer.write_i32::<LittleEndian>(camera.model.tag())?;
        writer.write_u64::<LittleEndian>(camera.width)?;
        writer.write_u64::<LittleEndian>(camera.height)?;
        for param in camera.model.params() {
            writer.write_f64::<LittleEndian>(param)?;
        }
    }
    Ok(())
}

/// Write `images.bin`, with references to deleted points replaced by the sentinel.
pub fn write_images<W: Write>(writer: &mut W, plan: &ExportPlan) -> io::Result<()> {
    let images = &plan.scene().images;
    writer.write_u64::<LittleEndian>(images.len() as u64)?;
    for pose in images.values() {
        let w2c = pose.pose.to_world_to_camera();

        writer.write_u32::<LittleEndian>(pose.id)?;
        for v in w2c.qvec() {
            writer.write_f64::<LittleEndian>(v)?;
        }
        for v in w2c.tvec() {
            writer.write_f64::<LittleEndian>(v)?;
        }
        writer.write_u32::<LittleEndian>(pose.camera_id)?;
        writer.write_all(pose.name.as_bytes())?;
        writer.write_u8(0)?;

        writer.write_u64::<LittleEndian>(pose.features.len() as u64)?;
        for feature in plan.features(pose) {
            writer.write_f64::<LittleEndian>(feature.xy.x)?;
            writer.write_f64::<LittleEndian>(feature.xy.y)?;
            writer.write_u64::<LittleEndian>(feature.point3d_id.unwrap_or(POINT3D_SENTINEL))?;
        }
    }
    Ok(())
}

/// Write `points3D.bin`, skipping deleted points.
pub fn write_points<W: Write>(writer: &mut W, plan: &ExportPlan) -> io::Result<()> {
    writer.write_u64::<LittleEndian>(plan.kept_count() as u64)?;
    for point in plan.points() {
        writer.write_u64::<LittleEndian>(point.id)?;
        writer.write_f64::<LittleEndian>(point.position.x as f64)?;
        writer.write_f64::<LittleEndian>(point.position.y as f64)?;
        writer.write_f64::<LittleEndian>(point.position.z as f64)?;
        writer.write_all(&point.rgb)?;
        writer.write_f64::<LittleEndian>(point.error)?;
        writer.write_u64::<LittleEndian>(point.track.len() as u64)?;
        for obs in point.track {
            writer.write_u32::<LittleEndian>(obs.image_id)?;
            writer.write_u32::<LittleEndian>(obs.point2d_idx)?;
        }
    }
    Ok(())
}
