//! COLMAP text files.
//!
//! Each file starts with a `#` comment block. Records are whitespace-separated:
//!
//! ```text
//! cameras.txt   CAMERA_ID MODEL WIDTH HEIGHT PARAMS...
//! images.txt    IMAGE_ID QW QX QY QZ TX TY TZ CAMERA_ID NAME
//!               X Y POINT3D_ID ...          (POINT3D_ID is -1 when untriangulated)
//! points3D.txt  POINT3D_ID X Y Z R G B ERROR (IMAGE_ID POINT2D_IDX)...
//! ```
//!
//! Images take two lines. The second line is read verbatim and may be empty,
//! so blank lines are only skipped when looking for the next pose line.

use super::RecordError;
use crate::core::{
    Camera, CameraModel, CameraPose, Feature, Observation, Point, PointMetadata, WorldToCamera,
    UNKNOWN_MODEL_TAG,
};
use crate::io::export::ExportPlan;
use crate::io::{Diagnostic, Diagnostics, LoadError};
use nalgebra::{Vector2, Vector3};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::str::FromStr;

/// Text token for "no 3D point".
pub const SENTINEL_TOKEN: &str = "-1";

fn parse<T: FromStr>(token: Option<&&str>, what: &str) -> Result<T, RecordError> {
    let token = token.ok_or_else(|| RecordError::Invalid(format!("missing {}", what)))?;
    token
        .parse()
        .map_err(|_| RecordError::Invalid(format!("invalid {}: {}", what, token)))
}

fn is_skippable(line: &str) -> bool {
    line.is_empty() || line.starts_with('#')
}

/// Lines read as bytes, so one undecodable line does not end the file.
///
/// Yields `Err` only for real I/O failures; a line that is not UTF-8 comes
/// back as `Ok(Err(reason))`.
struct RawLines<R> {
    reader: R,
    buf: Vec<u8>,
}

fn raw_lines<R: BufRead>(reader: R) -> RawLines<R> {
    RawLines {
        reader,
        buf: Vec::new(),
    }
}

impl<R: BufRead> Iterator for RawLines<R> {
    type Item = io::Result<Result<String, String>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                let line = String::from_utf8(self.buf.clone())
                    .map_err(|e| format!("invalid UTF-8: {}", e.utf8_error()));
                Some(Ok(line))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

fn skipped(path: &Path, line_no: usize, reason: String) -> Diagnostic {
    Diagnostic::SkippedRecord {
        file: path.to_path_buf(),
        record: line_no,
        reason,
    }
}

/// Why `name` would not survive a text pose line, if it would not.
///
/// The reader splits on whitespace and rejoins the name with single spaces.
pub(crate) fn unwritable_name(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        return Some("empty name");
    }
    let mut words = name.split(' ');
    if words.any(|w| w.is_empty() || w.contains(char::is_whitespace)) {
        return Some("whitespace other than single inner spaces");
    }
    None
}

/// Read `cameras.txt`.
pub fn read_cameras<R: BufRead>(
    reader: R,
    path: &Path,
    diagnostics: &mut Diagnostics,
) -> Result<BTreeMap<u32, Camera>, LoadError> {
    let mut cameras = BTreeMap::new();

    for (index, line) in raw_lines(reader).enumerate() {
        let line = match line.map_err(LoadError::io(path))? {
            Ok(line) => line,
            Err(reason) => {
                diagnostics.push(skipped(path, index + 1, reason));
                continue;
            }
        };
        let line = line.trim();
        if is_skippable(line) {
            continue;
        }

        match parse_camera(line, diagnostics) {
            Ok(camera) => {
                cameras.insert(camera.id, camera);
            }
            Err(err) => diagnostics.push(skipped(path, index + 1, err.to_string())),
        }
    }

    Ok(cameras)
}

fn parse_camera(line: &str, diagnostics: &mut Diagnostics) -> Result<Camera, RecordError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let id: u32 = parse(tokens.first(), "camera id")?;
    let model_name = *tokens
        .get(1)
        .ok_or_else(|| RecordError::Invalid("missing camera model".to_string()))?;
    let width: u64 = parse(tokens.get(2), "width")?;
    let height: u64 = parse(tokens.get(3), "height")?;
    let params = tokens
        .get(4..)
        .unwrap_or_default()
        .iter()
        .map(|t| parse::<f64>(Some(t), "camera parameter"))
        .collect::<Result<Vec<_>, _>>()?;

    let model = match CameraModel::tag_from_name(model_name) {
        Some(tag) => {
            // tag_from_name only returns tags with a schema
            let expected = CameraModel::num_params(tag).unwrap_or(0);
            if params.len() > expected {
                diagnostics.push(Diagnostic::ExtraCameraParams {
                    camera_id: id,
                    expected,
                    found: params.len(),
                });
            }
            let used = &params[..expected.min(params.len())];
            CameraModel::from_params(tag, used)
                .map_err(|err| RecordError::Invalid(err.to_string()))?
        }
        None => {
            diagnostics.push(Diagnostic::UnknownCameraModel {
                camera_id: id,
                model: model_name.to_string(),
            });
            CameraModel::Unknown {
                tag: UNKNOWN_MODEL_TAG,
            }
        }
    };

    Ok(Camera {
        id,
        model,
        width,
        height,
    })
}

/// Read `images.txt`, converting each pose to camera-to-world.
pub fn read_images<R: BufRead>(
    reader: R,
    path: &Path,
    normalize: bool,
    diagnostics: &mut Diagnostics,
) -> Result<BTreeMap<u32, CameraPose>, LoadError> {
    let mut images = BTreeMap::new();
    let mut lines = raw_lines(reader).enumerate();

    while let Some((index, line)) = lines.next() {
        let pose_line = line.map_err(LoadError::io(path))?;
        if matches!(&pose_line, Ok(line) if is_skippable(line.trim())) {
            continue;
        }

        // A missing second line at end of file means no features. The feature
        // line is consumed even when the pose line is bad, to stay paired.
        let feature_line = match lines.next() {
            Some((_, line)) => line.map_err(LoadError::io(path))?,
            None => Ok(String::new()),
        };

        let record = match (pose_line, feature_line) {
            (Ok(pose), Ok(features)) => parse_image(pose.trim(), &features, normalize),
            (Err(reason), _) | (_, Err(reason)) => Err(RecordError::Invalid(reason)),
        };
        match record {
            Ok(pose) => {
                images.insert(pose.id, pose);
            }
            Err(err) => diagnostics.push(skipped(path, index + 1, err.to_string())),
        }
    }

    Ok(images)
}

fn parse_image(
    pose_line: &str,
    feature_line: &str,
    normalize: bool,
) -> Result<CameraPose, RecordError> {
    let tokens: Vec<&str> = pose_line.split_whitespace().collect();
    let id: u32 = parse(tokens.first(), "image id")?;

    let mut q = [0.0; 4];
    for (i, v) in q.iter_mut().enumerate() {
        *v = parse(tokens.get(1 + i), "quaternion")?;
    }
    let mut t = [0.0; 3];
    for (i, v) in t.iter_mut().enumerate() {
        *v = parse(tokens.get(5 + i), "translation")?;
    }
    let camera_id: u32 = parse(tokens.get(8), "camera id")?;

    // Names may contain spaces; take everything after the camera id.
    let name = tokens.get(9..).unwrap_or_default().join(" ");
    if name.is_empty() {
        return Err(RecordError::Invalid("missing image name".to_string()));
    }

    let feature_tokens: Vec<&str> = feature_line.split_whitespace().collect();
    if feature_tokens.len() % 3 != 0 {
        return Err(RecordError::Invalid(format!(
            "feature line has {} tokens, expected triples",
            feature_tokens.len()
        )));
    }

    let features = feature_tokens
        .chunks_exact(3)
        .map(|triple| {
            let x: f64 = parse(triple.first(), "feature x")?;
            let y: f64 = parse(triple.get(1), "feature y")?;
            let point3d_id = if triple[2] == SENTINEL_TOKEN {
                None
            } else {
                Some(parse::<u64>(triple.get(2), "point3D id")?)
            };
            Ok(Feature::new(Vector2::new(x, y), point3d_id))
        })
        .collect::<Result<Vec<_>, RecordError>>()?;

    Ok(CameraPose {
        id,
        camera_id,
        name,
        pose: WorldToCamera::from_raw(q, t, normalize).to_camera_to_world(),
        features,
    })
}

/// Read `points3D.txt` into index-aligned points and metadata.
pub fn read_points<R: BufRead>(
    reader: R,
    path: &Path,
    diagnostics: &mut Diagnostics,
) -> Result<(Vec<Point>, Vec<PointMetadata>), LoadError> {
    let mut points = Vec::new();
    let mut metadata = Vec::new();

    for (index, line) in raw_lines(reader).enumerate() {
        let line = match line.map_err(LoadError::io(path))? {
            Ok(line) => line,
            Err(reason) => {
                diagnostics.push(skipped(path, index + 1, reason));
                continue;
            }
        };
        let line = line.trim();
        if is_skippable(line) {
            continue;
        }

        match parse_point(line) {
            Ok((point, meta)) => {
                points.push(point);
                metadata.push(meta);
            }
            Err(err) => diagnostics.push(skipped(path, index + 1, err.to_string())),
        }
    }

    Ok((points, metadata))
}

fn parse_point(line: &str) -> Result<(Point, PointMetadata), RecordError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let original_id: u64 = parse(tokens.first(), "point id")?;

    let x: f32 = parse(tokens.get(1), "x")?;
    let y: f32 = parse(tokens.get(2), "y")?;
    let z: f32 = parse(tokens.get(3), "z")?;
    let r: u8 = parse(tokens.get(4), "red")?;
    let g: u8 = parse(tokens.get(5), "green")?;
    let b: u8 = parse(tokens.get(6), "blue")?;
    let error: f64 = parse(tokens.get(7), "error")?;

    let track_tokens = tokens.get(8..).unwrap_or_default();
    if track_tokens.len() % 2 != 0 {
        return Err(RecordError::Invalid(
            "track has an odd number of tokens".to_string(),
        ));
    }
    let track = track_tokens
        .chunks_exact(2)
        .map(|pair| {
            Ok(Observation {
                image_id: parse(pair.first(), "track image id")?,
                point2d_idx: parse(pair.get(1), "track point2D index")?,
            })
        })
        .collect::<Result<Vec<_>, RecordError>>()?;

    Ok((
        Point::from_rgb8(Vector3::new(x, y, z), [r, g, b]),
        PointMetadata {
            original_id,
            error,
            track,
        },
    ))
}

/// Write `cameras.txt`.
pub fn write_cameras<W: Write>(writer: &mut W, cameras: &BTreeMap<u32, Camera>) -> io::Result<()> {
    writeln!(writer, "# Camera list with one line of data per camera:")?;
    writeln!(writer, "#   CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[]")?;
    writeln!(writer, "# Number of cameras: {}", cameras.len())?;

    for camera in cameras.values() {
        write!(
            writer,
            "{} {} {} {}",
            camera.id,
            camera.model.name(),
            camera.width,
            camera.height
        )?;
        for param in camera.model.params() {
            write!(writer, " {}", param)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Write `images.txt`, with references to deleted points replaced by `-1`.
pub fn write_images<W: Write>(writer: &mut W, plan: &ExportPlan) -> io::Result<()> {
    let images = &plan.scene().images;
    let total_features: usize = images.values().map(|pose| pose.features.len()).sum();
    let mean_observations = if images.is_empty() {
        0.0
    } else {
        total_features as f64 / images.len() as f64
    };

    writeln!(writer, "# Image list with two lines of data per image:")?;
    writeln!(
        writer,
        "#   IMAGE_ID, QW, QX, QY, QZ, TX, TY, TZ, CAMERA_ID, NAME"
    )?;
    writeln!(writer, "#   POINTS2D[] as (X, Y, POINT3D_ID)")?;
    writeln!(
        writer,
        "# Number of images: {}, mean observations per image: {}",
        images.len(),
        mean_observations
    )?;

    for pose in images.values() {
        let w2c = pose.pose.to_world_to_camera();
        let [qw, qx, qy, qz] = w2c.qvec();
        let [tx, ty, tz] = w2c.tvec();
        writeln!(
            writer,
            "{} {} {} {} {} {} {} {} {} {}",
            pose.id, qw, qx, qy, qz, tx, ty, tz, pose.camera_id, pose.name
        )?;

        let mut first = true;
        for feature in plan.features(pose) {
            if !first {
                write!(writer, " ")?;
            }
            first = false;
            match feature.point3d_id {
                Some(id) => write!(writer, "{} {} {}", feature.xy.x, feature.xy.y, id)?,
                None => write!(
                    writer,
                    "{} {} {}",
                    feature.xy.x, feature.xy.y, SENTINEL_TOKEN
                )?,
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Write `points3D.txt`, skipping deleted points.
pub fn write_points<W: Write>(writer: &mut W, plan: &ExportPlan) -> io::Result<()> {
    let total_track: usize = plan.points().map(|p| p.track.len()).sum();
    let mean_track = if plan.kept_count() == 0 {
        0.0
    } else {
        total_track as f64 / plan.kept_count() as f64
    };

    writeln!(writer, "# 3D point list with one line of data per point:")?;
    writeln!(
        writer,
        "#   POINT3D_ID, X, Y, Z, R, G, B, ERROR, TRACK[] as (IMAGE_ID, POINT2D_IDX)"
    )?;
    writeln!(
        writer,
        "# Number of points: {}, mean track length: {}",
        plan.kept_count(),
        mean_track
    )?;

    for point in plan.points() {
        write!(
            writer,
            "{} {} {} {} {} {} {} {}",
            point.id,
            point.position.x,
            point.position.y,
            point.position.z,
            point.rgb[0],
            point.rgb[1],
            point.rgb[2],
            point.error
        )?;
        for obs in point.track {
            write!(writer, " {} {}", obs.image_id, obs.point2d_idx)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_camera_line_parsing() {
        let input = "# comment\n\
                     1 PINHOLE 640 480 800 810 320 240\n\
                     2 SIMPLE_PINHOLE 1280 720 900 640 360\n";
        let mut diagnostics = Diagnostics::new();
        let cameras =
            read_cameras(Cursor::new(input), Path::new("cameras.txt"), &mut diagnostics).unwrap();

        assert_eq!(cameras.len(), 2);
        let k = cameras[&2].model.intrinsics().unwrap();
        assert_eq!(k.focal_length_y, 900.0);
        assert_eq!(k.principal_point_x, 640.0);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_unknown_model_name_becomes_placeholder() {
        let input = "7 WEIRD_MODEL 100 50 1 2 3\n8 PINHOLE 10 10 1 1 5 5\n";
        let mut diagnostics = Diagnostics::new();
        let cameras =
            read_cameras(Cursor::new(input), Path::new("cameras.txt"), &mut diagnostics).unwrap();

        assert_eq!(cameras.len(), 2);
        assert!(cameras[&7].model.is_unknown());
        assert_eq!(cameras[&7].width, 100);
        assert!(cameras[&7].model.params().is_empty());
        assert!(diagnostics.any(|d| matches!(
            d,
            Diagnostic::UnknownCameraModel { camera_id: 7, .. }
        )));
    }

    #[test]
    fn test_too_few_camera_params_skips_line() {
        let input = "1 OPENCV 640 480 500 500 320\n";
        let mut diagnostics = Diagnostics::new();
        let cameras =
            read_cameras(Cursor::new(input), Path::new("cameras.txt"), &mut diagnostics).unwrap();
        assert!(cameras.is_empty());
        assert!(diagnostics.any(|d| matches!(d, Diagnostic::SkippedRecord { record: 1, .. })));
    }

    #[test]
    fn test_image_with_empty_feature_line() {
        let input = "# header\n\
                     1 1 0 0 0 0 0 5 1 first.jpg\n\
                     \n\
                     2 1 0 0 0 1 2 3 1 second.jpg\n\
                     10.5 20.5 3 11 21 -1\n";
        let mut diagnostics = Diagnostics::new();
        let images = read_images(
            Cursor::new(input),
            Path::new("images.txt"),
            true,
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(images.len(), 2);
        assert!(images[&1].features.is_empty());
        let second = &images[&2];
        assert_eq!(second.name, "second.jpg");
        assert_eq!(second.features[0].point3d_id, Some(3));
        assert_eq!(second.features[1].point3d_id, None);
        assert_eq!(images[&1].pose.center, Vector3::new(0.0, 0.0, -5.0));
    }

    #[test]
    fn test_malformed_point_line_is_skipped() {
        let input = "# 3D point list\n\
                     1 0 0 0 255 0 0 0.5 1 0\n\
                     2 zero 0 0 1 1 1 0.1\n\
                     3 1 1 1 0 0 0 0.2\n";
        let mut diagnostics = Diagnostics::new();
        let (points, metadata) =
            read_points(Cursor::new(input), Path::new("points3D.txt"), &mut diagnostics).unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(metadata[1].original_id, 3);
        assert_eq!(diagnostics.len(), 1);
    }

    fn skipped_records(diagnostics: &Diagnostics) -> Vec<usize> {
        diagnostics
            .iter()
            .filter_map(|d| match d {
                Diagnostic::SkippedRecord { record, .. } => Some(*record),
                _ => None,
            })
            .collect()
    }

    fn images_from(input: &str, diagnostics: &mut Diagnostics) -> BTreeMap<u32, CameraPose> {
        read_images(Cursor::new(input), Path::new("images.txt"), true, diagnostics).unwrap()
    }

    #[test]
    fn test_bad_pose_skips_only_that_image() {
        let input = "# header\n\
                     1 1 0 0 0 0 0 5 1 a.jpg\n\
                     1.0 2.0 -1\n\
                     2 1 zero 0 0 0 0 5 1 b.jpg\n\
                     3.0 4.0 -1\n\
                     3 1 0 0 0 0 0 5 1 c.jpg\n\
                     5.0 6.0 7\n";
        let mut diagnostics = Diagnostics::new();
        let images = images_from(input, &mut diagnostics);

        assert_eq!(images.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(skipped_records(&diagnostics), vec![4]);
        // The bad record's feature line was consumed with it.
        assert_eq!(images[&3].name, "c.jpg");
        assert_eq!(images[&3].features[0].point3d_id, Some(7));
    }

    #[test]
    fn test_bad_feature_lines_skip_their_image() {
        let input = "1 1 0 0 0 0 0 5 1 a.jpg\n\
                     1.0 2.0\n\
                     2 1 0 0 0 0 0 5 1 b.jpg\n\
                     1 2 x\n\
                     3 1 0 0 0 0 0 5 1 c.jpg\n\
                     5.0 6.0 -1\n";
        let mut diagnostics = Diagnostics::new();
        let images = images_from(input, &mut diagnostics);

        assert_eq!(images.keys().copied().collect::<Vec<_>>(), vec![3]);
        assert_eq!(skipped_records(&diagnostics), vec![1, 3]);
        assert_eq!(images[&3].features[0].point3d_id, None);
    }

    #[test]
    fn test_non_utf8_camera_line_is_skipped() {
        let input = b"1 PINHOLE 640 480 800 810 320 240 \xc3\n2 PINHOLE 10 10 1 1 5 5\n";
        let mut diagnostics = Diagnostics::new();
        let cameras =
            read_cameras(Cursor::new(&input[..]), Path::new("cameras.txt"), &mut diagnostics)
                .unwrap();

        assert_eq!(cameras.keys().copied().collect::<Vec<_>>(), vec![2]);
        assert_eq!(skipped_records(&diagnostics), vec![1]);
    }

    #[test]
    fn test_names_that_do_not_survive_a_text_round_trip() {
        assert_eq!(unwritable_name("frame 001.png"), None);
        assert_eq!(unwritable_name("dir/frame.png"), None);
        for name in ["", " lead.png", "trail.png ", "a  b.png", "a\tb.png", "x\ny.png"] {
            assert!(unwritable_name(name).is_some(), "{:?}", name);
        }
    }
}
