//! OBJ vertex lists.
//!
//! Only `v` lines are used:
//! ```text
//! v x y z           # white
//! v x y z r g b     # color in 0..1 (0..255 is accepted on read)
//! ```
//! Faces, normals and texture coordinates are ignored.

use crate::core::Point;
use crate::io::ply::normalize_color;
use crate::io::{Diagnostic, Diagnostics, LoadError};
use nalgebra::Vector3;
use std::io::{self, BufRead, Write};
use std::path::Path;

fn parse_vertex(rest: &str) -> Result<Point, String> {
    let values = rest
        .split_whitespace()
        .map(|t| t.parse::<f32>().map_err(|_| format!("invalid number '{}'", t)))
        .collect::<Result<Vec<f32>, String>>()?;

    match values.as_slice() {
        [x, y, z] => Ok(Point::new(Vector3::new(*x, *y, *z), Vector3::new(1.0, 1.0, 1.0))),
        // `v x y z w` carries a homogeneous weight, not a color.
        [x, y, z, _w] => Ok(Point::new(Vector3::new(*x, *y, *z), Vector3::new(1.0, 1.0, 1.0))),
        [x, y, z, r, g, b, ..] => Ok(Point::new(
            Vector3::new(*x, *y, *z),
            normalize_color([*r, *g, *b]),
        )),
        _ => Err(format!("expected 3 or 6 values, found {}", values.len())),
    }
}

pub fn read_points<R: BufRead>(
    reader: R,
    path: &Path,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Point>, LoadError> {
    let mut points = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(LoadError::io(path))?;
        let Some(rest) = line.trim_start().strip_prefix("v ") else {
            continue;
        };
        match parse_vertex(rest) {
            Ok(point) => points.push(point),
            Err(reason) => diagnostics.push(Diagnostic::SkippedRecord {
                file: path.to_path_buf(),
                record: index + 1,
                reason,
            }),
        }
    }
    Ok(points)
}

/// Write live points as `v x y z r g b` lines. Returns the number written.
pub fn write_points<W: Write>(writer: &mut W, points: &[Point]) -> io::Result<usize> {
    writeln!(writer, "# SfM point export")?;
    let mut written = 0;
    for point in points.iter().filter(|p| !p.is_deleted()) {
        writeln!(
            writer,
            "v {} {} {} {} {} {}",
            point.position.x,
            point.position.y,
            point.position.z,
            point.color.x,
            point.color.y,
            point.color.z
        )?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PointState;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    #[test]
    fn test_vertices_with_and_without_color() {
        let text = "# comment\nv 1 2 3\nvn 0 0 1\nv 4 5 6 0.5 0 1\nf 1 2 3\nv bad\n";
        let mut diagnostics = Diagnostics::new();
        let points = read_points(Cursor::new(text), Path::new("m.obj"), &mut diagnostics).unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].rgb8(), [255, 255, 255]);
        assert_relative_eq!(points[1].color.x, 0.5);
        assert_relative_eq!(points[1].position.z, 6.0);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_write_skips_deleted() {
        let mut points = vec![Point::new(Vector3::zeros(), Vector3::new(0.25, 0.5, 1.0)); 3];
        points[0].state = PointState::Deleted;

        let mut buf = Vec::new();
        assert_eq!(write_points(&mut buf, &points).unwrap(), 2);
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 2);
        assert!(text.contains("v 0 0 0 0.25 0.5 1\n"));
    }
}
