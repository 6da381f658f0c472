//! XYZ point lists: one `x y z r g b` line per point, colors in 0..255.
//! Lines starting with `#` are comments.

use crate::core::Point;
use crate::io::{Diagnostic, Diagnostics, LoadError};
use nalgebra::Vector3;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// First line written by `write_points`. Also how `.txt` files are told apart
/// from COLMAP `points3D.txt`, whose header mentions "3D point".
pub const HEADER: &str = "# x y z r g b";

fn parse_line(line: &str) -> Result<Point, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let position = match tokens.as_slice() {
        [x, y, z, ..] => {
            let p = |t: &str| t.parse::<f32>().map_err(|_| format!("invalid coordinate '{}'", t));
            Vector3::new(p(*x)?, p(*y)?, p(*z)?)
        }
        _ => return Err(format!("expected at least 3 values, found {}", tokens.len())),
    };

    match &tokens[3..] {
        [] => Ok(Point::from_rgb8(position, [255, 255, 255])),
        [r, g, b, ..] => {
            let c = |t: &str| {
                t.parse::<f32>()
                    .map(|v| v.clamp(0.0, 255.0).round() as u8)
                    .map_err(|_| format!("invalid color '{}'", t))
            };
            Ok(Point::from_rgb8(position, [c(*r)?, c(*g)?, c(*b)?]))
        }
        rest => Err(format!("expected 3 color values, found {}", rest.len())),
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
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match parse_line(trimmed) {
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

pub fn write_points<W: Write>(writer: &mut W, points: &[Point]) -> io::Result<usize> {
    writeln!(writer, "{}", HEADER)?;
    let mut written = 0;
    for point in points.iter().filter(|p| !p.is_deleted()) {
        let [r, g, b] = point.rgb8();
        writeln!(
            writer,
            "{} {} {} {} {} {}",
            point.position.x, point.position.y, point.position.z, r, g, b
        )?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_skips_comments_and_bad_lines() {
        let text = "# x y z r g b\n1 2 3 10 20 30\n\n4 5\n7 8 9\n";
        let mut diagnostics = Diagnostics::new();
        let points = read_points(Cursor::new(text), Path::new("a.xyz"), &mut diagnostics).unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].rgb8(), [10, 20, 30]);
        assert_eq!(points[1].rgb8(), [255, 255, 255]);
        assert!(matches!(
            diagnostics.as_slice(),
            [Diagnostic::SkippedRecord { record: 4, .. }]
        ));
    }

    #[test]
    fn test_write_then_read() {
        let points = vec![
            Point::from_rgb8(Vector3::new(0.5, -1.0, 2.0), [1, 2, 3]),
            Point::from_rgb8(Vector3::new(3.0, 3.0, 3.0), [200, 100, 0]),
        ];
        let mut buf = Vec::new();
        write_points(&mut buf, &points).unwrap();

        let mut diagnostics = Diagnostics::new();
        let back = read_points(Cursor::new(buf), Path::new("a.xyz"), &mut diagnostics).unwrap();
        assert_eq!(back, points);
    }
}
