//! ASCII PLY point clouds.
//!
//! Only the `vertex` element is read; other elements (faces, edges) are
//! skipped. Positions come from the `x`/`y`/`z` properties and color from
//! `red`/`green`/`blue` when present. Binary PLY is rejected.

use crate::core::Point;
use crate::io::{Diagnostic, Diagnostics, LoadError};
use nalgebra::Vector3;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Map a color triple to 0..1. Values above 1 mean the file used 0..255.
pub(crate) fn normalize_color(rgb: [f32; 3]) -> Vector3<f32> {
    let color = Vector3::new(rgb[0], rgb[1], rgb[2]);
    if rgb.iter().any(|&c| c > 1.0) {
        color / 255.0
    } else {
        color
    }
}

fn invalid_header(path: &Path, msg: impl Into<String>) -> LoadError {
    LoadError::Header {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, msg.into()),
    }
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<(String, String)>,
}

impl Element {
    fn index_of(&self, names: &[&str]) -> Option<usize> {
        self.properties
            .iter()
            .position(|(_, name)| names.contains(&name.as_str()))
    }
}

#[derive(Debug)]
struct VertexLayout {
    position: [usize; 3],
    color: Option<[usize; 3]>,
    /// Integer color properties are always 0..255.
    color_is_byte: bool,
}

impl VertexLayout {
    fn from_element(element: &Element, path: &Path) -> Result<Self, LoadError> {
        let find = |names: &[&str]| {
            element
                .index_of(names)
                .ok_or_else(|| invalid_header(path, format!("vertex has no {} property", names[0])))
        };
        let position = [find(&["x"])?, find(&["y"])?, find(&["z"])?];

        let color = match (
            element.index_of(&["red", "r", "diffuse_red"]),
            element.index_of(&["green", "g", "diffuse_green"]),
            element.index_of(&["blue", "b", "diffuse_blue"]),
        ) {
            (Some(r), Some(g), Some(b)) => Some([r, g, b]),
            _ => None,
        };
        let color_is_byte = color
            .map(|[r, _, _]| {
                matches!(
                    element.properties[r].0.as_str(),
                    "uchar" | "uint8" | "char" | "int8"
                )
            })
            .unwrap_or(false);

        Ok(Self {
            position,
            color,
            color_is_byte,
        })
    }

    fn parse(&self, line: &str) -> Result<Point, String> {
        let values = line
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<f32>()
                    .map_err(|_| format!("invalid number '{}'", token))
            })
            .collect::<Result<Vec<f32>, String>>()?;

        let get = |index: usize| {
            values.get(index).copied().ok_or_else(|| {
                format!(
                    "expected at least {} values, found {}",
                    index + 1,
                    values.len()
                )
            })
        };

        let position = Vector3::new(
            get(self.position[0])?,
            get(self.position[1])?,
            get(self.position[2])?,
        );
        let color = match self.color {
            Some([r, g, b]) => {
                let rgb = [get(r)?, get(g)?, get(b)?];
                if self.color_is_byte {
                    Vector3::new(rgb[0], rgb[1], rgb[2]) / 255.0
                } else {
                    normalize_color(rgb)
                }
            }
            None => Vector3::new(1.0, 1.0, 1.0),
        };
        Ok(Point::new(position, color))
    }
}

fn read_header<R: BufRead>(
    lines: &mut io::Lines<R>,
    path: &Path,
) -> Result<Vec<Element>, LoadError> {
    let next_line = |lines: &mut io::Lines<R>| -> Result<String, LoadError> {
        match lines.next() {
            Some(line) => line.map_err(LoadError::io(path)),
            None => Err(invalid_header(path, "unexpected end of file in header")),
        }
    };

    if next_line(lines)?.trim() != "ply" {
        return Err(invalid_header(path, "missing 'ply' magic"));
    }

    let mut elements: Vec<Element> = Vec::new();
    loop {
        let line = next_line(lines)?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["end_header"] => break,
            ["format", "ascii", ..] => {}
            ["format", other, ..] => {
                return Err(LoadError::UnsupportedFormat(format!(
                    "PLY format '{}' in {}, only ascii is supported",
                    other,
                    path.display()
                )))
            }
            ["element", name, count] => {
                let count = count.parse().map_err(|_| {
                    invalid_header(path, format!("invalid element count '{}'", count))
                })?;
                elements.push(Element {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            ["property", "list", ..] => {
                if let Some(element) = elements.last_mut() {
                    element.properties.push(("list".into(), String::new()));
                }
            }
            ["property", ty, name] => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| invalid_header(path, "property before any element"))?;
                element.properties.push((ty.to_string(), name.to_string()));
            }
            _ => {}
        }
    }
    Ok(elements)
}

/// Read the vertices of an ASCII PLY file as points.
pub fn read_points<R: BufRead>(
    reader: R,
    path: &Path,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Point>, LoadError> {
    let mut lines = reader.lines();
    let elements = read_header(&mut lines, path)?;

    let vertex_index = elements
        .iter()
        .position(|e| e.name == "vertex")
        .ok_or_else(|| invalid_header(path, "no vertex element"))?;
    let layout = VertexLayout::from_element(&elements[vertex_index], path)?;

    // Skip the bodies of elements that precede the vertices.
    let mut line_no = 0usize;
    let skip: usize = elements[..vertex_index].iter().map(|e| e.count).sum();
    for _ in 0..skip {
        if lines.next().transpose().map_err(LoadError::io(path))?.is_none() {
            return Ok(Vec::new());
        }
        line_no += 1;
    }

    let declared = elements[vertex_index].count;
    let mut points = Vec::with_capacity(declared.min(1 << 16));
    for index in 0..declared {
        let Some(line) = lines.next().transpose().map_err(LoadError::io(path))? else {
            diagnostics.push(Diagnostic::TruncatedStream {
                file: path.to_path_buf(),
                declared: declared as u64,
                read: index as u64,
            });
            break;
        };
        line_no += 1;
        match layout.parse(&line) {
            Ok(point) => points.push(point),
            Err(reason) => diagnostics.push(Diagnostic::SkippedRecord {
                file: path.to_path_buf(),
                record: index,
                reason,
            }),
        }
    }

    log::debug!("Read {} PLY vertices over {} body lines", points.len(), line_no);
    Ok(points)
}

/// Write live points as an ASCII PLY cloud. Returns the number written.
pub fn write_points<W: Write>(writer: &mut W, points: &[Point]) -> io::Result<usize> {
    let live = points.iter().filter(|p| !p.is_deleted()).count();

    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "element vertex {}", live)?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    writeln!(writer, "property uchar red")?;
    writeln!(writer, "property uchar green")?;
    writeln!(writer, "property uchar blue")?;
    writeln!(writer, "end_header")?;

    for point in points.iter().filter(|p| !p.is_deleted()) {
        let [r, g, b] = point.rgb8();
        writeln!(
            writer,
            "{} {} {} {} {} {}",
            point.position.x, point.position.y, point.position.z, r, g, b
        )?;
    }

    Ok(live)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PointState;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn read(text: &str) -> (Result<Vec<Point>, LoadError>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let result = read_points(Cursor::new(text), Path::new("cloud.ply"), &mut diagnostics);
        (result, diagnostics)
    }

    #[test]
    fn test_write_skips_deleted_points() {
        let mut points = vec![
            Point::from_rgb8(Vector3::new(1.0, 2.0, 3.0), [255, 0, 128]),
            Point::from_rgb8(Vector3::new(4.0, 5.0, 6.0), [0, 0, 0]),
        ];
        points[1].state = PointState::Deleted;

        let mut buf = Vec::new();
        assert_eq!(write_points(&mut buf, &points).unwrap(), 1);

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("element vertex 1\n"));
        assert!(text.ends_with("1 2 3 255 0 128\n"));
    }

    #[test]
    fn test_read_byte_colors() {
        let (points, diagnostics) = read(
            "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float y\n\
             property float z\nproperty uchar red\nproperty uchar green\nproperty uchar blue\n\
             end_header\n1 2 3 255 0 51\n",
        );
        let points = points.unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].rgb8(), [255, 0, 51]);
    }

    #[test]
    fn test_read_float_colors_and_reordered_properties() {
        let (points, _) = read(
            "ply\nformat ascii 1.0\nelement vertex 1\nproperty float red\nproperty float green\n\
             property float blue\nproperty float x\nproperty float y\nproperty float z\n\
             end_header\n0.5 0.25 1 7 8 9\n",
        );
        let point = &points.unwrap()[0];
        assert_relative_eq!(point.position.x, 7.0);
        assert_relative_eq!(point.color.x, 0.5);
        assert_relative_eq!(point.color.y, 0.25);
    }

    #[test]
    fn test_missing_color_defaults_to_white() {
        let (points, _) = read(
            "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float y\n\
             property float z\nend_header\n0 0 0\n",
        );
        assert_eq!(points.unwrap()[0].rgb8(), [255, 255, 255]);
    }

    #[test]
    fn test_malformed_vertex_is_skipped() {
        let (points, diagnostics) = read(
            "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\n\
             property float z\nend_header\n0 0 0\nnot a point\n1 1 1\n",
        );
        assert_eq!(points.unwrap().len(), 2);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_binary_ply_rejected() {
        let (result, _) = read("ply\nformat binary_little_endian 1.0\nend_header\n");
        assert!(matches!(result, Err(LoadError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_bad_magic() {
        let (result, _) = read("nope\n");
        assert!(matches!(result, Err(LoadError::Header { .. })));
    }
}
