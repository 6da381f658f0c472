//! Camera intrinsic models.
//!
//! A camera is described on disk by a numeric model tag plus a flat list of
//! `f64` parameters whose length and meaning depend on the tag:
//!
//! | tag | name             | params | layout                              |
//! |-----|------------------|--------|-------------------------------------|
//! | 0   | SIMPLE_PINHOLE   | 3      | f, cx, cy                           |
//! | 1   | PINHOLE          | 4      | fx, fy, cx, cy                      |
//! | 2   | SIMPLE_RADIAL    | 4      | f, cx, cy, k1                       |
//! | 3   | RADIAL           | 5      | f, cx, cy, k1, k2                   |
//! | 4   | OPENCV           | 8      | fx, fy, cx, cy, k1, k2, p1, p2      |
//! | 5   | OPENCV_FISHEYE   | 12     | fx, fy, cx, cy, k1..k6, sx1, sy1    |
//! | 6   | FULL_OPENCV      | 5      | fx, fy, cx, cy, k1                  |
//!
//! `CameraModel` turns the flat list into one variant per layout so the slot
//! meaning is carried by the type instead of by index conventions.
//! Distortion terms are kept verbatim for round-tripping but never interpreted.

use thiserror::Error;

/// Label used for cameras whose model tag or name is not recognized.
pub const UNKNOWN_MODEL_NAME: &str = "UNKNOWN";

/// Tag stored for cameras whose model could not be identified from a text name.
pub const UNKNOWN_MODEL_TAG: i32 = -1;

/// Errors building a camera model from raw parameters.
#[derive(Debug, Error, PartialEq)]
pub enum CameraModelError {
    #[error("camera model {tag} expects {expected} parameters, found {found}")]
    ParamCount {
        tag: i32,
        expected: usize,
        found: usize,
    },
}

/// Camera intrinsic model, one variant per on-disk parameter layout.
#[derive(Debug, Clone, PartialEq)]
pub enum CameraModel {
    SimplePinhole {
        f: f64,
        cx: f64,
        cy: f64,
    },
    Pinhole {
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
    },
    SimpleRadial {
        f: f64,
        cx: f64,
        cy: f64,
        k1: f64,
    },
    Radial {
        f: f64,
        cx: f64,
        cy: f64,
        k1: f64,
        k2: f64,
    },
    OpenCv {
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
        k1: f64,
        k2: f64,
        p1: f64,
        p2: f64,
    },
    OpenCvFisheye {
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
        /// k1..k6
        k: [f64; 6],
        sx1: f64,
        sy1: f64,
    },
    /// Reduced five-slot layout (fx, fy, cx, cy, k1).
    FullOpenCv {
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
        k1: f64,
    },
    /// Placeholder for an unrecognized model. Carries no parameters so the
    /// camera's width/height and the poses referencing it stay usable.
    Unknown { tag: i32 },
}

/// Decoded pinhole intrinsics (pixels).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub focal_length: f64,
    pub focal_length_y: f64,
    pub principal_point_x: f64,
    pub principal_point_y: f64,
}

impl Intrinsics {
    /// Intrinsics substituted when a pose references a camera that is not in
    /// the scene (1920x1080 sensor, 1000px focal length, centered principal point).
    pub const FALLBACK: Intrinsics = Intrinsics {
        focal_length: 1000.0,
        focal_length_y: 1000.0,
        principal_point_x: 960.0,
        principal_point_y: 540.0,
    };
}

impl CameraModel {
    /// Number of parameters stored for a model tag, or `None` if the tag is unknown.
    pub fn num_params(tag: i32) -> Option<usize> {
        match tag {
            0 => Some(3),
            1 => Some(4),
            2 => Some(4),
            3 => Some(5),
            4 => Some(8),
            5 => Some(12),
            6 => Some(5),
            _ => None,
        }
    }

    /// Map a text model name (e.g. `PINHOLE`) to its tag.
    pub fn tag_from_name(name: &str) -> Option<i32> {
        match name {
            "SIMPLE_PINHOLE" => Some(0),
            "PINHOLE" => Some(1),
            "SIMPLE_RADIAL" => Some(2),
            "RADIAL" => Some(3),
            "OPENCV" => Some(4),
            "OPENCV_FISHEYE" => Some(5),
            "FULL_OPENCV" => Some(6),
            _ => None,
        }
    }

    /// Build a model from its tag and flat parameter list.
    ///
    /// Unknown tags yield `CameraModel::Unknown` regardless of `params`;
    /// known tags require exactly `num_params(tag)` values.
    pub fn from_params(tag: i32, params: &[f64]) -> Result<Self, CameraModelError> {
        let Some(expected) = Self::num_params(tag) else {
            return Ok(CameraModel::Unknown { tag });
        };
        if params.len() != expected {
            return Err(CameraModelError::ParamCount {
                tag,
                expected,
                found: params.len(),
            });
        }

        let p = params;
        let model = match tag {
            0 => CameraModel::SimplePinhole {
                f: p[0],
                cx: p[1],
                cy: p[2],
            },
            1 => CameraModel::Pinhole {
                fx: p[0],
                fy: p[1],
                cx: p[2],
                cy: p[3],
            },
            2 => CameraModel::SimpleRadial {
                f: p[0],
                cx: p[1],
                cy: p[2],
                k1: p[3],
            },
            3 => CameraModel::Radial {
                f: p[0],
                cx: p[1],
                cy: p[2],
                k1: p[3],
                k2: p[4],
            },
            4 => CameraModel::OpenCv {
                fx: p[0],
                fy: p[1],
                cx: p[2],
                cy: p[3],
                k1: p[4],
                k2: p[5],
                p1: p[6],
                p2: p[7],
            },
            5 => CameraModel::OpenCvFisheye {
                fx: p[0],
                fy: p[1],
                cx: p[2],
                cy: p[3],
                k: [p[4], p[5], p[6], p[7], p[8], p[9]],
                sx1: p[10],
                sy1: p[11],
            },
            6 => CameraModel::FullOpenCv {
                fx: p[0],
                fy: p[1],
                cx: p[2],
                cy: p[3],
                k1: p[4],
            },
            // num_params() already rejected every other tag
            _ => CameraModel::Unknown { tag },
        };
        Ok(model)
    }

    /// Numeric model tag as written to binary files.
    pub fn tag(&self) -> i32 {
        match self {
            CameraModel::SimplePinhole { .. } => 0,
            CameraModel::Pinhole { .. } => 1,
            CameraModel::SimpleRadial { .. } => 2,
            CameraModel::Radial { .. } => 3,
            CameraModel::OpenCv { .. } => 4,
            CameraModel::OpenCvFisheye { .. } => 5,
            CameraModel::FullOpenCv { .. } => 6,
            CameraModel::Unknown { tag } => *tag,
        }
    }

    /// Model name as written to text files.
    pub fn name(&self) -> &'static str {
        match self {
            CameraModel::SimplePinhole { .. } => "SIMPLE_PINHOLE",
            CameraModel::Pinhole { .. } => "PINHOLE",
            CameraModel::SimpleRadial { .. } => "SIMPLE_RADIAL",
            CameraModel::Radial { .. } => "RADIAL",
            CameraModel::OpenCv { .. } => "OPENCV",
            CameraModel::OpenCvFisheye { .. } => "OPENCV_FISHEYE",
            CameraModel::FullOpenCv { .. } => "FULL_OPENCV",
            CameraModel::Unknown { .. } => UNKNOWN_MODEL_NAME,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, CameraModel::Unknown { .. })
    }

    /// Flat parameter list in on-disk order.
    pub fn params(&self) -> Vec<f64> {
        match *self {
            CameraModel::SimplePinhole { f, cx, cy } => vec![f, cx, cy],
            CameraModel::Pinhole { fx, fy, cx, cy } => vec![fx, fy, cx, cy],
            CameraModel::SimpleRadial { f, cx, cy, k1 } => vec![f, cx, cy, k1],
            CameraModel::Radial { f, cx, cy, k1, k2 } => vec![f, cx, cy, k1, k2],
            CameraModel::OpenCv {
                fx,
                fy,
                cx,
                cy,
                k1,
                k2,
                p1,
                p2,
            } => vec![fx, fy, cx, cy, k1, k2, p1, p2],
            CameraModel::OpenCvFisheye {
                fx,
                fy,
                cx,
                cy,
                k,
                sx1,
                sy1,
            } => {
                let mut params = vec![fx, fy, cx, cy];
                params.extend_from_slice(&k);
                params.push(sx1);
                params.push(sy1);
                params
            }
            CameraModel::FullOpenCv { fx, fy, cx, cy, k1 } => vec![fx, fy, cx, cy, k1],
            CameraModel::Unknown { .. } => Vec::new(),
        }
    }

    /// Decode focal length(s) and principal point.
    ///
    /// Single-focal models report the same value for both axes.
    /// Returns `None` for `Unknown`.
    pub fn intrinsics(&self) -> Option<Intrinsics> {
        let (fx, fy, cx, cy) = match *self {
            CameraModel::SimplePinhole { f, cx, cy }
            | CameraModel::SimpleRadial { f, cx, cy, .. }
            | CameraModel::Radial { f, cx, cy, .. } => (f, f, cx, cy),
            CameraModel::Pinhole { fx, fy, cx, cy }
            | CameraModel::OpenCv { fx, fy, cx, cy, .. }
            | CameraModel::OpenCvFisheye { fx, fy, cx, cy, .. }
            | CameraModel::FullOpenCv { fx, fy, cx, cy, .. } => (fx, fy, cx, cy),
            CameraModel::Unknown { .. } => return None,
        };
        Some(Intrinsics {
            focal_length: fx,
            focal_length_y: fy,
            principal_point_x: cx,
            principal_point_y: cy,
        })
    }

    /// Parameters beyond the focal/principal-point slots.
    pub fn distortion(&self) -> Vec<f64> {
        let params = self.params();
        let intrinsic_slots = match self {
            CameraModel::SimplePinhole { .. }
            | CameraModel::SimpleRadial { .. }
            | CameraModel::Radial { .. } => 3,
            CameraModel::Unknown { .. } => 0,
            _ => 4,
        };
        params.get(intrinsic_slots..).map(<[f64]>::to_vec).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinhole_decoding() {
        let model = CameraModel::from_params(1, &[800.0, 810.0, 320.0, 240.0]).unwrap();
        let k = model.intrinsics().unwrap();
        assert_eq!(k.focal_length, 800.0);
        assert_eq!(k.focal_length_y, 810.0);
        assert_eq!(k.principal_point_x, 320.0);
        assert_eq!(k.principal_point_y, 240.0);
    }

    #[test]
    fn test_simple_pinhole_shares_focal() {
        let model = CameraModel::from_params(0, &[900.0, 640.0, 360.0]).unwrap();
        let k = model.intrinsics().unwrap();
        assert_eq!(k.focal_length, 900.0);
        assert_eq!(k.focal_length_y, 900.0);
        assert_eq!(k.principal_point_x, 640.0);
        assert_eq!(k.principal_point_y, 360.0);
    }

    #[test]
    fn test_params_preserve_order_for_every_tag() {
        for tag in 0..=6 {
            let n = CameraModel::num_params(tag).unwrap();
            let params: Vec<f64> = (0..n).map(|i| i as f64 + 0.5).collect();
            let model = CameraModel::from_params(tag, &params).unwrap();
            assert_eq!(model.tag(), tag);
            assert_eq!(model.params(), params);
            assert_eq!(CameraModel::tag_from_name(model.name()), Some(tag));
        }
    }

    #[test]
    fn test_distortion_is_kept_verbatim() {
        let model =
            CameraModel::from_params(4, &[500.0, 501.0, 320.0, 240.0, 0.1, -0.2, 0.003, 0.004])
                .unwrap();
        assert_eq!(model.distortion(), vec![0.1, -0.2, 0.003, 0.004]);

        let radial = CameraModel::from_params(3, &[500.0, 320.0, 240.0, 0.1, 0.2]).unwrap();
        assert_eq!(radial.distortion(), vec![0.1, 0.2]);
    }

    #[test]
    fn test_wrong_param_count_is_rejected() {
        let err = CameraModel::from_params(1, &[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(
            err,
            CameraModelError::ParamCount {
                tag: 1,
                expected: 4,
                found: 3
            }
        );
    }

    #[test]
    fn test_unknown_tag_has_no_params() {
        let model = CameraModel::from_params(42, &[1.0, 2.0]).unwrap();
        assert!(model.is_unknown());
        assert_eq!(model.tag(), 42);
        assert_eq!(model.name(), UNKNOWN_MODEL_NAME);
        assert!(model.params().is_empty());
        assert!(model.intrinsics().is_none());
    }
}
