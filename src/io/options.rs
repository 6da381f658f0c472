//! Codec options.
//!
//! Options can be built in code or read from a JSON file; missing fields take
//! their defaults:
//!
//! ```json
//! { "normalize_quaternions": true, "image_dir_name": "images", "image_dir_search_depth": 4 }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options shared by every load/write entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    /// Rescale pose quaternions to unit length when reading.
    pub normalize_quaternions: bool,

    /// Name of the directory holding source imagery.
    pub image_dir_name: String,

    /// How many directory levels to search for `image_dir_name`, starting at
    /// the reconstruction's own directory.
    pub image_dir_search_depth: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            normalize_quaternions: true,
            image_dir_name: "images".to_string(),
            image_dir_search_depth: 4,
        }
    }
}

/// Errors reading an options file.
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("I/O error reading options: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid options JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodecOptions {
    pub fn from_json_str(json: &str) -> Result<Self, OptionsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, OptionsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = CodecOptions::from_json_str(r#"{ "image_dir_name": "frames" }"#).unwrap();
        assert_eq!(options.image_dir_name, "frames");
        assert!(options.normalize_quaternions);
        assert_eq!(options.image_dir_search_depth, 4);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            CodecOptions::from_json_str("{ nope"),
            Err(OptionsError::Json(_))
        ));
    }
}
