//! Conversion options.
//!
//! All fields have defaults, so an options file only needs the keys it
//! changes:
//!
//! ```json
//! { "asset_folder": "Imported/USD", "guid_namespace": "my-studio" }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use usdpkg_math::UpAxis;

use crate::unity::FILE_FORMAT_VERSION;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid options: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid options: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Salt mixed into every derived GUID. Changing it changes every GUID.
    pub guid_namespace: String,

    /// Folder under `Assets/` that exported packages live in. May be empty.
    pub asset_folder: String,

    /// `fileFormatVersion` written to `.meta` files
    pub meta_format_version: u32,

    /// Up axis of USD layers written from Unity data without provenance
    pub output_up_axis: UpAxis,

    /// `metersPerUnit` of USD layers written from Unity data without provenance
    pub output_meters_per_unit: f64,

    /// Write `preview.png` members next to extracted assets
    pub keep_previews: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            guid_namespace: "usdpkg".to_string(),
            asset_folder: "USD".to_string(),
            meta_format_version: FILE_FORMAT_VERSION,
            output_up_axis: UpAxis::Y,
            output_meters_per_unit: 1.0,
            keep_previews: false,
        }
    }
}

impl ConvertOptions {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let options: ConvertOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let options = Self::from_json_str(&text)?;
        log::debug!("Loaded options from {}", path.as_ref().display());
        Ok(options)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.output_meters_per_unit.is_finite() && self.output_meters_per_unit > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "output_meters_per_unit must be positive, got {}",
                self.output_meters_per_unit
            )));
        }
        if self.asset_folder.split('/').any(|c| c == "..") || self.asset_folder.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "asset_folder must be a relative path: {}",
                self.asset_folder
            )));
        }
        Ok(())
    }
}
