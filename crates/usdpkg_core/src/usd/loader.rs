//! High-level USD layer loading.
//!
//! Picks the reader for a layer on disk:
//! - `.usda` - parsed in-process
//! - `.usd`  - parsed in-process when it is text, otherwise via the bridge
//! - `.usdc` - binary crate format, via the bridge

use std::io::Read;
use std::path::Path;

use thiserror::Error;

use crate::backend::Readiness;
use crate::usd::bridge::{BridgeError, UsdcatBridge};
use crate::usd::parser::{parse_usda, ParseError};
use crate::usd::types::UsdStage;

/// Errors that can occur during USD loading.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("USD bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Unsupported USD file format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// On-disk encoding of a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerEncoding {
    Text,
    Crate,
}

/// Determine how a layer is encoded from its extension and magic bytes.
pub fn layer_encoding(path: &Path) -> LoadResult<LayerEncoding> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "usda" => Ok(LayerEncoding::Text),
        "usdc" => Ok(LayerEncoding::Crate),
        "usd" => {
            let mut magic = [0u8; 5];
            let mut file = std::fs::File::open(path)?;
            let n = file.read(&mut magic)?;
            if &magic[..n] == b"#usda" {
                Ok(LayerEncoding::Text)
            } else {
                Ok(LayerEncoding::Crate)
            }
        }
        other => Err(LoadError::UnsupportedFormat(if other.is_empty() {
            path.display().to_string()
        } else {
            format!(".{}", other)
        })),
    }
}

/// Load a USD layer from disk.
///
/// The stage is named after the file stem. Binary layers need a bridge;
/// without one they fail with [`BridgeError::NotFound`].
pub fn load_stage(path: &Path, bridge: Option<&UsdcatBridge>) -> LoadResult<UsdStage> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed");

    let content = match layer_encoding(path)? {
        LayerEncoding::Text => String::from_utf8(std::fs::read(path)?).map_err(ParseError::from)?,
        LayerEncoding::Crate => {
            let bridge = bridge.ok_or(BridgeError::NotFound)?;
            if let Readiness::Unavailable(reason) = bridge.readiness() {
                return Err(BridgeError::Unavailable(reason).into());
            }
            log::info!("Flattening binary layer {} with {}", path.display(), UsdcatBridge::PROGRAM);
            bridge.flatten_to_usda(path)?
        }
    };

    let stage = parse_usda(&content, name)?;
    log::info!(
        "Loaded USD stage '{}': {} prims, upAxis {}, metersPerUnit {}",
        stage.name,
        stage.prim_count(),
        stage.up_axis.as_token(),
        stage.meters_per_unit
    );
    Ok(stage)
}

/// Load a USDA text layer.
pub fn load_usda<P: AsRef<Path>>(path: P) -> LoadResult<UsdStage> {
    load_stage(path.as_ref(), None)
}
