//! usdpkg core - USD stages to Unity packages and back.
//!
//! This crate provides:
//!
//! - **USD support**: USDA parsing and writing, binary layers via `usdcat`
//! - **Unity support**: YAML object graphs, `.meta` records, Mesh and
//!   Material assets, `.unitypackage` archives
//! - **Translation** in both directions, with up-axis, unit and
//!   handedness correction
//! - **[`Converter`]**: the three conversions behind one facade
//!
//! # Example
//!
//! ```ignore
//! use usdpkg_core::{ConvertOptions, Converter};
//!
//! let converter = Converter::detect(ConvertOptions::default());
//! let report = converter.usd_to_unity_package("shot.usda", "shot.unitypackage")?;
//! for note in &report.notes {
//!     println!("skipped {}", note);
//! }
//! ```

pub mod backend;
pub mod config;
pub mod convert;
pub mod error;
pub mod package;
pub mod translate;
pub mod unity;
pub mod usd;

// Re-export commonly used types
pub use backend::{ConversionBackend, MockBackend, NativeBackend, Readiness};
pub use config::ConvertOptions;
pub use convert::{ConversionReport, Converter, Operation};
pub use error::{ConvertError, ConvertResult, ErrorKind, UnsupportedFeature};
pub use package::{PackageAsset, UnityPackage};
pub use usd::{load_usda, UsdStage};
