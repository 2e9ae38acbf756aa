//! USD (Universal Scene Description) support.
//!
//! USDA (ASCII) layers are parsed into a prim tree and written back out
//! in-process. Binary crate layers go through [`bridge::UsdcatBridge`].
//!
//! ## Supported
//!
//! - Prim hierarchy with `def`/`over`/`class` specifiers
//! - Typed attributes, relationships and metadata
//! - `xformOp:*` transforms in `xformOpOrder` order
//! - `UsdGeomMesh` points, faces and per-vertex normals
//!
//! ## Not Supported
//!
//! - Composition (references, payloads, variants are kept as metadata only)
//! - Time samples beyond the default value
//!
//! # Example
//!
//! ```ignore
//! use usdpkg_core::usd::load_usda;
//!
//! let stage = load_usda("path/to/scene.usda")?;
//! println!("{} prims, up axis {:?}", stage.prim_count(), stage.up_axis);
//! ```

mod types;
mod parser;
mod writer;
mod loader;
pub mod bridge;

pub use types::*;
pub use parser::*;
pub use writer::*;
pub use loader::*;
