//! Unity serialized asset support.
//!
//! - [`object`]: the object graph of one text asset (`UnityDocument`)
//! - [`yaml`]: reading and writing Unity's YAML dialect
//! - [`meta`]: `.meta` sidecars and asset GUIDs
//! - [`assets`]: Mesh and Material asset encodings

pub mod assets;
pub mod meta;
pub mod object;
pub mod yaml;

pub use assets::{AssetError, MaterialAsset, MeshAsset, MATERIAL_FILE_ID, MESH_FILE_ID};
pub use meta::{Guid, ImporterKind, InvalidGuid, MetaError, MetaRecord, FILE_FORMAT_VERSION};
pub use object::{FileRef, UnityClass, UnityDocument, UnityObject, UnityValue};
pub use yaml::{parse_document, parse_document_bytes, write_document, YamlError, YAML_HEADER};
