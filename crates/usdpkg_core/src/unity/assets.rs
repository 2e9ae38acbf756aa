//! Mesh (`.asset`) and Material (`.mat`) assets.
//!
//! Vertex data is stored the way Unity serializes it: one interleaved
//! float32 stream (position, then normal when present) hex-encoded in
//! `_typelessdata`, and 32-bit indices hex-encoded in `m_IndexBuffer`.

use thiserror::Error;
use usdpkg_math::{Bounds, DVec3, Vec3, Vec4};

use super::object::{FileRef, UnityClass, UnityDocument, UnityObject, UnityValue};

/// Main object file id of a Mesh asset.
pub const MESH_FILE_ID: i64 = 4_300_000;

/// Main object file id of a Material asset.
pub const MATERIAL_FILE_ID: i64 = 2_100_000;

/// Built-in Standard shader: `{fileID: 46, guid: 0000000000000000f000000000000000, type: 0}`
pub const STANDARD_SHADER_FILE_ID: i64 = 46;
pub const BUILTIN_EXTRA_GUID: &str = "0000000000000000f000000000000000";

const FLOAT_SIZE: usize = 4;

// Unity vertex attributes carry at most four components
const MAX_CHANNEL_DIMENSION: i64 = 4;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("no {0} object in asset")]
    Missing(&'static str),

    #[error("{name}: {message}")]
    Invalid { name: String, message: String },

    #[error("{name}: bad hex data: {source}")]
    Hex {
        name: String,
        #[source]
        source: hex::FromHexError,
    },
}

/// Fields every serialized object starts with.
pub(crate) fn header_fields(object: UnityObject) -> UnityObject {
    object
        .with("m_ObjectHideFlags", 0)
        .with("m_CorrespondingSourceObject", FileRef::NULL)
        .with("m_PrefabInstance", FileRef::NULL)
        .with("m_PrefabAsset", FileRef::NULL)
}

/// Triangle mesh in Unity's frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshAsset {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,

    /// Triangle list
    pub indices: Vec<u32>,
}

impl MeshAsset {
    pub fn bounds(&self) -> Bounds {
        Bounds::from_points(&self.positions)
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn vertex_bytes(&self) -> Vec<u8> {
        let stride = if self.normals.is_some() { 6 } else { 3 } * FLOAT_SIZE;
        let mut bytes = Vec::with_capacity(self.positions.len() * stride);
        for (i, p) in self.positions.iter().enumerate() {
            for v in p.to_array() {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
            if let Some(normals) = &self.normals {
                let n = normals.get(i).copied().unwrap_or(Vec3::Y);
                for v in n.to_array() {
                    bytes.extend_from_slice(&v.to_le_bytes());
                }
            }
        }
        bytes
    }

    pub fn to_object(&self) -> UnityObject {
        let bounds = self.bounds();
        let aabb = || {
            UnityValue::Map(vec![
                ("m_Center".into(), UnityValue::vec3(bounds.center().as_dvec3())),
                ("m_Extent".into(), UnityValue::vec3(bounds.extent().as_dvec3())),
            ])
        };

        let channel = |offset: usize, dimension: usize| {
            UnityValue::Map(vec![
                ("stream".into(), UnityValue::Int(0)),
                ("offset".into(), UnityValue::Int(offset as i64)),
                ("format".into(), UnityValue::Int(0)),
                ("dimension".into(), UnityValue::Int(dimension as i64)),
            ])
        };
        let normal_dimension = if self.normals.is_some() { 3 } else { 0 };

        let vertex_bytes = self.vertex_bytes();
        let index_bytes: Vec<u8> = self.indices.iter().flat_map(|i| i.to_le_bytes()).collect();

        let sub_mesh = UnityValue::Map(vec![
            ("serializedVersion".into(), UnityValue::Int(2)),
            ("firstByte".into(), UnityValue::Int(0)),
            ("indexCount".into(), UnityValue::Int(self.indices.len() as i64)),
            ("topology".into(), UnityValue::Int(0)),
            ("baseVertex".into(), UnityValue::Int(0)),
            ("firstVertex".into(), UnityValue::Int(0)),
            ("vertexCount".into(), UnityValue::Int(self.positions.len() as i64)),
            ("localAABB".into(), aabb()),
        ]);

        let vertex_data = UnityValue::Map(vec![
            ("serializedVersion".into(), UnityValue::Int(2)),
            ("m_VertexCount".into(), UnityValue::Int(self.positions.len() as i64)),
            (
                "m_Channels".into(),
                UnityValue::Seq(vec![channel(0, 3), channel(3 * FLOAT_SIZE, normal_dimension)]),
            ),
            ("m_DataSize".into(), UnityValue::Int(vertex_bytes.len() as i64)),
            ("_typelessdata".into(), UnityValue::String(hex::encode(&vertex_bytes))),
        ]);

        header_fields(UnityObject::new(MESH_FILE_ID, UnityClass::Mesh))
            .with("m_Name", self.name.as_str())
            .with("serializedVersion", 10)
            .with("m_SubMeshes", UnityValue::Seq(vec![sub_mesh]))
            .with("m_IsReadable", 1)
            .with("m_KeepVertices", 1)
            .with("m_KeepIndices", 1)
            .with("m_IndexFormat", 1)
            .with("m_IndexBuffer", UnityValue::String(hex::encode(&index_bytes)))
            .with("m_VertexData", vertex_data)
            .with("m_LocalAABB", aabb())
            .with("m_MeshUsageFlags", 0)
    }

    pub fn to_document(&self) -> UnityDocument {
        UnityDocument {
            objects: vec![self.to_object()],
        }
    }

    /// Decode the first Mesh object of an asset document.
    pub fn from_document(document: &UnityDocument) -> Result<Self, AssetError> {
        let object = document
            .objects_of(UnityClass::Mesh)
            .next()
            .ok_or(AssetError::Missing("Mesh"))?;
        Self::from_object(object)
    }

    pub fn from_object(object: &UnityObject) -> Result<Self, AssetError> {
        let name = object.name().unwrap_or("Mesh").to_string();
        let invalid = |message: String| AssetError::Invalid {
            name: name.clone(),
            message,
        };
        let decode_hex = |value: Option<&UnityValue>| -> Result<Vec<u8>, AssetError> {
            let text = value.and_then(UnityValue::as_str).unwrap_or("");
            hex::decode(text).map_err(|source| AssetError::Hex {
                name: name.clone(),
                source,
            })
        };

        let vertex_data = object
            .get("m_VertexData")
            .ok_or_else(|| invalid("missing m_VertexData".to_string()))?;
        let vertex_count = vertex_data
            .get("m_VertexCount")
            .and_then(UnityValue::as_i64)
            .unwrap_or(0)
            .max(0) as usize;

        // Only stream 0 position (channel 0) and normal (channel 1) are read
        let dimensions: Vec<usize> = vertex_data
            .get("m_Channels")
            .and_then(UnityValue::as_seq)
            .unwrap_or(&[])
            .iter()
            .map(|c| {
                let stream = c.get("stream").and_then(UnityValue::as_i64).unwrap_or(0);
                let dimension = c.get("dimension").and_then(UnityValue::as_i64).unwrap_or(0);
                match dimension {
                    _ if stream != 0 => Ok(0),
                    0..=MAX_CHANNEL_DIMENSION => Ok(dimension as usize),
                    _ => Err(invalid(format!("channel dimension {}", dimension))),
                }
            })
            .collect::<Result<_, _>>()?;
        let position_dim = dimensions.first().copied().unwrap_or(3);
        let normal_dim = dimensions.get(1).copied().unwrap_or(0);
        let stride_floats: usize = dimensions.iter().sum::<usize>().max(position_dim);
        if position_dim < 3 {
            return Err(invalid(format!("position channel has dimension {}", position_dim)));
        }

        let bytes = decode_hex(vertex_data.get("_typelessdata"))?;
        let stride = stride_floats * FLOAT_SIZE;
        match vertex_count.checked_mul(stride) {
            Some(needed) if needed <= bytes.len() => {}
            _ => {
                return Err(invalid(format!(
                    "vertex data holds {} bytes, too few for {} vertices of {} bytes",
                    bytes.len(),
                    vertex_count,
                    stride
                )))
            }
        }

        let read_f32 = |offset: usize| {
            let mut word = [0u8; 4];
            word.copy_from_slice(&bytes[offset..offset + FLOAT_SIZE]);
            f32::from_le_bytes(word)
        };
        let read_vec3 = |offset: usize| {
            Vec3::new(
                read_f32(offset),
                read_f32(offset + FLOAT_SIZE),
                read_f32(offset + 2 * FLOAT_SIZE),
            )
        };

        let positions: Vec<Vec3> = (0..vertex_count).map(|i| read_vec3(i * stride)).collect();
        let normals = (normal_dim == 3).then(|| {
            (0..vertex_count)
                .map(|i| read_vec3(i * stride + position_dim * FLOAT_SIZE))
                .collect()
        });

        let index_bytes = decode_hex(object.get("m_IndexBuffer"))?;
        let index_format = object.get("m_IndexFormat").and_then(UnityValue::as_i64).unwrap_or(0);
        let indices: Vec<u32> = if index_format == 1 {
            index_bytes
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        } else {
            index_bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]) as u32)
                .collect()
        };

        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(invalid(format!("index {} out of range for {} vertices", bad, vertex_count)));
        }

        Ok(Self {
            name,
            positions,
            normals,
            indices,
        })
    }
}

/// Standard-shader material parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialAsset {
    pub name: String,

    /// `_Color`, RGBA
    pub color: Vec4,
    pub metallic: f32,
    pub glossiness: f32,
}

impl Default for MaterialAsset {
    fn default() -> Self {
        Self {
            name: "Material".to_string(),
            color: Vec4::ONE,
            metallic: 0.0,
            glossiness: 0.5,
        }
    }
}

impl MaterialAsset {
    pub fn to_object(&self) -> UnityObject {
        let shader_guid = BUILTIN_EXTRA_GUID
            .parse()
            .map(|guid| FileRef::external(STANDARD_SHADER_FILE_ID, guid, 0))
            .unwrap_or(FileRef::NULL);

        let properties = UnityValue::Map(vec![
            ("serializedVersion".into(), UnityValue::Int(3)),
            ("m_TexEnvs".into(), UnityValue::Seq(Vec::new())),
            (
                "m_Floats".into(),
                UnityValue::Seq(vec![
                    UnityValue::Map(vec![("_Glossiness".into(), self.glossiness.into())]),
                    UnityValue::Map(vec![("_Metallic".into(), self.metallic.into())]),
                ]),
            ),
            (
                "m_Colors".into(),
                UnityValue::Seq(vec![UnityValue::Map(vec![(
                    "_Color".into(),
                    UnityValue::color(self.color),
                )])]),
            ),
        ]);

        header_fields(UnityObject::new(MATERIAL_FILE_ID, UnityClass::Material).with("serializedVersion", 6))
            .with("m_Name", self.name.as_str())
            .with("m_Shader", shader_guid)
            .with("m_ShaderKeywords", UnityValue::Null)
            .with("m_LightmapFlags", 4)
            .with("m_EnableInstancingVariants", 0)
            .with("m_DoubleSidedGI", 0)
            .with("m_CustomRenderQueue", -1)
            .with("stringTagMap", UnityValue::Map(Vec::new()))
            .with("disabledShaderPasses", UnityValue::Seq(Vec::new()))
            .with("m_SavedProperties", properties)
    }

    pub fn to_document(&self) -> UnityDocument {
        UnityDocument {
            objects: vec![self.to_object()],
        }
    }

    pub fn from_document(document: &UnityDocument) -> Result<Self, AssetError> {
        let object = document
            .objects_of(UnityClass::Material)
            .next()
            .ok_or(AssetError::Missing("Material"))?;
        Ok(Self::from_object(object))
    }

    /// Read the Standard-shader properties; absent ones keep their defaults.
    pub fn from_object(object: &UnityObject) -> Self {
        let mut material = MaterialAsset {
            name: object.name().unwrap_or("Material").to_string(),
            ..Default::default()
        };

        let Some(properties) = object.get("m_SavedProperties") else {
            return material;
        };
        let entries = |key: &str| -> Vec<(String, UnityValue)> {
            properties
                .get(key)
                .and_then(UnityValue::as_seq)
                .unwrap_or(&[])
                .iter()
                .filter_map(|item| match item {
                    UnityValue::Map(entries) => entries.first().cloned(),
                    _ => None,
                })
                .collect()
        };

        for (name, value) in entries("m_Floats") {
            match (name.as_str(), value.as_f64()) {
                ("_Metallic", Some(v)) => material.metallic = v as f32,
                ("_Glossiness", Some(v)) => material.glossiness = v as f32,
                _ => {}
            }
        }
        for (name, value) in entries("m_Colors") {
            if name == "_Color" {
                if let Some(color) = value.to_color() {
                    material.color = color;
                }
            }
        }
        material
    }

    pub fn diffuse(&self) -> DVec3 {
        self.color.truncate().as_dvec3()
    }
}
