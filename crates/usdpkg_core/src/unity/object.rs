//! Unity serialized object model.
//!
//! A Unity text asset (`.prefab`, `.unity`, `.asset`, `.mat`) is a list of
//! objects, each identified by a file id that is local to the document.
//! Objects refer to each other with `{fileID: N}` and to objects in other
//! assets with `{fileID: N, guid: G, type: T}`.

use std::collections::{HashMap, HashSet};

use usdpkg_math::{DQuat, DVec3, Vec4};

use super::meta::Guid;
use super::yaml::YamlError;

/// Unity class id, from the `--- !u!<class>` document tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnityClass {
    GameObject,
    Transform,
    Camera,
    Material,
    MeshRenderer,
    MeshFilter,
    Mesh,
    Light,
    MonoBehaviour,
    SkinnedMeshRenderer,
    RectTransform,
    PrefabInstance,
    Other(u32),
}

impl UnityClass {
    pub fn from_id(id: u32) -> Self {
        match id {
            1 => UnityClass::GameObject,
            4 => UnityClass::Transform,
            20 => UnityClass::Camera,
            21 => UnityClass::Material,
            23 => UnityClass::MeshRenderer,
            33 => UnityClass::MeshFilter,
            43 => UnityClass::Mesh,
            108 => UnityClass::Light,
            114 => UnityClass::MonoBehaviour,
            137 => UnityClass::SkinnedMeshRenderer,
            224 => UnityClass::RectTransform,
            1001 => UnityClass::PrefabInstance,
            other => UnityClass::Other(other),
        }
    }

    pub fn id(self) -> u32 {
        match self {
            UnityClass::GameObject => 1,
            UnityClass::Transform => 4,
            UnityClass::Camera => 20,
            UnityClass::Material => 21,
            UnityClass::MeshRenderer => 23,
            UnityClass::MeshFilter => 33,
            UnityClass::Mesh => 43,
            UnityClass::Light => 108,
            UnityClass::MonoBehaviour => 114,
            UnityClass::SkinnedMeshRenderer => 137,
            UnityClass::RectTransform => 224,
            UnityClass::PrefabInstance => 1001,
            UnityClass::Other(id) => id,
        }
    }

    /// Class name, as written for the top-level key of each document.
    pub fn name(self) -> &'static str {
        match self {
            UnityClass::GameObject => "GameObject",
            UnityClass::Transform => "Transform",
            UnityClass::Camera => "Camera",
            UnityClass::Material => "Material",
            UnityClass::MeshRenderer => "MeshRenderer",
            UnityClass::MeshFilter => "MeshFilter",
            UnityClass::Mesh => "Mesh",
            UnityClass::Light => "Light",
            UnityClass::MonoBehaviour => "MonoBehaviour",
            UnityClass::SkinnedMeshRenderer => "SkinnedMeshRenderer",
            UnityClass::RectTransform => "RectTransform",
            UnityClass::PrefabInstance => "PrefabInstance",
            UnityClass::Other(_) => "Object",
        }
    }

    pub fn is_transform(self) -> bool {
        matches!(self, UnityClass::Transform | UnityClass::RectTransform)
    }
}

/// Reference to an object: `{fileID: N}` or `{fileID: N, guid: G, type: T}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileRef {
    pub file_id: i64,
    pub guid: Option<Guid>,
    pub type_id: Option<i32>,
}

impl FileRef {
    pub const NULL: FileRef = FileRef {
        file_id: 0,
        guid: None,
        type_id: None,
    };

    /// Reference to an object in the same document.
    pub fn local(file_id: i64) -> Self {
        Self {
            file_id,
            guid: None,
            type_id: None,
        }
    }

    /// Reference to an object in another asset. Type 2 is an asset
    /// serialized in text or binary form, type 0 a built-in resource.
    pub fn external(file_id: i64, guid: Guid, type_id: i32) -> Self {
        Self {
            file_id,
            guid: Some(guid),
            type_id: Some(type_id),
        }
    }

    pub fn is_null(&self) -> bool {
        self.file_id == 0
    }

    pub fn is_local(&self) -> bool {
        self.guid.is_none()
    }
}

/// A field value in a serialized object.
#[derive(Clone, Debug, PartialEq)]
pub enum UnityValue {
    Null,
    Int(i64),
    Float(f64),
    String(String),
    Ref(FileRef),
    Map(Vec<(String, UnityValue)>),
    Seq(Vec<UnityValue>),
}

impl UnityValue {
    pub fn str(s: impl Into<String>) -> Self {
        UnityValue::String(s.into())
    }

    pub fn vec3(v: DVec3) -> Self {
        UnityValue::Map(vec![
            ("x".into(), UnityValue::Float(v.x)),
            ("y".into(), UnityValue::Float(v.y)),
            ("z".into(), UnityValue::Float(v.z)),
        ])
    }

    pub fn quat(q: DQuat) -> Self {
        UnityValue::Map(vec![
            ("x".into(), UnityValue::Float(q.x)),
            ("y".into(), UnityValue::Float(q.y)),
            ("z".into(), UnityValue::Float(q.z)),
            ("w".into(), UnityValue::Float(q.w)),
        ])
    }

    pub fn color(c: Vec4) -> Self {
        UnityValue::Map(vec![
            ("r".into(), UnityValue::Float(c.x as f64)),
            ("g".into(), UnityValue::Float(c.y as f64)),
            ("b".into(), UnityValue::Float(c.z as f64)),
            ("a".into(), UnityValue::Float(c.w as f64)),
        ])
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            UnityValue::Int(i) => Some(*i),
            UnityValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            UnityValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            UnityValue::Int(i) => Some(*i as f64),
            UnityValue::Float(f) => Some(*f),
            UnityValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            UnityValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_file_ref(&self) -> Option<&FileRef> {
        match self {
            UnityValue::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[UnityValue]> {
        match self {
            UnityValue::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a key in a map value.
    pub fn get(&self, key: &str) -> Option<&UnityValue> {
        match self {
            UnityValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn to_dvec3(&self) -> Option<DVec3> {
        Some(DVec3::new(
            self.get("x")?.as_f64()?,
            self.get("y")?.as_f64()?,
            self.get("z")?.as_f64()?,
        ))
    }

    pub fn to_dquat(&self) -> Option<DQuat> {
        Some(DQuat::from_xyzw(
            self.get("x")?.as_f64()?,
            self.get("y")?.as_f64()?,
            self.get("z")?.as_f64()?,
            self.get("w")?.as_f64()?,
        ))
    }

    pub fn to_color(&self) -> Option<Vec4> {
        Some(Vec4::new(
            self.get("r")?.as_f64()? as f32,
            self.get("g")?.as_f64()? as f32,
            self.get("b")?.as_f64()? as f32,
            self.get("a").and_then(UnityValue::as_f64).unwrap_or(1.0) as f32,
        ))
    }

    /// Collect every reference in this value, depth first.
    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a FileRef>) {
        match self {
            UnityValue::Ref(r) => out.push(r),
            UnityValue::Map(entries) => entries.iter().for_each(|(_, v)| v.collect_refs(out)),
            UnityValue::Seq(items) => items.iter().for_each(|v| v.collect_refs(out)),
            _ => {}
        }
    }
}

impl From<FileRef> for UnityValue {
    fn from(r: FileRef) -> Self {
        UnityValue::Ref(r)
    }
}

impl From<i64> for UnityValue {
    fn from(i: i64) -> Self {
        UnityValue::Int(i)
    }
}

impl From<i32> for UnityValue {
    fn from(i: i32) -> Self {
        UnityValue::Int(i as i64)
    }
}

impl From<f32> for UnityValue {
    fn from(f: f32) -> Self {
        UnityValue::Float(f as f64)
    }
}

impl From<f64> for UnityValue {
    fn from(f: f64) -> Self {
        UnityValue::Float(f)
    }
}

impl From<&str> for UnityValue {
    fn from(s: &str) -> Self {
        UnityValue::String(s.to_string())
    }
}

/// One serialized object (one `--- !u!` document).
#[derive(Clone, Debug, PartialEq)]
pub struct UnityObject {
    pub file_id: i64,
    pub class: UnityClass,

    /// Placeholder for an object owned by a nested prefab instance
    pub stripped: bool,

    /// Class name written as the document's top-level key
    pub class_name: String,

    pub fields: Vec<(String, UnityValue)>,
}

impl UnityObject {
    pub fn new(file_id: i64, class: UnityClass) -> Self {
        Self {
            file_id,
            class,
            stripped: false,
            class_name: class.name().to_string(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field append.
    pub fn with(mut self, key: &str, value: impl Into<UnityValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a field, replacing an existing value in place.
    pub fn set(&mut self, key: &str, value: impl Into<UnityValue>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&UnityValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_ref(&self, key: &str) -> Option<&FileRef> {
        self.get(key).and_then(UnityValue::as_file_ref)
    }

    pub fn name(&self) -> Option<&str> {
        self.get("m_Name").and_then(UnityValue::as_str)
    }

    /// References listed in a GameObject's `m_Component`.
    ///
    /// Accepts both `- component: {fileID: N}` and the older
    /// `- <classID>: {fileID: N}` entries.
    pub fn component_refs(&self) -> Vec<FileRef> {
        let Some(items) = self.get("m_Component").and_then(UnityValue::as_seq) else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| match item {
                UnityValue::Ref(r) => Some(*r),
                UnityValue::Map(entries) => entries.first().and_then(|(_, v)| v.as_file_ref().copied()),
                _ => None,
            })
            .collect()
    }

    /// Every reference held by this object.
    pub fn references(&self) -> Vec<&FileRef> {
        let mut refs = Vec::new();
        for (_, value) in &self.fields {
            value.collect_refs(&mut refs);
        }
        refs
    }
}

/// All objects of one Unity text asset, in document order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnityDocument {
    pub objects: Vec<UnityObject>,
}

impl UnityDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, object: UnityObject) {
        self.objects.push(object);
    }

    pub fn get(&self, file_id: i64) -> Option<&UnityObject> {
        self.objects.iter().find(|o| o.file_id == file_id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Lookup table from file id to object.
    pub fn index(&self) -> HashMap<i64, &UnityObject> {
        self.objects.iter().map(|o| (o.file_id, o)).collect()
    }

    pub fn objects_of(&self, class: UnityClass) -> impl Iterator<Item = &UnityObject> {
        self.objects.iter().filter(move |o| o.class == class)
    }

    /// Check the document's internal consistency.
    ///
    /// File ids must be non-zero and unique, and every local reference
    /// (`fileID != 0` without a `guid`) must name an object in this document.
    pub fn validate_references(&self) -> Result<(), YamlError> {
        let mut ids = HashSet::with_capacity(self.objects.len());
        for object in &self.objects {
            if object.file_id == 0 || !ids.insert(object.file_id) {
                return Err(YamlError::DuplicateFileId(object.file_id));
            }
        }

        for object in &self.objects {
            for r in object.references() {
                if r.is_local() && !r.is_null() && !ids.contains(&r.file_id) {
                    return Err(YamlError::DanglingReference {
                        from: object.file_id,
                        to: r.file_id,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game_object(id: i64, transform: i64) -> UnityObject {
        UnityObject::new(id, UnityClass::GameObject)
            .with(
                "m_Component",
                UnityValue::Seq(vec![UnityValue::Map(vec![(
                    "component".into(),
                    FileRef::local(transform).into(),
                )])]),
            )
            .with("m_Name", "Cube")
    }

    #[test]
    fn test_class_ids() {
        for id in [1, 4, 20, 21, 23, 33, 43, 108, 114, 137, 224, 1001, 95] {
            assert_eq!(UnityClass::from_id(id).id(), id);
        }
        assert_eq!(UnityClass::from_id(95), UnityClass::Other(95));
    }

    #[test]
    fn test_component_refs() {
        let go = game_object(1, 2);
        assert_eq!(go.component_refs(), vec![FileRef::local(2)]);

        let legacy = UnityObject::new(1, UnityClass::GameObject).with(
            "m_Component",
            UnityValue::Seq(vec![UnityValue::Map(vec![("4".into(), FileRef::local(7).into())])]),
        );
        assert_eq!(legacy.component_refs(), vec![FileRef::local(7)]);
    }

    #[test]
    fn test_validate_references() {
        let mut doc = UnityDocument::new();
        doc.push(game_object(1, 2));
        doc.push(
            UnityObject::new(2, UnityClass::Transform)
                .with("m_GameObject", FileRef::local(1))
                .with("m_Father", FileRef::NULL),
        );
        assert!(doc.validate_references().is_ok());

        doc.push(UnityObject::new(3, UnityClass::MeshFilter).with("m_GameObject", FileRef::local(9)));
        assert!(matches!(
            doc.validate_references(),
            Err(YamlError::DanglingReference { from: 3, to: 9 })
        ));
    }

    #[test]
    fn test_external_refs_are_not_checked() {
        let mut doc = UnityDocument::new();
        doc.push(UnityObject::new(1, UnityClass::MeshFilter).with(
            "m_Mesh",
            FileRef::external(4300000, Guid::derive("test", &["mesh"]), 2),
        ));
        assert!(doc.validate_references().is_ok());
    }

    #[test]
    fn test_duplicate_file_id() {
        let mut doc = UnityDocument::new();
        doc.push(UnityObject::new(5, UnityClass::GameObject));
        doc.push(UnityObject::new(5, UnityClass::Transform));
        assert!(matches!(doc.validate_references(), Err(YamlError::DuplicateFileId(5))));
    }

    #[test]
    fn test_vector_fields() {
        let v = UnityValue::vec3(DVec3::new(1.0, -2.0, 0.5));
        assert_eq!(v.to_dvec3(), Some(DVec3::new(1.0, -2.0, 0.5)));
        let q = UnityValue::quat(DQuat::IDENTITY);
        assert_eq!(q.to_dquat(), Some(DQuat::IDENTITY));
    }
}
