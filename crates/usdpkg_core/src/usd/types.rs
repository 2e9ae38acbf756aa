//! USD primitive types for intermediate representation.
//!
//! These types hold a parsed USD layer: a tree of prims with their typed
//! attributes and relationships, plus the layer metadata that affects
//! conversion (up axis, units, default prim).

use usdpkg_math::{DMat4, DQuat, DVec3, StageBasis, UpAxis, Vec3};

/// Prim specifier (`def`, `over`, `class`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Specifier {
    #[default]
    Def,
    Over,
    Class,
}

impl Specifier {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "def" => Some(Specifier::Def),
            "over" => Some(Specifier::Over),
            "class" => Some(Specifier::Class),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Specifier::Def => "def",
            Specifier::Over => "over",
            Specifier::Class => "class",
        }
    }
}

/// A USD attribute or metadata value.
#[derive(Clone, Debug, PartialEq)]
pub enum UsdValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Quoted string or token
    String(String),
    /// Asset path (`@path@`)
    Asset(String),
    /// Prim or property path (`</World/Cube>`)
    Path(String),
    /// Parenthesized tuple, e.g. `(1, 2, 3)` or a matrix row set
    Tuple(Vec<UsdValue>),
    /// Bracketed array
    Array(Vec<UsdValue>),
    /// `{ ... }` block: dictionaries and time samples
    Dictionary(Vec<(String, UsdValue)>),
    /// `None` value
    Blocked,
}

impl UsdValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            UsdValue::Int(i) => Some(*i as f64),
            UsdValue::Float(f) => Some(*f),
            UsdValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            UsdValue::Int(i) => Some(*i),
            UsdValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            UsdValue::String(s) | UsdValue::Asset(s) | UsdValue::Path(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric tuple components, e.g. `(1, 2, 3)`.
    pub fn as_f64s(&self) -> Option<Vec<f64>> {
        match self {
            UsdValue::Tuple(items) => items.iter().map(UsdValue::as_f64).collect(),
            _ => None,
        }
    }

    pub fn as_dvec3(&self) -> Option<DVec3> {
        match self.as_f64s()?.as_slice() {
            [x, y, z] => Some(DVec3::new(*x, *y, *z)),
            _ => None,
        }
    }

    /// USD quaternion literal: real part first, `(w, x, y, z)`.
    pub fn as_dquat(&self) -> Option<DQuat> {
        match self.as_f64s()?.as_slice() {
            [w, x, y, z] => Some(DQuat::from_xyzw(*x, *y, *z, *w)),
            _ => None,
        }
    }

    /// USD `matrix4d` literal. Rows are stored with the translation in the
    /// last row (row-vector convention), which makes them glam columns.
    pub fn as_dmat4(&self) -> Option<DMat4> {
        let UsdValue::Tuple(rows) = self else {
            return None;
        };
        if rows.len() != 4 {
            return None;
        }
        let mut cols = [[0.0; 4]; 4];
        for (i, row) in rows.iter().enumerate() {
            match row.as_f64s()?.as_slice() {
                [a, b, c, d] => cols[i] = [*a, *b, *c, *d],
                _ => return None,
            }
        }
        Some(DMat4::from_cols_array_2d(&cols))
    }

    pub fn as_vec3_array(&self) -> Option<Vec<Vec3>> {
        match self {
            UsdValue::Array(items) => items
                .iter()
                .map(|v| v.as_dvec3().map(|d| d.as_vec3()))
                .collect(),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<Vec<i64>> {
        match self {
            UsdValue::Array(items) => items.iter().map(UsdValue::as_i64).collect(),
            _ => None,
        }
    }

    pub fn as_string_array(&self) -> Option<Vec<String>> {
        match self {
            UsdValue::Array(items) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => None,
        }
    }

    pub fn from_dvec3(v: DVec3) -> Self {
        UsdValue::Tuple(vec![
            UsdValue::Float(v.x),
            UsdValue::Float(v.y),
            UsdValue::Float(v.z),
        ])
    }

    pub fn from_dquat(q: DQuat) -> Self {
        UsdValue::Tuple(vec![
            UsdValue::Float(q.w),
            UsdValue::Float(q.x),
            UsdValue::Float(q.y),
            UsdValue::Float(q.z),
        ])
    }

    pub fn from_vec3_array(points: &[Vec3]) -> Self {
        UsdValue::Array(
            points
                .iter()
                .map(|p| UsdValue::from_dvec3(p.as_dvec3()))
                .collect(),
        )
    }

    pub fn from_int_array<I: IntoIterator<Item = i64>>(values: I) -> Self {
        UsdValue::Array(values.into_iter().map(UsdValue::Int).collect())
    }
}

/// A typed attribute on a prim.
#[derive(Clone, Debug, PartialEq)]
pub struct UsdAttribute {
    /// Full property name, including namespaces (`xformOp:translate`)
    pub name: String,

    /// Declared value type (`double3`, `point3f[]`, `token`, ...)
    pub type_name: String,

    /// Authored default value; `None` for declarations without a value
    pub value: Option<UsdValue>,

    pub uniform: bool,
    pub custom: bool,

    /// Property metadata such as `interpolation`
    pub metadata: Vec<(String, UsdValue)>,
}

impl UsdAttribute {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, value: UsdValue) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value: Some(value),
            uniform: false,
            custom: false,
            metadata: Vec::new(),
        }
    }

    pub fn uniform(mut self) -> Self {
        self.uniform = true;
        self
    }

    pub fn custom(mut self) -> Self {
        self.custom = true;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: UsdValue) -> Self {
        self.metadata.push((key.into(), value));
        self
    }

    pub fn metadata(&self, key: &str) -> Option<&UsdValue> {
        self.metadata.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// A relationship: named, non-owning references to other prims or properties.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UsdRelationship {
    pub name: String,
    pub targets: Vec<String>,
    pub custom: bool,
}

/// A USD prim (one node of the scene graph).
#[derive(Clone, Debug, Default)]
pub struct UsdPrim {
    /// Prim path (e.g., "/World/Model")
    pub path: String,

    /// Prim name (last component of path)
    pub name: String,

    /// Schema type name (`Xform`, `Mesh`, ...); empty for typeless prims
    pub type_name: String,

    pub specifier: Specifier,

    /// Prim metadata (`kind`, `references`, ...), list-op keywords kept in the key
    pub metadata: Vec<(String, UsdValue)>,

    pub attributes: Vec<UsdAttribute>,
    pub relationships: Vec<UsdRelationship>,

    /// Child prims, in document order
    pub children: Vec<UsdPrim>,
}

impl UsdPrim {
    /// Create a `def` prim below `parent_path` (`""` or `"/"` for a root prim).
    pub fn new(parent_path: &str, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: child_path(parent_path, &name),
            name,
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&UsdAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Authored value of an attribute.
    pub fn value(&self, name: &str) -> Option<&UsdValue> {
        self.attribute(name).and_then(|a| a.value.as_ref())
    }

    /// Add an attribute, replacing any existing one with the same name.
    pub fn set_attribute(&mut self, attribute: UsdAttribute) {
        match self.attributes.iter_mut().find(|a| a.name == attribute.name) {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
    }

    pub fn relationship(&self, name: &str) -> Option<&UsdRelationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn set_relationship(&mut self, name: impl Into<String>, targets: Vec<String>) {
        let name = name.into();
        match self.relationships.iter_mut().find(|r| r.name == name) {
            Some(existing) => existing.targets = targets,
            None => self.relationships.push(UsdRelationship {
                name,
                targets,
                custom: false,
            }),
        }
    }

    pub fn metadata(&self, key: &str) -> Option<&UsdValue> {
        self.metadata.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Gather the xformOps in `xformOpOrder` order.
    ///
    /// Without an authored order, ops are taken in declaration order.
    /// Returns `(op, inverted)` pairs; unrecognized ops are skipped.
    pub fn xform_ops(&self) -> Vec<(XformOp, bool)> {
        let order: Vec<String> = match self.value("xformOpOrder").and_then(UsdValue::as_string_array) {
            Some(order) => order,
            None => self
                .attributes
                .iter()
                .filter(|a| a.name.starts_with("xformOp:"))
                .map(|a| a.name.clone())
                .collect(),
        };

        let mut ops = Vec::with_capacity(order.len());
        for entry in &order {
            let (name, inverted) = match entry.strip_prefix("!invert!") {
                Some(name) => (name, true),
                None => (entry.as_str(), false),
            };

            let Some(attribute) = self.attribute(name) else {
                log::debug!("{}: xformOpOrder names missing op {}", self.path, name);
                continue;
            };
            let Some(value) = attribute.value.as_ref() else {
                continue;
            };

            match XformOp::from_attribute(name, value) {
                Some(op) => ops.push((op, inverted)),
                None => log::debug!("{}: skipping unrecognized op {}", self.path, name),
            }
        }
        ops
    }

    /// Local transform composed from the xformOps.
    pub fn local_transform(&self) -> DMat4 {
        compose_xform_ops(&self.xform_ops())
    }

    /// Visit this prim and all descendants depth-first.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a UsdPrim)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }

    /// Number of prims in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(UsdPrim::subtree_len).sum::<usize>()
    }
}

/// Build a child prim path.
pub fn child_path(parent_path: &str, name: &str) -> String {
    if parent_path.is_empty() || parent_path == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent_path, name)
    }
}

/// A parsed USD layer.
#[derive(Clone, Debug)]
pub struct UsdStage {
    /// Stage name (file stem of the layer)
    pub name: String,

    pub up_axis: UpAxis,
    pub meters_per_unit: f64,
    pub default_prim: Option<String>,
    pub doc: Option<String>,

    /// Other layer metadata, kept verbatim
    pub metadata: Vec<(String, UsdValue)>,

    pub roots: Vec<UsdPrim>,
}

/// USD's fallback when a layer does not author `metersPerUnit`.
pub const DEFAULT_METERS_PER_UNIT: f64 = 0.01;

impl UsdStage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            up_axis: UpAxis::Y,
            meters_per_unit: DEFAULT_METERS_PER_UNIT,
            default_prim: None,
            doc: None,
            metadata: Vec::new(),
            roots: Vec::new(),
        }
    }

    pub fn basis(&self) -> StageBasis {
        StageBasis::new(self.up_axis, self.meters_per_unit)
    }

    /// Find a prim by absolute path.
    pub fn prim_at(&self, path: &str) -> Option<&UsdPrim> {
        let mut components = path.trim_start_matches('/').split('/');
        let first = components.next()?;
        let mut current = self.roots.iter().find(|p| p.name == first)?;
        for name in components {
            current = current.children.iter().find(|p| p.name == name)?;
        }
        Some(current)
    }

    /// Total number of prims on the stage.
    pub fn prim_count(&self) -> usize {
        self.roots.iter().map(UsdPrim::subtree_len).sum()
    }
}

/// A typed view of a `Mesh` prim.
#[derive(Clone, Debug, Default)]
pub struct UsdMesh {
    /// Prim path
    pub path: String,

    /// Prim name
    pub name: String,

    /// Vertex positions
    pub points: Vec<Vec3>,

    /// Number of vertices per face (for triangulation)
    pub face_vertex_counts: Vec<i32>,

    /// Vertex indices for each face
    pub face_vertex_indices: Vec<i32>,

    /// Per-vertex normals (optional)
    pub normals: Option<Vec<Vec3>>,

    /// `orientation = "leftHanded"` winding
    pub left_handed: bool,
}

impl UsdMesh {
    /// Read the mesh attributes of a prim.
    pub fn from_prim(prim: &UsdPrim) -> Self {
        let ints = |name: &str| -> Vec<i32> {
            prim.value(name)
                .and_then(UsdValue::as_int_array)
                .map(|v| v.into_iter().map(|i| i as i32).collect())
                .unwrap_or_default()
        };

        let points = prim
            .value("points")
            .and_then(UsdValue::as_vec3_array)
            .unwrap_or_default();

        // Only per-vertex normals survive; faceVarying normals have no Unity equivalent
        let normals = prim
            .attribute("normals")
            .or_else(|| prim.attribute("primvars:normals"))
            .and_then(|a| a.value.as_ref())
            .and_then(UsdValue::as_vec3_array)
            .filter(|n| n.len() == points.len() && !n.is_empty());

        let left_handed = prim
            .value("orientation")
            .and_then(UsdValue::as_str)
            .map(|o| o == "leftHanded")
            .unwrap_or(false);

        if left_handed {
            log::debug!("Mesh {} uses left-handed winding", prim.name);
        }

        Self {
            path: prim.path.clone(),
            name: prim.name.clone(),
            points,
            face_vertex_counts: ints("faceVertexCounts"),
            face_vertex_indices: ints("faceVertexIndices"),
            normals,
            left_handed,
        }
    }

    /// Triangulate the mesh.
    ///
    /// USD meshes can have n-gons (faces with more than 3 vertices).
    /// This method converts them to triangles using fan triangulation.
    /// Faces referencing indices out of range are dropped.
    pub fn triangulate(&self) -> Vec<u32> {
        let mut indices = Vec::new();
        let mut vertex_offset = 0usize;
        let point_count = self.points.len();

        for &count in &self.face_vertex_counts {
            let count = count.max(0) as usize;
            let face = self
                .face_vertex_indices
                .get(vertex_offset..vertex_offset + count);
            vertex_offset += count;

            let Some(face) = face else {
                break;
            };
            if count < 3 || face.iter().any(|&i| i < 0 || i as usize >= point_count) {
                continue;
            }

            // Fan triangulation: for a polygon with vertices [0, 1, 2, 3, ...n-1]
            // create triangles: (0,1,2), (0,2,3), (0,3,4), ... (0,n-2,n-1)
            for i in 1..(count - 1) {
                indices.push(face[0] as u32);
                indices.push(face[i] as u32);
                indices.push(face[i + 1] as u32);
            }
        }

        indices
    }
}

/// Euler rotation order for `xformOp:rotateABC`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotationOrder {
    Xyz,
    Xzy,
    Yxz,
    Yzx,
    Zxy,
    Zyx,
}

impl RotationOrder {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "XYZ" => Some(RotationOrder::Xyz),
            "XZY" => Some(RotationOrder::Xzy),
            "YXZ" => Some(RotationOrder::Yxz),
            "YZX" => Some(RotationOrder::Yzx),
            "ZXY" => Some(RotationOrder::Zxy),
            "ZYX" => Some(RotationOrder::Zyx),
            _ => None,
        }
    }

    /// Axis indices in application order.
    fn axes(self) -> [usize; 3] {
        match self {
            RotationOrder::Xyz => [0, 1, 2],
            RotationOrder::Xzy => [0, 2, 1],
            RotationOrder::Yxz => [1, 0, 2],
            RotationOrder::Yzx => [1, 2, 0],
            RotationOrder::Zxy => [2, 0, 1],
            RotationOrder::Zyx => [2, 1, 0],
        }
    }
}

/// Transform operation types found in USD xformOps.
#[derive(Clone, Debug, PartialEq)]
pub enum XformOp {
    /// Translation (xformOp:translate)
    Translate(DVec3),

    /// Rotation in degrees around X axis
    RotateX(f64),

    /// Rotation in degrees around Y axis
    RotateY(f64),

    /// Rotation in degrees around Z axis
    RotateZ(f64),

    /// Three-axis Euler rotation in degrees, applied in `order`
    RotateEuler(RotationOrder, DVec3),

    /// Quaternion orientation (xformOp:orient)
    Orient(DQuat),

    /// Scale (uniform or non-uniform)
    Scale(DVec3),

    /// Full 4x4 transform matrix
    Transform(DMat4),
}

impl XformOp {
    /// Interpret an `xformOp:<kind>[:<suffix>]` attribute.
    pub fn from_attribute(name: &str, value: &UsdValue) -> Option<Self> {
        let kind = name.strip_prefix("xformOp:")?;
        let kind = kind.split(':').next().unwrap_or(kind);

        match kind {
            "translate" => value.as_dvec3().map(XformOp::Translate),
            "scale" => value
                .as_dvec3()
                .or_else(|| value.as_f64().map(DVec3::splat))
                .map(XformOp::Scale),
            "rotateX" => value.as_f64().map(XformOp::RotateX),
            "rotateY" => value.as_f64().map(XformOp::RotateY),
            "rotateZ" => value.as_f64().map(XformOp::RotateZ),
            "orient" => value.as_dquat().map(|q| XformOp::Orient(q.normalize())),
            "transform" => value.as_dmat4().map(XformOp::Transform),
            other => {
                let order = RotationOrder::from_suffix(other.strip_prefix("rotate")?)?;
                value.as_dvec3().map(|v| XformOp::RotateEuler(order, v))
            }
        }
    }

    /// Convert this operation to a transformation matrix.
    pub fn to_matrix(&self) -> DMat4 {
        match self {
            XformOp::Translate(t) => DMat4::from_translation(*t),
            XformOp::RotateX(deg) => DMat4::from_rotation_x(deg.to_radians()),
            XformOp::RotateY(deg) => DMat4::from_rotation_y(deg.to_radians()),
            XformOp::RotateZ(deg) => DMat4::from_rotation_z(deg.to_radians()),
            XformOp::RotateEuler(order, degrees) => {
                // First axis applies first, so it sits rightmost
                order.axes().iter().fold(DMat4::IDENTITY, |acc, &axis| {
                    let angle = degrees[axis].to_radians();
                    let rotation = match axis {
                        0 => DMat4::from_rotation_x(angle),
                        1 => DMat4::from_rotation_y(angle),
                        _ => DMat4::from_rotation_z(angle),
                    };
                    rotation * acc
                })
            }
            XformOp::Orient(q) => DMat4::from_quat(*q),
            XformOp::Scale(s) => DMat4::from_scale(*s),
            XformOp::Transform(m) => *m,
        }
    }
}

/// Combine a list of xformOps into a single matrix.
pub fn compose_xform_ops(ops: &[(XformOp, bool)]) -> DMat4 {
    let mut result = DMat4::IDENTITY;
    for (op, inverted) in ops {
        let matrix = op.to_matrix();
        result *= if *inverted { matrix.inverse() } else { matrix };
    }
    result
}
