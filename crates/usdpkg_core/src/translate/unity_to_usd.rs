//! Unity prefab/scene to USD stage.
//!
//! Root GameObjects are those whose Transform has no father. Each
//! GameObject becomes one prim: `Mesh` when its MeshFilter resolves to a
//! mesh asset, `Xform` otherwise. Components without a USD counterpart are
//! named in a `comment` attribute on the prim and reported.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use usdpkg_math::{mirror_x, Bounds, DMat4, DMat4Ext, DQuat, DVec3, StageBasis, Trs, Vec3};

use crate::config::ConvertOptions;
use crate::error::{ConvertError, ConvertResult, UnsupportedFeature};
use crate::package::UnityPackage;
use crate::unity::{
    parse_document_bytes, Guid, MaterialAsset, MeshAsset, MetaRecord, UnityClass, UnityDocument,
    UnityObject, UnityValue,
};
use crate::usd::{child_path, UsdAttribute, UsdPrim, UsdStage, UsdValue};

use super::{Provenance, UniqueNames};

const LOOKS: &str = "Looks";

/// A `.prefab` or `.unity` document with its provenance, if any.
#[derive(Clone, Debug)]
pub struct SceneAsset {
    pub pathname: String,
    pub document: UnityDocument,
    pub provenance: Option<Provenance>,
}

/// The Unity side of a conversion: scene documents plus the assets they
/// reference, keyed by GUID.
#[derive(Clone, Debug, Default)]
pub struct UnitySource {
    pub scenes: Vec<SceneAsset>,
    pub meshes: HashMap<Guid, MeshAsset>,
    pub materials: HashMap<Guid, MaterialAsset>,
}

impl UnitySource {
    /// Collect scenes, meshes and materials from a package.
    pub fn from_package(package: &UnityPackage) -> ConvertResult<Self> {
        let mut source = UnitySource::default();
        let mut assets: Vec<_> = package.assets.iter().filter(|a| !a.is_folder()).collect();
        assets.sort_by(|a, b| a.pathname.cmp(&b.pathname));

        for asset in assets {
            let Some(data) = &asset.asset else {
                continue;
            };
            let meta = asset.meta_record()?;
            source.add(&asset.pathname, &meta, data)?;
        }
        Ok(source)
    }

    /// Read a loose `.prefab`/`.unity` file from a Unity project.
    ///
    /// Mesh and material assets are looked up by GUID through the `.meta`
    /// files under the enclosing `Assets` directory (or the file's own
    /// directory outside a project).
    pub fn from_loose_file(path: &Path) -> ConvertResult<Self> {
        let mut source = UnitySource::default();
        let data = read(path)?;
        let pathname = path.display().to_string();

        let meta_path = with_meta_suffix(path);
        let meta = if meta_path.is_file() {
            Some(MetaRecord::parse_bytes(&read(&meta_path)?)?)
        } else {
            log::debug!("{} has no .meta", pathname);
            None
        };
        source.add_scene(&pathname, meta.as_ref(), &data)?;

        let wanted: HashSet<Guid> = source
            .scenes
            .iter()
            .flat_map(|s| s.document.objects.iter())
            .flat_map(|o| o.references())
            .filter_map(|r| r.guid)
            .collect();

        let root = path
            .ancestors()
            .find(|a| a.file_name().and_then(|n| n.to_str()) == Some("Assets"))
            .or_else(|| path.parent())
            .unwrap_or_else(|| Path::new("."));

        for entry in walkdir::WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            let meta_path = entry.path();
            if !entry.file_type().is_file() || meta_path.extension().and_then(|e| e.to_str()) != Some("meta") {
                continue;
            }
            let record = match MetaRecord::parse_bytes(&read(meta_path)?) {
                Ok(record) => record,
                Err(e) => {
                    log::debug!("Skipping {}: {}", meta_path.display(), e);
                    continue;
                }
            };
            if !wanted.contains(&record.guid) || record.is_folder() {
                continue;
            }

            let asset_path = meta_path.with_extension("");
            if asset_path.is_file() {
                let data = read(&asset_path)?;
                source.add(&asset_path.display().to_string(), &record, &data)?;
            }
        }

        Ok(source)
    }

    fn add(&mut self, pathname: &str, meta: &MetaRecord, data: &[u8]) -> ConvertResult<()> {
        let extension = Path::new(pathname)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "prefab" | "unity" => self.add_scene(pathname, Some(meta), data)?,
            "asset" => {
                let document = parse_document_bytes(data)?;
                let mesh = document.objects_of(UnityClass::Mesh).next();
                match mesh {
                    Some(object) => {
                        self.meshes.insert(meta.guid, MeshAsset::from_object(object)?);
                    }
                    None => log::debug!("{}: no Mesh object", pathname),
                }
            }
            "mat" => {
                let document = parse_document_bytes(data)?;
                self.materials
                    .insert(meta.guid, MaterialAsset::from_document(&document)?);
            }
            _ => log::debug!("Ignoring {}", pathname),
        }
        Ok(())
    }

    fn add_scene(&mut self, pathname: &str, meta: Option<&MetaRecord>, data: &[u8]) -> ConvertResult<()> {
        let document = parse_document_bytes(data)?;
        let provenance = meta
            .and_then(|m| m.user_data.as_deref())
            .and_then(Provenance::from_user_data);
        log::debug!("{}: {} objects", pathname, document.len());
        self.scenes.push(SceneAsset {
            pathname: pathname.to_string(),
            document,
            provenance,
        });
        Ok(())
    }
}

fn read(path: &Path) -> ConvertResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| ConvertError::io(format!("reading {}", path.display()), e))
}

fn with_meta_suffix(path: &Path) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".meta");
    name.into()
}

/// Result of translating Unity data to a stage.
#[derive(Debug)]
pub struct UsdImport {
    pub stage: UsdStage,
    pub prims: usize,
    pub notes: Vec<UnsupportedFeature>,
}

struct StageBuilder<'a> {
    source: &'a UnitySource,
    correction_inverse: DMat4,
    looks: Vec<UsdPrim>,
    look_names: UniqueNames,
    material_paths: HashMap<Guid, String>,
    // Transform file ids already walked in the current document
    visited: HashSet<i64>,
    notes: Vec<UnsupportedFeature>,
}

impl<'a> StageBuilder<'a> {
    fn note(&mut self, path: &str, type_name: &str) {
        let note = UnsupportedFeature::new(path, type_name);
        log::warn!("Skipping {}", note);
        self.notes.push(note);
    }

    /// Translate one GameObject and its children.
    ///
    /// A Transform reached twice (listed as its own descendant, or under two
    /// fathers) is a malformed hierarchy.
    fn game_object(
        &mut self,
        go: &UnityObject,
        index: &HashMap<i64, &UnityObject>,
        parent_path: &str,
        names: &mut UniqueNames,
        is_stage_root: bool,
    ) -> ConvertResult<UsdPrim> {
        let source = self.source;
        let name = names.claim(go.name().unwrap_or("GameObject"));
        let path = child_path(parent_path, &name);

        let mut transform = None;
        let mut mesh = None;
        let mut material = None;
        let mut unsupported: Vec<String> = Vec::new();

        for reference in go.component_refs() {
            let Some(component) = index.get(&reference.file_id).copied() else {
                continue;
            };
            match component.class {
                class if class.is_transform() => transform = Some(component),
                UnityClass::MeshFilter => match component.get_ref("m_Mesh") {
                    Some(r) if !r.is_null() => match r.guid.and_then(|g| source.meshes.get(&g)) {
                        Some(asset) => mesh = Some(asset),
                        None => {
                            self.note(&path, "MeshFilter (unresolved mesh)");
                            unsupported.push("MeshFilter".to_string());
                        }
                    },
                    _ => {}
                },
                UnityClass::MeshRenderer => {
                    material = component
                        .get("m_Materials")
                        .and_then(UnityValue::as_seq)
                        .unwrap_or(&[])
                        .iter()
                        .filter_map(UnityValue::as_file_ref)
                        .filter_map(|r| r.guid)
                        .find_map(|g| source.materials.get(&g).map(|m| (g, m)));
                }
                _ => {
                    self.note(&path, &component.class_name);
                    unsupported.push(component.class_name.clone());
                }
            }
        }

        if let Some(transform) = transform {
            self.enter(transform)?;
        }

        let type_name = if mesh.is_some() { "Mesh" } else { "Xform" };
        let mut prim = UsdPrim::new(parent_path, name, type_name);
        log::debug!("GameObject &{} -> {}", go.file_id, prim.path);

        let mut local = transform.map(local_matrix).unwrap_or(DMat4::IDENTITY);
        local = mirror_x(local);
        if is_stage_root {
            local = self.correction_inverse * local;
        }
        if !local.is_finite_affine() {
            return Err(ConvertError::Format(format!("{}: non-finite transform", path)));
        }
        set_xform_ops(&mut prim, Trs::from_matrix(local));

        if go.get("m_IsActive").and_then(UnityValue::as_i64) == Some(0) {
            prim.set_attribute(UsdAttribute::new("visibility", "token", UsdValue::String("invisible".into())));
        }

        if let Some(asset) = mesh {
            set_mesh_attributes(&mut prim, asset);
            if let Some((guid, asset)) = material {
                let target = self.material(guid, asset);
                prim.metadata.push((
                    "prepend apiSchemas".to_string(),
                    UsdValue::Array(vec![UsdValue::String("MaterialBindingAPI".into())]),
                ));
                prim.set_relationship("material:binding", vec![target]);
            }
        }

        if !unsupported.is_empty() {
            prim.set_attribute(
                UsdAttribute::new(
                    "comment",
                    "string",
                    UsdValue::String(format!("unsupported Unity components: {}", unsupported.join(", "))),
                )
                .custom(),
            );
        }

        let mut child_names = UniqueNames::new();
        for child in transform.map(|t| children_of(t, index)).unwrap_or_default() {
            let child = self.game_object(child, index, &prim.path, &mut child_names, false)?;
            prim.children.push(child);
        }

        Ok(prim)
    }

    fn enter(&mut self, transform: &UnityObject) -> ConvertResult<()> {
        if self.visited.insert(transform.file_id) {
            Ok(())
        } else {
            Err(ConvertError::Format(format!(
                "Transform &{} appears twice in the hierarchy",
                transform.file_id
            )))
        }
    }

    /// Material prim under `/Looks` for a material asset, created once.
    fn material(&mut self, guid: Guid, asset: &MaterialAsset) -> String {
        if let Some(path) = self.material_paths.get(&guid) {
            return path.clone();
        }

        let looks_path = format!("/{}", LOOKS);
        let mut material = UsdPrim::new(&looks_path, self.look_names.claim(&asset.name), "Material");
        let mut shader = UsdPrim::new(&material.path, "PreviewSurface", "Shader");

        shader.set_attribute(
            UsdAttribute::new("info:id", "token", UsdValue::String("UsdPreviewSurface".into())).uniform(),
        );
        shader.set_attribute(UsdAttribute::new(
            "inputs:diffuseColor",
            "color3f",
            UsdValue::from_dvec3(asset.diffuse()),
        ));
        shader.set_attribute(UsdAttribute::new(
            "inputs:metallic",
            "float",
            UsdValue::Float(asset.metallic as f64),
        ));
        shader.set_attribute(UsdAttribute::new(
            "inputs:roughness",
            "float",
            UsdValue::Float((1.0 - asset.glossiness) as f64),
        ));
        shader.set_attribute(UsdAttribute::new(
            "inputs:opacity",
            "float",
            UsdValue::Float(asset.color.w as f64),
        ));
        shader.set_attribute(UsdAttribute {
            value: None,
            ..UsdAttribute::new("outputs:surface", "token", UsdValue::Blocked)
        });

        material.set_attribute(UsdAttribute::new(
            "outputs:surface.connect",
            "token",
            UsdValue::Path(format!("{}.outputs:surface", shader.path)),
        ));
        material.children.push(shader);

        let path = material.path.clone();
        self.material_paths.insert(guid, path.clone());
        self.looks.push(material);
        path
    }
}

fn local_matrix(transform: &UnityObject) -> DMat4 {
    let vec = |key: &str, default: DVec3| {
        transform
            .get(key)
            .and_then(UnityValue::to_dvec3)
            .unwrap_or(default)
    };
    let rotation = transform
        .get("m_LocalRotation")
        .and_then(UnityValue::to_dquat)
        .map(DQuat::normalize)
        .unwrap_or(DQuat::IDENTITY);

    Trs {
        translation: vec("m_LocalPosition", DVec3::ZERO),
        rotation,
        scale: vec("m_LocalScale", DVec3::ONE),
    }
    .to_matrix()
}

/// Child GameObjects of a Transform, in `m_Children` order.
fn children_of<'a>(transform: &UnityObject, index: &HashMap<i64, &'a UnityObject>) -> Vec<&'a UnityObject> {
    let Some(children) = transform.get("m_Children").and_then(UnityValue::as_seq) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for child in children.iter().filter_map(UnityValue::as_file_ref) {
        let Some(child_transform) = index.get(&child.file_id).copied() else {
            continue;
        };
        if child_transform.stripped {
            log::debug!("Skipping stripped Transform &{}", child_transform.file_id);
            continue;
        }
        match child_transform
            .get_ref("m_GameObject")
            .and_then(|r| index.get(&r.file_id).copied())
        {
            Some(go) if !go.stripped => out.push(go),
            _ => log::debug!("Transform &{} has no GameObject", child_transform.file_id),
        }
    }
    out
}

fn transform_of<'a>(go: &UnityObject, index: &HashMap<i64, &'a UnityObject>) -> Option<&'a UnityObject> {
    go.component_refs()
        .iter()
        .filter_map(|r| index.get(&r.file_id).copied())
        .find(|c| c.class.is_transform())
}

fn set_xform_ops(prim: &mut UsdPrim, trs: Trs) {
    prim.set_attribute(UsdAttribute::new(
        "xformOp:translate",
        "double3",
        UsdValue::from_dvec3(trs.translation),
    ));
    prim.set_attribute(UsdAttribute::new(
        "xformOp:orient",
        "quatd",
        UsdValue::from_dquat(trs.rotation),
    ));
    prim.set_attribute(UsdAttribute::new(
        "xformOp:scale",
        "double3",
        UsdValue::from_dvec3(trs.scale),
    ));
    let order = ["xformOp:translate", "xformOp:orient", "xformOp:scale"]
        .iter()
        .map(|op| UsdValue::String(op.to_string()))
        .collect();
    prim.set_attribute(UsdAttribute::new("xformOpOrder", "token[]", UsdValue::Array(order)).uniform());
}

/// Mesh attributes in USD's frame: X mirrored back, winding restored.
fn set_mesh_attributes(prim: &mut UsdPrim, asset: &MeshAsset) {
    let mirror = |v: &Vec3| Vec3::new(-v.x, v.y, v.z);
    let points: Vec<Vec3> = asset.positions.iter().map(mirror).collect();

    let mut indices = asset.indices.clone();
    for triangle in indices.chunks_exact_mut(3) {
        triangle.swap(1, 2);
    }
    let triangles = indices.len() / 3;

    let bounds = Bounds::from_points(&points);
    prim.set_attribute(UsdAttribute::new(
        "extent",
        "float3[]",
        UsdValue::from_vec3_array(&[bounds.min, bounds.max]),
    ));
    prim.set_attribute(UsdAttribute::new(
        "faceVertexCounts",
        "int[]",
        UsdValue::from_int_array(std::iter::repeat(3).take(triangles)),
    ));
    prim.set_attribute(UsdAttribute::new(
        "faceVertexIndices",
        "int[]",
        UsdValue::from_int_array(indices.iter().map(|&i| i as i64)),
    ));
    if let Some(normals) = &asset.normals {
        let normals: Vec<Vec3> = normals.iter().map(mirror).collect();
        prim.set_attribute(
            UsdAttribute::new("normals", "normal3f[]", UsdValue::from_vec3_array(&normals))
                .with_metadata("interpolation", UsdValue::String("vertex".into())),
        );
    }
    prim.set_attribute(UsdAttribute::new("points", "point3f[]", UsdValue::from_vec3_array(&points)));
    prim.set_attribute(
        UsdAttribute::new("subdivisionScheme", "token", UsdValue::String("none".into())).uniform(),
    );
}

/// Translate Unity scene documents into one stage.
pub fn import_source(source: &UnitySource, options: &ConvertOptions) -> ConvertResult<UsdImport> {
    let first = source
        .scenes
        .first()
        .ok_or_else(|| ConvertError::Format("no .prefab or .unity asset".to_string()))?;

    let provenance = source.scenes.iter().find_map(|s| s.provenance.clone());
    let basis = provenance
        .as_ref()
        .map(Provenance::basis)
        .unwrap_or_else(|| StageBasis::new(options.output_up_axis, options.output_meters_per_unit));
    let name = match &provenance {
        Some(p) => p.stage.clone(),
        None => Path::new(&first.pathname)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("scene")
            .to_string(),
    };

    let mut builder = StageBuilder {
        source,
        correction_inverse: basis.root_correction_inverse(),
        looks: Vec::new(),
        look_names: UniqueNames::new(),
        material_paths: HashMap::new(),
        visited: HashSet::new(),
        notes: Vec::new(),
    };

    let mut root_names = UniqueNames::new();
    root_names.claim(LOOKS);
    let mut roots = Vec::new();

    for scene in &source.scenes {
        let document = &scene.document;
        document.validate_references()?;
        let index = document.index();
        builder.visited.clear();

        for instance in document.objects_of(UnityClass::PrefabInstance) {
            builder.note(&format!("{}&{}", scene.pathname, instance.file_id), "PrefabInstance");
        }

        let scene_roots: Vec<(&UnityObject, &UnityObject)> = document
            .objects_of(UnityClass::GameObject)
            .filter(|go| !go.stripped)
            .filter_map(|go| transform_of(go, &index).map(|t| (go, t)))
            .filter(|(_, t)| t.get_ref("m_Father").map_or(true, |r| r.is_null()))
            .collect();
        if scene_roots.is_empty() {
            return Err(ConvertError::Format(format!(
                "{}: no root GameObject",
                scene.pathname
            )));
        }

        let synthetic = scene.provenance.as_ref().map_or(false, |p| p.synthetic_root);
        match scene_roots.as_slice() {
            [(_, transform)] if synthetic => {
                builder.enter(transform)?;
                for child in children_of(transform, &index) {
                    roots.push(builder.game_object(child, &index, "/", &mut root_names, true)?);
                }
            }
            _ => {
                for (go, _) in &scene_roots {
                    roots.push(builder.game_object(go, &index, "/", &mut root_names, true)?);
                }
            }
        }
    }

    let mut stage = UsdStage::new(name);
    stage.up_axis = basis.up_axis;
    stage.meters_per_unit = basis.meters_per_unit;
    stage.default_prim = roots.first().map(|p| p.name.clone());
    stage.doc = Some(format!(
        "Converted from {}",
        source
            .scenes
            .iter()
            .map(|s| s.pathname.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    ));
    stage.roots = roots;

    if !builder.looks.is_empty() {
        let mut looks = UsdPrim::new("/", LOOKS, "Scope");
        looks.children = std::mem::take(&mut builder.looks);
        stage.roots.push(looks);
    }

    let prims = stage.prim_count();
    log::info!(
        "Translated {} into stage {}: {} prims, {} unsupported",
        first.pathname,
        stage.name,
        prims,
        builder.notes.len()
    );

    Ok(UsdImport {
        stage,
        prims,
        notes: builder.notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::translate::export_stage;
    use crate::unity::{parse_document, FileRef};
    use crate::usd::{parse_usda, write_usda};

    const SCENE: &str = r#"#usda 1.0
(
    defaultPrim = "World"
    metersPerUnit = 0.01
    upAxis = "Z"
)

def Xform "World"
{
    double3 xformOp:translate = (10, 20, 30)
    float3 xformOp:rotateXYZ = (15, 30, 45)
    float3 xformOp:scale = (1, 2, 3)
    uniform token[] xformOpOrder = ["xformOp:translate", "xformOp:rotateXYZ", "xformOp:scale"]

    def Mesh "Quad"
    {
        double3 xformOp:translate = (1, 0, 0)
        uniform token[] xformOpOrder = ["xformOp:translate"]
        int[] faceVertexCounts = [4]
        int[] faceVertexIndices = [0, 1, 2, 3]
        point3f[] points = [(0, 0, 0), (1, 0, 0), (1, 1, 0), (0, 1, 0)]
    }

    def Xform "Group"
    {
        double xformOp:rotateZ = 90
        uniform token[] xformOpOrder = ["xformOp:rotateZ"]

        def Xform "Leaf"
        {
        }
    }
}
"#;

    fn assert_matrix_close(a: DMat4, b: DMat4) {
        let (a, b) = (a.to_cols_array(), b.to_cols_array());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-5, "{:?} != {:?}", a, b);
        }
    }

    fn round_trip(usda: &str) -> (UsdStage, UsdImport) {
        let options = ConvertOptions::default();
        let original = parse_usda(usda, "scene").unwrap();
        let export = export_stage(&original, &options).unwrap();
        let bytes = export.package.to_bytes().unwrap();
        let package = UnityPackage::from_bytes(&bytes).unwrap();
        let source = UnitySource::from_package(&package).unwrap();
        (original, import_source(&source, &options).unwrap())
    }

    #[test]
    fn test_round_trip_preserves_hierarchy_and_transforms() {
        let (original, import) = round_trip(SCENE);
        let stage = &import.stage;

        assert!(import.notes.is_empty());
        assert_eq!(stage.prim_count(), original.prim_count());
        assert_eq!(stage.up_axis, original.up_axis);
        assert_eq!(stage.meters_per_unit, original.meters_per_unit);
        assert_eq!(stage.default_prim.as_deref(), Some("World"));

        for path in ["/World", "/World/Quad", "/World/Group", "/World/Group/Leaf"] {
            let a = original.prim_at(path).unwrap();
            let b = stage.prim_at(path).unwrap();
            assert_eq!(a.children.len(), b.children.len(), "{}", path);
            assert_matrix_close(a.local_transform(), b.local_transform());
        }
        assert_eq!(stage.prim_at("/World/Quad").unwrap().type_name, "Mesh");
    }

    #[test]
    fn test_round_trip_restores_mesh_points() {
        let (original, import) = round_trip(SCENE);
        let before = crate::usd::UsdMesh::from_prim(original.prim_at("/World/Quad").unwrap());
        let after = crate::usd::UsdMesh::from_prim(import.stage.prim_at("/World/Quad").unwrap());

        assert_eq!(before.points, after.points);
        // Quad is triangulated, winding preserved
        assert_eq!(after.face_vertex_counts, vec![3, 3]);
        assert_eq!(after.face_vertex_indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_round_trip_unwraps_synthetic_root() {
        let (original, import) = round_trip(
            "#usda 1.0\n(\n    upAxis = \"Z\"\n)\ndef Xform \"A\"\n{\n    double3 xformOp:translate = (0, 0, 5)\n    uniform token[] xformOpOrder = [\"xformOp:translate\"]\n}\ndef Xform \"B\"\n{\n}\n",
        );
        let names: Vec<&str> = import.stage.roots.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_matrix_close(
            original.roots[0].local_transform(),
            import.stage.roots[0].local_transform(),
        );
    }

    #[test]
    fn test_materials_become_looks() {
        let (_, import) = round_trip(
            r#"#usda 1.0
def Mesh "Tri"
{
    int[] faceVertexCounts = [3]
    int[] faceVertexIndices = [0, 1, 2]
    point3f[] points = [(0, 0, 0), (1, 0, 0), (0, 1, 0)]
    rel material:binding = </Looks/Red>
}
def Scope "Looks"
{
    def Material "Red"
    {
        def Shader "Surface"
        {
            uniform token info:id = "UsdPreviewSurface"
            color3f inputs:diffuseColor = (1, 0, 0)
        }
    }
}
"#,
        );
        let stage = &import.stage;
        let tri = stage.prim_at("/Tri").unwrap();
        assert_eq!(
            tri.relationship("material:binding").unwrap().targets,
            vec!["/Looks/Red".to_string()]
        );
        let shader = stage.prim_at("/Looks/Red/PreviewSurface").unwrap();
        assert_eq!(
            shader.value("inputs:diffuseColor").and_then(UsdValue::as_dvec3),
            Some(DVec3::new(1.0, 0.0, 0.0))
        );

        // Written layer parses back
        let text = write_usda(stage);
        let reparsed = parse_usda(&text, "scene").unwrap();
        assert_eq!(reparsed.prim_count(), stage.prim_count());
    }

    const LIGHT_PREFAB: &str = "%YAML 1.1
%TAG !u! tag:unity3d.com,2011:
--- !u!1 &1
GameObject:
  m_Component:
  - component: {fileID: 2}
  - component: {fileID: 3}
  m_Name: Lamp
  m_IsActive: 1
--- !u!4 &2
Transform:
  m_GameObject: {fileID: 1}
  m_LocalRotation: {x: 0, y: 0, z: 0, w: 1}
  m_LocalPosition: {x: 1, y: 2, z: 3}
  m_LocalScale: {x: 1, y: 1, z: 1}
  m_Children: []
  m_Father: {fileID: 0}
--- !u!108 &3
Light:
  m_GameObject: {fileID: 1}
  m_Intensity: 2
";

    fn scene_source(text: &str) -> UnitySource {
        UnitySource {
            scenes: vec![SceneAsset {
                pathname: "Assets/Lamp.prefab".into(),
                document: parse_document(text).unwrap(),
                provenance: None,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_unsupported_component_becomes_comment() {
        let import = import_source(&scene_source(LIGHT_PREFAB), &ConvertOptions::default()).unwrap();
        assert_eq!(import.notes.len(), 1);
        assert_eq!(import.notes[0].type_name, "Light");

        let lamp = import.stage.prim_at("/Lamp").unwrap();
        assert_eq!(lamp.type_name, "Xform");
        assert_eq!(
            lamp.value("comment").and_then(UsdValue::as_str),
            Some("unsupported Unity components: Light")
        );
        assert!(lamp.attribute("comment").unwrap().custom);

        // No provenance: Y-up meters, X mirrored
        assert_eq!(import.stage.meters_per_unit, 1.0);
        let p = lamp.local_transform().transform_point3(DVec3::ZERO);
        assert!((p - DVec3::new(-1.0, 2.0, 3.0)).length() < 1e-9);
    }

    #[test]
    fn test_missing_root_is_format_error() {
        let mut source = scene_source(LIGHT_PREFAB);
        let document = &mut source.scenes[0].document;
        document.objects[1].set("m_Father", FileRef::local(2));

        let err = import_source(&source, &ConvertOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatError);
    }

    #[test]
    fn test_dangling_reference_is_format_error() {
        let mut source = scene_source(LIGHT_PREFAB);
        source.scenes[0].document.objects[0].set(
            "m_Component",
            UnityValue::Seq(vec![UnityValue::Map(vec![(
                "component".into(),
                FileRef::local(99).into(),
            )])]),
        );
        let err = import_source(&source, &ConvertOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatError);
    }

    const NESTED_PREFAB: &str = "%YAML 1.1
%TAG !u! tag:unity3d.com,2011:
--- !u!1 &1
GameObject:
  m_Component:
  - component: {fileID: 2}
  m_Name: Parent
--- !u!4 &2
Transform:
  m_GameObject: {fileID: 1}
  m_Children:
  - {fileID: 4}
  m_Father: {fileID: 0}
--- !u!1 &3
GameObject:
  m_Component:
  - component: {fileID: 4}
  m_Name: Child
--- !u!4 &4
Transform:
  m_GameObject: {fileID: 3}
  m_Children: []
  m_Father: {fileID: 2}
";

    #[test]
    fn test_transform_listing_itself_is_format_error() {
        let mut source = scene_source(NESTED_PREFAB);
        source.scenes[0].document.objects[1].set(
            "m_Children",
            UnityValue::Seq(vec![FileRef::local(2).into()]),
        );

        let err = import_source(&source, &ConvertOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatError);
    }

    #[test]
    fn test_child_listing_ancestor_is_format_error() {
        let options = ConvertOptions::default();
        assert!(import_source(&scene_source(NESTED_PREFAB), &options).is_ok());

        let mut source = scene_source(NESTED_PREFAB);
        source.scenes[0].document.objects[3].set(
            "m_Children",
            UnityValue::Seq(vec![FileRef::local(2).into()]),
        );
        let err = import_source(&source, &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatError);
    }

    #[test]
    fn test_non_finite_transform_is_format_error() {
        let mut source = scene_source(LIGHT_PREFAB);
        source.scenes[0].document.objects[1].set(
            "m_LocalPosition",
            UnityValue::vec3(DVec3::new(f64::NAN, 0.0, 0.0)),
        );

        let err = import_source(&source, &ConvertOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatError);
    }

    #[test]
    fn test_empty_source() {
        let err = import_source(&UnitySource::default(), &ConvertOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatError);
    }

    #[test]
    fn test_loose_file_with_project_assets() {
        let options = ConvertOptions::default();
        let original = parse_usda(SCENE, "scene").unwrap();
        let export = export_stage(&original, &options).unwrap();

        let project = tempfile::tempdir().unwrap();
        export.package.extract_to(project.path(), false).unwrap();

        let prefab = project.path().join(&export.prefab_pathname);
        let source = UnitySource::from_loose_file(&prefab).unwrap();
        assert_eq!(source.meshes.len(), 1);
        assert!(source.scenes[0].provenance.is_some());

        let import = import_source(&source, &options).unwrap();
        assert_eq!(import.stage.prim_count(), original.prim_count());
        assert_eq!(import.stage.prim_at("/World/Quad").unwrap().type_name, "Mesh");
    }
}
