//! USD stage to Unity package.
//!
//! One prefab per stage. Xform, Scope and typeless prims become a
//! GameObject with a Transform; Mesh prims also get a MeshFilter and a
//! MeshRenderer pointing at a Mesh asset. Material prims become Material
//! assets. Every other prim type is reported and skipped with its subtree.

use std::collections::HashMap;

use usdpkg_math::{mirror_x, DMat4, DVec3, Trs, Vec3};

use crate::config::ConvertOptions;
use crate::error::{ConvertError, ConvertResult, UnsupportedFeature};
use crate::package::{PackageAsset, UnityPackage};
use crate::unity::assets::header_fields;
use crate::unity::{
    write_document, FileRef, Guid, ImporterKind, MaterialAsset, MeshAsset, MetaRecord, UnityClass,
    UnityDocument, UnityObject, UnityValue, MATERIAL_FILE_ID, MESH_FILE_ID,
};
use crate::usd::{Specifier, UsdMesh, UsdPrim, UsdStage, UsdValue};

use super::{sanitize_name, Provenance, UniqueNames};

/// `type` of a reference to a native asset in another file.
const NATIVE_ASSET_TYPE: i32 = 2;

/// Result of translating one stage.
#[derive(Debug)]
pub struct UnityExport {
    pub package: UnityPackage,
    pub prefab_pathname: String,
    pub game_objects: usize,
    pub meshes: usize,
    pub materials: usize,
    pub notes: Vec<UnsupportedFeature>,
}

/// How a prim is handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PrimRole {
    Node,
    Mesh,
    Material,

    /// A container holding only materials (`Looks`)
    MaterialLibrary,
    Unsupported,
}

fn role(prim: &UsdPrim) -> PrimRole {
    match prim.type_name.as_str() {
        "Mesh" => PrimRole::Mesh,
        "Material" => PrimRole::Material,
        "Xform" | "Scope" | "" => {
            let all_materials = !prim.children.is_empty()
                && prim.children.iter().all(|c| c.type_name == "Material");
            if all_materials {
                PrimRole::MaterialLibrary
            } else {
                PrimRole::Node
            }
        }
        _ => PrimRole::Unsupported,
    }
}

struct PendingMesh {
    guid: Guid,
    pathname: String,
    asset: MeshAsset,
}

struct PendingMaterial {
    guid: Guid,
    pathname: String,
    asset: MaterialAsset,
}

/// Builds the prefab document and collects the assets it references.
struct PrefabBuilder<'a> {
    stage: &'a UsdStage,
    options: &'a ConvertOptions,
    folder: String,
    correction: DMat4,
    next_file_id: i64,
    document: UnityDocument,
    meshes: Vec<PendingMesh>,
    materials: Vec<PendingMaterial>,
    material_by_path: HashMap<String, Guid>,
    mesh_names: UniqueNames,
    material_names: UniqueNames,
    notes: Vec<UnsupportedFeature>,
}

impl<'a> PrefabBuilder<'a> {
    fn new(stage: &'a UsdStage, options: &'a ConvertOptions, folder: String) -> Self {
        Self {
            stage,
            options,
            folder,
            correction: stage.basis().root_correction(),
            next_file_id: 1,
            document: UnityDocument::new(),
            meshes: Vec::new(),
            materials: Vec::new(),
            material_by_path: HashMap::new(),
            mesh_names: UniqueNames::new(),
            material_names: UniqueNames::new(),
            notes: Vec::new(),
        }
    }

    fn guid(&self, kind: &str, path: &str) -> Guid {
        Guid::derive(&self.options.guid_namespace, &[&self.stage.name, kind, path])
    }

    fn alloc_id(&mut self) -> i64 {
        let id = self.next_file_id;
        self.next_file_id += 1;
        id
    }

    fn note(&mut self, prim: &UsdPrim) {
        let note = UnsupportedFeature::new(&prim.path, &prim.type_name);
        log::warn!("Skipping {} ({} prims)", note, prim.subtree_len());
        self.notes.push(note);
    }

    /// Emit a GameObject and its components; returns the Transform's file id.
    fn visit(&mut self, prim: &UsdPrim, parent_transform: i64, is_stage_root: bool) -> Option<i64> {
        if prim.specifier != Specifier::Def {
            log::debug!("Skipping {} {}", prim.specifier.as_str(), prim.path);
            return None;
        }

        let role = role(prim);
        match role {
            PrimRole::Unsupported => {
                self.note(prim);
                return None;
            }
            PrimRole::Material => {
                self.material(prim);
                return None;
            }
            PrimRole::MaterialLibrary => {
                for child in &prim.children {
                    self.material(child);
                }
                return None;
            }
            PrimRole::Node | PrimRole::Mesh => {}
        }

        let mut local = prim.local_transform();
        if is_stage_root {
            local = self.correction * local;
        }
        let active = prim.value("visibility").and_then(UsdValue::as_str) != Some("invisible");

        let game_object_id = self.alloc_id();
        let transform_id = self.alloc_id();
        let mut components = vec![transform_id];
        let mut extra = Vec::new();

        if role == PrimRole::Mesh {
            let mesh_guid = self.mesh(prim);
            let material_guid = prim
                .relationship("material:binding")
                .and_then(|r| r.targets.first())
                .and_then(|target| self.bound_material(prim, target));

            let filter_id = self.alloc_id();
            let renderer_id = self.alloc_id();
            components.extend([filter_id, renderer_id]);
            extra.push(mesh_filter(filter_id, game_object_id, mesh_guid));
            extra.push(mesh_renderer(renderer_id, game_object_id, material_guid));
        }

        self.document
            .push(game_object(game_object_id, &prim.name, &components, active));
        let transform_index = self.document.len();
        self.document.push(transform(
            transform_id,
            game_object_id,
            mirror_x(local),
            parent_transform,
        ));
        for object in extra {
            self.document.push(object);
        }
        log::debug!("{} -> GameObject &{}", prim.path, game_object_id);

        let children: Vec<UnityValue> = prim
            .children
            .iter()
            .filter_map(|child| self.visit(child, transform_id, false))
            .map(|id| FileRef::local(id).into())
            .collect();
        self.document.objects[transform_index].set("m_Children", UnityValue::Seq(children));

        Some(transform_id)
    }

    /// Synthetic root wrapping several stage roots.
    fn visit_synthetic_root(&mut self, roots: &[&UsdPrim]) {
        let game_object_id = self.alloc_id();
        let transform_id = self.alloc_id();

        self.document.push(game_object(
            game_object_id,
            &self.stage.name,
            &[transform_id],
            true,
        ));
        let transform_index = self.document.len();
        self.document
            .push(transform(transform_id, game_object_id, DMat4::IDENTITY, 0));

        let children: Vec<UnityValue> = roots
            .iter()
            .filter_map(|root| self.visit(root, transform_id, true))
            .map(|id| FileRef::local(id).into())
            .collect();
        self.document.objects[transform_index].set("m_Children", UnityValue::Seq(children));
    }

    fn mesh(&mut self, prim: &UsdPrim) -> Guid {
        let asset = mesh_asset(&UsdMesh::from_prim(prim), self.mesh_names.claim(&prim.name));
        let guid = self.guid("mesh", &prim.path);
        log::debug!(
            "{}: {} vertices, {} triangles",
            prim.path,
            asset.positions.len(),
            asset.triangle_count()
        );
        self.meshes.push(PendingMesh {
            guid,
            pathname: format!("{}/Meshes/{}.asset", self.folder, asset.name),
            asset,
        });
        guid
    }

    fn bound_material(&mut self, prim: &UsdPrim, target: &str) -> Option<Guid> {
        let stage = self.stage;
        match stage.prim_at(target) {
            Some(material) if material.type_name == "Material" => self.material(material),
            _ => {
                log::warn!("{}: material binding {} does not resolve", prim.path, target);
                None
            }
        }
    }

    /// Register a Material prim once; returns its asset GUID.
    fn material(&mut self, prim: &UsdPrim) -> Option<Guid> {
        if prim.type_name != "Material" || prim.specifier != Specifier::Def {
            self.note(prim);
            return None;
        }
        if let Some(guid) = self.material_by_path.get(&prim.path) {
            return Some(*guid);
        }

        let asset = material_asset(prim, self.material_names.claim(&prim.name));
        let guid = self.guid("material", &prim.path);
        self.materials.push(PendingMaterial {
            guid,
            pathname: format!("{}/Materials/{}.mat", self.folder, asset.name),
            asset,
        });
        self.material_by_path.insert(prim.path.clone(), guid);
        Some(guid)
    }
}

fn game_object(file_id: i64, name: &str, components: &[i64], active: bool) -> UnityObject {
    let components = components
        .iter()
        .map(|id| UnityValue::Map(vec![("component".into(), FileRef::local(*id).into())]))
        .collect();

    header_fields(UnityObject::new(file_id, UnityClass::GameObject))
        .with("serializedVersion", 6)
        .with("m_Component", UnityValue::Seq(components))
        .with("m_Layer", 0)
        .with("m_Name", name)
        .with("m_TagString", "Untagged")
        .with("m_Icon", FileRef::NULL)
        .with("m_NavMeshLayer", 0)
        .with("m_StaticEditorFlags", 0)
        .with("m_IsActive", if active { 1 } else { 0 })
}

fn transform(file_id: i64, game_object: i64, local: DMat4, father: i64) -> UnityObject {
    let trs = Trs::from_matrix(local);
    header_fields(UnityObject::new(file_id, UnityClass::Transform))
        .with("m_GameObject", FileRef::local(game_object))
        .with("serializedVersion", 2)
        .with("m_LocalRotation", UnityValue::quat(trs.rotation))
        .with("m_LocalPosition", UnityValue::vec3(trs.translation))
        .with("m_LocalScale", UnityValue::vec3(trs.scale))
        .with("m_ConstrainProportionsScale", 0)
        .with("m_Children", UnityValue::Seq(Vec::new()))
        .with("m_Father", FileRef::local(father))
        .with("m_LocalEulerAnglesHint", UnityValue::vec3(DVec3::ZERO))
}

fn mesh_filter(file_id: i64, game_object: i64, mesh: Guid) -> UnityObject {
    header_fields(UnityObject::new(file_id, UnityClass::MeshFilter))
        .with("m_GameObject", FileRef::local(game_object))
        .with("m_Mesh", FileRef::external(MESH_FILE_ID, mesh, NATIVE_ASSET_TYPE))
}

fn mesh_renderer(file_id: i64, game_object: i64, material: Option<Guid>) -> UnityObject {
    let materials: Vec<UnityValue> = material
        .map(|guid| UnityValue::Ref(FileRef::external(MATERIAL_FILE_ID, guid, NATIVE_ASSET_TYPE)))
        .into_iter()
        .collect();

    header_fields(UnityObject::new(file_id, UnityClass::MeshRenderer))
        .with("m_GameObject", FileRef::local(game_object))
        .with("m_Enabled", 1)
        .with("m_CastShadows", 1)
        .with("m_ReceiveShadows", 1)
        .with("m_Materials", UnityValue::Seq(materials))
}

fn mirror_vec(v: Vec3) -> Vec3 {
    Vec3::new(-v.x, v.y, v.z)
}

/// Mesh data in Unity's frame: X mirrored and winding flipped to match.
fn mesh_asset(mesh: &UsdMesh, name: String) -> MeshAsset {
    let mut indices = mesh.triangulate();
    if !mesh.left_handed {
        for triangle in indices.chunks_exact_mut(3) {
            triangle.swap(1, 2);
        }
    }

    MeshAsset {
        name,
        positions: mesh.points.iter().copied().map(mirror_vec).collect(),
        normals: mesh
            .normals
            .as_ref()
            .map(|normals| normals.iter().copied().map(mirror_vec).collect()),
        indices,
    }
}

/// Standard-shader parameters from the material's `UsdPreviewSurface`.
fn material_asset(prim: &UsdPrim, name: String) -> MaterialAsset {
    let mut material = MaterialAsset {
        name,
        ..Default::default()
    };

    let mut surface = None;
    prim.walk(&mut |p| {
        if surface.is_none()
            && p.type_name == "Shader"
            && p.value("info:id").and_then(UsdValue::as_str) == Some("UsdPreviewSurface")
        {
            surface = Some(p);
        }
    });
    let Some(shader) = surface else {
        log::debug!("{}: no UsdPreviewSurface, using defaults", prim.path);
        return material;
    };

    let input = |name: &str| shader.value(&format!("inputs:{}", name));
    if let Some(color) = input("diffuseColor").and_then(UsdValue::as_dvec3) {
        material.color = color.as_vec3().extend(1.0);
    }
    if let Some(opacity) = input("opacity").and_then(UsdValue::as_f64) {
        material.color.w = opacity as f32;
    }
    if let Some(metallic) = input("metallic").and_then(UsdValue::as_f64) {
        material.metallic = metallic as f32;
    }
    if let Some(roughness) = input("roughness").and_then(UsdValue::as_f64) {
        material.glossiness = (1.0 - roughness).clamp(0.0, 1.0) as f32;
    }
    material
}

/// `Assets`-relative folder names from the options folder and stage name.
fn base_folder(options: &ConvertOptions, stage: &str) -> String {
    let mut parts = vec!["Assets".to_string()];
    parts.extend(
        options
            .asset_folder
            .split('/')
            .filter(|c| !c.is_empty() && *c != ".")
            .map(str::to_string),
    );
    parts.push(sanitize_name(stage));
    parts.join("/")
}

/// Translate a stage into a package holding one prefab and its assets.
pub fn export_stage(stage: &UsdStage, options: &ConvertOptions) -> ConvertResult<UnityExport> {
    let folder = base_folder(options, &stage.name);
    let mut builder = PrefabBuilder::new(stage, options, folder.clone());

    let mut roots: Vec<&UsdPrim> = Vec::new();
    for prim in &stage.roots {
        if prim.specifier != Specifier::Def {
            continue;
        }
        match role(prim) {
            PrimRole::Node | PrimRole::Mesh => roots.push(prim),
            PrimRole::Unsupported => builder.note(prim),
            PrimRole::Material => {
                builder.material(prim);
            }
            PrimRole::MaterialLibrary => {
                for child in &prim.children {
                    builder.material(child);
                }
            }
        }
    }

    let synthetic_root = match roots.as_slice() {
        [] => {
            return Err(ConvertError::Unsupported(format!(
                "{}: no convertible root prim",
                stage.name
            )))
        }
        [root] => {
            builder.visit(root, 0, true);
            false
        }
        many => {
            builder.visit_synthetic_root(many);
            true
        }
    };

    builder.document.validate_references()?;

    let provenance = Provenance {
        stage: stage.name.clone(),
        up_axis: stage.up_axis,
        meters_per_unit: stage.meters_per_unit,
        synthetic_root,
    };

    let namespace = &options.guid_namespace;
    let version = options.meta_format_version;
    let mut package = UnityPackage::new();

    let prefab_pathname = format!("{}/{}.prefab", folder, sanitize_name(&stage.name));
    let prefab_meta = MetaRecord::new(Guid::derive(namespace, &[&stage.name, "prefab"]), ImporterKind::Prefab)
        .with_format_version(version)
        .with_user_data(provenance.to_user_data());
    package.push(PackageAsset::new(
        &prefab_meta,
        prefab_pathname.clone(),
        Some(write_document(&builder.document).into_bytes()),
    ));

    for mesh in &builder.meshes {
        let meta = MetaRecord::new(
            mesh.guid,
            ImporterKind::NativeFormat {
                main_object_file_id: MESH_FILE_ID,
            },
        )
        .with_format_version(version);
        package.push(PackageAsset::new(
            &meta,
            mesh.pathname.clone(),
            Some(write_document(&mesh.asset.to_document()).into_bytes()),
        ));
    }

    for material in &builder.materials {
        let meta = MetaRecord::new(
            material.guid,
            ImporterKind::NativeFormat {
                main_object_file_id: MATERIAL_FILE_ID,
            },
        )
        .with_format_version(version);
        package.push(PackageAsset::new(
            &meta,
            material.pathname.clone(),
            Some(write_document(&material.asset.to_document()).into_bytes()),
        ));
    }

    // Folder entries for every directory below Assets/
    let mut folders: Vec<String> = Vec::new();
    let components: Vec<&str> = folder.split('/').collect();
    for i in 2..=components.len() {
        folders.push(components[..i].join("/"));
    }
    if !builder.meshes.is_empty() {
        folders.push(format!("{}/Meshes", folder));
    }
    if !builder.materials.is_empty() {
        folders.push(format!("{}/Materials", folder));
    }
    for pathname in folders {
        let meta = MetaRecord::new(Guid::derive(namespace, &["folder", &pathname]), ImporterKind::Folder)
            .with_format_version(version);
        package.push(PackageAsset::new(&meta, pathname, None));
    }

    let game_objects = builder.document.objects_of(UnityClass::GameObject).count();
    log::info!(
        "Translated stage {}: {} GameObjects, {} meshes, {} materials, {} unsupported",
        stage.name,
        game_objects,
        builder.meshes.len(),
        builder.materials.len(),
        builder.notes.len()
    );

    Ok(UnityExport {
        package,
        prefab_pathname,
        game_objects,
        meshes: builder.meshes.len(),
        materials: builder.materials.len(),
        notes: builder.notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unity::parse_document_bytes;
    use crate::usd::parse_usda;
    use usdpkg_math::{DQuat, Vec4};

    fn export(usda: &str) -> UnityExport {
        let stage = parse_usda(usda, "shot").unwrap();
        export_stage(&stage, &ConvertOptions::default()).unwrap()
    }

    fn prefab(export: &UnityExport) -> UnityDocument {
        let asset = export.package.find_by_pathname(&export.prefab_pathname).unwrap();
        parse_document_bytes(asset.asset.as_deref().unwrap()).unwrap()
    }

    fn position(document: &UnityDocument, name: &str) -> DVec3 {
        let go = document
            .objects_of(UnityClass::GameObject)
            .find(|o| o.name() == Some(name))
            .unwrap();
        let transform = document.get(go.component_refs()[0].file_id).unwrap();
        transform.get("m_LocalPosition").unwrap().to_dvec3().unwrap()
    }

    const MESH_AND_LIGHT: &str = r#"#usda 1.0
(
    upAxis = "Y"
    metersPerUnit = 1
)

def Xform "World"
{
    def Mesh "Tri"
    {
        int[] faceVertexCounts = [3]
        int[] faceVertexIndices = [0, 1, 2]
        point3f[] points = [(0, 0, 0), (1, 0, 0), (0, 1, 0)]
        rel material:binding = </World/Looks/Red>
    }

    def SphereLight "Key"
    {
        float inputs:intensity = 10
    }

    def Scope "Looks"
    {
        def Material "Red"
        {
            token outputs:surface.connect = </World/Looks/Red/Surface.outputs:surface>

            def Shader "Surface"
            {
                uniform token info:id = "UsdPreviewSurface"
                color3f inputs:diffuseColor = (1, 0, 0)
                float inputs:roughness = 0.25
                token outputs:surface
            }
        }
    }
}
"#;

    #[test]
    fn test_mesh_with_light_reports_one_note() {
        let export = export(MESH_AND_LIGHT);
        assert_eq!(export.notes.len(), 1);
        assert_eq!(export.notes[0].path, "/World/Key");
        assert_eq!(export.notes[0].type_name, "SphereLight");

        // World and Tri; Looks is consumed as a material library
        assert_eq!(export.game_objects, 2);
        assert_eq!(export.meshes, 1);
        assert_eq!(export.materials, 1);

        let document = prefab(&export);
        document.validate_references().unwrap();
        let tri = document
            .objects_of(UnityClass::GameObject)
            .find(|o| o.name() == Some("Tri"))
            .unwrap();
        assert_eq!(tri.component_refs().len(), 3);
    }

    #[test]
    fn test_package_layout() {
        let export = export(MESH_AND_LIGHT);
        let pathnames: Vec<&str> = export.package.assets.iter().map(|a| a.pathname.as_str()).collect();
        for expected in [
            "Assets/USD",
            "Assets/USD/shot",
            "Assets/USD/shot/shot.prefab",
            "Assets/USD/shot/Meshes",
            "Assets/USD/shot/Meshes/Tri.asset",
            "Assets/USD/shot/Materials",
            "Assets/USD/shot/Materials/Red.mat",
        ] {
            assert!(pathnames.contains(&expected), "missing {}", expected);
        }

        let material = export.package.find_by_pathname("Assets/USD/shot/Materials/Red.mat").unwrap();
        let document = parse_document_bytes(material.asset.as_deref().unwrap()).unwrap();
        let red = MaterialAsset::from_document(&document).unwrap();
        assert_eq!(red.color, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert!((red.glossiness - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_mesh_is_mirrored_and_rewound() {
        let export = export(MESH_AND_LIGHT);
        let asset = export.package.find_by_pathname("Assets/USD/shot/Meshes/Tri.asset").unwrap();
        let document = parse_document_bytes(asset.asset.as_deref().unwrap()).unwrap();
        let mesh = MeshAsset::from_document(&document).unwrap();
        assert_eq!(mesh.positions[1], Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(mesh.indices, vec![0, 2, 1]);
    }

    #[test]
    fn test_z_up_root_is_corrected() {
        let export = export(
            r#"#usda 1.0
(
    upAxis = "Z"
    metersPerUnit = 1
)
def Xform "Marker"
{
    double3 xformOp:translate = (0, 0, 5)
    uniform token[] xformOpOrder = ["xformOp:translate"]
}
"#,
        );
        let p = position(&prefab(&export), "Marker");
        assert!((p - DVec3::new(0.0, 5.0, 0.0)).length() < 1e-9, "{:?}", p);
    }

    #[test]
    fn test_units_and_mirror() {
        let export = export(
            r#"#usda 1.0
(
    metersPerUnit = 0.01
)
def Xform "Root"
{
    double3 xformOp:translate = (200, 0, 0)
    uniform token[] xformOpOrder = ["xformOp:translate"]

    def Xform "Child"
    {
        double3 xformOp:translate = (100, 0, 0)
        uniform token[] xformOpOrder = ["xformOp:translate"]
    }
}
"#,
        );
        let document = prefab(&export);
        assert!((position(&document, "Root") - DVec3::new(-2.0, 0.0, 0.0)).length() < 1e-9);
        // Children keep stage units; the root scale carries the conversion
        assert!((position(&document, "Child") - DVec3::new(-100.0, 0.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn test_multiple_roots_get_synthetic_root() {
        let export = export(
            "#usda 1.0\n(\n    metersPerUnit = 1\n)\ndef Xform \"A\"\n{\n}\ndef Xform \"B\"\n{\n}\n",
        );
        let document = prefab(&export);
        let names: Vec<&str> = document
            .objects_of(UnityClass::GameObject)
            .filter_map(UnityObject::name)
            .collect();
        assert_eq!(names, vec!["shot", "A", "B"]);

        let meta = export.package.find_by_pathname(&export.prefab_pathname).unwrap().meta_record().unwrap();
        let provenance = Provenance::from_user_data(meta.user_data.as_deref().unwrap()).unwrap();
        assert!(provenance.synthetic_root);
    }

    #[test]
    fn test_file_ids_count_from_one() {
        let export = export("#usda 1.0\ndef Xform \"A\"\n{\n    def Xform \"B\"\n    {\n    }\n}\n");
        let ids: Vec<i64> = prefab(&export).objects.iter().map(|o| o.file_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_guids_are_stable() {
        let a = export(MESH_AND_LIGHT);
        let b = export(MESH_AND_LIGHT);
        let guids = |e: &UnityExport| e.package.assets.iter().map(|a| a.guid).collect::<Vec<_>>();
        assert_eq!(guids(&a), guids(&b));
        assert_eq!(a.package.to_bytes().unwrap(), b.package.to_bytes().unwrap());
    }

    #[test]
    fn test_only_unsupported_roots_fail() {
        let stage = parse_usda("#usda 1.0\ndef Camera \"Cam\"\n{\n}\n", "shot").unwrap();
        let err = export_stage(&stage, &ConvertOptions::default()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedFeature);
    }

    #[test]
    fn test_invisible_prim_is_inactive() {
        let export = export("#usda 1.0\ndef Xform \"Hidden\"\n{\n    token visibility = \"invisible\"\n}\n");
        let document = prefab(&export);
        let go = document.objects_of(UnityClass::GameObject).next().unwrap();
        assert_eq!(go.get("m_IsActive").and_then(UnityValue::as_i64), Some(0));
    }

    #[test]
    fn test_rotation_is_mirrored() {
        let export = export(
            "#usda 1.0\n(\n    metersPerUnit = 1\n)\ndef Xform \"R\"\n{\n    float xformOp:rotateY = 90\n    uniform token[] xformOpOrder = [\"xformOp:rotateY\"]\n}\n",
        );
        let document = prefab(&export);
        let transform = document.objects_of(UnityClass::Transform).next().unwrap();
        let q = transform.get("m_LocalRotation").unwrap().to_dquat().unwrap();
        // Mirroring X negates the rotation about Y
        let expected = DQuat::from_rotation_y(-std::f64::consts::FRAC_PI_2);
        assert!(q.dot(expected).abs() > 1.0 - 1e-9, "{:?}", q);
    }
}
