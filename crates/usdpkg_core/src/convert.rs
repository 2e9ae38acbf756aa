//! Conversion facade.
//!
//! [`Converter`] validates arguments, consults its backend's
//! [`Readiness`] and runs the requested conversion. Every failure comes
//! back as a [`ConvertError`]; nothing escapes as a panic.
//!
//! ```ignore
//! use usdpkg_core::{ConvertOptions, Converter};
//!
//! let converter = Converter::detect(ConvertOptions::default());
//! let report = converter.usd_to_unity_package("shot.usda", "shot.unitypackage")?;
//! println!("{}", report);
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use crate::backend::{ConversionBackend, MockBackend, NativeBackend, Readiness};
use crate::config::ConvertOptions;
use crate::error::{ConvertError, ConvertResult, UnsupportedFeature};
use crate::usd::bridge::UsdcatBridge;

/// The three conversions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    UsdToUnityPackage,
    UnityToUsd,
    ImportUnityPackage,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::UsdToUnityPackage => "usd_to_unity_package",
            Operation::UnityToUsd => "unity_to_usd",
            Operation::ImportUnityPackage => "import_unity_package",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful conversion.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversionReport {
    pub operation: Operation,

    /// Free-form, human-readable summary
    pub summary: String,

    /// Files and directories written
    pub outputs: Vec<PathBuf>,

    /// Nodes skipped because they have no counterpart
    pub notes: Vec<UnsupportedFeature>,
}

impl ConversionReport {
    pub fn new(operation: Operation, summary: impl Into<String>) -> Self {
        Self {
            operation,
            summary: summary.into(),
            outputs: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_outputs(mut self, outputs: Vec<PathBuf>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_notes(mut self, notes: Vec<UnsupportedFeature>) -> Self {
        self.notes = notes;
        self
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary)?;
        if !self.notes.is_empty() {
            write!(f, "\n{} unsupported feature(s) skipped:", self.notes.len())?;
            for note in &self.notes {
                write!(f, "\n  {}", note)?;
            }
        }
        Ok(())
    }
}

/// Entry point for all conversions.
pub struct Converter {
    backend: Box<dyn ConversionBackend>,
}

impl Converter {
    pub fn new(backend: Box<dyn ConversionBackend>) -> Self {
        Self { backend }
    }

    /// Native backend, with `usdcat` from `PATH` when installed.
    pub fn detect(options: ConvertOptions) -> Self {
        Self::native(options, UsdcatBridge::discover())
    }

    pub fn native(options: ConvertOptions, bridge: UsdcatBridge) -> Self {
        Self::new(Box::new(NativeBackend::new(options, bridge)))
    }

    pub fn mock() -> Self {
        Self::new(Box::new(MockBackend))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn readiness(&self) -> Readiness {
        self.backend.readiness()
    }

    /// Convert a USD layer into a `.unitypackage`.
    pub fn usd_to_unity_package(
        &self,
        source: impl AsRef<Path>,
        dest: impl AsRef<Path>,
    ) -> ConvertResult<ConversionReport> {
        self.run(Operation::UsdToUnityPackage, source.as_ref(), dest.as_ref())
    }

    /// Convert a `.unitypackage`, `.prefab` or `.unity` file into a USDA layer.
    pub fn unity_to_usd(&self, source: impl AsRef<Path>, dest: impl AsRef<Path>) -> ConvertResult<ConversionReport> {
        self.run(Operation::UnityToUsd, source.as_ref(), dest.as_ref())
    }

    /// Extract a `.unitypackage` into a directory, keeping asset pathnames.
    pub fn import_unity_package(
        &self,
        archive: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> ConvertResult<ConversionReport> {
        self.run(Operation::ImportUnityPackage, archive.as_ref(), output_dir.as_ref())
    }

    fn run(&self, operation: Operation, source: &Path, dest: &Path) -> ConvertResult<ConversionReport> {
        if source.as_os_str().is_empty() {
            return Err(ConvertError::NotFound(source.to_path_buf()));
        }
        if dest.as_os_str().is_empty() {
            return Err(ConvertError::io(
                "no destination given",
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty path"),
            ));
        }

        match self.backend.readiness() {
            Readiness::Unavailable(reason) => {
                log::error!("{}: backend {} unavailable: {}", operation, self.backend.name(), reason);
                return Err(ConvertError::Bridge(reason));
            }
            Readiness::Mock => {
                log::debug!("{}: mock backend", operation);
            }
            Readiness::Ready => {
                if !source.exists() {
                    return Err(ConvertError::NotFound(source.to_path_buf()));
                }
            }
        }

        log::info!("{}: {} -> {}", operation, source.display(), dest.display());
        let result = match operation {
            Operation::UsdToUnityPackage => self.backend.usd_to_unity_package(source, dest),
            Operation::UnityToUsd => self.backend.unity_to_usd(source, dest),
            Operation::ImportUnityPackage => self.backend.import_unity_package(source, dest),
        };

        match &result {
            Ok(report) => log::info!("{}", report.summary),
            Err(e) => log::error!("{} failed ({}): {}", operation, e.kind(), e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::package::UnityPackage;
    use crate::usd::load_usda;

    const SCENE: &str = r#"#usda 1.0
(
    defaultPrim = "World"
    metersPerUnit = 1
    upAxis = "Z"
)

def Xform "World"
{
    double3 xformOp:translate = (0, 0, 5)
    uniform token[] xformOpOrder = ["xformOp:translate"]

    def Mesh "Tri"
    {
        double3 xformOp:translate = (1, 2, 3)
        float xformOp:rotateX = 30
        uniform token[] xformOpOrder = ["xformOp:translate", "xformOp:rotateX"]
        int[] faceVertexCounts = [3]
        int[] faceVertexIndices = [0, 1, 2]
        point3f[] points = [(0, 0, 0), (1, 0, 0), (0, 1, 0)]
    }

    def SphereLight "Key"
    {
    }
}
"#;

    fn converter() -> Converter {
        Converter::native(ConvertOptions::default(), UsdcatBridge::unavailable())
    }

    fn write_scene(dir: &Path) -> PathBuf {
        let path = dir.join("shot.usda");
        std::fs::write(&path, SCENE).unwrap();
        path
    }

    #[test]
    fn test_missing_source_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.unitypackage");

        let err = converter().usd_to_unity_package("/does/not/exist", &dest).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!dest.exists());
    }

    #[test]
    fn test_empty_arguments() {
        let c = converter();
        assert_eq!(c.unity_to_usd("", "out.usda").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(c.unity_to_usd("in.unitypackage", "").unwrap_err().kind(), ErrorKind::IoError);
    }

    #[test]
    fn test_export_with_unsupported_light() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_scene(dir.path());
        let dest = dir.path().join("shot.unitypackage");

        let report = converter().usd_to_unity_package(&source, &dest).unwrap();
        assert_eq!(report.notes.len(), 1);
        assert_eq!(report.outputs, vec![dest.clone()]);
        assert!(report.to_string().contains("/World/Key: unsupported SphereLight"));

        let package = UnityPackage::open(&dest).unwrap();
        assert!(package.find_by_pathname("Assets/USD/shot/Meshes/Tri.asset").is_some());
    }

    #[test]
    fn test_export_twice_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_scene(dir.path());
        let a = dir.path().join("a.unitypackage");
        let b = dir.path().join("b.unitypackage");

        converter().usd_to_unity_package(&source, &a).unwrap();
        converter().usd_to_unity_package(&source, &b).unwrap();

        let metas = |path: &Path| {
            UnityPackage::open(path)
                .unwrap()
                .assets
                .iter()
                .map(|asset| asset.meta.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(metas(&a), metas(&b));
        assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
    }

    #[test]
    fn test_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_scene(dir.path());
        let package = dir.path().join("shot.unitypackage");
        let back = dir.path().join("back.usda");

        let c = converter();
        c.usd_to_unity_package(&source, &package).unwrap();
        let report = c.unity_to_usd(&package, &back).unwrap();
        assert!(report.notes.is_empty());

        let original = load_usda(&source).unwrap();
        let converted = load_usda(&back).unwrap();
        assert_eq!(converted.up_axis, original.up_axis);

        // The light was dropped on the way out
        assert_eq!(converted.prim_count(), original.prim_count() - 1);
        for path in ["/World", "/World/Tri"] {
            let a = original.prim_at(path).unwrap().local_transform().to_cols_array();
            let b = converted.prim_at(path).unwrap().local_transform().to_cols_array();
            for (x, y) in a.iter().zip(b.iter()) {
                assert!((x - y).abs() < 1e-5, "{}: {:?} != {:?}", path, a, b);
            }
        }
    }

    #[test]
    fn test_import_preserves_pathnames() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_scene(dir.path());
        let package = dir.path().join("shot.unitypackage");
        let project = dir.path().join("project");

        let c = converter();
        c.usd_to_unity_package(&source, &package).unwrap();
        let report = c.import_unity_package(&package, &project).unwrap();

        assert!(project.join("Assets/USD/shot/shot.prefab").is_file());
        assert!(project.join("Assets/USD/shot/shot.prefab.meta").is_file());
        assert!(project.join("Assets/USD/shot/Meshes/Tri.asset").is_file());
        assert!(report.outputs.iter().all(|p| p.starts_with(&project)));

        // The extracted prefab converts on its own
        let back = dir.path().join("loose.usda");
        c.unity_to_usd(project.join("Assets/USD/shot/shot.prefab"), &back).unwrap();
        assert_eq!(load_usda(&back).unwrap().prim_count(), 2);
    }

    #[test]
    fn test_traversal_archive_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("evil.unitypackage");
        let out = dir.path().join("a").join("b");

        let mut builder = tar::Builder::new(flate2::write::GzEncoder::new(
            Vec::new(),
            flate2::Compression::default(),
        ));
        let name = b"../../evil";
        let mut header = tar::Header::new_gnu();
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.set_mode(0o644);
        header.set_size(4);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append(&header, &b"boom"[..]).unwrap();
        std::fs::write(&archive, builder.into_inner().unwrap().finish().unwrap()).unwrap();

        let err = converter().import_unity_package(&archive, &out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoError);
        assert!(!out.exists());
        assert!(!dir.path().join("evil").exists());
    }

    #[test]
    fn test_non_gzip_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("plain.unitypackage");
        std::fs::write(&archive, "not an archive").unwrap();

        let err = converter().import_unity_package(&archive, dir.path().join("out")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatError);
    }

    #[test]
    fn test_unwritable_destination_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_scene(dir.path());
        let missing = dir.path().join("missing");
        let package = missing.join("shot.unitypackage");

        let c = converter();
        let err = c.usd_to_unity_package(&source, &package).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoError);
        assert!(!missing.exists());

        let good = dir.path().join("shot.unitypackage");
        c.usd_to_unity_package(&source, &good).unwrap();
        let err = c.unity_to_usd(&good, missing.join("back.usda")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoError);
        assert!(!missing.exists());
    }

    #[test]
    fn test_camera_only_stage_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("camera.usda");
        std::fs::write(&source, "#usda 1.0\ndef Camera \"Cam\"\n{\n}\n").unwrap();
        let dest = dir.path().join("camera.unitypackage");

        let err = converter().usd_to_unity_package(&source, &dest).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_cyclic_prefab_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let prefab = dir.path().join("loop.prefab");
        std::fs::write(
            &prefab,
            "%YAML 1.1
%TAG !u! tag:unity3d.com,2011:
--- !u!1 &1
GameObject:
  m_Component:
  - component: {fileID: 2}
  m_Name: Loop
--- !u!4 &2
Transform:
  m_GameObject: {fileID: 1}
  m_Children:
  - {fileID: 2}
  m_Father: {fileID: 0}
",
        )
        .unwrap();
        let dest = dir.path().join("loop.usda");

        let err = converter().unity_to_usd(&prefab, &dest).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatError);
        assert!(!dest.exists());
    }

    #[test]
    fn test_oversized_mesh_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_scene(dir.path());
        let package = dir.path().join("shot.unitypackage");
        let project = dir.path().join("project");

        let c = converter();
        c.usd_to_unity_package(&source, &package).unwrap();
        c.import_unity_package(&package, &project).unwrap();

        let mesh = project.join("Assets/USD/shot/Meshes/Tri.asset");
        let text = std::fs::read_to_string(&mesh).unwrap();
        assert!(text.contains("m_VertexCount: 3"));
        std::fs::write(&mesh, text.replace("m_VertexCount: 3", "m_VertexCount: 4611686018427387904")).unwrap();

        let dest = dir.path().join("back.usda");
        let err = c.unity_to_usd(project.join("Assets/USD/shot/shot.prefab"), &dest).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatError);
        assert!(!dest.exists());
    }

    #[test]
    fn test_empty_archive_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("empty.unitypackage");
        let gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        std::fs::write(&archive, gz.finish().unwrap()).unwrap();

        let out = dir.path().join("out");
        let err = converter().import_unity_package(&archive, &out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatError);
        assert!(!out.exists());
    }

    #[test]
    fn test_binary_layer_without_usdcat() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("shot.usdc");
        std::fs::write(&source, b"PXR-USDC\0\0").unwrap();

        let err = converter()
            .usd_to_unity_package(&source, dir.path().join("out.unitypackage"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BridgeError);
    }

    #[test]
    fn test_mock_does_no_io() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.unitypackage");
        let c = Converter::mock();
        assert_eq!(c.readiness(), Readiness::Mock);

        let report = c.usd_to_unity_package("/does/not/exist.usda", &dest).unwrap();
        assert_eq!(report.operation, Operation::UsdToUnityPackage);
        assert!(report.outputs.is_empty());
        assert!(!dest.exists());

        c.import_unity_package("/does/not/exist.unitypackage", dir.path().join("x")).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    struct OfflineBackend;

    impl ConversionBackend for OfflineBackend {
        fn name(&self) -> &str {
            "offline"
        }

        fn readiness(&self) -> Readiness {
            Readiness::Unavailable("interpreter not started".into())
        }

        fn usd_to_unity_package(&self, _: &Path, _: &Path) -> ConvertResult<ConversionReport> {
            panic!("must not run while unavailable")
        }

        fn unity_to_usd(&self, _: &Path, _: &Path) -> ConvertResult<ConversionReport> {
            panic!("must not run while unavailable")
        }

        fn import_unity_package(&self, _: &Path, _: &Path) -> ConvertResult<ConversionReport> {
            panic!("must not run while unavailable")
        }
    }

    #[test]
    fn test_unavailable_backend_is_bridge_error() {
        let c = Converter::new(Box::new(OfflineBackend));
        let err = c.unity_to_usd("in.unitypackage", "out.usda").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BridgeError);
        assert!(err.to_string().contains("interpreter not started"));
    }

    #[test]
    fn test_converter_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Converter>();
    }
}
