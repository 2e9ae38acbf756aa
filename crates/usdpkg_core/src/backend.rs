//! Conversion backends.
//!
//! The facade never decides how a conversion runs; it asks the backend it
//! was built with. [`NativeBackend`] does the real work, [`MockBackend`]
//! answers without touching the filesystem.

use std::path::Path;

use crate::config::ConvertOptions;
use crate::convert::{ConversionReport, Operation};
use crate::error::{ConvertError, ConvertResult};
use crate::package::UnityPackage;
use crate::translate::{export_stage, import_source, UnitySource};
use crate::usd::bridge::UsdcatBridge;
use crate::usd::{load_stage, save_usda};

/// Whether a backend can run conversions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// Conversions run for real
    Ready,

    /// Conversions return canned results without I/O
    Mock,

    /// Conversions cannot run; the reason is reported as a bridge error
    Unavailable(String),
}

/// A strategy for running the three conversions.
pub trait ConversionBackend: Send + Sync {
    fn name(&self) -> &str;

    fn readiness(&self) -> Readiness;

    fn usd_to_unity_package(&self, source: &Path, dest: &Path) -> ConvertResult<ConversionReport>;

    fn unity_to_usd(&self, source: &Path, dest: &Path) -> ConvertResult<ConversionReport>;

    fn import_unity_package(&self, archive: &Path, output_dir: &Path) -> ConvertResult<ConversionReport>;
}

/// In-process conversions. Binary USD layers go through `usdcat`.
#[derive(Debug)]
pub struct NativeBackend {
    options: ConvertOptions,
    bridge: UsdcatBridge,
}

impl NativeBackend {
    pub fn new(options: ConvertOptions, bridge: UsdcatBridge) -> Self {
        Self { options, bridge }
    }
}

fn is_scene_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref(),
        Some("prefab" | "unity")
    )
}

impl ConversionBackend for NativeBackend {
    fn name(&self) -> &str {
        "native"
    }

    fn readiness(&self) -> Readiness {
        Readiness::Ready
    }

    fn usd_to_unity_package(&self, source: &Path, dest: &Path) -> ConvertResult<ConversionReport> {
        let stage = load_stage(source, Some(&self.bridge))?;
        let export = export_stage(&stage, &self.options)?;
        export.package.write_to_path(dest)?;

        let summary = format!(
            "Wrote {} ({} assets: {} GameObjects, {} meshes, {} materials)",
            dest.display(),
            export.package.len(),
            export.game_objects,
            export.meshes,
            export.materials
        );
        Ok(ConversionReport::new(Operation::UsdToUnityPackage, summary)
            .with_outputs(vec![dest.to_path_buf()])
            .with_notes(export.notes))
    }

    fn unity_to_usd(&self, source: &Path, dest: &Path) -> ConvertResult<ConversionReport> {
        let unity = if is_scene_file(source) {
            UnitySource::from_loose_file(source)?
        } else {
            UnitySource::from_package(&UnityPackage::open(source)?)?
        };
        let import = import_source(&unity, &self.options)?;
        save_usda(&import.stage, dest)
            .map_err(|e| ConvertError::io(format!("writing {}", dest.display()), e))?;

        let summary = format!(
            "Wrote {} ({} prims from {} scene(s))",
            dest.display(),
            import.prims,
            unity.scenes.len()
        );
        Ok(ConversionReport::new(Operation::UnityToUsd, summary)
            .with_outputs(vec![dest.to_path_buf()])
            .with_notes(import.notes))
    }

    fn import_unity_package(&self, archive: &Path, output_dir: &Path) -> ConvertResult<ConversionReport> {
        let package = UnityPackage::open(archive)?;
        let written = package.extract_to(output_dir, self.options.keep_previews)?;

        let summary = format!(
            "Extracted {} assets ({} files) to {}",
            package.len(),
            written.len(),
            output_dir.display()
        );
        Ok(ConversionReport::new(Operation::ImportUnityPackage, summary).with_outputs(written))
    }
}

/// Canned answers for tests and dry runs. Never reads or writes files.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockBackend;

impl ConversionBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn readiness(&self) -> Readiness {
        Readiness::Mock
    }

    fn usd_to_unity_package(&self, source: &Path, dest: &Path) -> ConvertResult<ConversionReport> {
        Ok(ConversionReport::new(
            Operation::UsdToUnityPackage,
            format!("[mock] {} -> {}", source.display(), dest.display()),
        ))
    }

    fn unity_to_usd(&self, source: &Path, dest: &Path) -> ConvertResult<ConversionReport> {
        Ok(ConversionReport::new(
            Operation::UnityToUsd,
            format!("[mock] {} -> {}", source.display(), dest.display()),
        ))
    }

    fn import_unity_package(&self, archive: &Path, output_dir: &Path) -> ConvertResult<ConversionReport> {
        Ok(ConversionReport::new(
            Operation::ImportUnityPackage,
            format!("[mock] {} -> {}", archive.display(), output_dir.display()),
        ))
    }
}
