//! USD tool bridge - subprocess wrapper around `usdcat`.
//!
//! Binary crate layers (`.usdc`, binary `.usd`) can't be read by the USDA
//! parser. When the USD distribution is installed, `usdcat` flattens them to
//! text which is then parsed natively.
//!
//! The tool is invoked with a fixed argument list; paths are passed as
//! arguments and never interpolated into a command string.
//!
//! # Example
//!
//! ```ignore
//! use usdpkg_core::usd::bridge::UsdcatBridge;
//!
//! let bridge = UsdcatBridge::discover();
//! let text = bridge.flatten_to_usda("scene.usdc".as_ref())?;
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::backend::Readiness;

/// Errors raised by the external USD tools.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("usdcat was not found on PATH")]
    NotFound,

    #[error("usdcat is unavailable: {0}")]
    Unavailable(String),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {output}")]
    Failed {
        program: String,
        status: String,
        output: String,
    },

    #[error("unreadable output from {program}: {source}")]
    Output {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Handle to the `usdcat` executable, if one was found.
#[derive(Clone, Debug, Default)]
pub struct UsdcatBridge {
    executable: Option<PathBuf>,
}

impl UsdcatBridge {
    pub const PROGRAM: &'static str = "usdcat";

    /// Look up `usdcat` on `PATH`.
    pub fn discover() -> Self {
        match which::which(Self::PROGRAM) {
            Ok(path) => {
                log::debug!("Found {} at {}", Self::PROGRAM, path.display());
                Self {
                    executable: Some(path),
                }
            }
            Err(e) => {
                log::debug!("{} not available: {}", Self::PROGRAM, e);
                Self::unavailable()
            }
        }
    }

    pub fn with_executable(path: impl Into<PathBuf>) -> Self {
        Self {
            executable: Some(path.into()),
        }
    }

    /// A bridge with no tool behind it.
    pub fn unavailable() -> Self {
        Self { executable: None }
    }

    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    pub fn readiness(&self) -> Readiness {
        match &self.executable {
            Some(path) if path.is_file() => Readiness::Ready,
            Some(path) => Readiness::Unavailable(format!("{} does not exist", path.display())),
            None => Readiness::Unavailable(format!("{} was not found on PATH", Self::PROGRAM)),
        }
    }

    /// Flatten any USD layer to USDA text.
    ///
    /// Runs `usdcat <input> --flatten -o <tmp>/flattened.usda` and reads the
    /// result. The temporary directory is removed on return.
    pub fn flatten_to_usda(&self, input: &Path) -> Result<String, BridgeError> {
        let executable = self.executable.as_ref().ok_or(BridgeError::NotFound)?;
        let program = executable.display().to_string();

        let dir = tempfile::tempdir().map_err(|source| BridgeError::Spawn {
            program: program.clone(),
            source,
        })?;
        let output_path = dir.path().join("flattened.usda");

        let args: Vec<OsString> = vec![
            input.as_os_str().to_owned(),
            "--flatten".into(),
            "-o".into(),
            output_path.as_os_str().to_owned(),
        ];

        log::debug!("Running {} on {}", program, input.display());
        let output = duct::cmd(executable, args)
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked()
            .run()
            .map_err(|source| BridgeError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(BridgeError::Failed {
                program,
                status: output.status.to_string(),
                output: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            });
        }

        std::fs::read_to_string(&output_path).map_err(|source| BridgeError::Output { program, source })
    }
}
