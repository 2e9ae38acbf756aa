//! Conversion errors.
//!
//! Every lower-level error (USDA parser, Unity YAML codec, package archive,
//! USD bridge) folds into [`ConvertError`], whose [`ErrorKind`] is what
//! callers branch on.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::package::PackageError;
use crate::unity::{AssetError, MetaError, YamlError};
use crate::usd::bridge::BridgeError;
use crate::usd::{LoadError, ParseError};

/// Coarse error classification reported to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    IoError,
    FormatError,
    UnsupportedFeature,
    BridgeError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::IoError => "IoError",
            ErrorKind::FormatError => "FormatError",
            ErrorKind::UnsupportedFeature => "UnsupportedFeature",
            ErrorKind::BridgeError => "BridgeError",
        };
        f.write_str(name)
    }
}

/// A failed conversion.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("source not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("path escapes the destination directory: {0}")]
    PathTraversal(String),

    #[error("malformed input: {0}")]
    Format(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("bridge failure: {0}")]
    Bridge(String),
}

/// Result type for conversions.
pub type ConvertResult<T> = Result<T, ConvertError>;

impl ConvertError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ConvertError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::NotFound(_) => ErrorKind::NotFound,
            ConvertError::Io { .. } | ConvertError::PathTraversal(_) => ErrorKind::IoError,
            ConvertError::Format(_) => ErrorKind::FormatError,
            ConvertError::Unsupported(_) => ErrorKind::UnsupportedFeature,
            ConvertError::Bridge(_) => ErrorKind::BridgeError,
        }
    }
}

impl From<ParseError> for ConvertError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::Io(source) => ConvertError::io("reading USD layer", source),
            ParseError::BinaryCrate => {
                ConvertError::Bridge("binary crate layers need usdcat".to_string())
            }
            other => ConvertError::Format(other.to_string()),
        }
    }
}

impl From<LoadError> for ConvertError {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::Io(source) => ConvertError::io("reading USD layer", source),
            LoadError::Parse(e) => e.into(),
            LoadError::Bridge(e) => e.into(),
            LoadError::UnsupportedFormat(ext) => {
                ConvertError::Format(format!("not a USD layer: {}", ext))
            }
        }
    }
}

impl From<BridgeError> for ConvertError {
    fn from(e: BridgeError) -> Self {
        ConvertError::Bridge(e.to_string())
    }
}

impl From<YamlError> for ConvertError {
    fn from(e: YamlError) -> Self {
        ConvertError::Format(e.to_string())
    }
}

impl From<MetaError> for ConvertError {
    fn from(e: MetaError) -> Self {
        ConvertError::Format(e.to_string())
    }
}

impl From<AssetError> for ConvertError {
    fn from(e: AssetError) -> Self {
        ConvertError::Format(e.to_string())
    }
}

impl From<PackageError> for ConvertError {
    fn from(e: PackageError) -> Self {
        match e {
            PackageError::Io(source) => ConvertError::io("package I/O", source),
            PackageError::PathTraversal(path) => ConvertError::PathTraversal(path),
            other => ConvertError::Format(other.to_string()),
        }
    }
}

impl From<ConfigError> for ConvertError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Io(source) => ConvertError::io("reading options", source),
            other => ConvertError::Format(other.to_string()),
        }
    }
}

/// A prim or component that has no counterpart on the other side.
///
/// These are collected during translation; the node is skipped and the
/// conversion continues.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsupportedFeature {
    /// USD prim path or Unity object path (`Root/Child`)
    pub path: String,

    /// USD schema type or Unity class name
    pub type_name: String,
}

impl UnsupportedFeature {
    pub fn new(path: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            type_name: type_name.into(),
        }
    }
}

impl fmt::Display for UnsupportedFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: unsupported {}", self.path, self.type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            ConvertError::NotFound("/does/not/exist".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ConvertError::from(PackageError::PathTraversal("../../evil".into())).kind(),
            ErrorKind::IoError
        );
        assert_eq!(
            ConvertError::from(PackageError::NotGzip).kind(),
            ErrorKind::FormatError
        );
        assert_eq!(
            ConvertError::from(BridgeError::NotFound).kind(),
            ErrorKind::BridgeError
        );
    }

    #[test]
    fn test_parse_errors_are_format_errors() {
        let e = ConvertError::from(ParseError::UnexpectedEof);
        assert_eq!(e.kind(), ErrorKind::FormatError);
    }

    #[test]
    fn test_display() {
        let note = UnsupportedFeature::new("/World/Key", "SphereLight");
        assert_eq!(note.to_string(), "/World/Key: unsupported SphereLight");
        assert_eq!(ErrorKind::UnsupportedFeature.to_string(), "UnsupportedFeature");
    }
}
