//! `.meta` sidecar files and asset GUIDs.
//!
//! ```text
//! fileFormatVersion: 2
//! guid: 5f1c0e5b9e6a5d3b8c2f6a1e4d7b9c0a
//! NativeFormatImporter:
//!   externalObjects: {}
//!   mainObjectFileID: 4300000
//!   userData:
//!   assetBundleName:
//!   assetBundleVariant:
//! ```

use std::fmt;
use std::str::FromStr;

use serde_yaml::Value;
use thiserror::Error;
use uuid::Uuid;

use super::yaml::quote_hex_values;

/// `fileFormatVersion` Unity has written since 5.x.
pub const FILE_FORMAT_VERSION: u32 = 2;

/// A 128-bit asset GUID, rendered as 32 lowercase hex characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid(Uuid);

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid GUID '{0}': expected 32 hex characters")]
pub struct InvalidGuid(pub String);

impl Guid {
    pub const NIL: Guid = Guid(Uuid::nil());

    /// Derive a stable GUID from a namespace salt and naming parts.
    ///
    /// Equal inputs always give equal GUIDs (UUID version 5 over
    /// `salt/part/part/...`).
    pub fn derive(salt: &str, parts: &[&str]) -> Self {
        let mut name = String::from(salt);
        for part in parts {
            name.push('/');
            name.push_str(part);
        }
        Guid(Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()))
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Guid(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0.as_bytes()))
    }
}

impl FromStr for Guid {
    type Err = InvalidGuid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 16];
        if s.len() != 32 {
            return Err(InvalidGuid(s.to_string()));
        }
        hex::decode_to_slice(s, &mut bytes).map_err(|_| InvalidGuid(s.to_string()))?;
        Ok(Guid::from_bytes(bytes))
    }
}

/// Importer section of a `.meta` file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImporterKind {
    /// `.prefab` assets
    Prefab,

    /// Unity-native serialized assets (`.asset`, `.mat`)
    NativeFormat { main_object_file_id: i64 },

    /// Assets Unity has no importer for
    Default,

    /// `folderAsset: yes` directory entries
    Folder,

    /// Any other importer (`ModelImporter`, `TextureImporter`, ...)
    Other(String),
}

impl ImporterKind {
    pub fn section_name(&self) -> &str {
        match self {
            ImporterKind::Prefab => "PrefabImporter",
            ImporterKind::NativeFormat { .. } => "NativeFormatImporter",
            ImporterKind::Default | ImporterKind::Folder => "DefaultImporter",
            ImporterKind::Other(name) => name,
        }
    }
}

#[derive(Error, Debug)]
pub enum MetaError {
    #[error("meta file has no guid")]
    MissingGuid,

    #[error(transparent)]
    InvalidGuid(#[from] InvalidGuid),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Invalid(String),

    #[error("meta file is not UTF-8 text")]
    NotText,
}

/// Contents of one `.meta` file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaRecord {
    pub file_format_version: u32,
    pub guid: Guid,
    pub importer: ImporterKind,

    /// Free-form importer `userData`
    pub user_data: Option<String>,
}

impl MetaRecord {
    pub fn new(guid: Guid, importer: ImporterKind) -> Self {
        Self {
            file_format_version: FILE_FORMAT_VERSION,
            guid,
            importer,
            user_data: None,
        }
    }

    pub fn with_user_data(mut self, user_data: impl Into<String>) -> Self {
        self.user_data = Some(user_data.into());
        self
    }

    pub fn with_format_version(mut self, version: u32) -> Self {
        self.file_format_version = version;
        self
    }

    pub fn is_folder(&self) -> bool {
        self.importer == ImporterKind::Folder
    }

    pub fn to_text(&self) -> String {
        let mut out = format!(
            "fileFormatVersion: {}\nguid: {}\n",
            self.file_format_version, self.guid
        );
        if self.is_folder() {
            out.push_str("folderAsset: yes\n");
        }
        out.push_str(self.importer.section_name());
        out.push_str(":\n  externalObjects: {}\n");
        if let ImporterKind::NativeFormat { main_object_file_id } = self.importer {
            out.push_str(&format!("  mainObjectFileID: {}\n", main_object_file_id));
        }
        match &self.user_data {
            Some(data) => out.push_str(&format!("  userData: '{}'\n", data.replace('\'', "''"))),
            None => out.push_str("  userData: \n"),
        }
        out.push_str("  assetBundleName: \n  assetBundleVariant: \n");
        out
    }

    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, MetaError> {
        let text = std::str::from_utf8(bytes).map_err(|_| MetaError::NotText)?;
        Self::parse(text.strip_prefix('\u{feff}').unwrap_or(text))
    }

    /// Parse a `.meta` file. Only the GUID, the importer section and its
    /// `mainObjectFileID`/`userData` are read; everything else is ignored.
    pub fn parse(text: &str) -> Result<Self, MetaError> {
        let quoted: String = text
            .lines()
            .map(|line| quote_hex_values(line) + "\n")
            .collect();
        let value: Value = serde_yaml::from_str(&quoted)?;
        let Value::Mapping(root) = value else {
            return Err(MetaError::Invalid("top level is not a mapping".to_string()));
        };

        let file_format_version = match root.get("fileFormatVersion") {
            None | Some(Value::Null) => FILE_FORMAT_VERSION,
            Some(v) => v
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| MetaError::Invalid(format!("invalid fileFormatVersion {:?}", v)))?,
        };

        let guid = match root.get("guid") {
            None | Some(Value::Null) => return Err(MetaError::MissingGuid),
            Some(Value::String(s)) => s.parse::<Guid>()?,
            Some(other) => return Err(MetaError::Invalid(format!("invalid guid {:?}", other))),
        };

        let folder = match root.get("folderAsset") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "yes",
            _ => false,
        };

        // The importer section is the first top-level mapping, or an empty `*Importer:`
        let section = root.iter().find_map(|(key, value)| {
            let name = key.as_str()?;
            match value {
                Value::Mapping(body) => Some((name, Some(body))),
                Value::Null if name.ends_with("Importer") => Some((name, None)),
                _ => None,
            }
        });
        let section_value = |key: &str| section.and_then(|(_, body)| body?.get(key));

        let main_object_file_id = section_value("mainObjectFileID").and_then(Value::as_i64);
        let user_data = match section_value("userData") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        };

        let importer = if folder {
            ImporterKind::Folder
        } else {
            match section.map(|(name, _)| name) {
                Some("PrefabImporter") => ImporterKind::Prefab,
                Some("NativeFormatImporter") => ImporterKind::NativeFormat {
                    main_object_file_id: main_object_file_id.unwrap_or(0),
                },
                Some("DefaultImporter") | None => ImporterKind::Default,
                Some(other) => ImporterKind::Other(other.to_string()),
            }
        };

        Ok(Self {
            file_format_version,
            guid,
            importer,
            user_data,
        })
    }
}
