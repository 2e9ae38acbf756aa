//! `.unitypackage` archives.
//!
//! A Unity package is a gzip-compressed tar with one directory per asset:
//!
//! ```text
//! <guid>/asset         asset bytes (absent for folders)
//! <guid>/asset.meta    the .meta sidecar
//! <guid>/pathname      project path, e.g. Assets/USD/shot/shot.prefab
//! <guid>/preview.png   optional thumbnail
//! ```
//!
//! Archives that name the directory after the asset path instead
//! (`<pathname>/asset`) are read as well.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

use flate2::{read::GzDecoder, Compression, GzBuilder};
use thiserror::Error;

use crate::unity::{Guid, MetaError, MetaRecord};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a gzip archive")]
    NotGzip,

    #[error("malformed archive: {0}")]
    Malformed(String),

    #[error("member path escapes the destination: {0}")]
    PathTraversal(String),

    #[error("{0}: asset has no asset.meta")]
    MissingMeta(String),

    #[error("{path}: {source}")]
    Meta {
        path: String,
        #[source]
        source: MetaError,
    },
}

/// One asset entry of a package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageAsset {
    pub guid: Guid,

    /// Project-relative path (`Assets/...`)
    pub pathname: String,

    /// Asset bytes; `None` for folder entries
    pub asset: Option<Vec<u8>>,

    /// `.meta` text
    pub meta: Vec<u8>,

    pub preview: Option<Vec<u8>>,
}

impl PackageAsset {
    pub fn new(record: &MetaRecord, pathname: impl Into<String>, asset: Option<Vec<u8>>) -> Self {
        Self {
            guid: record.guid,
            pathname: pathname.into(),
            asset,
            meta: record.to_text().into_bytes(),
            preview: None,
        }
    }

    pub fn meta_record(&self) -> Result<MetaRecord, PackageError> {
        MetaRecord::parse_bytes(&self.meta).map_err(|source| PackageError::Meta {
            path: self.pathname.clone(),
            source,
        })
    }

    pub fn is_folder(&self) -> bool {
        self.asset.is_none()
    }

    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.pathname).extension().and_then(|e| e.to_str())
    }
}

/// An in-memory Unity package.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnityPackage {
    pub assets: Vec<PackageAsset>,
}

impl UnityPackage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, asset: PackageAsset) {
        self.assets.push(asset);
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, guid: &Guid) -> Option<&PackageAsset> {
        self.assets.iter().find(|a| &a.guid == guid)
    }

    pub fn find_by_pathname(&self, pathname: &str) -> Option<&PackageAsset> {
        self.assets.iter().find(|a| a.pathname == pathname)
    }

    /// Assets in archive order: by pathname, then GUID.
    fn sorted(&self) -> Vec<&PackageAsset> {
        let mut assets: Vec<&PackageAsset> = self.assets.iter().collect();
        assets.sort_by(|a, b| a.pathname.cmp(&b.pathname).then(a.guid.cmp(&b.guid)));
        assets
    }

    /// Write the package as gzip-compressed tar.
    ///
    /// Output depends only on the package contents: members are sorted, and
    /// every header carries a fixed mode, owner and zero mtime.
    pub fn write<W: Write>(&self, writer: W) -> Result<W, PackageError> {
        let encoder = GzBuilder::new().mtime(0).write(writer, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.mode(tar::HeaderMode::Deterministic);

        for asset in self.sorted() {
            let dir = asset.guid.to_string();
            if let Some(data) = &asset.asset {
                append_member(&mut builder, &format!("{}/asset", dir), data)?;
            }
            append_member(&mut builder, &format!("{}/asset.meta", dir), &asset.meta)?;
            append_member(&mut builder, &format!("{}/pathname", dir), asset.pathname.as_bytes())?;
            if let Some(preview) = &asset.preview {
                append_member(&mut builder, &format!("{}/preview.png", dir), preview)?;
            }
        }

        let encoder = builder.into_inner()?;
        Ok(encoder.finish()?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PackageError> {
        self.write(Vec::new())
    }

    /// Write the package to `path`.
    ///
    /// The archive goes to a temporary file in the same directory and is
    /// renamed into place once complete.
    pub fn write_to_path(&self, path: &Path) -> Result<(), PackageError> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        let bytes = self.to_bytes()?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| PackageError::Io(e.error))?;
        log::debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    pub fn open(path: &Path) -> Result<Self, PackageError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, PackageError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    /// Parse a package held in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self, PackageError> {
        if !data.starts_with(&GZIP_MAGIC) {
            return Err(PackageError::NotGzip);
        }

        let malformed = |e: std::io::Error| PackageError::Malformed(e.to_string());
        let mut archive = tar::Archive::new(GzDecoder::new(data));
        let mut groups: BTreeMap<String, MemberGroup> = BTreeMap::new();

        for entry in archive.entries().map_err(malformed)? {
            let mut entry = entry.map_err(malformed)?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let path = entry.path().map_err(malformed)?.into_owned();
            validate_member_path(&path)?;

            let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            let dir = path
                .parent()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            if dir.is_empty() {
                log::debug!("Skipping top-level member {}", path.display());
                continue;
            }

            let mut data = Vec::new();
            entry.read_to_end(&mut data).map_err(malformed)?;

            let group = groups.entry(dir).or_default();
            match file_name.as_str() {
                "asset" => group.asset = Some(data),
                "asset.meta" => group.meta = Some(data),
                "pathname" => group.pathname = Some(data),
                "preview.png" => group.preview = Some(data),
                other => log::debug!("Ignoring member {}", other),
            }
        }

        let mut package = UnityPackage::new();
        for (dir, group) in groups {
            let meta = group.meta.ok_or_else(|| PackageError::MissingMeta(dir.clone()))?;
            let record = MetaRecord::parse_bytes(&meta).map_err(|source| PackageError::Meta {
                path: dir.clone(),
                source,
            })?;

            // Unity appends a line with a checksum to some pathname members
            let pathname = match &group.pathname {
                Some(bytes) => String::from_utf8_lossy(bytes)
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                None => dir.clone(),
            };
            if pathname.is_empty() {
                return Err(PackageError::Malformed(format!("{}: empty pathname", dir)));
            }
            validate_member_path(Path::new(&pathname))?;

            if package.get(&record.guid).is_some() {
                return Err(PackageError::Malformed(format!("duplicate GUID {}", record.guid)));
            }

            package.push(PackageAsset {
                guid: record.guid,
                pathname,
                asset: group.asset,
                meta,
                preview: group.preview,
            });
        }

        if package.is_empty() {
            return Err(PackageError::Malformed("archive holds no assets".to_string()));
        }

        log::debug!("Read package with {} assets", package.len());
        Ok(package)
    }

    /// Materialize every asset below `dir`, keeping its pathname, with its
    /// `.meta` next to it.
    ///
    /// All pathnames are checked before anything is written. Files are
    /// staged in a temporary directory inside `dir` and moved into place
    /// once every file has been written.
    pub fn extract_to(&self, dir: &Path, keep_previews: bool) -> Result<Vec<PathBuf>, PackageError> {
        for asset in &self.assets {
            validate_member_path(Path::new(&asset.pathname))?;
        }

        std::fs::create_dir_all(dir)?;
        let staging = tempfile::Builder::new()
            .prefix(".usdpkg-import")
            .tempdir_in(dir)?;

        let mut staged: Vec<PathBuf> = Vec::new();
        let mut write = |relative: PathBuf, data: &[u8]| -> Result<(), PackageError> {
            let target = staging.path().join(&relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, data)?;
            staged.push(relative);
            Ok(())
        };

        for asset in self.sorted() {
            let relative = PathBuf::from(&asset.pathname);
            match &asset.asset {
                Some(data) => write(relative.clone(), data)?,
                None => std::fs::create_dir_all(staging.path().join(&relative))?,
            }
            write(with_suffix(&relative, ".meta"), &asset.meta)?;
            if keep_previews {
                if let Some(preview) = &asset.preview {
                    write(with_suffix(&relative, ".preview.png"), preview)?;
                }
            }
        }

        let mut written = Vec::with_capacity(staged.len());
        for relative in staged {
            let target = dir.join(&relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::rename(staging.path().join(&relative), &target)?;
            written.push(target);
        }

        for asset in self.assets.iter().filter(|a| a.is_folder()) {
            std::fs::create_dir_all(dir.join(&asset.pathname))?;
        }

        log::info!("Extracted {} files to {}", written.len(), dir.display());
        Ok(written)
    }
}

#[derive(Default)]
struct MemberGroup {
    asset: Option<Vec<u8>>,
    meta: Option<Vec<u8>>,
    pathname: Option<Vec<u8>>,
    preview: Option<Vec<u8>>,
}

fn append_member<W: Write>(builder: &mut tar::Builder<W>, path: &str, data: &[u8]) -> Result<(), PackageError> {
    let mut header = tar::Header::new_gnu();
    header.set_mode(0o644);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);
    header.set_size(data.len() as u64);
    header.set_entry_type(tar::EntryType::Regular);
    builder.append_data(&mut header, path, data)?;
    Ok(())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Reject paths that could land outside the extraction directory.
pub fn validate_member_path(path: &Path) -> Result<(), PackageError> {
    let traversal = || PackageError::PathTraversal(path.display().to_string());

    if path.as_os_str().is_empty() {
        return Err(PackageError::Malformed("empty member path".to_string()));
    }
    if path.to_string_lossy().contains('\\') {
        return Err(traversal());
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return Err(traversal()),
        }
    }
    Ok(())
}
