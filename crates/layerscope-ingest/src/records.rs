//! Record model handed over by archive decoders.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use layerscope_core::{ContentHash, FileInfo, FileKind};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::fingerprint::fingerprint_reader;

/// Type of an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    #[default]
    Regular,
    Directory,
    Symlink,
    Hardlink,
    /// Deletes the same-named entry of a lower layer.
    Whiteout,
    Other,
}

impl RecordKind {
    fn file_kind(self) -> FileKind {
        match self {
            RecordKind::Regular | RecordKind::Whiteout => FileKind::Regular,
            RecordKind::Directory => FileKind::Directory,
            RecordKind::Symlink => FileKind::Symlink,
            RecordKind::Hardlink => FileKind::Hardlink,
            RecordKind::Other => FileKind::Other,
        }
    }
}

/// One entry of a layer archive.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    #[serde(default)]
    pub kind: RecordKind,
    #[serde(default, skip_serializing_if = "CompactString::is_empty")]
    pub link_target: CompactString,
    /// Hex BLAKE3 fingerprint of the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Inline content, fingerprinted when no `hash` is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub mode: u32,
    #[serde(default)]
    pub uid: u32,
    #[serde(default)]
    pub gid: u32,
}

impl FileRecord {
    /// Create a regular-file record.
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            mode: 0o644,
            ..Self::default()
        }
    }

    /// Create a directory record.
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: RecordKind::Directory,
            mode: 0o755,
            ..Self::default()
        }
    }

    /// Create a whiteout record for the entry at `path`.
    pub fn whiteout(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: RecordKind::Whiteout,
            ..Self::default()
        }
    }

    /// Set inline content; size follows the content length.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        self.size = content.len() as u64;
        self.content = Some(content);
        self
    }

    /// Resolve the record's content fingerprint.
    pub fn content_hash(&self) -> Result<Option<ContentHash>, IngestError> {
        if let Some(hex) = &self.hash {
            let hash = blake3::Hash::from_hex(hex).map_err(|err| IngestError::InvalidRecord {
                path: self.path.clone(),
                message: err.to_string(),
            })?;
            return Ok(Some(ContentHash::new(*hash.as_bytes())));
        }
        match &self.content {
            Some(content) => fingerprint_reader(content.as_bytes())
                .map(Some)
                .map_err(|err| IngestError::io(&self.path, err)),
            None => Ok(None),
        }
    }

    /// Convert into tree metadata.
    pub fn to_file_info(&self) -> Result<FileInfo, IngestError> {
        Ok(FileInfo {
            path: self.path.clone(),
            kind: self.kind.file_kind(),
            link_target: self.link_target.clone(),
            hash: self.content_hash()?,
            size: self.size,
            mode: self.mode,
            uid: self.uid,
            gid: self.gid,
            is_dir: self.kind == RecordKind::Directory,
            implicit: false,
        })
    }
}

/// Image history entry; entries flagged `empty_layer` carry no layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub empty_layer: bool,
}

/// Records of one layer, oldest layer first within an image.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LayerSource {
    /// Content digest, e.g. `sha256:...`.
    pub digest: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub records: Vec<FileRecord>,
}

/// Full image description.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub layers: Vec<LayerSource>,
}

impl ImageSource {
    /// Parse an image description from JSON.
    pub fn from_reader(reader: impl Read) -> Result<Self, IngestError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Load an image description from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| IngestError::io(path, err))?;
        Self::from_reader(BufReader::new(file))
    }
}
