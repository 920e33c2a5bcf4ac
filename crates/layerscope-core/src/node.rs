//! File node and payload types.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, EnumString};
use uuid::Uuid;

/// Name prefix marking an entry that deletes the same-named entry below it.
pub const WHITEOUT_PREFIX: &str = ".wh.";

/// Name prefix marking a directory whose lower-layer contents are hidden.
pub const OPAQUE_WHITEOUT_PREFIX: &str = ".wh..wh..";

/// Check if a name is a whiteout marker.
pub fn is_whiteout_name(name: &str) -> bool {
    name.starts_with(WHITEOUT_PREFIX)
}

/// Check if a name is an opaque-directory marker.
pub fn is_opaque_marker(name: &str) -> bool {
    name.starts_with(OPAQUE_WHITEOUT_PREFIX)
}

/// Index of a node within its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Create a new NodeId from an arena slot.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Arena slot of this node.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a tree; every node records the tree that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeId(pub Uuid);

impl TreeId {
    /// Allocate a fresh tree identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TreeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// BLAKE3 content fingerprint of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Create a new ContentHash from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the hash as a hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Type of a file system entry inside a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Regular file.
    #[default]
    Regular,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
    /// Hard link to another entry in the archive.
    Hardlink,
    /// Device nodes, fifos and anything else.
    Other,
}

impl FileKind {
    /// Check if this kind carries a link target.
    pub fn is_link(self) -> bool {
        matches!(self, FileKind::Symlink | FileKind::Hardlink)
    }
}

/// File metadata carried by each node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileInfo {
    /// Path as recorded by the layer.
    pub path: String,
    /// Entry type.
    pub kind: FileKind,
    /// Link target for symlinks and hardlinks.
    pub link_target: CompactString,
    /// Content fingerprint (None for directories and empty payloads).
    pub hash: Option<ContentHash>,
    /// Size in bytes.
    pub size: u64,
    /// Permission bits.
    pub mode: u32,
    /// Owner user id.
    pub uid: u32,
    /// Owner group id.
    pub gid: u32,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Directory that only exists because a deeper path does.
    #[serde(default)]
    pub implicit: bool,
}

impl FileInfo {
    /// Create metadata for a regular file.
    pub fn new_file(path: impl Into<String>, size: u64, hash: Option<ContentHash>) -> Self {
        Self {
            path: path.into(),
            kind: FileKind::Regular,
            hash,
            size,
            mode: 0o644,
            ..Self::default()
        }
    }

    /// Create metadata for a directory.
    pub fn new_directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: FileKind::Directory,
            mode: 0o755,
            is_dir: true,
            ..Self::default()
        }
    }

    /// Placeholder for a directory created on the way to a deeper path.
    ///
    /// It never replaces metadata already recorded for the same path.
    pub fn implicit_directory() -> Self {
        Self {
            kind: FileKind::Directory,
            is_dir: true,
            implicit: true,
            ..Self::default()
        }
    }

    /// Create metadata for a symbolic link.
    pub fn new_symlink(path: impl Into<String>, target: impl Into<CompactString>) -> Self {
        Self {
            path: path.into(),
            kind: FileKind::Symlink,
            link_target: target.into(),
            mode: 0o777,
            ..Self::default()
        }
    }

    /// Set permission bits.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Set owner and group.
    pub fn with_owner(mut self, uid: u32, gid: u32) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    /// Classify this entry against another occurrence of the same path.
    ///
    /// Entries are unchanged iff type, fingerprint, permissions, owner and
    /// group all match.
    pub fn compare(&self, other: &FileInfo) -> DiffType {
        if self.kind == other.kind
            && self.hash == other.hash
            && self.mode == other.mode
            && self.uid == other.uid
            && self.gid == other.gid
        {
            DiffType::Unchanged
        } else {
            DiffType::Changed
        }
    }
}

/// Display state consumed by a tree view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewInfo {
    /// Children are not shown.
    pub collapsed: bool,
    /// The node itself is not shown.
    pub hidden: bool,
}

impl ViewInfo {
    /// Create view state with the given initial collapse.
    pub fn new(collapsed: bool) -> Self {
        Self {
            collapsed,
            hidden: false,
        }
    }
}

/// Change classification of a node between two compared states.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumCount,
    EnumIter,
    EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum DiffType {
    #[default]
    Unchanged,
    Changed,
    Added,
    Removed,
}

impl DiffType {
    /// Fold two classifications: equal values stay, any mismatch is `Changed`.
    pub fn merge(self, other: DiffType) -> DiffType {
        if self == other {
            self
        } else {
            DiffType::Changed
        }
    }
}

/// Payload of a node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeData {
    pub file_info: FileInfo,
    pub view: ViewInfo,
    pub diff_type: DiffType,
}

impl NodeData {
    /// Create a payload for fresh metadata.
    pub fn new(file_info: FileInfo, collapsed: bool) -> Self {
        Self {
            file_info,
            view: ViewInfo::new(collapsed),
            diff_type: DiffType::Unchanged,
        }
    }
}

/// One path segment within a tree.
///
/// Children are owned through the tree's arena and indexed by name; `parent`
/// and `tree` are back-references that never outlive the owning tree.
#[derive(Debug, Clone)]
pub struct FileNode {
    pub(crate) name: CompactString,
    pub(crate) path: OnceCell<String>,
    pub(crate) children: HashMap<CompactString, NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) tree: TreeId,
    /// Metadata, view state and classification.
    pub data: NodeData,
}

impl FileNode {
    pub(crate) fn new(
        name: impl Into<CompactString>,
        parent: Option<NodeId>,
        tree: TreeId,
        data: NodeData,
    ) -> Self {
        Self {
            name: name.into(),
            path: OnceCell::new(),
            children: HashMap::new(),
            parent,
            tree,
            data,
        }
    }

    /// Segment name, including any whiteout prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the entry this node stands for (whiteout prefix stripped).
    pub fn real_name(&self) -> &str {
        self.name
            .strip_prefix(WHITEOUT_PREFIX)
            .unwrap_or(self.name.as_str())
    }

    /// Parent node (None for the root).
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Identity of the owning tree.
    pub fn tree_id(&self) -> TreeId {
        self.tree
    }

    /// Look up a direct child by name.
    pub fn child(&self, name: &str) -> Option<NodeId> {
        self.children.get(name).copied()
    }

    /// Get the number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Check if this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Check if this node marks a deletion in a lower layer.
    pub fn is_whiteout(&self) -> bool {
        is_whiteout_name(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_marker_names() {
        assert!(is_whiteout_name(".wh.file"));
        assert!(!is_whiteout_name("file.wh."));
        assert!(is_opaque_marker(".wh..wh..opq"));
        assert!(!is_opaque_marker(".wh.file"));
    }

    #[test]
    fn test_content_hash_hex() {
        let hash = ContentHash::new([0xab; 32]);
        assert_eq!(hash.to_hex().len(), 64);
        assert!(hash.to_hex().starts_with("abab"));
    }

    #[test]
    fn test_compare_identical() {
        let a = FileInfo::new_file("/a", 10, Some(ContentHash::new([1; 32])));
        assert_eq!(a.compare(&a.clone()), DiffType::Unchanged);
    }

    #[test]
    fn test_compare_ignores_size_and_path() {
        let a = FileInfo::new_file("/a", 10, None);
        let b = FileInfo::new_file("/b", 99, None);
        assert_eq!(a.compare(&b), DiffType::Unchanged);
    }

    #[test]
    fn test_compare_detects_changes() {
        let base = FileInfo::new_file("/a", 10, Some(ContentHash::new([1; 32])));
        let content = FileInfo::new_file("/a", 10, Some(ContentHash::new([2; 32])));
        let mode = base.clone().with_mode(0o600);
        let owner = base.clone().with_owner(1000, 0);
        let kind = FileInfo::new_symlink("/a", "/b");

        assert_eq!(base.compare(&content), DiffType::Changed);
        assert_eq!(base.compare(&mode), DiffType::Changed);
        assert_eq!(base.compare(&owner), DiffType::Changed);
        assert_eq!(base.compare(&kind), DiffType::Changed);
    }

    #[test]
    fn test_diff_type_merge() {
        for diff in DiffType::iter() {
            assert_eq!(diff.merge(diff), diff);
        }
        assert_eq!(DiffType::Added.merge(DiffType::Unchanged), DiffType::Changed);
        assert_eq!(DiffType::Removed.merge(DiffType::Added), DiffType::Changed);
    }

    #[test]
    fn test_diff_type_parse() {
        assert_eq!("added".parse::<DiffType>().unwrap(), DiffType::Added);
        assert_eq!("REMOVED".parse::<DiffType>().unwrap(), DiffType::Removed);
        assert_eq!(DiffType::Changed.to_string(), "Changed");
        assert_eq!(DiffType::COUNT, 4);
    }

    #[test]
    fn test_real_name() {
        let node = FileNode::new(".wh.gone", None, TreeId::new(), NodeData::default());
        assert!(node.is_whiteout());
        assert_eq!(node.real_name(), "gone");
        assert!(node.is_leaf());
    }
}
