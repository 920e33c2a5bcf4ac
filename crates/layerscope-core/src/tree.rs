//! Layer file tree: an arena of name-indexed nodes.

use std::convert::Infallible;
use std::ops::{Index, IndexMut};

use compact_str::CompactString;
use itertools::Itertools;
use tracing::trace;

use crate::config::TreeConfig;
use crate::error::TreeError;
use crate::node::{
    DiffType, FileInfo, FileNode, NodeData, NodeId, TreeId, ViewInfo, is_opaque_marker,
};

/// Split a slash path into its real segments.
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".")
}

/// Evaluator that admits every node.
pub fn visit_all(_: NodeRef<'_>) -> bool {
    true
}

/// One filesystem snapshot.
///
/// Nodes live in an arena owned by the tree; the root occupies a fixed slot,
/// is never visited and can never be removed. Removed slots are recycled.
#[derive(Debug)]
pub struct FileTree {
    nodes: Vec<Option<FileNode>>,
    free: Vec<NodeId>,
    root: NodeId,
    size: usize,
    id: TreeId,
    config: TreeConfig,

    /// Aggregate byte size of the entries the tree was built from.
    pub file_size: u64,

    /// Descriptive name (usually the layer it was built from).
    pub name: String,
}

impl FileTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Create an empty tree whose nodes follow `config`.
    pub fn with_config(config: TreeConfig) -> Self {
        let id = TreeId::new();
        let root = FileNode::new("", None, id, NodeData::new(FileInfo::default(), false));
        Self {
            nodes: vec![Some(root)],
            free: Vec::new(),
            root: NodeId::new(0),
            size: 0,
            id,
            config,
            file_size: 0,
            name: String::new(),
        }
    }

    /// Identity of this tree.
    pub fn id(&self) -> TreeId {
        self.id
    }

    /// Root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of non-root nodes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Check if the tree holds nothing but the root.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Configuration applied to new nodes.
    pub fn config(&self) -> TreeConfig {
        self.config
    }

    /// Get a node if the id is live.
    pub fn get(&self, id: NodeId) -> Option<&FileNode> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    /// Read handle for a node.
    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { tree: self, id }
    }

    /// Full path of a node, computed once and cached.
    pub fn path(&self, id: NodeId) -> &str {
        let node = &self[id];
        node.path.get_or_init(|| match node.parent {
            None => "/".to_string(),
            Some(parent) => {
                let parent_path = self.path(parent);
                let name = node.real_name();
                if parent_path == "/" {
                    format!("/{name}")
                } else {
                    format!("{parent_path}/{name}")
                }
            }
        })
    }

    /// Children of a node in lexicographic name order.
    pub fn sorted_children(&self, id: NodeId) -> Vec<NodeId> {
        self[id]
            .children
            .iter()
            .sorted_by(|a, b| a.0.cmp(b.0))
            .map(|(_, child)| *child)
            .collect()
    }

    fn alloc(&mut self, node: FileNode) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.index()] = Some(node);
                id
            }
            None => {
                let id = NodeId::new(self.nodes.len() as u32);
                self.nodes.push(Some(node));
                id
            }
        }
    }

    /// Attach a child under `parent`.
    ///
    /// Re-adding an existing name replaces that child's metadata (unless the
    /// new metadata is an implicit directory) and keeps its subtree.
    /// Opaque-directory markers are refused.
    pub fn add_child(&mut self, parent: NodeId, name: &str, info: FileInfo) -> Option<NodeId> {
        if is_opaque_marker(name) {
            trace!(name, "refusing opaque directory marker");
            return None;
        }

        if let Some(existing) = self[parent].child(name) {
            if !info.implicit {
                self[existing].data.file_info = info;
            }
            return Some(existing);
        }

        let data = NodeData::new(info, self.config.collapse_directories);
        let id = self.alloc(FileNode::new(name, Some(parent), self.id, data));
        self[parent].children.insert(CompactString::from(name), id);
        self.size += 1;
        Some(id)
    }

    /// Insert metadata at a slash path, creating intermediate directories.
    ///
    /// Returns the terminal node and every node created along the way.
    pub fn add_path(
        &mut self,
        path: &str,
        info: FileInfo,
    ) -> Result<(NodeId, Vec<NodeId>), TreeError> {
        let names: Vec<&str> = segments(path).collect();
        if names.is_empty() || names.iter().any(|name| is_opaque_marker(name)) {
            return Err(TreeError::invalid_path(path));
        }

        let mut node = self.root;
        let mut added = Vec::new();
        for name in names {
            node = match self[node].child(name) {
                Some(child) => child,
                None => {
                    // intermediates are bare directories; only the terminal node gets `info`
                    let child = self
                        .add_child(node, name, FileInfo::implicit_directory())
                        .ok_or_else(|| TreeError::invalid_path(path))?;
                    added.push(child);
                    child
                }
            };
        }
        if !info.implicit || added.last() == Some(&node) {
            self[node].data.file_info = info;
        }

        Ok((node, added))
    }

    /// Resolve a slash path to a node.
    pub fn get_node(&self, path: &str) -> Result<NodeId, TreeError> {
        let mut node = self.root;
        for name in segments(path) {
            node = self[node]
                .child(name)
                .ok_or_else(|| TreeError::not_found(path))?;
        }
        Ok(node)
    }

    /// Remove a node and its entire subtree.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), TreeError> {
        if id == self.root {
            return Err(TreeError::InvalidOperation {
                message: "cannot remove the tree root".to_string(),
            });
        }
        if self.get(id).is_none() {
            return Err(TreeError::not_found(format!("node #{}", id.0)));
        }

        let children: Vec<NodeId> = self[id].children.values().copied().collect();
        for child in children {
            self.remove_node(child)?;
        }

        if let Some(node) = self.nodes[id.index()].take() {
            if let Some(parent) = node.parent {
                self[parent].children.remove(&node.name);
            }
            self.free.push(id);
            self.size -= 1;
        }
        Ok(())
    }

    /// Remove the subtree at a slash path.
    pub fn remove_path(&mut self, path: &str) -> Result<(), TreeError> {
        let id = self.get_node(path)?;
        self.remove_node(id)
    }

    /// Deep copy into a new, independent tree.
    pub fn copy(&self) -> FileTree {
        let id = TreeId::new();
        let nodes = self
            .nodes
            .iter()
            .map(|slot| {
                slot.as_ref().map(|node| FileNode {
                    tree: id,
                    ..node.clone()
                })
            })
            .collect();

        FileTree {
            nodes,
            free: self.free.clone(),
            root: self.root,
            size: self.size,
            id,
            config: self.config,
            file_size: self.file_size,
            name: self.name.clone(),
        }
    }

    /// Visit every non-root node, children before parents.
    ///
    /// `evaluator` decides whether a node is handed to `visitor`; descent is
    /// never pruned. The first visitor error aborts the traversal.
    pub fn visit_depth_child_first<E, V, P>(&self, mut visitor: V, mut evaluator: P) -> Result<(), E>
    where
        V: FnMut(NodeRef<'_>) -> Result<(), E>,
        P: FnMut(NodeRef<'_>) -> bool,
    {
        self.child_first(self.root, &mut visitor, &mut evaluator)
    }

    /// Visit the subtree rooted at `id` (inclusive), children before parents.
    pub fn visit_subtree_child_first<E, V, P>(
        &self,
        id: NodeId,
        mut visitor: V,
        mut evaluator: P,
    ) -> Result<(), E>
    where
        V: FnMut(NodeRef<'_>) -> Result<(), E>,
        P: FnMut(NodeRef<'_>) -> bool,
    {
        self.child_first(id, &mut visitor, &mut evaluator)
    }

    /// Visit every non-root node, parents before children.
    ///
    /// A node rejected by `evaluator` is skipped together with its subtree.
    pub fn visit_depth_parent_first<E, V, P>(&self, mut visitor: V, mut evaluator: P) -> Result<(), E>
    where
        V: FnMut(NodeRef<'_>) -> Result<(), E>,
        P: FnMut(NodeRef<'_>) -> bool,
    {
        self.parent_first(self.root, &mut visitor, &mut evaluator)
    }

    fn child_first<E, V, P>(&self, id: NodeId, visitor: &mut V, evaluator: &mut P) -> Result<(), E>
    where
        V: FnMut(NodeRef<'_>) -> Result<(), E>,
        P: FnMut(NodeRef<'_>) -> bool,
    {
        for child in self.sorted_children(id) {
            self.child_first(child, visitor, evaluator)?;
        }

        if id == self.root {
            return Ok(());
        }
        let node = self.node(id);
        if evaluator(node) {
            visitor(node)?;
        }
        Ok(())
    }

    fn parent_first<E, V, P>(&self, id: NodeId, visitor: &mut V, evaluator: &mut P) -> Result<(), E>
    where
        V: FnMut(NodeRef<'_>) -> Result<(), E>,
        P: FnMut(NodeRef<'_>) -> bool,
    {
        if id != self.root {
            let node = self.node(id);
            if !evaluator(node) {
                return Ok(());
            }
            visitor(node)?;
        }

        for child in self.sorted_children(id) {
            self.parent_first(child, visitor, evaluator)?;
        }
        Ok(())
    }

    /// Ids of all nodes accepted by `evaluator`, in child-first order.
    pub(crate) fn collect_child_first<P>(&self, evaluator: P) -> Vec<NodeId>
    where
        P: FnMut(NodeRef<'_>) -> bool,
    {
        let mut ids = Vec::new();
        let _ = self.visit_depth_child_first(
            |node| {
                ids.push(node.id());
                Ok::<(), Infallible>(())
            },
            evaluator,
        );
        ids
    }
}

impl Default for FileTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<NodeId> for FileTree {
    type Output = FileNode;

    fn index(&self, id: NodeId) -> &FileNode {
        match self.get(id) {
            Some(node) => node,
            None => panic!("stale node id #{}", id.0),
        }
    }
}

impl IndexMut<NodeId> for FileTree {
    fn index_mut(&mut self, id: NodeId) -> &mut FileNode {
        match self.nodes.get_mut(id.index()).and_then(Option::as_mut) {
            Some(node) => node,
            None => panic!("stale node id #{}", id.0),
        }
    }
}

/// Borrowed view of one node, handed to visitors.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a FileTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn id(self) -> NodeId {
        self.id
    }

    pub fn tree(self) -> &'a FileTree {
        self.tree
    }

    pub fn node(self) -> &'a FileNode {
        &self.tree[self.id]
    }

    pub fn name(self) -> &'a str {
        self.node().name()
    }

    pub fn path(self) -> &'a str {
        self.tree.path(self.id)
    }

    pub fn data(self) -> &'a NodeData {
        &self.node().data
    }

    pub fn info(self) -> &'a FileInfo {
        &self.node().data.file_info
    }

    pub fn diff_type(self) -> DiffType {
        self.node().data.diff_type
    }

    pub fn view(self) -> ViewInfo {
        self.node().data.view
    }

    pub fn parent(self) -> Option<NodeRef<'a>> {
        self.node().parent.map(|id| self.tree.node(id))
    }

    /// Children in lexicographic name order.
    pub fn children(self) -> impl Iterator<Item = NodeRef<'a>> {
        let tree = self.tree;
        tree.sorted_children(self.id)
            .into_iter()
            .map(move |id| tree.node(id))
    }

    pub fn is_root(self) -> bool {
        self.id == self.tree.root
    }

    pub fn is_leaf(self) -> bool {
        self.node().is_leaf()
    }

    pub fn is_whiteout(self) -> bool {
        self.node().is_whiteout()
    }
}
