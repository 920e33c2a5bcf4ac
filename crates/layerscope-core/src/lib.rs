//! Core types for layerscope.
//!
//! This crate provides the layered file tree used throughout layerscope:
//! an arena of path-indexed nodes, overlay stacking of layer trees, change
//! classification between composed trees, view state and text rendering.

mod config;
mod diff;
mod error;
mod node;
mod render;
mod stack;
mod tree;
mod view;

pub use config::{TreeConfig, TreeConfigBuilder};
pub use diff::compare_nodes;
pub use error::TreeError;
pub use node::{
    ContentHash, DiffType, FileInfo, FileKind, FileNode, NodeData, NodeId, OPAQUE_WHITEOUT_PREFIX,
    TreeId, ViewInfo, WHITEOUT_PREFIX, is_opaque_marker, is_whiteout_name,
};
pub use render::mode_string;
pub use stack::stack_tree_range;
pub use tree::{FileTree, NodeRef, visit_all};
pub use view::DiffTypeSet;
