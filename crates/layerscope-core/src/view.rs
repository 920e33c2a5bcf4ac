//! View state (collapse / hide) carried on nodes for tree views.

use strum::EnumCount;

use crate::node::{DiffType, NodeId};
use crate::tree::{FileTree, visit_all};

/// A set of classifications, used to hide nodes by their diff type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffTypeSet([bool; DiffType::COUNT]);

impl DiffTypeSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, diff: DiffType) {
        self.0[diff as usize] = true;
    }

    pub fn remove(&mut self, diff: DiffType) {
        self.0[diff as usize] = false;
    }

    /// Flip membership; returns whether `diff` is now in the set.
    pub fn toggle(&mut self, diff: DiffType) -> bool {
        self.0[diff as usize] = !self.0[diff as usize];
        self.0[diff as usize]
    }

    pub fn contains(&self, diff: DiffType) -> bool {
        self.0[diff as usize]
    }

    pub fn is_empty(&self) -> bool {
        !self.0.iter().any(|member| *member)
    }
}

impl FromIterator<DiffType> for DiffTypeSet {
    fn from_iter<I: IntoIterator<Item = DiffType>>(iter: I) -> Self {
        let mut set = Self::new();
        for diff in iter {
            set.insert(diff);
        }
        set
    }
}

impl FileTree {
    /// Flip the collapsed state of a node; returns the new state.
    pub fn toggle_collapse(&mut self, id: NodeId) -> bool {
        let view = &mut self[id].data.view;
        view.collapsed = !view.collapsed;
        view.collapsed
    }

    /// Collapse or expand every directory.
    pub fn set_collapse_all(&mut self, collapsed: bool) {
        let dirs = self.collect_child_first(|node| node.info().is_dir || !node.is_leaf());
        for id in dirs {
            self[id].data.view.collapsed = collapsed;
        }
    }

    /// Hide every node whose classification is in `hidden`, unless one of
    /// its children stays visible.
    pub fn apply_hidden_diff_types(&mut self, hidden: &DiffTypeSet) {
        for id in self.collect_child_first(visit_all) {
            let node = &self[id];
            let visible_child = node
                .children
                .values()
                .any(|child| !self[*child].data.view.hidden);
            let hide = hidden.contains(node.data.diff_type) && !visible_child;
            self[id].data.view.hidden = hide;
        }
    }

    /// Carry view state over from `other` for every path both trees share.
    pub fn copy_view_state(&mut self, other: &FileTree) {
        for id in other.collect_child_first(visit_all) {
            if let Ok(target) = self.get_node(other.path(id)) {
                self[target].data.view = other[id].data.view;
            }
        }
    }
}
