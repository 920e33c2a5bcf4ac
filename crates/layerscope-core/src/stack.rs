//! Overlay composition of layer trees.

use tracing::{debug, trace};

use crate::error::TreeError;
use crate::node::{NodeId, WHITEOUT_PREFIX};
use crate::tree::{FileTree, NodeRef, visit_all};

/// Slash path of a node with its own name left as-is (whiteout prefix kept).
fn marker_path(node: NodeRef<'_>) -> String {
    match node.parent() {
        Some(parent) if !parent.is_root() => format!("{}/{}", parent.path(), node.name()),
        _ => format!("/{}", node.name()),
    }
}

impl FileTree {
    /// Apply `upper` on top of this tree.
    ///
    /// Whiteouts delete the entry they name (failing if it does not exist);
    /// every other node, directories included, is inserted or has its
    /// metadata replaced.
    pub fn stack(&mut self, upper: &FileTree) -> Result<(), TreeError> {
        self.overlay(upper, false)
    }

    /// Apply `upper` to a tree that does not hold the layers beneath it.
    ///
    /// Whiteouts delete what they name here when it exists, and the marker is
    /// kept either way so a comparison against the lower layers can resolve it.
    pub fn stack_delta(&mut self, upper: &FileTree) -> Result<(), TreeError> {
        self.overlay(upper, true)
    }

    fn overlay(&mut self, upper: &FileTree, keep_whiteouts: bool) -> Result<(), TreeError> {
        upper.visit_depth_child_first(
            |node| {
                if !node.is_whiteout() {
                    let (id, added) = self.add_path(node.path(), node.info().clone())?;
                    self.clear_whiteout(id)?;
                    for created in added {
                        self.clear_whiteout(created)?;
                    }
                    return Ok(());
                }

                match self.get_node(node.path()) {
                    Ok(target) => self.remove_node(target)?,
                    Err(err) if keep_whiteouts && err.is_not_found() => {
                        trace!(path = node.path(), "keeping unresolved whiteout");
                    }
                    Err(err) => return Err(err),
                }
                if keep_whiteouts {
                    self.add_path(&marker_path(node), node.info().clone())?;
                }
                Ok(())
            },
            visit_all,
        )
    }

    /// Drop the whiteout marker shadowing `id`, if any.
    fn clear_whiteout(&mut self, id: NodeId) -> Result<(), TreeError> {
        let Some(parent) = self[id].parent() else {
            return Ok(());
        };
        let marker = format!("{WHITEOUT_PREFIX}{}", self[id].name());
        match self[parent].child(&marker) {
            Some(marker) => self.remove_node(marker),
            None => Ok(()),
        }
    }

    /// Remove every whiteout marker; returns how many were removed.
    pub fn remove_whiteouts(&mut self) -> Result<usize, TreeError> {
        let markers = self.collect_child_first(|node| node.is_whiteout());
        let mut removed = 0;
        for id in markers {
            if self.get(id).is_some() {
                self.remove_node(id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Compose `trees[start..=stop]` into a new tree.
///
/// The result is a copy of `trees[start]` with every later tree in the range
/// stacked on in order. Inputs are never modified. A range starting above the
/// base layer is a delta over the layers below it: its whiteouts are kept as
/// markers (see [`FileTree::stack_delta`]).
pub fn stack_tree_range(trees: &[FileTree], start: usize, stop: usize) -> Result<FileTree, TreeError> {
    if stop >= trees.len() {
        return Err(TreeError::LayerOutOfRange {
            index: stop,
            count: trees.len(),
        });
    }
    if start > stop {
        return Err(TreeError::LayerOutOfRange {
            index: start,
            count: trees.len(),
        });
    }

    debug!(start, stop, "composing layer range");
    let mut tree = trees[start].copy();
    for upper in &trees[start + 1..=stop] {
        if start == 0 {
            tree.stack(upper)?;
        } else {
            tree.stack_delta(upper)?;
        }
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::FileInfo;

    fn layer(paths: &[(&str, u64)]) -> FileTree {
        let mut tree = FileTree::new();
        for (path, size) in paths {
            tree.add_path(path, FileInfo::new_file(*path, *size, None)).unwrap();
        }
        tree
    }

    #[test]
    fn test_stack_adds_and_replaces() {
        let mut base = layer(&[("/a", 1), ("/dir/b", 2)]);
        let upper = layer(&[("/a", 5), ("/dir/c", 3)]);

        base.stack(&upper).unwrap();

        assert_eq!(base.size(), 4);
        let a = base.get_node("/a").unwrap();
        assert_eq!(base[a].data.file_info.size, 5);
        assert!(base.get_node("/dir/b").is_ok());
        assert!(base.get_node("/dir/c").is_ok());
    }

    #[test]
    fn test_stack_whiteout_removes_subtree() {
        let mut base = layer(&[("/dir/a", 1), ("/dir/b", 2), ("/keep", 1)]);
        let upper = layer(&[("/.wh.dir", 0)]);

        base.stack(&upper).unwrap();

        assert_eq!(base.size(), 1);
        assert!(base.get_node("/dir").unwrap_err().is_not_found());
        assert!(base.get_node("/.wh.dir").is_err());
    }

    #[test]
    fn test_stack_whiteout_of_missing_path_fails() {
        let mut base = layer(&[("/a", 1)]);
        let upper = layer(&[("/.wh.ghost", 0)]);
        assert!(matches!(base.stack(&upper), Err(TreeError::NotFound { .. })));
    }

    #[test]
    fn test_range_is_inclusive_and_leaves_inputs_alone() {
        let trees = vec![
            layer(&[("/a", 1)]),
            layer(&[("/b", 1)]),
            layer(&[("/.wh.a", 0), ("/c", 1)]),
        ];

        let composed = stack_tree_range(&trees, 0, 2).unwrap();
        assert!(composed.get_node("/a").is_err());
        assert!(composed.get_node("/b").is_ok());
        assert!(composed.get_node("/c").is_ok());
        assert_ne!(composed.id(), trees[0].id());
        assert!(trees[0].get_node("/a").is_ok());

        let single = stack_tree_range(&trees, 1, 1).unwrap();
        assert_eq!(single.size(), 1);
        assert!(single.get_node("/b").is_ok());
    }

    #[test]
    fn test_readd_clears_whiteout_marker() {
        let mut base = layer(&[("/.wh.a", 0), ("/.wh.dir", 0)]);
        let upper = layer(&[("/a", 3), ("/dir/b", 1)]);

        base.stack(&upper).unwrap();

        assert_eq!(base.size(), 3);
        assert!(base.get_node("/.wh.a").is_err());
        assert!(base.get_node("/.wh.dir").is_err());
        let a = base.get_node("/a").unwrap();
        assert_eq!(base[a].data.file_info.size, 3);
    }

    #[test]
    fn test_delta_keeps_whiteouts() {
        let mut delta = layer(&[("/b", 1), ("/c", 1)]);
        let upper = layer(&[("/.wh.base", 0), ("/.wh.c", 0)]);

        delta.stack_delta(&upper).unwrap();

        assert!(delta.get_node("/.wh.base").is_ok());
        assert!(delta.get_node("/.wh.c").is_ok());
        assert!(delta.get_node("/c").is_err());
        assert!(delta.get_node("/b").is_ok());
        assert_eq!(delta.remove_whiteouts().unwrap(), 2);
        assert_eq!(delta.size(), 1);
    }

    #[test]
    fn test_range_above_base_resolves_later() {
        let trees = vec![
            layer(&[("/a", 1)]),
            layer(&[("/b", 1)]),
            layer(&[("/.wh.a", 0), ("/dir/.wh.x", 0)]),
        ];

        let upper = stack_tree_range(&trees, 1, 2).unwrap();
        assert!(upper.get_node("/b").is_ok());
        let marker = upper.get_node("/.wh.a").unwrap();
        assert_eq!(upper.path(marker), "/a");
        assert!(upper.get_node("/dir/.wh.x").is_ok());

        assert!(stack_tree_range(&trees, 0, 2).unwrap_err().is_not_found());
    }

    #[test]
    fn test_range_bounds() {
        let trees = vec![layer(&[("/a", 1)])];
        assert!(matches!(
            stack_tree_range(&trees, 0, 1),
            Err(TreeError::LayerOutOfRange { index: 1, count: 1 })
        ));
        let two = vec![layer(&[]), layer(&[])];
        assert!(matches!(
            stack_tree_range(&two, 1, 0),
            Err(TreeError::LayerOutOfRange { .. })
        ));
    }
}
