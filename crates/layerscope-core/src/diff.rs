//! Change classification between two composed trees.
//!
//! Comparison runs in two phases. The upper tree is walked child-first and
//! every outcome is recorded against the pre-mutation state of the lower
//! tree (paths missing from it are inserted as they are found). Only after
//! the walk are the recorded outcomes applied, so nodes inserted by the walk
//! never contaminate later comparisons and children are always classified
//! before the directories that fold them.
//!
//! A whiteout naming a path the lower tree never held marks nothing: the
//! entry was added and deleted within the upper range.

use tracing::trace;

use crate::error::TreeError;
use crate::node::{DiffType, NodeId};
use crate::tree::{FileTree, NodeRef, visit_all};

#[derive(Debug, Clone, Copy)]
enum Outcome {
    /// Assigned as-is (Added, or Removed from a whiteout).
    Final(DiffType),
    /// Folded with the children's classifications, if still unclassified.
    Tentative(DiffType),
}

#[derive(Debug)]
struct CompareMark {
    lower: NodeId,
    /// Node whose metadata overwrites `lower` once applied.
    upper: Option<NodeId>,
    outcome: Outcome,
}

/// Classify two occurrences of the same path.
pub fn compare_nodes(lower: NodeRef<'_>, upper: NodeRef<'_>) -> Result<DiffType, TreeError> {
    if upper.is_whiteout() {
        return Ok(DiffType::Removed);
    }
    if lower.name() != upper.name() {
        return Err(TreeError::ComparisonMismatch {
            lower: lower.path().to_string(),
            upper: upper.path().to_string(),
        });
    }
    if upper.info().implicit {
        // no record of its own; children decide
        return Ok(DiffType::Unchanged);
    }
    Ok(lower.info().compare(upper.info()))
}

impl FileTree {
    /// Merge `upper` into this tree, classifying every node it touches.
    pub fn compare_and_mark(&mut self, upper: &FileTree) -> Result<(), TreeError> {
        let original = self.copy();
        let mut marks = Vec::new();

        upper.visit_depth_child_first(
            |upper_node| {
                let path = upper_node.path();

                if upper_node.is_whiteout() {
                    match original.get_node(path) {
                        Ok(_) => marks.push(CompareMark {
                            lower: self.get_node(path)?,
                            upper: None,
                            outcome: Outcome::Final(DiffType::Removed),
                        }),
                        Err(err) if err.is_not_found() => {
                            trace!(path, "whiteout has nothing to remove");
                        }
                        Err(err) => return Err(err),
                    }
                    return Ok(());
                }

                match original.get_node(path) {
                    Ok(_) => {
                        let lower = self.get_node(path)?;
                        let diff = compare_nodes(self.node(lower), upper_node)?;
                        marks.push(CompareMark {
                            lower,
                            upper: Some(upper_node.id()),
                            outcome: Outcome::Tentative(diff),
                        });
                    }
                    Err(err) if err.is_not_found() => {
                        let (_, added) = self.add_path(path, upper_node.info().clone())?;
                        for id in added.into_iter().rev() {
                            let counterpart = upper.get_node(self.path(id))?;
                            marks.push(CompareMark {
                                lower: id,
                                upper: Some(counterpart),
                                outcome: Outcome::Final(DiffType::Added),
                            });
                        }
                    }
                    Err(err) => return Err(err),
                }
                Ok(())
            },
            visit_all,
        )?;

        trace!(marks = marks.len(), "applying comparison marks");
        for mark in marks {
            match mark.outcome {
                Outcome::Final(diff) => self.assign_diff_type(mark.lower, diff),
                Outcome::Tentative(diff) => {
                    if self[mark.lower].data.diff_type == DiffType::Unchanged {
                        self.derive_diff_type(mark.lower, diff);
                    }
                }
            }
            if let Some(upper_id) = mark.upper {
                let info = &upper[upper_id].data.file_info;
                if !info.implicit || self[mark.lower].data.file_info.implicit {
                    self[mark.lower].data.file_info = info.clone();
                }
            }
        }
        Ok(())
    }

    /// Set a node's classification; `Removed` cascades to every descendant.
    pub fn assign_diff_type(&mut self, id: NodeId, diff: DiffType) {
        self[id].data.diff_type = diff;
        if diff == DiffType::Removed {
            let children: Vec<NodeId> = self[id].children.values().copied().collect();
            for child in children {
                self.assign_diff_type(child, DiffType::Removed);
            }
        }
    }

    /// Fold a tentative classification with the node's children.
    ///
    /// Leaves take the value directly. A directory merges it with each
    /// child; a directory whose own entry is unchanged but whose children
    /// were all removed reads as removed.
    pub fn derive_diff_type(&mut self, id: NodeId, diff: DiffType) {
        if self[id].is_leaf() {
            self.assign_diff_type(id, diff);
            return;
        }

        let children: Vec<DiffType> = self[id]
            .children
            .values()
            .map(|child| self[*child].data.diff_type)
            .collect();

        let emptied = children.iter().all(|child| *child == DiffType::Removed);
        let derived = if emptied && diff == DiffType::Unchanged {
            DiffType::Removed
        } else {
            children.into_iter().fold(diff, DiffType::merge)
        };
        self.assign_diff_type(id, derived);
    }
}
