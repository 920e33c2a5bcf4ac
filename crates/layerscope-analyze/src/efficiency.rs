//! Path-level duplication scoring across layers.
//!
//! Every leaf of every layer is an occurrence of its path. An occurrence
//! costs its own size, or for a whiteout, the size of whatever it deletes.
//! A path stored once at its cheapest costs nothing extra; everything above
//! that minimum is waste.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use layerscope_core::{FileTree, NodeId, NodeRef, TreeError, stack_tree_range, visit_all};

/// One occurrence of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLocation {
    /// Index of the layer tree holding the node.
    pub layer: usize,
    pub node: NodeId,
}

/// Accumulated cost of one path across all layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EfficiencyData {
    pub path: String,
    pub nodes: Vec<NodeLocation>,
    /// Sum of every occurrence's cost.
    pub cumulative_size: u64,
    /// Cheapest single occurrence.
    pub min_discovered_size: u64,
}

impl EfficiencyData {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            nodes: Vec::new(),
            cumulative_size: 0,
            min_discovered_size: u64::MAX,
        }
    }

    /// Number of layers in which the path occurs.
    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    /// Bytes above the cheapest occurrence.
    pub fn wasted_bytes(&self) -> u64 {
        self.cumulative_size.saturating_sub(self.min_discovered_size)
    }
}

/// Results from efficiency analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyReport {
    /// Minimum bytes over stored bytes; 1.0 means no duplication.
    pub score: f64,
    /// Paths seen more than once, ascending by cumulative size.
    pub inefficiencies: Vec<EfficiencyData>,
}

impl EfficiencyReport {
    /// Inefficiencies from the most to the least expensive.
    pub fn worst(&self) -> impl Iterator<Item = &EfficiencyData> {
        self.inefficiencies.iter().rev()
    }
}

/// Size of everything a whiteout in layer `layer` deletes.
fn whiteout_cost(
    node: NodeRef<'_>,
    layer: usize,
    below: &mut Option<FileTree>,
    trees: &[FileTree],
) -> Result<u64, TreeError> {
    if layer == 0 {
        debug!(path = node.path(), "whiteout in the base layer deletes nothing");
        return Ok(0);
    }
    if below.is_none() {
        *below = Some(stack_tree_range(trees, 0, layer - 1)?);
    }
    let Some(previous) = below.as_ref() else {
        return Ok(0);
    };

    let target = match previous.get_node(node.path()) {
        Ok(target) => target,
        Err(err) => {
            debug!(layer, %err, "whiteout target not found while sizing");
            return Ok(0);
        }
    };

    let occupant = &previous[target];
    if !occupant.data.file_info.is_dir && occupant.is_leaf() {
        return Ok(occupant.data.file_info.size);
    }

    let mut size = 0u64;
    previous.visit_subtree_child_first(
        target,
        |child| {
            size += child.info().size;
            Ok::<(), TreeError>(())
        },
        visit_all,
    )?;
    Ok(size)
}

/// Score the path-level duplication of `trees` (oldest first).
pub fn efficiency(trees: &[FileTree]) -> Result<EfficiencyReport, TreeError> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<EfficiencyData> = Vec::new();
    let mut inefficient: Vec<usize> = Vec::new();

    for (layer, tree) in trees.iter().enumerate() {
        // composition of every layer below this one, built on the first whiteout
        let mut below: Option<FileTree> = None;

        tree.visit_depth_child_first(
            |node| {
                let path = node.path();
                let cost = if node.is_whiteout() {
                    whiteout_cost(node, layer, &mut below, trees)?
                } else {
                    node.info().size
                };

                let slot = *index.entry(path.to_string()).or_insert_with(|| {
                    entries.push(EfficiencyData::new(path));
                    entries.len() - 1
                });
                let data = &mut entries[slot];
                data.cumulative_size += cost;
                data.min_discovered_size = data.min_discovered_size.min(cost);
                data.nodes.push(NodeLocation {
                    layer,
                    node: node.id(),
                });
                if data.nodes.len() == 2 {
                    inefficient.push(slot);
                }
                Ok::<(), TreeError>(())
            },
            |node| node.is_leaf(),
        )?;
    }

    let (minimum, discovered) = entries.iter().fold((0u64, 0u64), |(min, total), data| {
        (min + data.min_discovered_size, total + data.cumulative_size)
    });
    let score = if discovered == 0 {
        1.0
    } else {
        minimum as f64 / discovered as f64
    };

    let mut inefficiencies: Vec<EfficiencyData> =
        inefficient.into_iter().map(|slot| entries[slot].clone()).collect();
    inefficiencies.sort_by_key(|data| data.cumulative_size);

    debug!(score, paths = entries.len(), inefficient = inefficiencies.len(), "scored image");
    Ok(EfficiencyReport {
        score,
        inefficiencies,
    })
}
