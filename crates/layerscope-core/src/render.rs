//! Plain-text rendering of the visible part of a tree.

use humansize::{BINARY, format_size};

use crate::node::{DiffType, NodeId};
use crate::tree::FileTree;

const BRANCH_CONTINUES: &str = "│   ";
const BRANCH_NONE: &str = "    ";
const BRANCH_ENTRY: &str = "├─";
const BRANCH_LAST: &str = "└─";
const COLLAPSED_ITEM: &str = "⊕ ";
const UNCOLLAPSED_ITEM: &str = "─ ";

/// Pending row on the render stack.
struct RenderParams {
    id: NodeId,
    /// One flag per ancestor level: whether that ancestor was the last child.
    spaces: Vec<bool>,
    show_collapsed: bool,
    is_last: bool,
}

/// Render permission bits as `rwxr-xr-x`.
pub fn mode_string(mode: u32) -> String {
    const FLAGS: [char; 3] = ['r', 'w', 'x'];
    (0..9)
        .map(|bit| {
            if mode & (1 << (8 - bit)) != 0 {
                FLAGS[bit % 3]
            } else {
                '-'
            }
        })
        .collect()
}

impl FileTree {
    /// Render visible rows `start..=stop`.
    pub fn string_between(&self, start: usize, stop: usize, show_attributes: bool) -> String {
        let mut out = String::new();
        let mut row = 0usize;
        let mut stack = vec![RenderParams {
            id: self.root(),
            spaces: Vec::new(),
            show_collapsed: false,
            is_last: false,
        }];

        while let Some(params) = stack.pop() {
            if row > stop {
                break;
            }
            let is_root = params.id == self.root();
            let node = &self[params.id];

            if is_root || !node.data.view.collapsed {
                let visible: Vec<NodeId> = self
                    .sorted_children(params.id)
                    .into_iter()
                    .filter(|child| !self[*child].data.view.hidden)
                    .collect();

                let mut child_spaces = params.spaces.clone();
                if !is_root {
                    child_spaces.push(params.is_last);
                }

                // pushed in reverse so the first child pops first
                for (idx, child) in visible.iter().enumerate().rev() {
                    let child_node = &self[*child];
                    stack.push(RenderParams {
                        id: *child,
                        spaces: child_spaces.clone(),
                        show_collapsed: child_node.data.view.collapsed && !child_node.is_leaf(),
                        is_last: idx + 1 == visible.len(),
                    });
                }
            }

            if is_root {
                continue;
            }
            if row >= start {
                if show_attributes {
                    out.push_str(&self.metadata_string(params.id));
                }
                out.push_str(&self.tree_line(&params));
                out.push('\n');
            }
            row += 1;
        }
        out
    }

    /// Render every visible row.
    pub fn render(&self, show_attributes: bool) -> String {
        self.string_between(0, usize::MAX, show_attributes)
    }

    /// Number of rows `render` would produce.
    pub fn visible_size(&self) -> usize {
        let mut count = 0usize;
        let _ = self.visit_depth_parent_first(
            |_| {
                count += 1;
                Ok::<(), std::convert::Infallible>(())
            },
            |node| {
                let under_collapsed = node
                    .parent()
                    .is_some_and(|parent| !parent.is_root() && parent.view().collapsed);
                !node.view().hidden && !under_collapsed
            },
        );
        count
    }

    /// Attribute column: type and mode, `uid:gid`, human-readable size.
    ///
    /// Directory size is the sum over descendants that are neither removed
    /// nor hidden.
    pub fn metadata_string(&self, id: NodeId) -> String {
        let node = &self[id];
        let info = &node.data.file_info;
        let dir = if info.is_dir { 'd' } else { '-' };

        let size = if node.is_leaf() {
            info.size
        } else {
            let mut total = 0u64;
            let _ = self.visit_subtree_child_first(
                id,
                |child| {
                    if child.is_leaf() {
                        total += child.info().size;
                    }
                    Ok::<(), std::convert::Infallible>(())
                },
                |child| child.diff_type() != DiffType::Removed && !child.view().hidden,
            );
            total
        };

        format!(
            "{}{} {:>11} {:>10} ",
            dir,
            mode_string(info.mode),
            format!("{}:{}", info.uid, info.gid),
            format_size(size, BINARY)
        )
    }

    fn tree_line(&self, params: &RenderParams) -> String {
        let node = &self[params.id];
        let mut line = String::new();

        for last in &params.spaces {
            line.push_str(if *last { BRANCH_NONE } else { BRANCH_CONTINUES });
        }
        line.push_str(if params.is_last { BRANCH_LAST } else { BRANCH_ENTRY });
        line.push_str(if params.show_collapsed {
            COLLAPSED_ITEM
        } else {
            UNCOLLAPSED_ITEM
        });

        line.push_str(node.name());
        let info = &node.data.file_info;
        if info.kind.is_link() && !info.link_target.is_empty() {
            line.push_str(" → ");
            line.push_str(&info.link_target);
        }
        line
    }
}
