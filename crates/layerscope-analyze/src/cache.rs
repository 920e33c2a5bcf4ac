//! Memoized layer comparisons.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::{debug, trace};

use layerscope_core::{FileTree, TreeError, stack_tree_range};

/// How the upper side of a comparison is chosen when browsing layers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CompareMode {
    /// The selected layer against everything below it.
    #[default]
    Layer,
    /// Everything above the comparison start, up to the selected layer.
    Aggregated,
}

/// Inclusive layer ranges of one comparison: `bottom` is the lower tree,
/// `top` is marked onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeCacheKey {
    pub bottom_start: usize,
    pub bottom_stop: usize,
    pub top_start: usize,
    pub top_stop: usize,
}

impl TreeCacheKey {
    pub fn new(bottom_start: usize, bottom_stop: usize, top_start: usize, top_stop: usize) -> Self {
        Self {
            bottom_start,
            bottom_stop,
            top_start,
            top_stop,
        }
    }

    /// Key for viewing `layer` relative to `compare_start`.
    pub fn for_layer(layer: usize, compare_start: usize, mode: CompareMode) -> Self {
        if layer <= compare_start {
            return Self::new(compare_start, layer, layer, layer);
        }
        match mode {
            CompareMode::Layer => Self::new(compare_start, layer - 1, layer, layer),
            CompareMode::Aggregated => {
                Self::new(compare_start, compare_start, compare_start + 1, layer)
            }
        }
    }
}

/// Cache of composed, diff-annotated trees keyed by comparison ranges.
///
/// Entries live as long as the cache; there is no eviction.
#[derive(Debug)]
pub struct TreeCache<'a> {
    ref_trees: &'a [FileTree],
    cache: HashMap<TreeCacheKey, FileTree>,
    builds: usize,
}

impl<'a> TreeCache<'a> {
    /// Create an empty cache over single-layer trees, oldest first.
    pub fn new(ref_trees: &'a [FileTree]) -> Self {
        Self {
            ref_trees,
            cache: HashMap::new(),
            builds: 0,
        }
    }

    /// Get the comparison for `key`, building it on first request.
    pub fn get(&mut self, key: TreeCacheKey) -> Result<&mut FileTree, TreeError> {
        match self.cache.entry(key) {
            Entry::Occupied(entry) => {
                trace!(?key, "tree cache hit");
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                debug!(?key, "tree cache miss");
                let tree = build(self.ref_trees, key)?;
                self.builds += 1;
                Ok(entry.insert(tree))
            }
        }
    }

    /// Get the comparison shown for `layer` in the given mode.
    pub fn get_layer(
        &mut self,
        layer: usize,
        compare_start: usize,
        mode: CompareMode,
    ) -> Result<&mut FileTree, TreeError> {
        self.get(TreeCacheKey::for_layer(layer, compare_start, mode))
    }

    /// Populate both browsing patterns for every layer.
    pub fn prewarm(&mut self) -> Result<(), TreeError> {
        for mode in [CompareMode::Layer, CompareMode::Aggregated] {
            for layer in 0..self.ref_trees.len() {
                self.get_layer(layer, 0, mode)?;
            }
        }
        debug!(entries = self.cache.len(), builds = self.builds, "tree cache prewarmed");
        Ok(())
    }

    /// Number of comparisons built so far.
    pub fn builds(&self) -> usize {
        self.builds
    }

    /// Number of cached comparisons.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Single-layer trees the cache composes from.
    pub fn ref_trees(&self) -> &'a [FileTree] {
        self.ref_trees
    }
}

fn build(trees: &[FileTree], key: TreeCacheKey) -> Result<FileTree, TreeError> {
    let mut bottom = stack_tree_range(trees, key.bottom_start, key.bottom_stop)?;
    if key.bottom_start > 0 {
        // nothing below the comparison start is shown
        let dropped = bottom.remove_whiteouts()?;
        trace!(dropped, "dropped whiteouts below the comparison start");
    }
    let top = stack_tree_range(trees, key.top_start, key.top_stop)?;
    bottom.compare_and_mark(&top)?;
    Ok(bottom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerscope_core::{DiffType, FileInfo};

    fn layer(paths: &[&str]) -> FileTree {
        let mut tree = FileTree::new();
        for path in paths {
            tree.add_path(path, FileInfo::new_file(*path, 1, None)).unwrap();
        }
        tree
    }

    #[test]
    fn test_for_layer_keys() {
        assert_eq!(
            TreeCacheKey::for_layer(0, 0, CompareMode::Layer),
            TreeCacheKey::new(0, 0, 0, 0)
        );
        assert_eq!(
            TreeCacheKey::for_layer(3, 0, CompareMode::Layer),
            TreeCacheKey::new(0, 2, 3, 3)
        );
        assert_eq!(
            TreeCacheKey::for_layer(3, 0, CompareMode::Aggregated),
            TreeCacheKey::new(0, 0, 1, 3)
        );
        assert_eq!(
            TreeCacheKey::for_layer(3, 1, CompareMode::Aggregated),
            TreeCacheKey::new(1, 1, 2, 3)
        );
    }

    #[test]
    fn test_compare_mode_parse() {
        assert_eq!("aggregated".parse::<CompareMode>().unwrap(), CompareMode::Aggregated);
        assert_eq!("Layer".parse::<CompareMode>().unwrap(), CompareMode::Layer);
        assert_eq!(CompareMode::Aggregated.to_string(), "aggregated");
    }

    #[test]
    fn test_get_memoizes() {
        let trees = vec![layer(&["/a"]), layer(&["/b"])];
        let mut cache = TreeCache::new(&trees);
        let key = TreeCacheKey::for_layer(1, 0, CompareMode::Layer);

        let first = cache.get(key).unwrap().render(false);
        assert_eq!(cache.builds(), 1);
        let second = cache.get(key).unwrap().render(false);
        assert_eq!(cache.builds(), 1);
        assert_eq!(first, second);

        let tree = cache.get(key).unwrap();
        let b = tree.get_node("/b").unwrap();
        assert_eq!(tree[b].data.diff_type, DiffType::Added);
    }

    #[test]
    fn test_prewarm_covers_both_patterns() {
        let trees = vec![layer(&["/a"]), layer(&["/b"]), layer(&["/c"])];
        let mut cache = TreeCache::new(&trees);
        cache.prewarm().unwrap();

        // layer keys (0,0,0,0) (0,0,1,1) (0,1,2,2); aggregated adds (0,0,1,2)
        assert_eq!(cache.len(), 4);
        assert_eq!(cache.builds(), 4);

        cache.get_layer(2, 0, CompareMode::Aggregated).unwrap();
        assert_eq!(cache.builds(), 4);
    }

    #[test]
    fn test_aggregated_whiteout_of_base_file() {
        let trees = vec![layer(&["/a"]), layer(&["/b"]), layer(&["/.wh.a"])];
        let mut cache = TreeCache::new(&trees);

        cache.prewarm().unwrap();

        let tree = cache.get_layer(2, 0, CompareMode::Aggregated).unwrap();
        let a = tree.get_node("/a").unwrap();
        let b = tree.get_node("/b").unwrap();
        assert_eq!(tree[a].data.diff_type, DiffType::Removed);
        assert_eq!(tree[b].data.diff_type, DiffType::Added);
        assert!(tree.get_node("/.wh.a").is_err());

        let tree = cache.get_layer(2, 0, CompareMode::Layer).unwrap();
        let a = tree.get_node("/a").unwrap();
        assert_eq!(tree[a].data.diff_type, DiffType::Removed);
    }

    #[test]
    fn test_aggregated_delete_then_readd() {
        let trees = vec![layer(&["/a"]), layer(&["/.wh.a"]), layer(&["/a"])];
        let mut cache = TreeCache::new(&trees);

        let tree = cache.get_layer(2, 0, CompareMode::Aggregated).unwrap();
        let a = tree.get_node("/a").unwrap();
        assert_eq!(tree[a].data.diff_type, DiffType::Unchanged);
        assert_eq!(tree.size(), 1);

        let tree = cache.get_layer(1, 0, CompareMode::Aggregated).unwrap();
        let a = tree.get_node("/a").unwrap();
        assert_eq!(tree[a].data.diff_type, DiffType::Removed);
    }

    #[test]
    fn test_aggregated_rewrite_then_delete() {
        let trees = vec![layer(&["/a"]), layer(&["/a", "/tmp"]), layer(&["/.wh.a", "/.wh.tmp"])];
        let mut cache = TreeCache::new(&trees);

        let tree = cache.get_layer(2, 0, CompareMode::Aggregated).unwrap();
        let a = tree.get_node("/a").unwrap();
        assert_eq!(tree[a].data.diff_type, DiffType::Removed);
        assert!(tree.get_node("/tmp").is_err());
        assert_eq!(tree.size(), 1);
    }

    #[test]
    fn test_comparison_start_above_base() {
        let trees = vec![layer(&["/a"]), layer(&["/.wh.a", "/b"]), layer(&["/c"])];
        let mut cache = TreeCache::new(&trees);

        let tree = cache.get_layer(2, 1, CompareMode::Aggregated).unwrap();
        assert!(tree.get_node("/.wh.a").is_err());
        assert!(tree.get_node("/a").is_err());
        let c = tree.get_node("/c").unwrap();
        assert_eq!(tree[c].data.diff_type, DiffType::Added);
    }

    #[test]
    fn test_out_of_range_key() {
        let trees = vec![layer(&["/a"])];
        let mut cache = TreeCache::new(&trees);
        assert!(matches!(
            cache.get(TreeCacheKey::new(0, 0, 1, 1)),
            Err(TreeError::LayerOutOfRange { .. })
        ));
        assert!(cache.is_empty());
    }
}
