//! Layer trees from layer records.

use layerscope_core::{FileTree, TreeConfig, WHITEOUT_PREFIX, is_opaque_marker, is_whiteout_name};
use tracing::{debug, trace};

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::layer::{Layer, MISSING_COMMAND, strip_shell_prefix};
use crate::records::{FileRecord, HistoryEntry, ImageSource, LayerSource, RecordKind};

/// Layers of one image with their single-layer trees, oldest first.
#[derive(Debug)]
pub struct IngestedImage {
    pub name: String,
    pub layers: Vec<Layer>,
    pub trees: Vec<FileTree>,
}

/// Path under which a record is inserted, or None when it is skipped.
fn tree_path(record: &FileRecord) -> Option<String> {
    let segments: Vec<&str> = record
        .path
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    let (last, parents) = segments.split_last()?;

    if segments.iter().any(|segment| is_opaque_marker(segment)) {
        trace!(path = %record.path, "skipping opaque directory marker");
        return None;
    }

    let name = if record.kind == RecordKind::Whiteout && !is_whiteout_name(last) {
        format!("{WHITEOUT_PREFIX}{last}")
    } else {
        (*last).to_string()
    };

    let mut path = String::new();
    for segment in parents {
        path.push('/');
        path.push_str(segment);
    }
    path.push('/');
    path.push_str(&name);
    Some(path)
}

/// Build the tree of a single layer.
///
/// Opaque-directory markers and the root entry are skipped; every record's
/// size counts toward the tree's aggregate size.
pub fn build_layer_tree(
    name: impl Into<String>,
    records: &[FileRecord],
    config: TreeConfig,
) -> Result<FileTree, IngestError> {
    let mut tree = FileTree::with_config(config);
    tree.name = name.into();

    for record in records {
        tree.file_size += record.size;
        let Some(path) = tree_path(record) else {
            continue;
        };
        tree.add_path(&path, record.to_file_info()?)?;
    }

    debug!(name = %tree.name, nodes = tree.size(), bytes = tree.file_size, "built layer tree");
    Ok(tree)
}

/// Walks image history in order, handing out entries that carry a layer.
struct HistoryCursor<'a> {
    entries: std::slice::Iter<'a, HistoryEntry>,
}

impl<'a> HistoryCursor<'a> {
    fn new(history: &'a [HistoryEntry]) -> Self {
        Self {
            entries: history.iter(),
        }
    }

    fn next_layer_entry(&mut self) -> Option<&'a HistoryEntry> {
        self.entries.by_ref().find(|entry| !entry.empty_layer)
    }
}

fn describe_layer(
    index: usize,
    source: &LayerSource,
    tree: &FileTree,
    history: Option<&HistoryEntry>,
    config: &IngestConfig,
) -> Layer {
    let raw_command = source
        .command
        .as_deref()
        .or_else(|| history.map(|entry| entry.created_by.as_str()))
        .unwrap_or(MISSING_COMMAND);
    let command = if config.strip_shell_prefix {
        strip_shell_prefix(raw_command)
    } else {
        raw_command
    };

    Layer {
        index,
        digest: source.digest.clone(),
        command: command.to_string(),
        created: source.created.or_else(|| history.and_then(|entry| entry.created)),
        size: tree.file_size,
        tree_name: tree.name.clone(),
    }
}

/// Build every layer tree of an image together with its descriptors.
pub fn ingest(image: &ImageSource, config: &IngestConfig) -> Result<IngestedImage, IngestError> {
    if image.layers.is_empty() {
        return Err(IngestError::NoLayers);
    }

    let mut history = HistoryCursor::new(&image.history);
    let mut layers = Vec::with_capacity(image.layers.len());
    let mut trees = Vec::with_capacity(image.layers.len());

    for (index, source) in image.layers.iter().enumerate() {
        let name = source.name.clone().unwrap_or_else(|| source.digest.clone());
        let tree = build_layer_tree(name, &source.records, config.tree_config)?;
        let entry = history.next_layer_entry();
        layers.push(describe_layer(index, source, &tree, entry, config));
        trees.push(tree);
    }

    debug!(image = %image.name, layers = layers.len(), "ingested image");
    Ok(IngestedImage {
        name: image.name.clone(),
        layers,
        trees,
    })
}
