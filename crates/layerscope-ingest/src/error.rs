//! Error types for ingestion.

use std::path::PathBuf;

use layerscope_core::TreeError;
use thiserror::Error;

/// Errors that can occur while loading an image description or building
/// its layer trees.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Reading the image description failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The image description is not valid JSON for the record model.
    #[error("Malformed image description: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// A record could not be placed in its layer tree.
    #[error("Tree error: {source}")]
    Tree {
        #[from]
        source: TreeError,
    },

    /// The image has no layers.
    #[error("Image has no layers")]
    NoLayers,

    /// A record carries unusable data.
    #[error("Invalid record {path}: {message}")]
    InvalidRecord { path: String, message: String },
}

impl IngestError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
