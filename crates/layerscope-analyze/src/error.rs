//! Error types for analysis.

use layerscope_core::TreeError;
use layerscope_ingest::IngestError;
use thiserror::Error;

/// Errors that can occur while analyzing an image.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The image could not be ingested.
    #[error("Ingest failed: {source}")]
    Ingest {
        #[from]
        source: IngestError,
    },

    /// Layer trees could not be composed or compared.
    #[error("Tree error: {source}")]
    Tree {
        #[from]
        source: TreeError,
    },
}
