//! Ingestion configuration.

use derive_builder::Builder;
use layerscope_core::TreeConfig;
use serde::{Deserialize, Serialize};

/// Configuration for turning layer records into trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct IngestConfig {
    /// Configuration handed to every layer tree.
    #[builder(default)]
    #[serde(default)]
    pub tree_config: TreeConfig,

    /// Strip the `/bin/sh -c ` prefix from layer commands.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub strip_shell_prefix: bool,
}

fn default_true() -> bool {
    true
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            tree_config: TreeConfig::default(),
            strip_shell_prefix: true,
        }
    }
}

impl IngestConfig {
    /// Create a new ingest config builder.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }
}
