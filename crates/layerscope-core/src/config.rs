//! Tree construction configuration.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration carried by a tree and applied to every node it creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct TreeConfig {
    /// Initial collapsed state of newly created nodes.
    #[builder(default = "false")]
    #[serde(default)]
    pub collapse_directories: bool,
}

impl TreeConfig {
    /// Create a new tree config builder.
    pub fn builder() -> TreeConfigBuilder {
        TreeConfigBuilder::default()
    }

    /// Config whose new nodes start collapsed.
    pub fn collapsed() -> Self {
        Self {
            collapse_directories: true,
        }
    }
}
