//! Whole-image analysis.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use tracing::info;

use layerscope_core::{FileTree, TreeConfig};
use layerscope_ingest::{ImageSource, IngestConfig, IngestedImage, Layer, ingest};

use crate::cache::TreeCache;
use crate::efficiency::{EfficiencyData, efficiency};
use crate::error::AnalysisError;

/// Configuration for image analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct AnalysisConfig {
    /// Build every browsing comparison up front.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub prewarm_cache: bool,

    /// Configuration handed to every layer tree.
    #[builder(default)]
    #[serde(default)]
    pub tree_config: TreeConfig,
}

fn default_true() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            prewarm_cache: true,
            tree_config: TreeConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Create a new analysis config builder.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }
}

/// Everything known about an analyzed image.
#[derive(Debug)]
pub struct AnalysisResult {
    pub name: String,
    pub layers: Vec<Layer>,
    /// Single-layer trees, oldest first.
    pub ref_trees: Vec<FileTree>,
    pub efficiency: f64,
    /// Bytes across all layers.
    pub size_bytes: u64,
    /// Bytes across all layers but the base.
    pub user_size_bytes: u64,
    /// Cumulative size of every inefficient path.
    pub wasted_bytes: u64,
    /// `wasted_bytes` as a fraction of `user_size_bytes`.
    pub wasted_user_percent: f64,
    /// Paths seen more than once, ascending by cumulative size.
    pub inefficiencies: Vec<EfficiencyData>,
}

impl AnalysisResult {
    /// Serializable view without the trees.
    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary {
            name: self.name.clone(),
            layers: self.layers.clone(),
            efficiency: self.efficiency,
            size_bytes: self.size_bytes,
            user_size_bytes: self.user_size_bytes,
            wasted_bytes: self.wasted_bytes,
            wasted_user_percent: self.wasted_user_percent,
            inefficiencies: self
                .inefficiencies
                .iter()
                .rev()
                .map(|data| InefficiencySummary {
                    path: data.path.clone(),
                    count: data.count(),
                    cumulative_size: data.cumulative_size,
                    min_size: data.min_discovered_size,
                })
                .collect(),
        }
    }
}

/// One inefficient path in a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InefficiencySummary {
    pub path: String,
    pub count: usize,
    pub cumulative_size: u64,
    pub min_size: u64,
}

/// Report form of an analysis; inefficiencies are listed worst first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub name: String,
    pub layers: Vec<Layer>,
    pub efficiency: f64,
    pub size_bytes: u64,
    pub user_size_bytes: u64,
    pub wasted_bytes: u64,
    pub wasted_user_percent: f64,
    pub inefficiencies: Vec<InefficiencySummary>,
}

/// Image analyzer.
pub struct ImageAnalyzer {
    config: AnalysisConfig,
}

impl ImageAnalyzer {
    /// Create a new analyzer with default config.
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
        }
    }

    /// Create a new analyzer with custom config.
    pub fn with_config(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Ingest and analyze an image description.
    pub fn analyze_source(&self, image: &ImageSource) -> Result<AnalysisResult, AnalysisError> {
        let ingest_config = IngestConfig {
            tree_config: self.config.tree_config,
            ..IngestConfig::default()
        };
        self.analyze(ingest(image, &ingest_config)?)
    }

    /// Score an ingested image and total its sizes.
    pub fn analyze(&self, image: IngestedImage) -> Result<AnalysisResult, AnalysisError> {
        let report = efficiency(&image.trees)?;

        let size_bytes: u64 = image.layers.iter().map(|layer| layer.size).sum();
        let user_size_bytes: u64 = image.layers.iter().skip(1).map(|layer| layer.size).sum();
        let wasted_bytes: u64 = report
            .inefficiencies
            .iter()
            .map(|data| data.cumulative_size)
            .sum();
        let wasted_user_percent = if user_size_bytes == 0 {
            0.0
        } else {
            wasted_bytes as f64 / user_size_bytes as f64
        };

        info!(
            image = %image.name,
            efficiency = report.score,
            wasted_bytes,
            "analyzed image"
        );

        Ok(AnalysisResult {
            name: image.name,
            layers: image.layers,
            ref_trees: image.trees,
            efficiency: report.score,
            size_bytes,
            user_size_bytes,
            wasted_bytes,
            wasted_user_percent,
            inefficiencies: report.inefficiencies,
        })
    }

    /// Comparison cache over the result's trees, prewarmed if configured.
    pub fn tree_cache<'r>(&self, result: &'r AnalysisResult) -> Result<TreeCache<'r>, AnalysisError> {
        let mut cache = TreeCache::new(&result.ref_trees);
        if self.config.prewarm_cache {
            cache.prewarm()?;
        }
        Ok(cache)
    }
}

impl Default for ImageAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
