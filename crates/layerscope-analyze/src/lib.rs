//! Analysis algorithms for layerscope.
//!
//! This crate works on the single-layer trees of an ingested image:
//!
//! - **Efficiency scoring** - Find paths stored in more than one layer and
//!   the bytes wasted on them
//! - **Comparison cache** - Compose and diff layer ranges once per browsing
//!   session
//!
//! ```rust,no_run
//! use layerscope_analyze::{CompareMode, ImageAnalyzer};
//! use layerscope_ingest::ImageSource;
//!
//! let image = ImageSource::from_path("image.json").unwrap();
//! let analyzer = ImageAnalyzer::new();
//! let result = analyzer.analyze_source(&image).unwrap();
//!
//! println!("efficiency: {:.2}%", result.efficiency * 100.0);
//!
//! let mut cache = analyzer.tree_cache(&result).unwrap();
//! let tree = cache.get_layer(1, 0, CompareMode::Layer).unwrap();
//! print!("{}", tree.render(false));
//! ```

mod analysis;
mod cache;
mod efficiency;
mod error;

pub use analysis::{
    AnalysisConfig, AnalysisConfigBuilder, AnalysisResult, AnalysisSummary, ImageAnalyzer,
    InefficiencySummary,
};
pub use cache::{CompareMode, TreeCache, TreeCacheKey};
pub use efficiency::{EfficiencyData, EfficiencyReport, NodeLocation, efficiency};
pub use error::AnalysisError;

// Re-export core types
pub use layerscope_core::{DiffType, FileTree};
