//! Layer ingestion for layerscope.
//!
//! Archive decoders hand over per-file records for every layer of an image;
//! this crate turns them into single-layer trees and layer descriptors.
//!
//! # Example
//!
//! ```rust,no_run
//! use layerscope_ingest::{ImageSource, IngestConfig, ingest};
//!
//! let image = ImageSource::from_path("image.json").unwrap();
//! let ingested = ingest(&image, &IngestConfig::default()).unwrap();
//!
//! for layer in &ingested.layers {
//!     println!("{layer}");
//! }
//! ```

mod builder;
mod config;
mod error;
mod fingerprint;
mod layer;
mod records;

pub use builder::{IngestedImage, build_layer_tree, ingest};
pub use config::{IngestConfig, IngestConfigBuilder};
pub use error::IngestError;
pub use fingerprint::fingerprint_reader;
pub use layer::{Layer, MISSING_COMMAND, strip_shell_prefix};
pub use records::{FileRecord, HistoryEntry, ImageSource, LayerSource, RecordKind};
