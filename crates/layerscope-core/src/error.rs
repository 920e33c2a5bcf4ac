//! Error types for tree operations.

use thiserror::Error;

/// Errors that can occur while building, stacking or comparing trees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// A path could not be resolved against the tree.
    #[error("Path not found: {path}")]
    NotFound { path: String },

    /// The operation is not allowed on the given node.
    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    /// A path segment cannot be materialised as a node.
    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    /// Two nodes compared for equality do not share a name.
    #[error("Cannot compare mismatched nodes: {lower} vs {upper}")]
    ComparisonMismatch { lower: String, upper: String },

    /// A layer index outside the available trees was requested.
    #[error("Layer index {index} out of range ({count} layers)")]
    LayerOutOfRange { index: usize, count: usize },
}

impl TreeError {
    /// Create a not-found error for a path.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an invalid-path error for a path.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into() }
    }

    /// Check if this error is a failed path resolution.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
