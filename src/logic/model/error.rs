//! Model and explanation errors

use thiserror::Error;

/// Artifact could not be turned into a usable forest (fatal at startup)
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported model format '{format}' v{version}")]
    UnsupportedFormat { format: String, version: u32 },

    #[error("model artifact contains no trees")]
    NoTrees,

    #[error("model artifact declares no features")]
    NoFeatures,

    #[error("tree {tree}: {reason}")]
    MalformedTree { tree: usize, reason: String },
}

/// Input row rejected before reaching the model (request-scoped)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExplainError {
    #[error("input record has {actual} columns but the model expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("input record was built for layout {actual:08x} but the model is bound to {expected:08x}")]
    LayoutMismatch { expected: u32, actual: u32 },

    #[error("input column {index} is not a finite number")]
    NonFinite { index: usize },
}
