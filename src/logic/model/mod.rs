//! Model Module - tree ensemble inference and attribution
//!
//! Loading, prediction and SHAP attribution are kept apart so the
//! explainer can be bound once and shared by every request.

pub mod error;
pub mod forest;
pub mod loader;
pub mod treeshap;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export common types
pub use error::ExplainError;
pub use forest::Forest;
pub use loader::{load_model, ModelInfo};
pub use treeshap::TreeExplainer;
