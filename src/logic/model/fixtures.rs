//! Shared test fixtures

use std::sync::Arc;

use super::forest::Forest;
use super::treeshap::TreeExplainer;

/// The demo artifact shipped at the repository root
pub const DEMO_ARTIFACT: &str = include_str!("../../../RandomForestRegressor.json");

pub fn demo_forest() -> Forest {
    Forest::from_json_slice(DEMO_ARTIFACT.as_bytes()).expect("demo artifact is valid")
}

pub fn demo_explainer() -> TreeExplainer {
    TreeExplainer::new(Arc::new(demo_forest()))
}
