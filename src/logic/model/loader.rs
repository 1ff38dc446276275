//! Model Loader - read, checksum and parse the model artifact

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::ModelError;
use super::forest::Forest;

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_path: String,
    pub model_type: String,
    /// SHA-256 of the artifact bytes
    pub checksum: String,
    pub n_trees: usize,
    pub n_features: usize,
    pub n_nodes: usize,
    pub layout_version: u8,
    pub feature_names: Vec<String>,
    pub loaded_at: DateTime<Utc>,
}

/// A forest together with where it came from
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub forest: Forest,
    pub info: ModelInfo,
}

/// Load the forest artifact from `path`
pub fn load_model(path: &Path) -> Result<LoadedModel, ModelError> {
    tracing::info!("Loading model from: {}", path.display());

    let bytes = std::fs::read(path)?;
    let checksum = hex::encode(Sha256::digest(&bytes));
    let forest = Forest::from_json_slice(&bytes)?;

    let info = ModelInfo {
        model_path: path.display().to_string(),
        model_type: super::forest::ARTIFACT_FORMAT.to_string(),
        checksum,
        n_trees: forest.n_trees(),
        n_features: forest.n_features(),
        n_nodes: forest.n_nodes(),
        layout_version: forest.layout_version(),
        feature_names: forest.feature_names().to_vec(),
        loaded_at: Utc::now(),
    };

    tracing::info!(
        "Model loaded: {} trees, {} features, {} nodes (sha256 {})",
        info.n_trees,
        info.n_features,
        info.n_nodes,
        &info.checksum[..12]
    );

    Ok(LoadedModel { forest, info })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::fixtures::DEMO_ARTIFACT;
    use std::io::Write;

    #[test]
    fn test_load_demo_artifact() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DEMO_ARTIFACT.as_bytes()).unwrap();

        let loaded = load_model(file.path()).unwrap();
        assert_eq!(loaded.info.n_trees, 3);
        assert_eq!(loaded.info.n_features, 2);
        assert_eq!(loaded.info.feature_names, vec!["age", "weight"]);
        assert_eq!(loaded.info.layout_version, 1);
        assert_eq!(loaded.info.checksum.len(), 64);
        assert_eq!(
            loaded.info.checksum,
            hex::encode(Sha256::digest(DEMO_ARTIFACT.as_bytes()))
        );
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_model(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(ModelError::Io(_))));
    }

    #[test]
    fn test_corrupt_artifact() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"\x80\x04\x95 pickle bytes").unwrap();
        assert!(matches!(load_model(file.path()), Err(ModelError::Parse(_))));
    }
}
