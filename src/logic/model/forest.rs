//! Random Forest - tree ensemble regression
//!
//! The artifact mirrors the arrays scikit-learn keeps on a fitted
//! `DecisionTreeRegressor` (`tree_.children_left`, `tree_.feature`, ...),
//! one entry per tree of the ensemble. The forest's output is the mean of
//! its trees' outputs.

use serde::{Deserialize, Serialize};

use super::error::{ExplainError, ModelError};

// ============================================================================
// ARTIFACT
// ============================================================================

/// Artifact `format` tag accepted by the loader
pub const ARTIFACT_FORMAT: &str = "random_forest_regressor";

/// Artifact `format_version` accepted by the loader
pub const ARTIFACT_VERSION: u32 = 1;

/// Child marker for leaves (scikit-learn `TREE_LEAF`)
const TREE_LEAF: i64 = -1;

/// Relative tolerance for `cover(left) + cover(right) == cover(parent)`
const COVER_TOLERANCE: f64 = 1e-6;

fn default_layout_version() -> u8 {
    1
}

/// One tree as parallel arrays indexed by node id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeArrays {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
    /// Weighted number of training samples reaching each node
    #[serde(alias = "weighted_n_node_samples")]
    pub cover: Vec<f64>,
}

/// Serialized model as written by the training export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format: String,
    pub format_version: u32,
    #[serde(default = "default_layout_version")]
    pub layout_version: u8,
    pub feature_names: Vec<String>,
    pub trees: Vec<TreeArrays>,
}

// ============================================================================
// TREE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        cover: f64,
    },
    Leaf {
        value: f64,
        cover: f64,
    },
}

impl Node {
    pub fn cover(&self) -> f64 {
        match self {
            Node::Split { cover, .. } | Node::Leaf { cover, .. } => *cover,
        }
    }
}

/// scikit-learn evaluates splits on float32 inputs
#[inline]
pub(crate) fn goes_left(x: f64, threshold: f64) -> bool {
    (x as f32) as f64 <= threshold
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Build a tree from its arrays, rejecting anything that is not a proper
    /// binary tree rooted at node 0.
    pub fn from_arrays(arrays: &TreeArrays, n_features: usize) -> Result<Self, String> {
        let n = arrays.children_left.len();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        let lengths = [
            arrays.children_right.len(),
            arrays.feature.len(),
            arrays.threshold.len(),
            arrays.value.len(),
            arrays.cover.len(),
        ];
        if lengths.iter().any(|&len| len != n) {
            return Err(format!("array lengths differ (expected {} nodes)", n));
        }

        let mut referenced = vec![false; n];
        let mut nodes = Vec::with_capacity(n);

        for id in 0..n {
            let cover = arrays.cover[id];
            if !cover.is_finite() || cover <= 0.0 {
                return Err(format!("node {}: cover must be positive", id));
            }

            let (left, right) = (arrays.children_left[id], arrays.children_right[id]);
            if left == TREE_LEAF || right == TREE_LEAF {
                if left != right {
                    return Err(format!("node {}: only one child is a leaf marker", id));
                }
                let value = arrays.value[id];
                if !value.is_finite() {
                    return Err(format!("node {}: leaf value is not finite", id));
                }
                nodes.push(Node::Leaf { value, cover });
                continue;
            }

            let child = |c: i64| -> Result<usize, String> {
                // Children always come after their parent, which rules out cycles
                if c <= id as i64 || c >= n as i64 {
                    return Err(format!("node {}: child {} out of range", id, c));
                }
                Ok(c as usize)
            };
            let (left, right) = (child(left)?, child(right)?);
            if left == right {
                return Err(format!("node {}: both children are node {}", id, left));
            }
            for c in [left, right] {
                if std::mem::replace(&mut referenced[c], true) {
                    return Err(format!("node {} has more than one parent", c));
                }
            }

            let feature = arrays.feature[id];
            if feature < 0 || feature as usize >= n_features {
                return Err(format!("node {}: split feature {} out of range", id, feature));
            }
            let threshold = arrays.threshold[id];
            if !threshold.is_finite() {
                return Err(format!("node {}: threshold is not finite", id));
            }

            let children_cover = arrays.cover[left] + arrays.cover[right];
            if (children_cover - cover).abs() > COVER_TOLERANCE * cover {
                return Err(format!(
                    "node {}: children cover {} does not add up to {}",
                    id, children_cover, cover
                ));
            }

            nodes.push(Node::Split {
                feature: feature as usize,
                threshold,
                left,
                right,
                cover,
            });
        }

        if let Some(orphan) = (1..n).find(|&id| !referenced[id]) {
            return Err(format!("node {} is unreachable", orphan));
        }

        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    /// Leaf value reached by `row`; the row length is checked by the caller
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    id = if goes_left(row[*feature], *threshold) { *left } else { *right };
                }
            }
        }
    }

    /// Cover-weighted mean leaf value
    pub fn expected_value(&self) -> f64 {
        let total = self.root().cover();
        self.nodes
            .iter()
            .map(|node| match node {
                Node::Leaf { value, cover } => value * cover,
                Node::Split { .. } => 0.0,
            })
            .sum::<f64>()
            / total
    }

    pub fn max_depth(&self) -> usize {
        fn depth(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + depth(nodes, *left).max(depth(nodes, *right)),
            }
        }
        depth(&self.nodes, 0)
    }
}

// ============================================================================
// FOREST
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Forest {
    feature_names: Vec<String>,
    layout_version: u8,
    trees: Vec<Tree>,
}

impl Forest {
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ModelError> {
        if artifact.format != ARTIFACT_FORMAT || artifact.format_version != ARTIFACT_VERSION {
            return Err(ModelError::UnsupportedFormat {
                format: artifact.format,
                version: artifact.format_version,
            });
        }
        if artifact.feature_names.is_empty() {
            return Err(ModelError::NoFeatures);
        }
        if artifact.trees.is_empty() {
            return Err(ModelError::NoTrees);
        }

        let n_features = artifact.feature_names.len();
        let trees = artifact
            .trees
            .iter()
            .enumerate()
            .map(|(tree, arrays)| {
                Tree::from_arrays(arrays, n_features)
                    .map_err(|reason| ModelError::MalformedTree { tree, reason })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            feature_names: artifact.feature_names,
            layout_version: artifact.layout_version,
            trees,
        })
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes)?;
        Self::from_artifact(artifact)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn layout_version(&self) -> u8 {
        self.layout_version
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_nodes(&self) -> usize {
        self.trees.iter().map(|t| t.nodes().len()).sum()
    }

    /// Reject rows the trees cannot be evaluated on
    pub fn check_row(&self, row: &[f64]) -> Result<(), ExplainError> {
        if row.len() != self.n_features() {
            return Err(ExplainError::ShapeMismatch {
                expected: self.n_features(),
                actual: row.len(),
            });
        }
        if let Some(index) = row.iter().position(|v| !v.is_finite()) {
            return Err(ExplainError::NonFinite { index });
        }
        Ok(())
    }

    /// Mean of the trees' outputs for one row
    pub fn predict(&self, row: &[f64]) -> Result<f64, ExplainError> {
        self.check_row(row)?;
        let sum: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        Ok(sum / self.trees.len() as f64)
    }

    /// Mean prediction over the training distribution recorded in the trees
    pub fn expected_value(&self) -> f64 {
        let sum: f64 = self.trees.iter().map(Tree::expected_value).sum();
        sum / self.trees.len() as f64
    }
}
