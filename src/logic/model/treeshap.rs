//! TreeSHAP - exact Shapley attributions for tree ensembles
//!
//! Polynomial-time path-dependent algorithm (Lundberg et al., "Consistent
//! Individualized Feature Attribution for Tree Ensembles", Algorithm 2).
//! Feature absence is modelled by following both children weighted by the
//! training cover recorded in the tree, so for every row
//! `expected_value + Σ φᵢ == predict(row)` up to floating-point error.

use std::sync::Arc;

use super::error::ExplainError;
use super::forest::{goes_left, Forest, Node, Tree};
use crate::models::Attribution;

/// One entry of the unique feature path from the root to the current node
#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// `None` for the root sentinel
    feature: Option<usize>,
    /// Fraction of zero paths (feature absent) flowing through this split
    zero_fraction: f64,
    /// Fraction of one paths (feature present) flowing through this split
    one_fraction: f64,
    /// Proportion of permutations with this subset size
    pweight: f64,
}

/// Grow the path by one split, updating subset-size weights
fn extend_path(
    path: &mut Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let d = depth as f64;
    for i in (0..depth).rev() {
        let w = path[i].pweight;
        path[i + 1].pweight += one_fraction * w * (i as f64 + 1.0) / (d + 1.0);
        path[i].pweight = zero_fraction * w * (d - i as f64) / (d + 1.0);
    }
}

/// Undo `extend_path` for the element at `index`
fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let d = depth as f64;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * (d + 1.0) / ((i as f64 + 1.0) * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (d - i as f64) / (d + 1.0);
        } else {
            path[i].pweight = path[i].pweight * (d + 1.0) / (zero_fraction * (d - i as f64));
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight of the path with the element at `index` removed
fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let d = depth as f64;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * (d + 1.0) / ((i as f64 + 1.0) * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * ((d - i as f64) / (d + 1.0));
        } else if zero_fraction != 0.0 {
            total += (path[i].pweight / zero_fraction) / ((d - i as f64) / (d + 1.0));
        }
    }

    total
}

struct Walk<'a> {
    tree: &'a Tree,
    row: &'a [f64],
    phi: &'a mut [f64],
    scale: f64,
}

impl Walk<'_> {
    fn recurse(
        &mut self,
        node: usize,
        mut path: Vec<PathElement>,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        extend_path(&mut path, zero_fraction, one_fraction, feature);

        let tree = self.tree;
        let nodes = tree.nodes();
        match nodes[node] {
            Node::Leaf { value, .. } => {
                for i in 1..path.len() {
                    let w = unwound_path_sum(&path, i);
                    let el = path[i];
                    if let Some(f) = el.feature {
                        self.phi[f] += w * (el.one_fraction - el.zero_fraction) * value * self.scale;
                    }
                }
            }
            Node::Split {
                feature: split,
                threshold,
                left,
                right,
                cover,
            } => {
                let (hot, cold) = if goes_left(self.row[split], threshold) {
                    (left, right)
                } else {
                    (right, left)
                };
                let hot_zero_fraction = nodes[hot].cover() / cover;
                let cold_zero_fraction = nodes[cold].cover() / cover;

                // A feature seen earlier on this path is merged into one element
                let mut incoming_zero_fraction = 1.0;
                let mut incoming_one_fraction = 1.0;
                if let Some(k) = (1..path.len()).find(|&k| path[k].feature == Some(split)) {
                    incoming_zero_fraction = path[k].zero_fraction;
                    incoming_one_fraction = path[k].one_fraction;
                    unwind_path(&mut path, k);
                }

                self.recurse(
                    hot,
                    path.clone(),
                    hot_zero_fraction * incoming_zero_fraction,
                    incoming_one_fraction,
                    Some(split),
                );
                self.recurse(
                    cold,
                    path,
                    cold_zero_fraction * incoming_zero_fraction,
                    0.0,
                    Some(split),
                );
            }
        }
    }
}

/// Attribution explainer bound to one forest.
///
/// Binding is independent of any input row, so one explainer serves every
/// request for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct TreeExplainer {
    forest: Arc<Forest>,
    expected_value: f64,
}

impl TreeExplainer {
    pub fn new(forest: Arc<Forest>) -> Self {
        let expected_value = forest.expected_value();
        Self {
            forest,
            expected_value,
        }
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Baseline all attributions are measured from
    pub fn expected_value(&self) -> f64 {
        self.expected_value
    }

    pub fn n_features(&self) -> usize {
        self.forest.n_features()
    }

    pub fn predict(&self, row: &[f64]) -> Result<f64, ExplainError> {
        self.forest.predict(row)
    }

    /// SHAP values for one row, averaged over the trees like the prediction
    pub fn shap_values(&self, row: &[f64]) -> Result<Attribution, ExplainError> {
        self.forest.check_row(row)?;

        let trees = self.forest.trees();
        let mut phi = vec![0.0; self.n_features()];
        let scale = 1.0 / trees.len() as f64;

        for tree in trees {
            let depth = tree.max_depth();
            let mut walk = Walk {
                tree,
                row,
                phi: &mut phi,
                scale,
            };
            walk.recurse(0, Vec::with_capacity(depth + 2), 1.0, 1.0, None);
        }

        Ok(Attribution {
            expected_value: self.expected_value,
            contributions: phi,
        })
    }
}
