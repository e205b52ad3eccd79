//! Regression model evaluators.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Parameters of a trained price model.
///
/// Serialized with a `type` tag:
///
/// ```json
/// {"type": "linear", "intercept": 12000.0, "coefficients": [3100.0, 850.0]}
/// {"type": "tree_ensemble", "aggregation": "sum", "base_score": 410000.0, "trees": [...]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegressionModel {
    /// `intercept + sum(coefficients[i] * x[i])`.
    Linear {
        /// Constant term.
        intercept: f64,
        /// One weight per feature.
        coefficients: Vec<f64>,
    },
    /// `base_score + aggregate(tree outputs)`.
    TreeEnsemble {
        /// Member trees.
        trees: Vec<RegressionTree>,
        /// How tree outputs are combined.
        #[serde(default)]
        aggregation: Aggregation,
        /// Added to the aggregated output.
        #[serde(default)]
        base_score: f64,
    },
}

/// Combination rule for ensemble members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Average of tree outputs (random forest).
    #[default]
    Mean,
    /// Sum of tree outputs (gradient boosting).
    Sum,
}

/// A single regression tree stored as a flat node list rooted at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    /// Nodes; children always come after their parent.
    pub nodes: Vec<TreeNode>,
}

/// A tree node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Goes `left` when `x[feature] <= threshold`, otherwise `right`.
    Split {
        /// Feature index.
        feature: usize,
        /// Split threshold.
        threshold: f64,
        /// Index of the left child.
        left: usize,
        /// Index of the right child.
        right: usize,
    },
    /// Terminal value.
    Leaf {
        /// Output of this leaf.
        value: f64,
    },
}

impl RegressionModel {
    /// Checks the parameters against the schema width.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelUnavailable`] describing the first defect.
    pub fn validate(&self, feature_count: usize) -> Result<()> {
        match self {
            Self::Linear {
                intercept,
                coefficients,
            } => {
                if coefficients.len() != feature_count {
                    return Err(Error::ModelUnavailable(format!(
                        "linear model has {} coefficients for {feature_count} features",
                        coefficients.len()
                    )));
                }
                if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                    return Err(Error::ModelUnavailable(
                        "linear model has non-finite parameters".to_string(),
                    ));
                }
            },
            Self::TreeEnsemble {
                trees, base_score, ..
            } => {
                if trees.is_empty() {
                    return Err(Error::ModelUnavailable(
                        "tree ensemble has no trees".to_string(),
                    ));
                }
                if !base_score.is_finite() {
                    return Err(Error::ModelUnavailable(
                        "tree ensemble base score is not finite".to_string(),
                    ));
                }
                for (index, tree) in trees.iter().enumerate() {
                    tree.validate(feature_count).map_err(|reason| {
                        Error::ModelUnavailable(format!("tree {index}: {reason}"))
                    })?;
                }
            },
        }
        Ok(())
    }

    /// Evaluates the model on an encoded feature vector.
    ///
    /// The vector must have the width passed to [`validate`](Self::validate).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn predict(&self, features: &[f64]) -> f64 {
        match self {
            Self::Linear {
                intercept,
                coefficients,
            } => {
                intercept
                    + coefficients
                        .iter()
                        .zip(features)
                        .map(|(c, x)| c * x)
                        .sum::<f64>()
            },
            Self::TreeEnsemble {
                trees,
                aggregation,
                base_score,
            } => {
                let total: f64 = trees.iter().map(|tree| tree.predict(features)).sum();
                match aggregation {
                    Aggregation::Mean => base_score + total / trees.len() as f64,
                    Aggregation::Sum => base_score + total,
                }
            },
        }
    }

    /// Short family name for logs.
    #[must_use]
    pub const fn family(&self) -> &'static str {
        match self {
            Self::Linear { .. } => "linear",
            Self::TreeEnsemble { .. } => "tree_ensemble",
        }
    }
}

impl RegressionTree {
    fn validate(&self, feature_count: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (index, node) in self.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= feature_count {
                        return Err(format!(
                            "node {index} splits on feature {feature} of {feature_count}"
                        ));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {index} has a NaN threshold"));
                    }
                    for child in [left, right] {
                        if child <= index || child >= self.nodes.len() {
                            return Err(format!("node {index} has invalid child {child}"));
                        }
                    }
                },
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {index} is not finite"));
                    }
                },
            }
        }
        Ok(())
    }

    /// Walks from the root to a leaf.
    ///
    /// Validation guarantees children follow parents, so the walk terminates.
    fn predict(&self, features: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                Some(TreeNode::Leaf { value }) => return *value,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = features.get(*feature).copied().unwrap_or(0.0);
                    index = if x <= *threshold { *left } else { *right };
                },
                None => return f64::NAN,
            }
        }
    }
}
