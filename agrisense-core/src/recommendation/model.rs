//! Evaluator for gradient-boosted tree ensembles exported to JSON.
//!
//! The artifact is produced offline. Each class owns a list of regression
//! trees; the class margin is the base score plus the leaf value reached in
//! every tree, and class probabilities are the softmax over margins. Inputs
//! are standardised with the scaler saved next to the trees.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::features::{FieldConditions, FEATURE_COUNT};
use crate::errors::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        leaf: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    /// Walk from the root; `x < threshold` goes left.
    fn evaluate(&self, features: &[f64]) -> CoreResult<f64> {
        let mut index = 0;
        // a well-formed tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(index) {
                Some(TreeNode::Leaf { leaf }) => return Ok(*leaf),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = features.get(*feature).copied().ok_or_else(|| {
                        CoreError::internal(format!("Tree references unknown feature {}", feature))
                    })?;
                    index = if value < *threshold { *left } else { *right };
                }
                None => {
                    return Err(CoreError::internal(format!(
                        "Tree references missing node {}",
                        index
                    )))
                }
            }
        }
        Err(CoreError::internal("Tree contains a cycle"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    fn transform(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(value, (mean, scale))| {
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (value - mean) / scale
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_name: String,
    pub version: String,
    pub accuracy: f64,
    #[serde(default)]
    pub precision: Option<f64>,
    #[serde(default)]
    pub recall: Option<f64>,
    #[serde(default)]
    pub f1_score: Option<f64>,
    #[serde(default)]
    pub test_samples: Option<i32>,
    #[serde(default)]
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropModel {
    pub metadata: ModelMetadata,
    pub scaler: StandardScaler,
    pub classes: Vec<String>,
    #[serde(default)]
    pub base_score: f64,
    /// `class_trees[c]` holds the trees contributing to `classes[c]`.
    pub class_trees: Vec<Vec<Tree>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassProbability {
    pub crop: String,
    pub probability: f64,
}

impl CropModel {
    pub fn from_json(raw: &str) -> CoreResult<Self> {
        let model: CropModel = serde_json::from_str(raw)
            .map_err(|e| CoreError::validation("Invalid crop model artifact").with_source(e))?;
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::internal(format!("Failed to read crop model {}", path.display()))
                .with_source(e)
        })?;
        Self::from_json(&raw)
    }

    fn validate(&self) -> CoreResult<()> {
        if self.classes.is_empty() {
            return Err(CoreError::validation("Crop model has no classes"));
        }
        if self.class_trees.len() != self.classes.len() {
            return Err(CoreError::validation(format!(
                "Crop model has {} classes but {} tree lists",
                self.classes.len(),
                self.class_trees.len()
            )));
        }
        if self.scaler.mean.len() != FEATURE_COUNT || self.scaler.scale.len() != FEATURE_COUNT {
            return Err(CoreError::validation(format!(
                "Crop model scaler must cover {} features",
                FEATURE_COUNT
            )));
        }
        for tree in self.class_trees.iter().flatten() {
            for node in &tree.nodes {
                if let TreeNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } = node
                {
                    if *feature >= FEATURE_COUNT
                        || *left >= tree.nodes.len()
                        || *right >= tree.nodes.len()
                    {
                        return Err(CoreError::validation(
                            "Crop model contains a split pointing outside its tree",
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Probabilities for every class, highest first.
    pub fn predict(&self, conditions: &FieldConditions) -> CoreResult<Vec<ClassProbability>> {
        let scaled = self.scaler.transform(&conditions.features());

        let mut margins = Vec::with_capacity(self.classes.len());
        for trees in &self.class_trees {
            let mut margin = self.base_score;
            for tree in trees {
                margin += tree.evaluate(&scaled)?;
            }
            margins.push(margin);
        }

        let mut probabilities: Vec<ClassProbability> = self
            .classes
            .iter()
            .zip(softmax(&margins))
            .map(|(crop, probability)| ClassProbability {
                crop: crop.clone(),
                probability,
            })
            .collect();
        probabilities.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        Ok(probabilities)
    }
}

pub fn softmax(margins: &[f64]) -> Vec<f64> {
    let max = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = margins.iter().map(|margin| (margin - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|value| value / total).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Two-class model: rice when rainfall is high, chickpea otherwise.
    pub(crate) fn rainfall_model() -> CropModel {
        let mut mean = vec![0.0; FEATURE_COUNT];
        let mut scale = vec![1.0; FEATURE_COUNT];
        mean[6] = 5.0;
        scale[6] = 2.0;
        let raw = json!({
            "metadata": {
                "model_name": "XGBoost",
                "version": "2.0",
                "accuracy": 0.97,
                "feature_names": ["N", "P", "K"]
            },
            "scaler": { "mean": mean, "scale": scale },
            "classes": ["rice", "chickpea"],
            "base_score": 0.5,
            "class_trees": [
                [{ "nodes": [
                    { "feature": 6, "threshold": 0.0, "left": 1, "right": 2 },
                    { "leaf": -1.0 },
                    { "leaf": 2.0 }
                ]}],
                [{ "nodes": [
                    { "feature": 6, "threshold": 0.0, "left": 1, "right": 2 },
                    { "leaf": 1.5 },
                    { "leaf": -0.5 }
                ]}]
            ]
        });
        CropModel::from_json(&raw.to_string()).unwrap()
    }

    fn conditions(rainfall: f64) -> FieldConditions {
        FieldConditions {
            n: 80.0,
            p: 40.0,
            k: 40.0,
            ph: 6.5,
            temperature: 26.0,
            humidity: 80.0,
            rainfall,
        }
    }

    #[test]
    fn softmax_sums_to_one() {
        let probabilities = softmax(&[1.0, 2.0, 3.0]);
        assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(probabilities[2] > probabilities[1]);
    }

    #[test]
    fn trees_route_on_scaled_features() {
        let model = rainfall_model();

        let wet = model.predict(&conditions(12.0)).unwrap();
        assert_eq!(wet[0].crop, "rice");
        let expected = 1.0 / (1.0 + (-2.5f64).exp());
        assert!((wet[0].probability - expected).abs() < 1e-9);

        let dry = model.predict(&conditions(1.0)).unwrap();
        assert_eq!(dry[0].crop, "chickpea");
    }

    #[test]
    fn rejects_mismatched_artifacts() {
        let mut model = rainfall_model();
        model.class_trees.pop();
        let raw = serde_json::to_string(&model).unwrap();
        assert!(CropModel::from_json(&raw).is_err());

        let mut model = rainfall_model();
        model.class_trees[0][0].nodes[0] = TreeNode::Split {
            feature: 6,
            threshold: 0.0,
            left: 7,
            right: 2,
        };
        let raw = serde_json::to_string(&model).unwrap();
        assert!(CropModel::from_json(&raw).is_err());
    }

    #[test]
    fn cyclic_tree_is_an_error() {
        let tree = Tree {
            nodes: vec![TreeNode::Split {
                feature: 0,
                threshold: 1.0,
                left: 0,
                right: 0,
            }],
        };
        assert!(tree.evaluate(&[0.0]).is_err());
    }
}
