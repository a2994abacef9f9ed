//! Isolation forest loaded from a JSON artifact.
//!
//! The artifact is produced offline by the training job:
//!
//! ```json
//! { "categories": [...], "subsample_size": 256, "trees": [...] }
//! ```
//!
//! Scoring follows the isolation forest contract
//! `score = -2^(-E[h(x)] / c(psi))` where `E[h(x)]` is the mean path
//! length across trees and `c(psi)` the expected path length of an
//! unsuccessful BST search over the training subsample. Scores fall in
//! `[-1, 0)`; lower means more anomalous.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::domain::feature::NUMERIC_FEATURES;
use crate::domain::{FeatureVector, FALLBACK_CATEGORY};
use crate::error::{Error, Result, ScoringError};
use crate::port::model::DecisionModel;

const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;

/// One tree node. Splits route on `x[feature] < threshold`; leaves carry
/// the number of training samples that ended there.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: u64,
    },
}

impl Node {
    fn path_length(&self, x: &[f64], depth: f64) -> f64 {
        match self {
            Node::Leaf { size } => depth + average_path_length(*size),
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if x[*feature] < *threshold {
                    left.path_length(x, depth + 1.0)
                } else {
                    right.path_length(x, depth + 1.0)
                }
            }
        }
    }

    fn max_feature_index(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Split {
                feature,
                left,
                right,
                ..
            } => (*feature)
                .max(left.max_feature_index())
                .max(right.max_feature_index()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Artifact {
    categories: Vec<String>,
    subsample_size: u64,
    trees: Vec<Node>,
}

/// Expected path length of an unsuccessful BST search over `n` samples.
fn average_path_length(n: u64) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        n => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_MASCHERONI) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Immutable isolation forest shared read-only across scoring workers.
#[derive(Debug)]
pub struct ForestModel {
    categories: Vec<String>,
    trees: Vec<Node>,
    normalizer: f64,
    expected_dims: usize,
}

impl ForestModel {
    /// Parse and validate an artifact.
    pub fn from_json(json: &str) -> Result<Self> {
        let artifact: Artifact = serde_json::from_str(json)?;

        if artifact.trees.is_empty() {
            return Err(ScoringError::InvalidArtifact("no trees".into()).into());
        }
        if artifact.subsample_size < 2 {
            return Err(ScoringError::InvalidArtifact(format!(
                "subsample_size must be at least 2, got {}",
                artifact.subsample_size
            ))
            .into());
        }
        if artifact.categories.is_empty() {
            return Err(ScoringError::InvalidArtifact("empty category vocabulary".into()).into());
        }
        if !artifact
            .categories
            .iter()
            .any(|c| c == FALLBACK_CATEGORY)
        {
            return Err(ScoringError::InvalidArtifact(format!(
                "vocabulary is missing the '{FALLBACK_CATEGORY}' slot"
            ))
            .into());
        }

        let expected_dims = NUMERIC_FEATURES + artifact.categories.len();
        for (i, tree) in artifact.trees.iter().enumerate() {
            let max_index = tree.max_feature_index();
            if max_index >= expected_dims {
                return Err(ScoringError::InvalidArtifact(format!(
                    "tree {i} splits on feature {max_index}, model has {expected_dims} features"
                ))
                .into());
            }
        }

        info!(
            trees = artifact.trees.len(),
            categories = artifact.categories.len(),
            dims = expected_dims,
            "Loaded decision model"
        );

        Ok(Self {
            categories: artifact.categories,
            trees: artifact.trees,
            normalizer: average_path_length(artifact.subsample_size),
            expected_dims,
        })
    }

    /// Load an artifact from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref()).map_err(Error::Io)?;
        Self::from_json(&json)
    }
}

impl DecisionModel for ForestModel {
    fn score(&self, features: &FeatureVector) -> Result<f64> {
        if features.len() != self.expected_dims {
            return Err(ScoringError::DimensionMismatch {
                expected: self.expected_dims,
                got: features.len(),
            }
            .into());
        }

        let dense = features.to_dense();
        if let Some(index) = dense.iter().position(|v| !v.is_finite()) {
            return Err(ScoringError::NonFiniteFeature { index }.into());
        }

        let total: f64 = self
            .trees
            .iter()
            .map(|tree| tree.path_length(&dense, 0.0))
            .sum();
        let mean_path = total / self.trees.len() as f64;

        Ok(-(2f64.powf(-mean_path / self.normalizer)))
    }

    fn categories(&self) -> &[String] {
        &self.categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::feature::one_hot;

    /// One tree isolating large z-scores at depth 1; everything else
    /// bottoms out in a deep, well-populated leaf.
    fn artifact_json() -> String {
        r#"{
            "categories": ["politics", "sports", "other"],
            "subsample_size": 256,
            "trees": [
                {
                    "feature": 3,
                    "threshold": 100.0,
                    "left": {
                        "feature": 0,
                        "threshold": 500.0,
                        "left": {"size": 200},
                        "right": {"size": 40}
                    },
                    "right": {"size": 1}
                }
            ]
        }"#
        .to_string()
    }

    fn features(z: f64, count: f64) -> FeatureVector {
        FeatureVector {
            trade_count: count,
            price: 0.5,
            avg_trade_size: 50.0,
            size_z_score: z,
            time_to_resolution_hours: 48.0,
            open_interest: 1000.0,
            volume_24h: 2000.0,
            category_onehot: one_hot("politics", &[
                "politics".to_string(),
                "sports".to_string(),
                "other".to_string(),
            ]),
        }
    }

    #[test]
    fn average_path_length_known_values() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) per the published formula.
        let c = average_path_length(256);
        assert!((c - 10.244).abs() < 0.01, "c(256) was {c}");
    }

    #[test]
    fn isolated_outlier_scores_below_threshold() {
        let model = ForestModel::from_json(&artifact_json()).unwrap();
        let score = model.score(&features(495.0, 5000.0)).unwrap();
        // Path length 1 against c(256) ~ 10.24.
        assert!(score < -0.9, "score was {score}");
        assert!(score >= -1.0);
    }

    #[test]
    fn typical_trade_scores_near_zero() {
        let model = ForestModel::from_json(&artifact_json()).unwrap();
        let score = model.score(&features(0.1, 50.0)).unwrap();
        assert!(score > -0.7, "score was {score}");
        assert!(score < 0.0);
    }

    #[test]
    fn scoring_is_deterministic() {
        let model = ForestModel::from_json(&artifact_json()).unwrap();
        let fv = features(3.0, 120.0);
        assert_eq!(model.score(&fv).unwrap(), model.score(&fv).unwrap());
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let model = ForestModel::from_json(&artifact_json()).unwrap();
        let mut fv = features(1.0, 50.0);
        fv.category_onehot.push(0.0);
        let err = model.score(&fv).unwrap_err();
        assert!(matches!(
            err,
            Error::Scoring(ScoringError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn non_finite_feature_is_rejected() {
        let model = ForestModel::from_json(&artifact_json()).unwrap();
        let mut fv = features(1.0, 50.0);
        fv.open_interest = f64::NAN;
        let err = model.score(&fv).unwrap_err();
        assert!(matches!(
            err,
            Error::Scoring(ScoringError::NonFiniteFeature { index: 5 })
        ));
    }

    #[test]
    fn artifact_without_trees_is_invalid() {
        let json = r#"{"categories": ["other"], "subsample_size": 256, "trees": []}"#;
        assert!(ForestModel::from_json(json).is_err());
    }

    #[test]
    fn artifact_without_fallback_slot_is_invalid() {
        let json = r#"{
            "categories": ["politics"],
            "subsample_size": 256,
            "trees": [{"size": 10}]
        }"#;
        let err = ForestModel::from_json(json).unwrap_err();
        assert!(err.to_string().contains("other"));
    }

    #[test]
    fn artifact_with_out_of_range_feature_is_invalid() {
        let json = r#"{
            "categories": ["other"],
            "subsample_size": 256,
            "trees": [{
                "feature": 99, "threshold": 1.0,
                "left": {"size": 1}, "right": {"size": 1}
            }]
        }"#;
        let err = ForestModel::from_json(json).unwrap_err();
        assert!(matches!(
            err,
            Error::Scoring(ScoringError::InvalidArtifact(_))
        ));
    }

    #[test]
    fn categories_expose_vocabulary_in_slot_order() {
        let model = ForestModel::from_json(&artifact_json()).unwrap();
        assert_eq!(model.categories(), &["politics", "sports", "other"]);
    }
}
