//! Canned [`DecisionModel`] implementations.

use crate::domain::FeatureVector;
use crate::error::Result;
use crate::port::model::DecisionModel;

fn default_vocabulary() -> Vec<String> {
    vec!["politics".into(), "sports".into(), "other".into()]
}

/// Model that scores every trade the same.
pub struct FixedModel {
    score: f64,
    categories: Vec<String>,
}

impl FixedModel {
    pub fn new(score: f64) -> Self {
        Self {
            score,
            categories: default_vocabulary(),
        }
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }
}

impl DecisionModel for FixedModel {
    fn score(&self, _features: &FeatureVector) -> Result<f64> {
        Ok(self.score)
    }

    fn categories(&self) -> &[String] {
        &self.categories
    }
}

/// Model that flags trades by z-score: `whale_score` at or above the
/// cutoff, `normal_score` below it. Mirrors what a trained forest does
/// to the two worked pipeline scenarios without any trees.
pub struct ZGateModel {
    pub z_cutoff: f64,
    pub whale_score: f64,
    pub normal_score: f64,
    categories: Vec<String>,
}

impl ZGateModel {
    pub fn new(z_cutoff: f64) -> Self {
        Self {
            z_cutoff,
            whale_score: -0.82,
            normal_score: -0.3,
            categories: default_vocabulary(),
        }
    }
}

impl DecisionModel for ZGateModel {
    fn score(&self, features: &FeatureVector) -> Result<f64> {
        if features.size_z_score.abs() >= self.z_cutoff {
            Ok(self.whale_score)
        } else {
            Ok(self.normal_score)
        }
    }

    fn categories(&self) -> &[String] {
        &self.categories
    }
}
