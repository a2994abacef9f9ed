//! Decision model port.

use crate::domain::FeatureVector;
use crate::error::Result;

/// A trained anomaly model loaded at startup.
///
/// Scoring is synchronous and CPU-bound; callers on async tasks invoke
/// it inline because a single evaluation is microseconds of work.
pub trait DecisionModel: Send + Sync {
    /// Anomaly score for a feature vector. More negative means more
    /// anomalous. Fails on dimension mismatch or non-finite features.
    fn score(&self, features: &FeatureVector) -> Result<f64>;

    /// Category vocabulary the model was trained with, in one-hot slot
    /// order. Feature vectors must be encoded against exactly this list.
    fn categories(&self) -> &[String];
}
