//! Feature vectors fed to the decision model.

use rust_decimal::prelude::ToPrimitive;

use crate::domain::context::{InstrumentContext, FALLBACK_CATEGORY};
use crate::domain::trade::TradeEvent;

/// The number of numeric features ahead of the category one-hot block.
pub const NUMERIC_FEATURES: usize = 7;

/// Derived per-trade features. Never persisted.
///
/// Building a feature vector is a pure function of the trade and a
/// context snapshot: the same inputs always produce the same output.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    /// Contracts in this trade.
    pub trade_count: f64,
    /// Price paid per contract.
    pub price: f64,
    /// Baseline mean trade size from the context snapshot.
    pub avg_trade_size: f64,
    /// Deviation of this trade's size from the pre-update baseline.
    pub size_z_score: f64,
    /// Hours until market resolution, floored at zero.
    pub time_to_resolution_hours: f64,
    pub open_interest: f64,
    pub volume_24h: f64,
    /// One-hot category block, dimensioned by the model vocabulary.
    pub category_onehot: Vec<f64>,
}

impl FeatureVector {
    /// Build the feature vector for `trade` against a pre-update context
    /// snapshot.
    ///
    /// The z-score deliberately reflects the baseline *before* this trade
    /// is folded in; callers update the context store afterwards.
    /// Unrecognized categories one-hot to the vocabulary's
    /// [`FALLBACK_CATEGORY`] slot.
    #[must_use]
    pub fn build(trade: &TradeEvent, snapshot: &InstrumentContext, vocabulary: &[String]) -> Self {
        Self {
            trade_count: trade.size as f64,
            price: trade.price.to_f64().unwrap_or(0.0),
            avg_trade_size: snapshot.stats.mean,
            size_z_score: snapshot.stats.z_score(trade.size as f64),
            time_to_resolution_hours: trade.time_to_resolution_hours(),
            open_interest: snapshot.open_interest as f64,
            volume_24h: snapshot.volume_24h as f64,
            category_onehot: one_hot(&snapshot.category, vocabulary),
        }
    }

    /// Flatten to the dense layout the model scores:
    /// seven numeric features followed by the one-hot block.
    #[must_use]
    pub fn to_dense(&self) -> Vec<f64> {
        let mut dense = Vec::with_capacity(NUMERIC_FEATURES + self.category_onehot.len());
        dense.push(self.trade_count);
        dense.push(self.price);
        dense.push(self.avg_trade_size);
        dense.push(self.size_z_score);
        dense.push(self.time_to_resolution_hours);
        dense.push(self.open_interest);
        dense.push(self.volume_24h);
        dense.extend_from_slice(&self.category_onehot);
        dense
    }

    /// Total dimensionality (numeric block + one-hot block).
    #[must_use]
    pub fn len(&self) -> usize {
        NUMERIC_FEATURES + self.category_onehot.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Encode `category` against the model vocabulary.
///
/// Exactly one slot is set when the category (or the fallback slot) is
/// present; a vocabulary without the fallback yields an all-zero block
/// for unknown categories, which artifact validation prevents.
#[must_use]
pub fn one_hot(category: &str, vocabulary: &[String]) -> Vec<f64> {
    let mut encoded = vec![0.0; vocabulary.len()];
    let slot = vocabulary
        .iter()
        .position(|c| c.eq_ignore_ascii_case(category))
        .or_else(|| vocabulary.iter().position(|c| c == FALLBACK_CATEGORY));
    if let Some(i) = slot {
        encoded[i] = 1.0;
    }
    encoded
}
