//! Per-instrument baselines and online trade-size statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category assigned to instruments the catalog has not classified yet.
pub const FALLBACK_CATEGORY: &str = "other";

/// Floor applied to the standard deviation when computing z-scores, so a
/// degenerate (zero-variance) baseline cannot divide by zero.
pub const SIGMA_FLOOR: f64 = 1e-9;

/// Single-pass running mean/variance of trade size (Welford's algorithm).
///
/// Memory and update cost are O(1) per trade regardless of history length.
/// Variance uses the sample convention (ddof = 1), matching a batch
/// computation over the same sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    /// Number of observations. Monotonically non-decreasing.
    pub count: u64,
    /// Running mean of observed sizes.
    pub mean: f64,
    /// Sum of squared deviations from the running mean.
    pub m2: f64,
}

impl RunningStats {
    /// Incorporate one observation.
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Sample variance, `0.0` with fewer than two observations.
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Sample standard deviation.
    #[must_use]
    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Deviation of `value` from this baseline in standard deviations.
    ///
    /// The denominator is floored at [`SIGMA_FLOOR`]; callers gate on the
    /// warm-up minimum before trusting the result.
    #[must_use]
    pub fn z_score(&self, value: f64) -> f64 {
        (value - self.mean) / self.stddev().max(SIGMA_FLOOR)
    }
}

/// Per-instrument context merged into every trade at scoring time.
///
/// Running statistics are mutated only through the scoring engine's
/// [`ContextStore::apply_trade`](crate::port::store::ContextStore::apply_trade)
/// path; external liquidity fields are refreshed on an independent
/// background cycle and are eventually consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentContext {
    pub instrument_id: String,
    /// Authoritative category from the venue catalog, lowercase.
    pub category: String,
    pub open_interest: i64,
    pub volume_24h: i64,
    pub stats: RunningStats,
    /// Last mutation time (trade update or external refresh).
    pub updated_at: DateTime<Utc>,
}

impl InstrumentContext {
    /// Cold-start default served for unseen instruments so scoring never
    /// blocks on missing data.
    #[must_use]
    pub fn cold(instrument_id: impl Into<String>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            category: FALLBACK_CATEGORY.to_string(),
            open_interest: 0,
            volume_24h: 0,
            stats: RunningStats::default(),
            updated_at: Utc::now(),
        }
    }

    /// True until the instrument has seen at least `warmup_min_samples`
    /// trades. Cold instruments never alert.
    #[must_use]
    pub fn is_cold(&self, warmup_min_samples: u64) -> bool {
        self.stats.count < warmup_min_samples
    }

    /// Fold one trade size into the running statistics.
    pub fn apply_trade(&mut self, size: i64) {
        self.stats.push(size as f64);
        self.updated_at = Utc::now();
    }

    /// Overwrite externally sourced fields from the venue catalog.
    pub fn apply_refresh(&mut self, category: String, open_interest: i64, volume_24h: i64) {
        self.category = category;
        self.open_interest = open_interest;
        self.volume_24h = volume_24h;
        self.updated_at = Utc::now();
    }
}
