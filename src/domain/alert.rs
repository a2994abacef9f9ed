//! Confirmed whale alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity tier derived from the anomaly score. Lower scores mean
/// stronger outlier evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Extreme,
    Major,
    Notable,
}

impl Severity {
    /// Classify an anomaly score into a tier.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score < -0.7 {
            Severity::Extreme
        } else if score < -0.65 {
            Severity::Major
        } else {
            Severity::Notable
        }
    }
}

/// A trade confirmed as anomalous. Created at most once per `trade_id`;
/// this is also the wire format on the bus "alerts" stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub trade_id: String,
    pub instrument_id: String,
    /// Category resolved at scoring time; routing keys off this.
    pub category: String,
    pub anomaly_score: f64,
    pub generated_at: DateTime<Utc>,
}

impl Alert {
    #[must_use]
    pub fn severity(&self) -> Severity {
        Severity::from_score(self.anomaly_score)
    }
}
