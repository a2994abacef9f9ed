//! Normalized trade events.
//!
//! A [`TradeEvent`] is the validated form of a venue trade payload. It is
//! immutable once constructed; `trade_id` is the idempotency key for the
//! whole pipeline.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which side the taker traded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Yes => "yes",
            Side::No => "no",
        }
    }
}

/// A single normalized trade observed on the venue firehose.
///
/// This is also the wire format on the bus "raw" stream: JSON with
/// ISO-8601 timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Venue market ticker, e.g. `MKT-X`.
    pub instrument_id: String,
    /// Venue-unique trade identifier. Idempotency key end-to-end.
    pub trade_id: String,
    /// Price paid per contract.
    pub price: Decimal,
    /// Number of contracts traded.
    pub size: i64,
    /// Taker side.
    pub side: Side,
    /// When the trade happened.
    pub occurred_at: DateTime<Utc>,
    /// When the market resolves.
    pub market_close_at: DateTime<Utc>,
}

impl TradeEvent {
    /// Hours until market resolution at trade time, floored at zero.
    ///
    /// Trades on already-closed markets yield `0.0` rather than a
    /// negative value; they are still scored.
    #[must_use]
    pub fn time_to_resolution_hours(&self) -> f64 {
        let secs = (self.market_close_at - self.occurred_at).num_seconds();
        (secs as f64 / 3600.0).max(0.0)
    }

    /// True when the market had already closed when the trade occurred.
    #[must_use]
    pub fn market_closed(&self) -> bool {
        self.occurred_at >= self.market_close_at
    }
}
