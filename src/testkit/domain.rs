//! Builders for domain primitives.

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use crate::domain::{Alert, InstrumentContext, RunningStats, Side, TradeEvent};

/// A whale-sized trade on `MKT-X` resolving in 48 hours.
pub fn trade(trade_id: &str) -> TradeEvent {
    trade_sized("MKT-X", trade_id, 5000)
}

/// A trade with explicit instrument and size.
pub fn trade_sized(instrument_id: &str, trade_id: &str, size: i64) -> TradeEvent {
    let now = Utc::now();
    TradeEvent {
        instrument_id: instrument_id.to_string(),
        trade_id: trade_id.to_string(),
        price: dec!(0.80),
        size,
        side: Side::Yes,
        occurred_at: now,
        market_close_at: now + Duration::hours(48),
    }
}

/// A context whose baseline has the given mean and (sample) stddev over
/// `count` observations.
pub fn warm_context(instrument_id: &str, count: u64, mean: f64, stddev: f64) -> InstrumentContext {
    let mut ctx = InstrumentContext::cold(instrument_id);
    ctx.stats = RunningStats {
        count,
        mean,
        m2: stddev * stddev * (count.saturating_sub(1)) as f64,
    };
    ctx
}

/// An alert for `trade_id` with the given score.
pub fn alert(trade_id: &str, anomaly_score: f64) -> Alert {
    Alert {
        trade_id: trade_id.to_string(),
        instrument_id: "MKT-X".to_string(),
        category: "politics".to_string(),
        anomaly_score,
        generated_at: Utc::now(),
    }
}
