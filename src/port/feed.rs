//! Venue trade stream port.

use async_trait::async_trait;

use crate::domain::TradeEvent;
use crate::error::Result;

/// Events surfaced by a venue trade stream.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// A trade that passed schema validation.
    Trade(TradeEvent),
    /// A payload that failed validation. Dropped and counted upstream,
    /// never forwarded to the bus.
    Malformed { reason: String },
    /// The connection dropped; the caller decides whether to reconnect.
    Disconnected { reason: String },
}

/// A long-lived subscription to a venue's trade firehose.
///
/// Implementations handle one connection; reconnection policy lives in a
/// wrapper so it can be tested against scripted streams.
#[async_trait]
pub trait TradeStream: Send + Sync {
    /// Establish the authenticated session.
    async fn connect(&mut self) -> Result<()>;

    /// Subscribe to the full trade firehose. No sequence cursor is kept;
    /// gaps across reconnects are tolerated because downstream stages are
    /// idempotent on `trade_id`.
    async fn subscribe(&mut self) -> Result<()>;

    /// Next event, or `None` when the stream has ended.
    async fn next_event(&mut self) -> Option<FeedEvent>;

    /// Venue name for logging and metrics.
    fn venue_name(&self) -> &'static str;
}
