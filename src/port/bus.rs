//! Event bus port: durable, ack-based, at-least-once delivery.
//!
//! Two independent streams decouple the pipeline stages: raw trade
//! events and confirmed alerts. Consumers must acknowledge every
//! delivery; unacknowledged messages redeliver after a visibility
//! timeout, and messages redelivered beyond the attempt budget are
//! routed to a dead-letter sink instead of looping forever.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Stream carrying normalized trade events from the feed connector.
pub const RAW_STREAM: &str = "raw_trades";

/// Stream carrying confirmed alerts from the scoring engine.
pub const ALERTS_STREAM: &str = "alerts";

/// Bus behavior knobs shared by adapters.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// How long a delivery may remain unacknowledged before it is
    /// redelivered to another consumer.
    pub visibility_timeout_ms: u64,
    /// Delivery attempts (including the first) before a message is
    /// routed to the dead-letter sink.
    pub max_attempts: u32,
    /// Bound on unacknowledged deliveries per consumer. Backpressure:
    /// queue depth grows instead of blocking publishers.
    pub prefetch: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            visibility_timeout_ms: 30_000,
            max_attempts: 5,
            prefetch: 16,
        }
    }
}

/// One message handed to a consumer. Redeliveries carry an incremented
/// `attempt` so consumers can spot poison messages early.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Message body (JSON on both pipeline streams).
    pub payload: Vec<u8>,
    /// 1-based delivery attempt.
    pub attempt: u32,
    /// Opaque tag identifying this delivery to its consumer.
    pub tag: u64,
}

/// A message that exhausted its redelivery budget.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub stream: String,
    pub payload: Vec<u8>,
    pub attempts: u32,
    pub dead_at: DateTime<Utc>,
}

/// Producer/management side of the bus.
///
/// Implementations must be thread-safe: publishers and the management
/// surface are shared across worker tasks.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish a message. Non-blocking from the caller's perspective:
    /// adapters buffer and apply a bounded retry internally rather than
    /// stalling producers on a slow bus.
    async fn publish(&self, stream: &str, payload: Vec<u8>) -> Result<()>;

    /// Open a consumer on a stream. Multiple consumers compete for
    /// messages (work sharing, not fan-out).
    async fn consumer(&self, stream: &str) -> Result<Box<dyn BusConsumer>>;

    /// Snapshot of the stream's dead-letter sink.
    async fn dead_letters(&self, stream: &str) -> Result<Vec<DeadLetter>>;
}

/// Consumer side of one stream.
#[async_trait]
pub trait BusConsumer: Send {
    /// Next delivery, waiting if the stream is empty. Returns `None`
    /// only when the bus is shut down.
    async fn next(&mut self) -> Option<Delivery>;

    /// Acknowledge a delivery, removing the message permanently.
    async fn ack(&mut self, delivery: &Delivery) -> Result<()>;

    /// Negatively acknowledge: make the message immediately eligible
    /// for redelivery (still counted against the attempt budget).
    async fn nack(&mut self, delivery: &Delivery) -> Result<()>;
}
