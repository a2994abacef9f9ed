//! Context store port: per-instrument rolling baselines and metadata.

use async_trait::async_trait;

use crate::domain::{InstrumentContext, TradeEvent};
use crate::error::Result;

/// Durable store of per-instrument context.
///
/// Implementations must serialize writes per instrument: two trades on
/// the same instrument may never interleave their read-modify-write
/// cycles. Different instruments proceed independently.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Current context for an instrument. An instrument never seen
    /// before yields a cold context rather than an error.
    async fn get(&self, instrument_id: &str) -> Result<InstrumentContext>;

    /// Fold a trade into the instrument's rolling statistics and return
    /// the post-update context.
    async fn apply_trade(&self, trade: &TradeEvent) -> Result<InstrumentContext>;

    /// Overwrite the externally sourced fields (category, open interest,
    /// 24h volume) without touching the rolling statistics.
    async fn refresh_external(
        &self,
        instrument_id: &str,
        category: &str,
        open_interest: i64,
        volume_24h: i64,
    ) -> Result<()>;
}
