//! Market catalog port: the venue's REST metadata surface.

use async_trait::async_trait;

use crate::error::Result;

/// Metadata for one instrument as reported by the venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentMeta {
    pub instrument_id: String,
    pub category: String,
    pub open_interest: i64,
    pub volume_24h: i64,
}

/// Read-only access to the venue's instrument catalog.
#[async_trait]
pub trait MarketCatalog: Send + Sync {
    /// Fetch metadata for every open instrument, following pagination
    /// to exhaustion.
    async fn fetch_all(&self) -> Result<Vec<InstrumentMeta>>;
}
