//! In-memory context store.
//!
//! Backs tests and cache-only deployments. `DashMap` entry locks give
//! the per-instrument serialization the scoring path requires: two
//! trades on the same instrument cannot interleave their
//! read-modify-write, while different instruments update in parallel.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::{InstrumentContext, TradeEvent};
use crate::error::Result;
use crate::port::store::ContextStore;

#[derive(Default)]
pub struct InMemoryContextStore {
    contexts: DashMap<String, InstrumentContext>,
}

impl InMemoryContextStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instruments tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn get(&self, instrument_id: &str) -> Result<InstrumentContext> {
        Ok(self
            .contexts
            .get(instrument_id)
            .map(|entry| entry.clone())
            .unwrap_or_else(|| InstrumentContext::cold(instrument_id)))
    }

    async fn apply_trade(&self, trade: &TradeEvent) -> Result<InstrumentContext> {
        let mut entry = self
            .contexts
            .entry(trade.instrument_id.clone())
            .or_insert_with(|| InstrumentContext::cold(&trade.instrument_id));
        entry.apply_trade(trade.size);
        Ok(entry.clone())
    }

    async fn refresh_external(
        &self,
        instrument_id: &str,
        category: &str,
        open_interest: i64,
        volume_24h: i64,
    ) -> Result<()> {
        let mut entry = self
            .contexts
            .entry(instrument_id.to_string())
            .or_insert_with(|| InstrumentContext::cold(instrument_id));
        entry.apply_refresh(category.to_string(), open_interest, volume_24h);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FALLBACK_CATEGORY;
    use crate::testkit;
    use std::sync::Arc;

    #[tokio::test]
    async fn miss_serves_cold_default() {
        let store = InMemoryContextStore::new();
        let ctx = store.get("NEVER-SEEN").await.unwrap();
        assert_eq!(ctx.category, FALLBACK_CATEGORY);
        assert_eq!(ctx.stats.count, 0);
        assert_eq!(ctx.open_interest, 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn trades_accumulate_stats() {
        let store = InMemoryContextStore::new();
        for size in [40, 50, 60] {
            store
                .apply_trade(&testkit::domain::trade_sized("MKT-X", "T", size))
                .await
                .unwrap();
        }

        let ctx = store.get("MKT-X").await.unwrap();
        assert_eq!(ctx.stats.count, 3);
        assert!((ctx.stats.mean - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn refresh_preserves_running_stats() {
        let store = InMemoryContextStore::new();
        store
            .apply_trade(&testkit::domain::trade_sized("MKT-X", "T1", 50))
            .await
            .unwrap();

        store
            .refresh_external("MKT-X", "politics", 1000, 2000)
            .await
            .unwrap();

        let ctx = store.get("MKT-X").await.unwrap();
        assert_eq!(ctx.category, "politics");
        assert_eq!(ctx.open_interest, 1000);
        assert_eq!(ctx.stats.count, 1);
        assert!((ctx.stats.mean - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn concurrent_trades_on_one_instrument_all_count() {
        let store = Arc::new(InMemoryContextStore::new());

        let mut handles = vec![];
        for i in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .apply_trade(&testkit::domain::trade_sized(
                        "MKT-X",
                        &format!("T{i}"),
                        100,
                    ))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let ctx = store.get("MKT-X").await.unwrap();
        assert_eq!(ctx.stats.count, 50);
        assert!((ctx.stats.mean - 100.0).abs() < 1e-9);
        assert!(ctx.stats.variance().abs() < 1e-9);
    }

    #[tokio::test]
    async fn instruments_are_independent() {
        let store = InMemoryContextStore::new();
        store
            .apply_trade(&testkit::domain::trade_sized("MKT-A", "T1", 10))
            .await
            .unwrap();
        store
            .apply_trade(&testkit::domain::trade_sized("MKT-B", "T2", 99))
            .await
            .unwrap();

        assert_eq!(store.get("MKT-A").await.unwrap().stats.count, 1);
        assert!((store.get("MKT-B").await.unwrap().stats.mean - 99.0).abs() < 1e-9);
    }
}
