//! Background context refresher.
//!
//! Periodically pages the venue catalog and overwrites each
//! instrument's externally sourced fields (category, open interest,
//! 24h volume). Runs independently of the trade path: a failed cycle
//! is logged and retried on the next tick, never fatal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::engine::counters::PipelineCounters;
use crate::port::catalog::MarketCatalog;
use crate::port::store::ContextStore;

pub struct ContextRefresher {
    catalog: Arc<dyn MarketCatalog>,
    store: Arc<dyn ContextStore>,
    interval: Duration,
    counters: Arc<PipelineCounters>,
}

impl ContextRefresher {
    pub fn new(
        catalog: Arc<dyn MarketCatalog>,
        store: Arc<dyn ContextStore>,
        interval: Duration,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            catalog,
            store,
            interval,
            counters,
        }
    }

    /// Refresh immediately, then on every interval tick until shutdown.
    ///
    /// The immediate first cycle gives new instruments their category
    /// before the first trades arrive.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            self.refresh_once().await;
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("context refresher stopping");
                        return;
                    }
                }
            }
        }
    }

    /// One full catalog pass.
    pub async fn refresh_once(&self) {
        let instruments = match self.catalog.fetch_all().await {
            Ok(instruments) => instruments,
            Err(e) => {
                PipelineCounters::incr(&self.counters.refresh_failures);
                warn!(error = %e, "catalog fetch failed, retrying next cycle");
                return;
            }
        };

        let mut updated = 0usize;
        for meta in &instruments {
            match self
                .store
                .refresh_external(
                    &meta.instrument_id,
                    &meta.category,
                    meta.open_interest,
                    meta.volume_24h,
                )
                .await
            {
                Ok(()) => updated += 1,
                Err(e) => {
                    PipelineCounters::incr(&self.counters.refresh_failures);
                    warn!(
                        error = %e,
                        instrument_id = %meta.instrument_id,
                        "context refresh failed for instrument"
                    );
                }
            }
        }
        info!(total = instruments.len(), updated, "context refresh cycle complete");
    }
}
