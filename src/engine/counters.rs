//! Atomic pipeline counters surfaced through periodic log summaries.
//!
//! Dropped work is never silent: every path that discards a message
//! bumps a counter here, and a background task logs the totals on a
//! fixed cadence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

/// Shared pipeline counters. Cheap to bump from any worker.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub trades_ingested: AtomicU64,
    pub malformed_dropped: AtomicU64,
    pub feed_disconnects: AtomicU64,
    pub publish_failures: AtomicU64,
    pub scoring_failures: AtomicU64,
    pub alerts_emitted: AtomicU64,
    pub alerts_deduplicated: AtomicU64,
    pub warmup_suppressed: AtomicU64,
    pub deliveries_succeeded: AtomicU64,
    pub deliveries_failed: AtomicU64,
    pub refresh_failures: AtomicU64,
}

impl PipelineCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Emit one structured summary line with the current totals.
    pub fn log_summary(&self) {
        info!(
            trades_ingested = self.trades_ingested.load(Ordering::Relaxed),
            malformed_dropped = self.malformed_dropped.load(Ordering::Relaxed),
            feed_disconnects = self.feed_disconnects.load(Ordering::Relaxed),
            publish_failures = self.publish_failures.load(Ordering::Relaxed),
            scoring_failures = self.scoring_failures.load(Ordering::Relaxed),
            alerts_emitted = self.alerts_emitted.load(Ordering::Relaxed),
            alerts_deduplicated = self.alerts_deduplicated.load(Ordering::Relaxed),
            warmup_suppressed = self.warmup_suppressed.load(Ordering::Relaxed),
            deliveries_succeeded = self.deliveries_succeeded.load(Ordering::Relaxed),
            deliveries_failed = self.deliveries_failed.load(Ordering::Relaxed),
            refresh_failures = self.refresh_failures.load(Ordering::Relaxed),
            "pipeline summary"
        );
    }

    /// Log a summary every `period` until shutdown, plus one final
    /// summary on the way out.
    pub async fn run_summary_loop(
        self: Arc<Self>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(period) => self.log_summary(),
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        self.log_summary();
                        return;
                    }
                }
            }
        }
    }
}
