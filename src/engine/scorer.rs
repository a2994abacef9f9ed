//! Enrichment and scoring engine.
//!
//! Consumes normalized trades from the raw stream, merges each with a
//! pre-update snapshot of its instrument context, scores the combined
//! feature vector against the decision model, and publishes an alert
//! when the score clears the threshold gate.
//!
//! Ordering per trade is fixed: snapshot first (so the z-score reflects
//! the baseline *before* the trade), then fold the trade into the
//! store, then score. Any failure after deserialization is logged,
//! counted, and acked; a bad trade never halts the worker.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::{Alert, FeatureVector, TradeEvent};
use crate::engine::counters::PipelineCounters;
use crate::error::Result;
use crate::port::bus::{Delivery, EventBus, ALERTS_STREAM, RAW_STREAM};
use crate::port::model::DecisionModel;
use crate::port::store::ContextStore;

/// Threshold gate configuration.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Global anomaly threshold. Alerts fire on `score < threshold`
    /// (strictly below; a score equal to the threshold does not alert).
    pub threshold: f64,
    /// Per-category overrides; an override always wins over the global
    /// threshold for trades in that category.
    pub category_thresholds: HashMap<String, f64>,
    /// Minimum baseline samples before an instrument may alert.
    pub warmup_min_samples: u64,
    /// Drop trades whose market already closed instead of scoring them
    /// with zero time to resolution.
    pub reject_closed_markets: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            threshold: -0.7,
            category_thresholds: HashMap::new(),
            warmup_min_samples: 5,
            reject_closed_markets: false,
        }
    }
}

impl ScoringConfig {
    /// Effective threshold for a category.
    #[must_use]
    pub fn threshold_for(&self, category: &str) -> f64 {
        self.category_thresholds
            .get(category)
            .copied()
            .unwrap_or(self.threshold)
    }
}

/// One scoring worker. Run several against the same bus for parallel
/// draining; the store serializes per-instrument updates.
#[derive(Clone)]
pub struct ScoringEngine {
    bus: Arc<dyn EventBus>,
    store: Arc<dyn ContextStore>,
    model: Arc<dyn DecisionModel>,
    config: ScoringConfig,
    counters: Arc<PipelineCounters>,
}

impl ScoringEngine {
    pub fn new(
        bus: Arc<dyn EventBus>,
        store: Arc<dyn ContextStore>,
        model: Arc<dyn DecisionModel>,
        config: ScoringConfig,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            bus,
            store,
            model,
            config,
            counters,
        }
    }

    /// Consume the raw stream until shutdown or bus close.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut consumer = self.bus.consumer(RAW_STREAM).await?;
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scoring engine stopping");
                        return Ok(());
                    }
                }
                delivery = consumer.next() => {
                    let Some(delivery) = delivery else {
                        info!("raw stream closed, scoring engine stopping");
                        return Ok(());
                    };
                    self.handle_delivery(&delivery).await;
                    consumer.ack(&delivery).await?;
                }
            }
        }
    }

    async fn handle_delivery(&self, delivery: &Delivery) {
        let trade: TradeEvent = match serde_json::from_slice(&delivery.payload) {
            Ok(trade) => trade,
            Err(e) => {
                PipelineCounters::incr(&self.counters.malformed_dropped);
                warn!(error = %e, "dropped undecodable raw message");
                return;
            }
        };

        match self.score_trade(&trade).await {
            Ok(Some(alert)) => match serde_json::to_vec(&alert) {
                Ok(payload) => match self.bus.publish(ALERTS_STREAM, payload).await {
                    Ok(()) => {
                        PipelineCounters::incr(&self.counters.alerts_emitted);
                        info!(
                            trade_id = %alert.trade_id,
                            instrument_id = %alert.instrument_id,
                            category = %alert.category,
                            score = alert.anomaly_score,
                            "whale alert"
                        );
                    }
                    Err(e) => {
                        PipelineCounters::incr(&self.counters.publish_failures);
                        warn!(error = %e, trade_id = %alert.trade_id, "alert publish failed");
                    }
                },
                Err(e) => {
                    PipelineCounters::incr(&self.counters.scoring_failures);
                    warn!(error = %e, "alert serialization failed");
                }
            },
            Ok(None) => {}
            Err(e) => {
                PipelineCounters::incr(&self.counters.scoring_failures);
                warn!(error = %e, trade_id = %trade.trade_id, "scoring failed, trade skipped");
            }
        }
    }

    /// Score one trade against its pre-update context snapshot.
    async fn score_trade(&self, trade: &TradeEvent) -> Result<Option<Alert>> {
        if self.config.reject_closed_markets && trade.market_closed() {
            debug!(trade_id = %trade.trade_id, "trade on closed market dropped");
            return Ok(None);
        }

        let snapshot = self.store.get(&trade.instrument_id).await?;
        let features = FeatureVector::build(trade, &snapshot, self.model.categories());
        self.store.apply_trade(trade).await?;

        if snapshot.is_cold(self.config.warmup_min_samples) {
            PipelineCounters::incr(&self.counters.warmup_suppressed);
            debug!(
                instrument_id = %trade.instrument_id,
                samples = snapshot.stats.count,
                "instrument still warming up, not alerting"
            );
            return Ok(None);
        }

        let score = self.model.score(&features)?;
        let threshold = self.config.threshold_for(&snapshot.category);
        if score < threshold {
            Ok(Some(Alert {
                trade_id: trade.trade_id.clone(),
                instrument_id: trade.instrument_id.clone(),
                category: snapshot.category.clone(),
                anomaly_score: score,
                generated_at: chrono::Utc::now(),
            }))
        } else {
            debug!(
                trade_id = %trade.trade_id,
                score,
                threshold,
                "trade below alert threshold"
            );
            Ok(None)
        }
    }
}
