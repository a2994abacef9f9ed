//! Alert router: fans confirmed alerts out to notification channels.
//!
//! Consumes the alerts stream, suppresses redeliveries through a
//! time-windowed trade-id dedup, maps category to channel, and hands
//! the alert to the notifier with a bounded retry. When the retry
//! budget is exhausted the alert goes to the failure sink (logged and
//! counted) and the message is acked anyway: the router prefers
//! forward progress over guaranteed delivery.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::domain::Alert;
use crate::engine::counters::PipelineCounters;
use crate::engine::dedup::RecentTradeIds;
use crate::error::Result;
use crate::port::bus::{EventBus, ALERTS_STREAM};
use crate::port::notifier::AlertNotifier;

/// Routing and delivery-retry configuration.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    /// Category → channel map. Lookup is exact on the lowercased
    /// category the scorer stamped into the alert.
    pub channels: HashMap<String, String>,
    /// Channel for categories with no mapping.
    pub default_channel: String,
    /// Dedup window for redelivered alerts.
    pub dedup_window_secs: u64,
    /// Delivery attempts per alert (including the first).
    pub max_delivery_attempts: u32,
    /// Base backoff between delivery attempts; doubles per retry.
    pub retry_initial_delay_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            channels: HashMap::new(),
            default_channel: "general".to_string(),
            dedup_window_secs: 600,
            max_delivery_attempts: 3,
            retry_initial_delay_ms: 200,
        }
    }
}

impl RoutingConfig {
    /// Channel for a category, falling back to the default.
    #[must_use]
    pub fn channel_for(&self, category: &str) -> &str {
        self.channels
            .get(category)
            .map(String::as_str)
            .unwrap_or(&self.default_channel)
    }
}

pub struct AlertRouter {
    bus: Arc<dyn EventBus>,
    notifier: Arc<dyn AlertNotifier>,
    config: RoutingConfig,
    counters: Arc<PipelineCounters>,
    dedup: RecentTradeIds,
}

impl AlertRouter {
    pub fn new(
        bus: Arc<dyn EventBus>,
        notifier: Arc<dyn AlertNotifier>,
        config: RoutingConfig,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        let dedup = RecentTradeIds::new(Duration::from_secs(config.dedup_window_secs));
        Self {
            bus,
            notifier,
            config,
            counters,
            dedup,
        }
    }

    /// Consume the alerts stream until shutdown or bus close.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut consumer = self.bus.consumer(ALERTS_STREAM).await?;
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("alert router stopping");
                        return Ok(());
                    }
                }
                delivery = consumer.next() => {
                    let Some(delivery) = delivery else {
                        info!("alerts stream closed, router stopping");
                        return Ok(());
                    };
                    self.handle_payload(&delivery.payload).await;
                    consumer.ack(&delivery).await?;
                }
            }
        }
    }

    async fn handle_payload(&mut self, payload: &[u8]) {
        let alert: Alert = match serde_json::from_slice(payload) {
            Ok(alert) => alert,
            Err(e) => {
                PipelineCounters::incr(&self.counters.malformed_dropped);
                warn!(error = %e, "dropped undecodable alert message");
                return;
            }
        };

        if !self.dedup.observe(&alert.trade_id) {
            PipelineCounters::incr(&self.counters.alerts_deduplicated);
            debug!(trade_id = %alert.trade_id, "duplicate alert suppressed");
            return;
        }

        let channel = self.config.channel_for(&alert.category).to_string();
        self.deliver_with_retry(&channel, &alert).await;
    }

    async fn deliver_with_retry(&self, channel: &str, alert: &Alert) {
        let mut delay = Duration::from_millis(self.config.retry_initial_delay_ms);
        for attempt in 1..=self.config.max_delivery_attempts {
            match self.notifier.deliver(channel, alert).await {
                Ok(()) => {
                    PipelineCounters::incr(&self.counters.deliveries_succeeded);
                    debug!(trade_id = %alert.trade_id, channel, attempt, "alert delivered");
                    return;
                }
                Err(e) if attempt < self.config.max_delivery_attempts => {
                    warn!(error = %e, attempt, "alert delivery failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    // Failure sink: the alert is lost to this channel but
                    // the pipeline keeps moving.
                    PipelineCounters::incr(&self.counters.deliveries_failed);
                    error!(
                        error = %e,
                        trade_id = %alert.trade_id,
                        channel,
                        attempts = attempt,
                        "alert delivery abandoned"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::bus::memory::InMemoryBus;
    use crate::port::bus::BusConfig;
    use crate::testkit::domain::alert;
    use crate::testkit::notifier::CapturingNotifier;

    fn router_with(
        notifier: Arc<CapturingNotifier>,
        config: RoutingConfig,
    ) -> (AlertRouter, Arc<InMemoryBus>) {
        let bus = Arc::new(InMemoryBus::new(BusConfig::default()));
        let router = AlertRouter::new(bus.clone(), notifier, config, PipelineCounters::new());
        (router, bus)
    }

    async fn publish_alert(bus: &InMemoryBus, alert: &Alert) {
        bus.publish(ALERTS_STREAM, serde_json::to_vec(alert).unwrap())
            .await
            .unwrap();
    }

    #[test]
    fn unmapped_category_routes_to_default_channel() {
        let mut config = RoutingConfig::default();
        config
            .channels
            .insert("politics".into(), "politics-desk".into());
        assert_eq!(config.channel_for("politics"), "politics-desk");
        assert_eq!(config.channel_for("weather"), "general");
    }

    #[tokio::test]
    async fn routes_alert_to_mapped_channel() {
        let notifier = Arc::new(CapturingNotifier::new());
        let mut config = RoutingConfig::default();
        config
            .channels
            .insert("politics".into(), "politics-desk".into());
        let (mut router, _bus) = router_with(notifier.clone(), config);

        let payload = serde_json::to_vec(&alert("T1", -0.82)).unwrap();
        router.handle_payload(&payload).await;

        let delivered = notifier.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, "politics-desk");
        assert_eq!(delivered[0].1.trade_id, "T1");
    }

    #[tokio::test]
    async fn duplicate_trade_id_is_delivered_once() {
        let notifier = Arc::new(CapturingNotifier::new());
        let (mut router, _bus) = router_with(notifier.clone(), RoutingConfig::default());

        let payload = serde_json::to_vec(&alert("T1", -0.82)).unwrap();
        router.handle_payload(&payload).await;
        router.handle_payload(&payload).await;

        assert_eq!(notifier.delivered().len(), 1);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_then_delivered() {
        let notifier = Arc::new(CapturingNotifier::failing_first(1));
        let mut config = RoutingConfig::default();
        config.retry_initial_delay_ms = 1;
        let (mut router, _bus) = router_with(notifier.clone(), config);

        let payload = serde_json::to_vec(&alert("T1", -0.82)).unwrap();
        router.handle_payload(&payload).await;

        assert_eq!(notifier.attempts(), 2);
        assert_eq!(notifier.delivered().len(), 1);
    }

    #[tokio::test]
    async fn retry_exhaustion_hits_failure_sink_without_stalling() {
        let notifier = Arc::new(CapturingNotifier::failing_first(10));
        let mut config = RoutingConfig::default();
        config.retry_initial_delay_ms = 1;
        let (mut router, _bus) = router_with(notifier.clone(), config);

        let payload = serde_json::to_vec(&alert("T1", -0.82)).unwrap();
        router.handle_payload(&payload).await;

        assert_eq!(notifier.attempts(), 3);
        assert!(notifier.delivered().is_empty());
        assert_eq!(
            router
                .counters
                .deliveries_failed
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn worker_loop_consumes_and_acks() {
        let notifier = Arc::new(CapturingNotifier::new());
        let (router, bus) = router_with(notifier.clone(), RoutingConfig::default());
        publish_alert(&bus, &alert("T1", -0.82)).await;

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(router.run(rx));

        // Wait for the delivery to land before shutting down.
        for _ in 0..100 {
            if !notifier.delivered().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        tx.send(true).unwrap();
        task.await.unwrap().unwrap();

        assert_eq!(notifier.delivered().len(), 1);
        assert_eq!(bus.depth(ALERTS_STREAM), 0);
    }
}
