//! End-to-end pipeline tests over the in-process adapters.
//!
//! Wire a scripted feed through the connector, scoring engine, and
//! router, and assert on what reaches the capturing notifier.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use whalewatch::adapter::bus::memory::InMemoryBus;
use whalewatch::adapter::store::memory::InMemoryContextStore;
use whalewatch::domain::Severity;
use whalewatch::engine::{
    AlertRouter, FeedConnector, PipelineCounters, RoutingConfig, ScoringEngine,
};
use whalewatch::engine::scorer::ScoringConfig;
use whalewatch::port::bus::{BusConfig, EventBus};
use whalewatch::port::feed::FeedEvent;
use whalewatch::port::model::DecisionModel;
use whalewatch::port::store::ContextStore;
use whalewatch::testkit::domain::trade_sized;
use whalewatch::testkit::model::{FixedModel, ZGateModel};
use whalewatch::testkit::notifier::CapturingNotifier;
use whalewatch::testkit::stream::ScriptedTradeStream;

struct Pipeline {
    bus: Arc<InMemoryBus>,
    store: Arc<InMemoryContextStore>,
    notifier: Arc<CapturingNotifier>,
    counters: Arc<PipelineCounters>,
    workers: Vec<JoinHandle<whalewatch::Result<()>>>,
    _worker_tx: watch::Sender<bool>,
}

fn spawn_pipeline(model: Arc<dyn DecisionModel>, routing: RoutingConfig) -> Pipeline {
    let bus = Arc::new(InMemoryBus::new(BusConfig::default()));
    let store = Arc::new(InMemoryContextStore::new());
    let notifier = Arc::new(CapturingNotifier::new());
    let counters = PipelineCounters::new();
    let (worker_tx, _) = watch::channel(false);

    let scorer = ScoringEngine::new(
        bus.clone(),
        store.clone(),
        model,
        ScoringConfig::default(),
        counters.clone(),
    );
    let router = AlertRouter::new(bus.clone(), notifier.clone(), routing, counters.clone());

    let workers = vec![
        tokio::spawn(scorer.run(worker_tx.subscribe())),
        tokio::spawn(router.run(worker_tx.subscribe())),
    ];

    Pipeline {
        bus,
        store,
        notifier,
        counters,
        workers,
        _worker_tx: worker_tx,
    }
}

impl Pipeline {
    /// Feed scripted events through a connector and wait for it to
    /// finish.
    async fn ingest(&self, events: Vec<Option<FeedEvent>>) {
        let stream = ScriptedTradeStream::new().with_events(events);
        let (_tx, rx) = watch::channel(false);
        FeedConnector::new(Box::new(stream), self.bus.clone(), self.counters.clone())
            .run(rx)
            .await
            .unwrap();
    }

    /// Close the bus and join the workers, draining both queues.
    async fn drain(self) -> Arc<CapturingNotifier> {
        self.bus.shutdown();
        for worker in self.workers {
            worker.await.unwrap().unwrap();
        }
        self.notifier
    }

    /// Warm `instrument` past the default minimum with a mean-50
    /// baseline.
    async fn warm_up(&self, instrument: &str) {
        for (i, size) in [40, 50, 60, 40, 60, 50].iter().enumerate() {
            let trade = trade_sized(instrument, &format!("warm-{instrument}-{i}"), *size);
            self.store.apply_trade(&trade).await.unwrap();
        }
    }
}

#[tokio::test]
async fn whale_trade_reaches_the_notifier() {
    let pipeline = spawn_pipeline(Arc::new(ZGateModel::new(100.0)), RoutingConfig::default());
    pipeline.warm_up("MKT-X").await;

    pipeline
        .ingest(vec![Some(FeedEvent::Trade(trade_sized(
            "MKT-X", "T-whale", 5000,
        )))])
        .await;

    let notifier = pipeline.drain().await;
    let delivered = notifier.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].0, "general");
    assert_eq!(delivered[0].1.trade_id, "T-whale");
    assert_eq!(delivered[0].1.severity(), Severity::Extreme);
}

#[tokio::test]
async fn near_mean_trade_is_silent() {
    let pipeline = spawn_pipeline(Arc::new(ZGateModel::new(100.0)), RoutingConfig::default());
    pipeline.warm_up("MKT-X").await;

    pipeline
        .ingest(vec![Some(FeedEvent::Trade(trade_sized(
            "MKT-X", "T-typical", 55,
        )))])
        .await;

    let notifier = pipeline.drain().await;
    assert!(notifier.delivered().is_empty());
}

#[tokio::test]
async fn redelivered_trade_id_notifies_once() {
    // A model that flags everything makes both copies of the trade
    // score as alerts; the router's dedup must still deliver one.
    let pipeline = spawn_pipeline(Arc::new(FixedModel::new(-0.9)), RoutingConfig::default());
    pipeline.warm_up("MKT-X").await;

    let whale = trade_sized("MKT-X", "T-whale", 5000);
    pipeline
        .ingest(vec![
            Some(FeedEvent::Trade(whale.clone())),
            Some(FeedEvent::Trade(whale)),
        ])
        .await;

    let notifier = pipeline.drain().await;
    assert_eq!(notifier.delivered().len(), 1);
}

#[tokio::test]
async fn cold_instrument_is_suppressed_until_warm() {
    let pipeline = spawn_pipeline(Arc::new(FixedModel::new(-0.9)), RoutingConfig::default());

    // First sighting of the instrument: no baseline, no alert, even
    // though the model would flag it.
    pipeline
        .ingest(vec![Some(FeedEvent::Trade(trade_sized(
            "MKT-NEW", "T1", 5000,
        )))])
        .await;

    let counters = pipeline.counters.clone();
    let store = pipeline.store.clone();
    let notifier = pipeline.drain().await;

    assert!(notifier.delivered().is_empty());
    assert_eq!(
        counters
            .warmup_suppressed
            .load(std::sync::atomic::Ordering::Relaxed),
        1
    );
    // The trade still fed the baseline.
    assert_eq!(store.get("MKT-NEW").await.unwrap().stats.count, 1);
}

#[tokio::test]
async fn category_routes_to_mapped_channel_with_default_fallback() {
    let mut routing = RoutingConfig::default();
    routing
        .channels
        .insert("politics".into(), "politics-desk".into());
    let pipeline = spawn_pipeline(Arc::new(FixedModel::new(-0.9)), routing);

    pipeline.warm_up("MKT-POL").await;
    pipeline.warm_up("MKT-ODD").await;
    pipeline
        .store
        .refresh_external("MKT-POL", "politics", 1000, 2000)
        .await
        .unwrap();
    pipeline
        .store
        .refresh_external("MKT-ODD", "weather", 10, 20)
        .await
        .unwrap();

    pipeline
        .ingest(vec![
            Some(FeedEvent::Trade(trade_sized("MKT-POL", "T-pol", 5000))),
            Some(FeedEvent::Trade(trade_sized("MKT-ODD", "T-odd", 5000))),
        ])
        .await;

    let notifier = pipeline.drain().await;
    let mut delivered = notifier.delivered();
    delivered.sort_by(|a, b| a.1.trade_id.cmp(&b.1.trade_id));
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0].0, "general"); // "weather" has no mapping
    assert_eq!(delivered[0].1.trade_id, "T-odd");
    assert_eq!(delivered[1].0, "politics-desk");
    assert_eq!(delivered[1].1.category, "politics");
}

#[tokio::test]
async fn malformed_feed_payloads_never_reach_the_bus() {
    let pipeline = spawn_pipeline(Arc::new(FixedModel::new(-0.9)), RoutingConfig::default());

    pipeline
        .ingest(vec![
            Some(FeedEvent::Malformed {
                reason: "missing trade_id".into(),
            }),
            Some(FeedEvent::Malformed {
                reason: "zero count".into(),
            }),
        ])
        .await;

    let counters = pipeline.counters.clone();
    let notifier = pipeline.drain().await;
    assert!(notifier.delivered().is_empty());
    assert_eq!(
        counters
            .malformed_dropped
            .load(std::sync::atomic::Ordering::Relaxed),
        2
    );
}

#[tokio::test]
async fn orderly_shutdown_does_not_lose_queued_alerts() {
    // Publish alerts straight onto the alerts stream, then close the
    // bus before the router has had time to drain them all.
    let bus = Arc::new(InMemoryBus::new(BusConfig::default()));
    let notifier = Arc::new(CapturingNotifier::new());
    let counters = PipelineCounters::new();
    let (worker_tx, _) = watch::channel(false);

    for i in 0..20 {
        let alert = whalewatch::testkit::domain::alert(&format!("T{i}"), -0.8);
        bus.publish(
            whalewatch::port::bus::ALERTS_STREAM,
            serde_json::to_vec(&alert).unwrap(),
        )
        .await
        .unwrap();
    }

    let router = AlertRouter::new(
        bus.clone(),
        notifier.clone(),
        RoutingConfig::default(),
        counters,
    );
    let task = tokio::spawn(router.run(worker_tx.subscribe()));

    tokio::time::sleep(Duration::from_millis(10)).await;
    bus.shutdown();
    task.await.unwrap().unwrap();

    assert_eq!(notifier.delivered().len(), 20);
}
