//! Application wiring and lifecycle.
//!
//! Builds every component from the configuration, spawns the pipeline
//! tasks, and coordinates orderly shutdown: intake stops first, then
//! the bus is closed so workers drain what is already queued before
//! exiting. No queued alert is dropped by a clean shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::adapter::bus::memory::InMemoryBus;
use crate::adapter::kalshi::{
    KalshiCatalog, KalshiTradeStream, ReconnectingTradeStream, StaticKeyAuth,
};
use crate::adapter::model::forest::ForestModel;
use crate::adapter::store::db::connection::{create_pool, run_migrations};
use crate::adapter::store::memory::InMemoryContextStore;
use crate::adapter::store::sqlite::SqliteContextStore;
use crate::app::config::{Config, StoreMode};
use crate::engine::{
    AlertRouter, ContextRefresher, FeedConnector, PipelineCounters, ScoringEngine,
};
use crate::error::{ConfigError, Error, Result};
use crate::port::bus::EventBus;
use crate::port::catalog::MarketCatalog;
use crate::port::feed::TradeStream;
use crate::port::model::DecisionModel;
use crate::port::notifier::{AlertNotifier, LogNotifier};
use crate::port::store::ContextStore;

pub struct App;

impl App {
    /// Run the pipeline until the feed terminates or a shutdown signal
    /// arrives.
    pub async fn run(config: Config) -> Result<()> {
        let counters = PipelineCounters::new();
        let bus = Arc::new(InMemoryBus::new(config.bus.to_bus_config()));

        let store = build_store(&config)?;
        let model: Arc<dyn DecisionModel> =
            Arc::new(ForestModel::load(&config.model.artifact_path)?);
        info!(
            artifact = %config.model.artifact_path,
            categories = model.categories().len(),
            "decision model loaded"
        );
        let notifier = build_notifier();
        let catalog: Arc<dyn MarketCatalog> = Arc::new(KalshiCatalog::new(
            config.venue.api_url.clone(),
            Duration::from_secs(config.refresh.http_timeout_secs),
        )?);
        let stream = build_stream(&config)?;

        // Intake tasks stop on signal; workers drain the bus and stop
        // when it closes.
        let (intake_tx, _) = watch::channel(false);
        let (worker_tx, _) = watch::channel(false);

        let summary_task = tokio::spawn(counters.clone().run_summary_loop(
            Duration::from_secs(config.logging.summary_interval_secs),
            intake_tx.subscribe(),
        ));
        let refresher = ContextRefresher::new(
            catalog,
            store.clone(),
            Duration::from_secs(config.refresh.interval_secs),
            counters.clone(),
        );
        let refresher_task = tokio::spawn(refresher.run(intake_tx.subscribe()));

        let mut scorer_tasks: Vec<JoinHandle<Result<()>>> = Vec::new();
        for _ in 0..config.scoring.workers {
            let engine = ScoringEngine::new(
                bus.clone(),
                store.clone(),
                model.clone(),
                config.scoring.to_scoring_config(),
                counters.clone(),
            );
            scorer_tasks.push(tokio::spawn(engine.run(worker_tx.subscribe())));
        }
        let router = AlertRouter::new(
            bus.clone(),
            notifier,
            config.routing.to_routing_config(),
            counters.clone(),
        );
        let router_task = tokio::spawn(router.run(worker_tx.subscribe()));

        let connector =
            FeedConnector::new(stream, bus.clone() as Arc<dyn EventBus>, counters.clone());
        let mut connector_task = tokio::spawn(connector.run(intake_tx.subscribe()));

        let mut interrupted = false;
        let mut feed_result: Option<Result<()>> = None;
        tokio::select! {
            res = &mut connector_task => feed_result = Some(flatten(res)),
            _ = signal::ctrl_c() => {
                interrupted = true;
                info!("shutdown signal received");
            }
        }

        // Orderly shutdown: stop intake, close the bus, let workers
        // drain the queues, then join everything.
        let _ = intake_tx.send(true);
        if feed_result.is_none() {
            feed_result = Some(flatten(connector_task.await));
        }
        bus.shutdown();

        for task in scorer_tasks {
            if let Err(e) = flatten(task.await) {
                warn!(error = %e, "scoring worker exited with error");
            }
        }
        if let Err(e) = flatten(router_task.await) {
            warn!(error = %e, "alert router exited with error");
        }
        let _ = refresher_task.await;
        let _ = summary_task.await;
        drop(worker_tx);

        match feed_result {
            Some(Err(e)) => {
                error!(error = %e, "feed connector failed");
                Err(e)
            }
            _ if interrupted => Ok(()),
            // The reconnect policy retries transient drops forever, so
            // an unprompted feed exit means something unrecoverable.
            _ => Err(Error::Connection("trade feed terminated".to_string())),
        }
    }
}

fn flatten<T>(joined: std::result::Result<Result<T>, tokio::task::JoinError>) -> Result<T> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(Error::Connection(format!("task panicked: {e}"))),
    }
}

fn build_store(config: &Config) -> Result<Arc<dyn ContextStore>> {
    match config.store.mode {
        StoreMode::Memory => {
            info!("using in-memory context store, baselines reset on restart");
            Ok(Arc::new(InMemoryContextStore::new()))
        }
        StoreMode::Sqlite => {
            let pool = create_pool(&config.store.database)?;
            run_migrations(&pool)?;
            info!(database = %config.store.database, "context store ready");
            Ok(Arc::new(SqliteContextStore::new(pool)))
        }
    }
}

fn build_stream(config: &Config) -> Result<Box<dyn TradeStream>> {
    let key_id = config
        .venue
        .api_key_id
        .clone()
        .ok_or(ConfigError::MissingField {
            field: "WHALEWATCH_API_KEY_ID",
        })?;
    let token = config
        .venue
        .api_token
        .clone()
        .ok_or(ConfigError::MissingField {
            field: "WHALEWATCH_API_TOKEN",
        })?;

    let inner = KalshiTradeStream::new(
        config.venue.ws_url.clone(),
        Box::new(StaticKeyAuth::new(key_id, token)),
    );
    Ok(Box::new(ReconnectingTradeStream::new(
        inner,
        config.reconnect.to_reconnect_config(),
    )))
}

#[cfg(feature = "telegram")]
fn build_notifier() -> Arc<dyn AlertNotifier> {
    use crate::adapter::notifier::{TelegramConfig, TelegramNotifier};

    if let Some(telegram) = TelegramConfig::from_env() {
        return Arc::new(TelegramNotifier::new(telegram));
    }
    info!("Telegram not configured, alerts will be logged only");
    Arc::new(LogNotifier)
}

#[cfg(not(feature = "telegram"))]
fn build_notifier() -> Arc<dyn AlertNotifier> {
    info!("built without Telegram support, alerts will be logged only");
    Arc::new(LogNotifier)
}
