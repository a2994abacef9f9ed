//! Feed connector: drains the venue trade stream onto the raw bus
//! stream.
//!
//! Validation happens inside the stream adapter; the connector only
//! routes its outcomes. Malformed payloads and disconnects are counted
//! and dropped, valid trades are serialized and published. The read
//! loop never blocks on a slow bus: publish is non-blocking and a
//! failed publish drops the trade with a counter bump.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::domain::TradeEvent;
use crate::engine::counters::PipelineCounters;
use crate::error::{BusError, Error, Result};
use crate::port::bus::{EventBus, RAW_STREAM};
use crate::port::feed::{FeedEvent, TradeStream};

pub struct FeedConnector {
    stream: Box<dyn TradeStream>,
    bus: Arc<dyn EventBus>,
    counters: Arc<PipelineCounters>,
}

impl FeedConnector {
    pub fn new(
        stream: Box<dyn TradeStream>,
        bus: Arc<dyn EventBus>,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            stream,
            bus,
            counters,
        }
    }

    /// Connect, subscribe, and pump events until the stream ends or
    /// shutdown is signalled.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        // Non-fatal startup failures are left to the stream's reconnect
        // policy; only credential rejection aborts.
        if let Err(e) = self.stream.connect().await {
            if e.is_fatal() {
                return Err(e);
            }
            warn!(error = %e, "initial connect failed, reconnect policy takes over");
        }
        if let Err(e) = self.stream.subscribe().await {
            if e.is_fatal() {
                return Err(e);
            }
            warn!(error = %e, "initial subscribe failed, will resubscribe on reconnect");
        }
        info!(venue = self.stream.venue_name(), "feed connector running");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("feed connector stopping");
                        return Ok(());
                    }
                }
                event = self.stream.next_event() => match event {
                    Some(FeedEvent::Trade(trade)) => {
                        if !self.publish_trade(&trade).await? {
                            return Ok(());
                        }
                    }
                    Some(FeedEvent::Malformed { reason }) => {
                        PipelineCounters::incr(&self.counters.malformed_dropped);
                        warn!(%reason, "dropped malformed feed message");
                    }
                    Some(FeedEvent::Disconnected { reason }) => {
                        PipelineCounters::incr(&self.counters.feed_disconnects);
                        warn!(%reason, "feed disconnected");
                    }
                    None => {
                        info!(venue = self.stream.venue_name(), "trade stream ended");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Returns `false` when the bus has shut down and the connector
    /// should stop.
    async fn publish_trade(&self, trade: &TradeEvent) -> Result<bool> {
        let payload = serde_json::to_vec(trade)?;
        match self.bus.publish(RAW_STREAM, payload).await {
            Ok(()) => {
                PipelineCounters::incr(&self.counters.trades_ingested);
                Ok(true)
            }
            Err(Error::Bus(BusError::Closed(_))) => {
                info!("bus closed, feed connector stopping");
                Ok(false)
            }
            Err(e) => {
                PipelineCounters::incr(&self.counters.publish_failures);
                warn!(error = %e, trade_id = %trade.trade_id, "dropped trade: publish failed");
                Ok(true)
            }
        }
    }
}
