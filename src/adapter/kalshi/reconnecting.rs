//! Reconnecting wrapper for [`TradeStream`].
//!
//! Wraps any stream with exponential backoff reconnection. After a drop
//! the wrapper waits, reconnects, and resubscribes; the delay grows by a
//! configured multiplier up to a cap and keeps retrying at the cap
//! indefinitely. Jitter is added to avoid synchronized reconnection
//! storms. Only credential rejection ends the stream.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::port::feed::{FeedEvent, TradeStream};

/// Backoff parameters for the reconnect loop.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Wrapper that adds automatic reconnection to any [`TradeStream`].
pub struct ReconnectingTradeStream<S: TradeStream> {
    inner: S,
    config: ReconnectConfig,
    /// Whether `subscribe` was called, so reconnects resubscribe.
    subscribed: bool,
    consecutive_failures: u32,
    current_delay_ms: u64,
    connected: bool,
}

impl<S: TradeStream> ReconnectingTradeStream<S> {
    /// Starts disconnected; call [`connect`](TradeStream::connect) before
    /// reading events.
    pub fn new(inner: S, config: ReconnectConfig) -> Self {
        let initial_delay = config.initial_delay_ms;
        Self {
            inner,
            config,
            subscribed: false,
            consecutive_failures: 0,
            current_delay_ms: initial_delay,
            connected: false,
        }
    }

    fn reset_backoff(&mut self) {
        self.consecutive_failures = 0;
        self.current_delay_ms = self.config.initial_delay_ms;
    }

    /// Current delay plus jitter, advancing the delay for the next call.
    fn next_delay(&mut self) -> Duration {
        let base = Duration::from_millis(self.current_delay_ms);
        let delay = base + Duration::from_millis(self.jitter_ms(base));

        let next = (self.current_delay_ms as f64 * self.config.backoff_multiplier) as u64;
        self.current_delay_ms = next.min(self.config.max_delay_ms);

        delay
    }

    /// Up to 20% random jitter on top of the base delay.
    fn jitter_ms(&self, base: Duration) -> u64 {
        let range = (base.as_millis() as u64) / 5;
        if range == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..=range)
    }

    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        self.connected = false;
    }

    async fn reconnect(&mut self) -> Result<(), Error> {
        let delay = self.next_delay();
        info!(
            delay_ms = delay.as_millis(),
            attempt = self.consecutive_failures + 1,
            "Reconnecting after delay"
        );
        sleep(delay).await;

        match self.inner.connect().await {
            Ok(()) => {
                info!("Reconnected successfully");
                self.connected = true;

                if self.subscribed {
                    if let Err(err) = self.inner.subscribe().await {
                        error!(error = %err, "Resubscribe failed after reconnect");
                        self.record_failure();
                        return Err(err);
                    }
                }

                self.reset_backoff();
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Reconnection failed");
                self.record_failure();
                Err(e)
            }
        }
    }
}

#[async_trait]
impl<S: TradeStream + Send> TradeStream for ReconnectingTradeStream<S> {
    async fn connect(&mut self) -> Result<(), Error> {
        let result = self.inner.connect().await;
        if result.is_ok() {
            self.connected = true;
            self.reset_backoff();
        }
        result
    }

    async fn subscribe(&mut self) -> Result<(), Error> {
        self.subscribed = true;
        self.inner.subscribe().await
    }

    async fn next_event(&mut self) -> Option<FeedEvent> {
        loop {
            if !self.connected {
                if let Err(e) = self.reconnect().await {
                    if e.is_fatal() {
                        error!(error = %e, "Fatal feed error, stopping reconnection");
                        return None;
                    }
                    warn!(error = %e, "Reconnection attempt failed, will retry");
                    continue;
                }
            }

            match self.inner.next_event().await {
                Some(FeedEvent::Disconnected { reason }) => {
                    warn!(reason = %reason, "Connection lost, will reconnect");
                    self.record_failure();
                    continue;
                }
                Some(event) => {
                    if self.consecutive_failures > 0 {
                        debug!("Received event after reconnection, resetting failure count");
                        self.reset_backoff();
                    }
                    return Some(event);
                }
                None => {
                    warn!("Trade stream ended unexpectedly, will reconnect");
                    self.record_failure();
                    continue;
                }
            }
        }
    }

    fn venue_name(&self) -> &'static str {
        self.inner.venue_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::error::FeedError;
    use crate::testkit;
    use crate::testkit::stream::ScriptedTradeStream;

    fn backoff_config() -> ReconnectConfig {
        ReconnectConfig {
            initial_delay_ms: 10,
            max_delay_ms: 100,
            backoff_multiplier: 2.0,
        }
    }

    fn fast_config() -> ReconnectConfig {
        ReconnectConfig {
            initial_delay_ms: 1,
            max_delay_ms: 10,
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn passes_events_through_when_connected() {
        let mock = ScriptedTradeStream::new()
            .with_events(vec![Some(FeedEvent::Trade(testkit::domain::trade("T1")))]);

        let mut stream = ReconnectingTradeStream::new(mock, backoff_config());
        stream.connect().await.unwrap();

        let event = stream.next_event().await;
        assert!(matches!(event, Some(FeedEvent::Trade(_))));
    }

    #[tokio::test]
    async fn reconnects_and_resubscribes_after_disconnect() {
        let mock = ScriptedTradeStream::new().with_events(vec![
            Some(FeedEvent::Disconnected {
                reason: "server closed".into(),
            }),
            Some(FeedEvent::Trade(testkit::domain::trade("T1"))),
        ]);
        let (connect_count, subscribe_count) = mock.counts();

        let mut stream = ReconnectingTradeStream::new(mock, fast_config());
        stream.connect().await.unwrap();
        stream.subscribe().await.unwrap();

        let event = stream.next_event().await;
        assert!(matches!(event, Some(FeedEvent::Trade(_))));

        assert!(connect_count.load(Ordering::SeqCst) >= 2);
        assert!(subscribe_count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn backoff_doubles_and_caps() {
        let mut stream = ReconnectingTradeStream::new(ScriptedTradeStream::new(), backoff_config());

        let assert_delay_in_range = |delay: Duration, base_ms: u64| {
            let max_ms = base_ms + (base_ms / 5);
            assert!(
                (base_ms..=max_ms).contains(&(delay.as_millis() as u64)),
                "delay {delay:?} not within {base_ms}..={max_ms} ms"
            );
        };

        assert_delay_in_range(stream.next_delay(), 10);
        assert_delay_in_range(stream.next_delay(), 20);
        assert_delay_in_range(stream.next_delay(), 40);
        assert_delay_in_range(stream.next_delay(), 80);
        assert_delay_in_range(stream.next_delay(), 100); // capped
        assert_delay_in_range(stream.next_delay(), 100); // stays capped
    }

    #[tokio::test]
    async fn jitter_is_bounded() {
        let config = ReconnectConfig {
            initial_delay_ms: 100,
            max_delay_ms: 1000,
            backoff_multiplier: 1.0,
        };
        let mut stream = ReconnectingTradeStream::new(ScriptedTradeStream::new(), config);

        for _ in 0..10 {
            let delay_ms = stream.next_delay().as_millis() as u64;
            assert!((100..=120).contains(&delay_ms), "delay was {delay_ms}ms");
        }
    }

    #[tokio::test]
    async fn zero_base_delay_zero_jitter() {
        let config = ReconnectConfig {
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 2.0,
        };
        let stream = ReconnectingTradeStream::new(ScriptedTradeStream::new(), config);
        assert_eq!(stream.jitter_ms(Duration::from_millis(0)), 0);
    }

    #[tokio::test]
    async fn auth_rejection_ends_the_stream() {
        let mock = ScriptedTradeStream::new()
            .with_events(vec![Some(FeedEvent::Disconnected {
                reason: "server closed".into(),
            })])
            .with_connect_results(vec![
                Ok(()),
                Err(Error::Feed(FeedError::Auth("revoked".into()))),
            ]);

        let mut stream = ReconnectingTradeStream::new(mock, fast_config());
        stream.connect().await.unwrap();

        assert!(stream.next_event().await.is_none());
    }

    #[tokio::test]
    async fn failure_resets_after_successful_event() {
        let mock = ScriptedTradeStream::new().with_events(vec![
            Some(FeedEvent::Disconnected {
                reason: "drop".into(),
            }),
            Some(FeedEvent::Trade(testkit::domain::trade("T1"))),
        ]);

        let mut stream = ReconnectingTradeStream::new(mock, fast_config());
        stream.connect().await.unwrap();

        let event = stream.next_event().await;
        assert!(matches!(event, Some(FeedEvent::Trade(_))));
        assert_eq!(stream.consecutive_failures, 0);
    }

    #[test]
    fn initial_state_is_disconnected() {
        let config = backoff_config();
        let stream = ReconnectingTradeStream::new(ScriptedTradeStream::new(), config.clone());

        assert!(!stream.connected);
        assert!(!stream.subscribed);
        assert_eq!(stream.consecutive_failures, 0);
        assert_eq!(stream.current_delay_ms, config.initial_delay_ms);
    }

    #[test]
    fn venue_name_delegates_to_inner() {
        let stream = ReconnectingTradeStream::new(ScriptedTradeStream::new(), backoff_config());
        assert_eq!(stream.venue_name(), "mock");
    }
}
