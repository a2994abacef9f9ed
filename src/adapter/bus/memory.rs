//! In-process event bus over tokio primitives.
//!
//! Queues live in memory behind the [`EventBus`] port, so another
//! transport can be swapped in without touching the pipeline stages.
//! Delivery is at-least-once: a popped message is tracked as in-flight
//! until acked, reclaimed for redelivery once its visibility timeout
//! expires, and dead-lettered after `max_attempts` deliveries.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{BusError, Result};
use crate::port::bus::{BusConfig, BusConsumer, DeadLetter, Delivery, EventBus};

struct Queued {
    payload: Vec<u8>,
    /// Deliveries so far.
    attempts: u32,
}

struct InFlight {
    tag: u64,
    owner: u64,
    payload: Vec<u8>,
    attempt: u32,
    deadline: Instant,
}

/// One named stream's state, shared by all its consumers.
struct StreamState {
    queue: Mutex<VecDeque<Queued>>,
    in_flight: Mutex<Vec<InFlight>>,
    dead: Mutex<Vec<DeadLetter>>,
    notify: Notify,
    name: String,
}

impl StreamState {
    fn new(name: String) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            in_flight: Mutex::new(Vec::new()),
            dead: Mutex::new(Vec::new()),
            notify: Notify::new(),
            name,
        }
    }

    /// Move expired in-flight messages back onto the queue, or to the
    /// dead-letter sink when their attempt budget is spent.
    fn reclaim_expired(&self, config: &BusConfig) {
        let now = Instant::now();
        let expired: Vec<InFlight> = {
            let mut in_flight = self.in_flight.lock();
            let (expired, kept) = std::mem::take(&mut *in_flight)
                .into_iter()
                .partition(|m: &InFlight| m.deadline <= now);
            *in_flight = kept;
            expired
        };

        for msg in expired {
            if msg.attempt >= config.max_attempts {
                self.dead_letter(msg.payload, msg.attempt);
            } else {
                warn!(
                    stream = %self.name,
                    attempt = msg.attempt,
                    "Visibility timeout expired, requeueing message"
                );
                self.queue.lock().push_back(Queued {
                    payload: msg.payload,
                    attempts: msg.attempt,
                });
            }
            self.notify.notify_waiters();
        }
    }

    fn dead_letter(&self, payload: Vec<u8>, attempts: u32) {
        warn!(
            stream = %self.name,
            attempts,
            "Message exhausted its delivery budget, dead-lettering"
        );
        self.dead.lock().push(DeadLetter {
            stream: self.name.clone(),
            payload,
            attempts,
            dead_at: Utc::now(),
        });
    }

    /// Earliest in-flight deadline, used to bound consumer waits.
    fn next_deadline(&self) -> Option<Instant> {
        self.in_flight.lock().iter().map(|m| m.deadline).min()
    }

    fn unacked_by(&self, owner: u64) -> usize {
        self.in_flight
            .lock()
            .iter()
            .filter(|m| m.owner == owner)
            .count()
    }
}

/// In-memory [`EventBus`] implementation.
pub struct InMemoryBus {
    streams: DashMap<String, Arc<StreamState>>,
    config: BusConfig,
    next_tag: Arc<AtomicU64>,
    next_consumer: AtomicU64,
    closed: Arc<AtomicBool>,
}

impl InMemoryBus {
    #[must_use]
    pub fn new(config: BusConfig) -> Self {
        Self {
            streams: DashMap::new(),
            config,
            next_tag: Arc::new(AtomicU64::new(1)),
            next_consumer: AtomicU64::new(1),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn state(&self, stream: &str) -> Arc<StreamState> {
        self.streams
            .entry(stream.to_string())
            .or_insert_with(|| Arc::new(StreamState::new(stream.to_string())))
            .clone()
    }

    /// Stop the bus: publishes fail, consumers drain what is queued and
    /// then see `None`.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        for entry in self.streams.iter() {
            entry.value().notify.notify_waiters();
        }
    }

    /// Messages waiting on a stream (excluding in-flight), for drain
    /// checks.
    #[must_use]
    pub fn depth(&self, stream: &str) -> usize {
        self.state(stream).queue.lock().len()
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn publish(&self, stream: &str, payload: Vec<u8>) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed(stream.to_string()).into());
        }
        let state = self.state(stream);
        state.queue.lock().push_back(Queued {
            payload,
            attempts: 0,
        });
        state.notify.notify_one();
        Ok(())
    }

    async fn consumer(&self, stream: &str) -> Result<Box<dyn BusConsumer>> {
        let id = self.next_consumer.fetch_add(1, Ordering::SeqCst);
        debug!(stream, consumer = id, "Opening bus consumer");
        Ok(Box::new(MemoryConsumer {
            state: self.state(stream),
            config: self.config.clone(),
            id,
            next_tag: Arc::clone(&self.next_tag),
            closed: Arc::clone(&self.closed),
        }))
    }

    async fn dead_letters(&self, stream: &str) -> Result<Vec<DeadLetter>> {
        Ok(self.state(stream).dead.lock().clone())
    }
}

struct MemoryConsumer {
    state: Arc<StreamState>,
    config: BusConfig,
    id: u64,
    next_tag: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl MemoryConsumer {
    /// Pop and register the next message if the prefetch window allows.
    fn try_take(&self) -> Option<Delivery> {
        if self.state.unacked_by(self.id) >= self.config.prefetch {
            return None;
        }

        let queued = loop {
            let queued = self.state.queue.lock().pop_front()?;
            if queued.attempts >= self.config.max_attempts {
                self.state.dead_letter(queued.payload, queued.attempts);
                continue;
            }
            break queued;
        };

        let attempt = queued.attempts + 1;
        let tag = self.next_tag.fetch_add(1, Ordering::SeqCst);
        let deadline = Instant::now() + Duration::from_millis(self.config.visibility_timeout_ms);

        self.state.in_flight.lock().push(InFlight {
            tag,
            owner: self.id,
            payload: queued.payload.clone(),
            attempt,
            deadline,
        });

        Some(Delivery {
            payload: queued.payload,
            attempt,
            tag,
        })
    }

    fn remove_in_flight(&self, tag: u64) -> Option<InFlight> {
        let mut in_flight = self.state.in_flight.lock();
        let idx = in_flight.iter().position(|m| m.tag == tag)?;
        Some(in_flight.swap_remove(idx))
    }

    /// How long to sleep before re-checking: until the next in-flight
    /// deadline, capped at the visibility timeout.
    fn wait_budget(&self) -> Duration {
        let visibility = Duration::from_millis(self.config.visibility_timeout_ms.max(1));
        match self.state.next_deadline() {
            Some(deadline) => deadline
                .saturating_duration_since(Instant::now())
                .min(visibility),
            None => visibility,
        }
    }
}

#[async_trait]
impl BusConsumer for MemoryConsumer {
    async fn next(&mut self) -> Option<Delivery> {
        loop {
            self.state.reclaim_expired(&self.config);

            if let Some(delivery) = self.try_take() {
                return Some(delivery);
            }

            if self.closed.load(Ordering::SeqCst) && self.state.queue.lock().is_empty() {
                return None;
            }

            // Wake on publish/ack, or in time to reclaim an expired
            // message.
            let _ = tokio::time::timeout(self.wait_budget(), self.state.notify.notified()).await;
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<()> {
        // A missing tag means the visibility timeout already reclaimed
        // the message; at-least-once tolerates the duplicate.
        self.remove_in_flight(delivery.tag);
        self.state.notify.notify_waiters();
        Ok(())
    }

    async fn nack(&mut self, delivery: &Delivery) -> Result<()> {
        if let Some(msg) = self.remove_in_flight(delivery.tag) {
            if msg.attempt >= self.config.max_attempts {
                self.state.dead_letter(msg.payload, msg.attempt);
            } else {
                self.state.queue.lock().push_back(Queued {
                    payload: msg.payload,
                    attempts: msg.attempt,
                });
            }
            self.state.notify.notify_waiters();
        }
        Ok(())
    }
}
