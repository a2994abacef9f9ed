//! Time-windowed trade-id deduplication for the alert router.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Remembers trade ids seen within a sliding window so redelivered
/// alerts (at-least-once bus) are suppressed instead of re-sent.
///
/// Entries older than the window are garbage-collected lazily on each
/// observation, keeping memory proportional to the alert rate.
pub struct RecentTradeIds {
    window: Duration,
    seen: HashMap<String, Instant>,
    last_gc: Instant,
}

impl RecentTradeIds {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
            last_gc: Instant::now(),
        }
    }

    /// Record `trade_id`; returns `true` if it is the first sighting
    /// within the window.
    pub fn observe(&mut self, trade_id: &str) -> bool {
        self.observe_at(trade_id, Instant::now())
    }

    fn observe_at(&mut self, trade_id: &str, now: Instant) -> bool {
        if now.duration_since(self.last_gc) >= self.window {
            self.seen.retain(|_, at| now.duration_since(*at) < self.window);
            self.last_gc = now;
        }

        match self.seen.get(trade_id) {
            Some(at) if now.duration_since(*at) < self.window => false,
            _ => {
                self.seen.insert(trade_id.to_string(), now);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
