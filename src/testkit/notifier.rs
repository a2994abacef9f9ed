//! A capturing notifier with scriptable failures.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::Alert;
use crate::error::DeliveryError;
use crate::port::notifier::AlertNotifier;

/// Records every delivery; optionally fails the first N attempts.
#[derive(Default)]
pub struct CapturingNotifier {
    delivered: Mutex<Vec<(String, Alert)>>,
    fail_first: AtomicU32,
    attempts: AtomicU32,
}

impl CapturingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `n` delivery attempts before succeeding.
    pub fn failing_first(n: u32) -> Self {
        let notifier = Self::new();
        notifier.fail_first.store(n, Ordering::SeqCst);
        notifier
    }

    /// Channel/alert pairs delivered so far.
    pub fn delivered(&self) -> Vec<(String, Alert)> {
        self.delivered.lock().unwrap().clone()
    }

    /// Total delivery attempts, including failed ones.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertNotifier for CapturingNotifier {
    async fn deliver(&self, channel: &str, alert: &Alert) -> Result<(), DeliveryError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.fail_first.load(Ordering::SeqCst) {
            return Err(DeliveryError {
                channel: channel.to_string(),
                reason: format!("scripted failure on attempt {attempt}"),
            });
        }
        self.delivered
            .lock()
            .unwrap()
            .push((channel.to_string(), alert.clone()));
        Ok(())
    }
}
