//! Alert delivery port.

use async_trait::async_trait;

use crate::domain::Alert;
use crate::error::DeliveryError;

/// Delivers a formatted alert to one destination channel.
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// Deliver `alert` to `channel`. Errors are retryable from the
    /// router's perspective; the notifier itself must not retry.
    async fn deliver(&self, channel: &str, alert: &Alert) -> std::result::Result<(), DeliveryError>;
}

/// Notifier that drops alerts. Used when no delivery backend is
/// configured.
pub struct NullNotifier;

#[async_trait]
impl AlertNotifier for NullNotifier {
    async fn deliver(
        &self,
        _channel: &str,
        _alert: &Alert,
    ) -> std::result::Result<(), DeliveryError> {
        Ok(())
    }
}

/// Notifier that logs alerts instead of sending them. Useful for dry
/// runs against live data.
pub struct LogNotifier;

#[async_trait]
impl AlertNotifier for LogNotifier {
    async fn deliver(
        &self,
        channel: &str,
        alert: &Alert,
    ) -> std::result::Result<(), DeliveryError> {
        tracing::info!(
            channel,
            trade_id = %alert.trade_id,
            instrument_id = %alert.instrument_id,
            score = alert.anomaly_score,
            severity = ?alert.severity(),
            "alert (dry run)"
        );
        Ok(())
    }
}
