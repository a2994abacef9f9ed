//! Telegram alert delivery.
//!
//! Each routing channel maps to a Telegram chat. Delivery is awaited so
//! the router can drive its bounded retry off the result; the adapter
//! itself never retries.
//!
//! Requires the `telegram` feature to be enabled.

use std::collections::HashMap;

use async_trait::async_trait;
use teloxide::prelude::*;
use tracing::{debug, info};

use crate::domain::{Alert, Severity};
use crate::error::DeliveryError;
use crate::port::notifier::AlertNotifier;

/// Configuration for the Telegram notifier.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot API token obtained from BotFather.
    pub bot_token: String,
    /// Routing channel name -> target chat ID.
    pub chats: HashMap<String, i64>,
}

impl TelegramConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHATS` as a
    /// comma-separated `channel=chat_id` list, e.g.
    /// `politics=-100123,default=-100456`. Returns `None` if either is
    /// missing or no pair parses.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok()?;
        let chats = parse_chat_map(&std::env::var("TELEGRAM_CHATS").ok()?);
        if chats.is_empty() {
            return None;
        }
        Some(Self { bot_token, chats })
    }
}

fn parse_chat_map(raw: &str) -> HashMap<String, i64> {
    raw.split(',')
        .filter_map(|pair| {
            let (channel, chat_id) = pair.split_once('=')?;
            let chat_id: i64 = chat_id.trim().parse().ok()?;
            Some((channel.trim().to_string(), chat_id))
        })
        .collect()
}

/// Telegram notifier that sends alerts to per-channel chats.
pub struct TelegramNotifier {
    bot: Bot,
    chats: HashMap<String, i64>,
}

impl TelegramNotifier {
    #[must_use]
    pub fn new(config: TelegramConfig) -> Self {
        info!(chats = config.chats.len(), "Telegram notifier started");
        Self {
            bot: Bot::new(&config.bot_token),
            chats: config.chats,
        }
    }
}

#[async_trait]
impl AlertNotifier for TelegramNotifier {
    async fn deliver(&self, channel: &str, alert: &Alert) -> Result<(), DeliveryError> {
        let chat_id = self.chats.get(channel).ok_or_else(|| DeliveryError {
            channel: channel.to_string(),
            reason: "no chat configured for channel".to_string(),
        })?;

        let text = format_alert(alert);
        debug!(channel, chat_id, trade_id = %alert.trade_id, "Sending alert");

        self.bot
            .send_message(ChatId(*chat_id), text)
            .await
            .map_err(|e| DeliveryError {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;

        Ok(())
    }
}

/// Plain-text message body for an alert.
fn format_alert(alert: &Alert) -> String {
    let (emoji, label) = match alert.severity() {
        Severity::Extreme => ("🚨", "EXTREME WHALE"),
        Severity::Major => ("🐋", "Major whale"),
        Severity::Notable => ("📈", "Notable trade"),
    };

    format!(
        "{emoji} {label}\n\
         Market: {}\n\
         Category: {}\n\
         Anomaly score: {:.3}\n\
         Trade: {}",
        alert.instrument_id, alert.category, alert.anomaly_score, alert.trade_id
    )
}
