//! Wire-format DTOs for the venue websocket feed.
//!
//! The feed wraps every payload in a `{"type": ..., "msg": ...}` envelope.
//! For trade messages `msg` may be a single object or an array of them;
//! both shapes normalize to a list before validation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Side, TradeEvent};
use crate::error::MalformedMessage;

/// Subscription command sent right after the handshake.
#[derive(Debug, Serialize)]
pub struct SubscribeCommand {
    pub id: u64,
    pub cmd: &'static str,
    pub params: SubscribeParams,
}

#[derive(Debug, Serialize)]
pub struct SubscribeParams {
    pub channels: Vec<&'static str>,
}

impl SubscribeCommand {
    /// Subscribe to the full trade firehose.
    #[must_use]
    pub fn trades() -> Self {
        Self {
            id: 1,
            cmd: "subscribe",
            params: SubscribeParams {
                channels: vec!["trade"],
            },
        }
    }
}

/// A field that arrives as either a single value or an array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

/// Envelope for every message on the feed, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum VenueMessage {
    #[serde(rename = "trade")]
    Trade { msg: OneOrMany<RawTrade> },
    #[serde(rename = "subscribed")]
    Subscribed { msg: SubscribedMsg },
    #[serde(rename = "error")]
    Error { msg: serde_json::Value },
    /// Heartbeats and anything the feed adds later.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct SubscribedMsg {
    pub channel: String,
}

/// A raw trade payload before validation. Every field is optional so a
/// partial payload yields a precise rejection reason instead of a serde
/// error for the whole envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTrade {
    pub market_ticker: Option<String>,
    pub trade_id: Option<String>,
    /// Price in cents (0..=100).
    pub yes_price: Option<i64>,
    pub count: Option<i64>,
    pub taker_side: Option<String>,
    /// Trade time, epoch seconds.
    pub ts: Option<i64>,
    /// Market resolution time, epoch seconds.
    pub close_ts: Option<i64>,
}

impl RawTrade {
    /// Validate and normalize into a [`TradeEvent`].
    pub fn into_trade_event(self) -> Result<TradeEvent, MalformedMessage> {
        let instrument_id = match self.market_ticker {
            Some(t) if !t.is_empty() => t,
            _ => return Err(MalformedMessage::new("missing market_ticker")),
        };
        let trade_id = match self.trade_id {
            Some(t) if !t.is_empty() => t,
            _ => return Err(MalformedMessage::new("missing trade_id")),
        };
        let size = match self.count {
            Some(c) if c > 0 => c,
            Some(c) => {
                return Err(MalformedMessage::new(format!("non-positive count: {c}")));
            }
            None => return Err(MalformedMessage::new("missing count")),
        };
        let price = match self.yes_price {
            Some(p) if (0..=100).contains(&p) => Decimal::new(p, 2),
            Some(p) => {
                return Err(MalformedMessage::new(format!("price out of range: {p}")));
            }
            None => return Err(MalformedMessage::new("missing yes_price")),
        };
        let side = match self.taker_side.as_deref() {
            Some("yes") => Side::Yes,
            Some("no") => Side::No,
            Some(other) => {
                return Err(MalformedMessage::new(format!("unknown taker_side: {other}")));
            }
            None => return Err(MalformedMessage::new("missing taker_side")),
        };
        let occurred_at = parse_ts(self.ts, "ts")?;
        let market_close_at = parse_ts(self.close_ts, "close_ts")?;

        Ok(TradeEvent {
            instrument_id,
            trade_id,
            price,
            size,
            side,
            occurred_at,
            market_close_at,
        })
    }
}

fn parse_ts(ts: Option<i64>, field: &str) -> Result<DateTime<Utc>, MalformedMessage> {
    let secs = ts.ok_or_else(|| MalformedMessage::new(format!("missing {field}")))?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| MalformedMessage::new(format!("{field} out of range: {secs}")))
}
