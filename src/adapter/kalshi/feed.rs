//! Kalshi websocket trade stream.
//!
//! Handles one connection: handshake with auth headers, channel
//! subscription, and the frame loop. Reconnection policy lives in
//! [`super::reconnecting`].

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{info, trace, warn};

use super::messages::{SubscribeCommand, VenueMessage};
use crate::error::{Error, FeedError, Result};
use crate::port::feed::{FeedEvent, TradeStream};

/// Supplies authentication headers for the websocket handshake.
///
/// Venue signing schemes vary; whatever scheme is in play stays behind
/// this seam so the stream itself never sees key material.
pub trait FeedAuth: Send + Sync {
    fn headers(&self) -> Result<Vec<(String, String)>>;
}

/// Auth that sends a pre-issued key id and access token verbatim.
pub struct StaticKeyAuth {
    key_id: String,
    token: String,
}

impl StaticKeyAuth {
    #[must_use]
    pub fn new(key_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            token: token.into(),
        }
    }
}

impl FeedAuth for StaticKeyAuth {
    fn headers(&self) -> Result<Vec<(String, String)>> {
        Ok(vec![
            ("KALSHI-ACCESS-KEY".to_string(), self.key_id.clone()),
            ("KALSHI-ACCESS-TOKEN".to_string(), self.token.clone()),
        ])
    }
}

/// One websocket session against the venue trade firehose.
pub struct KalshiTradeStream {
    url: String,
    auth: Box<dyn FeedAuth>,
    ws: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    /// Events still to hand out when one frame carried several trades.
    /// Stored in reverse so `pop` yields arrival order.
    pending: Vec<FeedEvent>,
}

impl KalshiTradeStream {
    #[must_use]
    pub fn new(url: String, auth: Box<dyn FeedAuth>) -> Self {
        Self {
            url,
            auth,
            ws: None,
            pending: Vec::new(),
        }
    }

    fn build_request(&self) -> Result<tungstenite::handshake::client::Request> {
        let mut request = self.url.as_str().into_client_request()?;
        for (name, value) in self.auth.headers()? {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Parse(format!("bad header name {name}: {e}")))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|e| Error::Parse(format!("bad header value: {e}")))?;
            request.headers_mut().insert(name, value);
        }
        Ok(request)
    }

    /// Split one parsed envelope into feed events, buffering extras.
    fn enqueue_trades(&mut self, msg: VenueMessage) -> Option<FeedEvent> {
        match msg {
            VenueMessage::Trade { msg } => {
                let mut events: Vec<FeedEvent> = msg
                    .into_vec()
                    .into_iter()
                    .map(|raw| match raw.into_trade_event() {
                        Ok(trade) => FeedEvent::Trade(trade),
                        Err(e) => FeedEvent::Malformed { reason: e.reason },
                    })
                    .collect();
                events.reverse();
                let first = events.pop();
                self.pending = events;
                first
            }
            VenueMessage::Subscribed { msg } => {
                info!(channel = %msg.channel, "Subscription confirmed");
                None
            }
            VenueMessage::Error { msg } => {
                warn!(detail = %msg, "Feed reported an error");
                None
            }
            VenueMessage::Unknown => None,
        }
    }
}

#[async_trait]
impl TradeStream for KalshiTradeStream {
    async fn connect(&mut self) -> Result<()> {
        info!(url = %self.url, "Connecting to WebSocket");
        let request = self.build_request()?;

        match connect_async(request).await {
            Ok((ws_stream, response)) => {
                info!(status = %response.status(), "WebSocket connected");
                self.ws = Some(ws_stream);
                Ok(())
            }
            Err(tungstenite::Error::Http(response))
                if matches!(response.status().as_u16(), 401 | 403) =>
            {
                Err(FeedError::Auth(format!(
                    "handshake rejected with status {}",
                    response.status()
                ))
                .into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn subscribe(&mut self) -> Result<()> {
        let ws = self
            .ws
            .as_mut()
            .ok_or(Error::Feed(FeedError::NotConnected))?;

        let json = serde_json::to_string(&SubscribeCommand::trades())?;
        info!("Subscribing to trade channel");
        ws.send(Message::Text(json)).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<FeedEvent> {
        if let Some(event) = self.pending.pop() {
            return Some(event);
        }

        loop {
            let ws = self.ws.as_mut()?;
            match ws.next().await? {
                Ok(Message::Text(text)) => {
                    trace!(bytes = text.len(), "Received WebSocket text frame");
                    match serde_json::from_str::<VenueMessage>(&text) {
                        Ok(msg) => {
                            if let Some(event) = self.enqueue_trades(msg) {
                                return Some(event);
                            }
                        }
                        Err(e) => {
                            return Some(FeedEvent::Malformed {
                                reason: format!("unparseable frame: {e}"),
                            });
                        }
                    }
                }
                Ok(Message::Ping(data)) => {
                    trace!("Received WebSocket ping");
                    if ws.send(Message::Pong(data)).await.is_err() {
                        return Some(FeedEvent::Disconnected {
                            reason: "failed to send pong".into(),
                        });
                    }
                }
                Ok(Message::Close(frame)) => {
                    info!(frame = ?frame, "WebSocket closed by server");
                    return Some(FeedEvent::Disconnected {
                        reason: frame.map(|f| f.reason.to_string()).unwrap_or_default(),
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "WebSocket error");
                    return Some(FeedEvent::Disconnected {
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    fn venue_name(&self) -> &'static str {
        "Kalshi"
    }
}
