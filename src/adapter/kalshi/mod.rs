//! Kalshi venue adapters: websocket trade feed and REST market catalog.

pub mod catalog;
pub mod feed;
pub mod messages;
pub mod reconnecting;

pub use catalog::KalshiCatalog;
pub use feed::{FeedAuth, KalshiTradeStream, StaticKeyAuth};
pub use reconnecting::{ReconnectConfig, ReconnectingTradeStream};
