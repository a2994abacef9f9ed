//! Whalewatch - Real-time whale-trade anomaly detection for prediction markets.
//!
//! This crate ingests a venue's trade firehose, maintains per-instrument
//! rolling baselines, scores every trade against an isolation-forest
//! model, and routes confirmed whale alerts to notification channels.
//!
//! # Architecture
//!
//! A staged pipeline decoupled by an at-least-once event bus:
//!
//! - **`engine::connector`** - Drains the venue WebSocket onto the raw
//!   trade stream
//! - **`engine::scorer`** - Enriches trades with instrument context and
//!   gates model scores against the alert threshold
//! - **`engine::router`** - Dedups and delivers alerts per category
//! - **`engine::refresh`** - Background catalog refresh of categories
//!   and liquidity
//!
//! # Modules
//!
//! - [`domain`] - Venue-agnostic types: trades, contexts, features, alerts
//! - [`port`] - Trait seams: feed, bus, store, model, catalog, notifier
//! - [`adapter`] - Kalshi feed/catalog, in-memory bus, SQLite and
//!   in-memory stores, forest model, Telegram notifier
//! - [`engine`] - The pipeline stages
//! - [`app`] - Configuration loading and runtime wiring
//! - [`error`] - Error types for the crate
//!
//! # Features
//!
//! - `telegram` - Enable Telegram alert delivery (on by default)
//! - `testkit` - Expose test mocks and builders to integration tests
//!
//! # Example
//!
//! ```no_run
//! use whalewatch::app::{App, Config};
//!
//! # async fn run() -> whalewatch::Result<()> {
//! let config = Config::load("config.toml")?;
//! config.init_logging();
//! App::run(config).await
//! # }
//! ```

pub mod adapter;
pub mod app;
pub mod domain;
pub mod engine;
pub mod error;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use error::{Error, Result};
