//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`stream`] — Mock [`TradeStream`](crate::port::feed::TradeStream)
//!   implementations: `ScriptedTradeStream`, `ChannelTradeStream`.
//! - [`domain`] — Builders for trades, contexts, and alerts.
//! - [`model`] — Canned [`DecisionModel`](crate::port::model::DecisionModel)
//!   implementations.
//! - [`notifier`] — A capturing notifier with scriptable failures.

pub mod domain;
pub mod model;
pub mod notifier;
pub mod stream;
