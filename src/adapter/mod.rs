//! Adapters implementing the port traits against real backends.

pub mod bus;
pub mod kalshi;
pub mod model;
pub mod notifier;
pub mod store;
