//! Application composition: configuration and runtime wiring.

pub mod config;
pub mod runtime;

pub use config::Config;
pub use runtime::App;
