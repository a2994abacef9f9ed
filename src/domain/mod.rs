//! Exchange-agnostic domain types.
//!
//! Pure data: no I/O, no async. Everything here is deterministic and
//! cheaply cloneable so scoring workers can snapshot state freely.

pub mod alert;
pub mod context;
pub mod feature;
pub mod trade;

pub use alert::{Alert, Severity};
pub use context::{InstrumentContext, RunningStats, FALLBACK_CATEGORY, SIGMA_FLOOR};
pub use feature::FeatureVector;
pub use trade::{Side, TradeEvent};
