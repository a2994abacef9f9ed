//! Pipeline stages: feed connector, scoring engine, alert router, and
//! the background context refresher. Each stage is a tokio task wired
//! together through the event bus.

pub mod connector;
pub mod counters;
pub mod dedup;
pub mod refresh;
pub mod router;
pub mod scorer;

pub use connector::FeedConnector;
pub use counters::PipelineCounters;
pub use dedup::RecentTradeIds;
pub use refresh::ContextRefresher;
pub use router::{AlertRouter, RoutingConfig};
pub use scorer::{ScoringConfig, ScoringEngine};
