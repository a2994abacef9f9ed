//! Decision model adapters.

pub mod forest;

pub use forest::ForestModel;
