//! Event bus adapters.

pub mod memory;

pub use memory::InMemoryBus;
