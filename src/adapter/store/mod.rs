//! Context store adapters.

pub mod db;
pub mod memory;
pub mod sqlite;

pub use memory::InMemoryContextStore;
pub use sqlite::SqliteContextStore;
