//! Database plumbing for the SQLite context store.

pub mod connection;
pub mod model;
pub mod schema;
