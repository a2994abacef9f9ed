//! Ports: trait seams between the pipeline and its collaborators.
//!
//! Each port is implemented by at least one adapter under
//! [`crate::adapter`] and by mocks in [`crate::testkit`].

pub mod bus;
pub mod catalog;
pub mod feed;
pub mod model;
pub mod notifier;
pub mod store;
