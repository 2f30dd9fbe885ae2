//! Infrastructure: event store, command dispatch, read models, projections.
//!
//! Nothing in this crate knows business rules; it composes the domain crates'
//! aggregates with storage and transport so the application layer can stay
//! thin.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;

#[cfg(test)]
mod integration_tests;
