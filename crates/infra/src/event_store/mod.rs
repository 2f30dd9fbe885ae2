//! Append-only event storage.
//!
//! The `EventStore` trait is the seam where storage is injected: the shipped
//! implementation is in-memory (tests, dev, and the current single-process
//! deployment), and a database-backed implementation can slot in behind the
//! same trait without touching domain or application code.

mod in_memory;
mod query;
mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use query::{EventFilter, EventQuery, EventQueryResult, Pagination};
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
