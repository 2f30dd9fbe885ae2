//! Disposable, rebuildable read models.

mod store;

pub use store::{InMemoryReadStore, ReadStore};
