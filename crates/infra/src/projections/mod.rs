//! Read-model projections.
//!
//! Projections consume published envelopes (JSON payloads) and maintain
//! disposable, rebuildable read models. They are idempotent for
//! at-least-once delivery: each keeps a per-stream cursor and ignores
//! replays at or below it.

mod cursor;

pub mod low_stock;
pub mod movement_log;
pub mod purchase_orders;
pub mod stock_levels;
pub mod stocktakes;
pub mod suppliers;

use thiserror::Error;

pub(crate) use cursor::StreamCursors;

/// Projection apply error.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event: {0}")]
    Deserialize(String),

    #[error("event does not belong to the envelope's stream: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}
