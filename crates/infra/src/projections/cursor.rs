//! Per-stream cursors shared by all projections.

use std::collections::HashMap;
use std::sync::RwLock;

use glowdesk_core::AggregateId;

use super::ProjectionError;

/// Outcome of a cursor check for an incoming envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CursorCheck {
    /// First time this sequence number is seen; apply it.
    Fresh,
    /// Duplicate or replay at or below the cursor; safe to ignore.
    Replay,
}

/// Tracks the last applied sequence number per aggregate stream.
///
/// Projections are consumed from a single subscriber loop, so check → apply →
/// advance without holding a lock across the apply is race-free; the lock
/// only guards the map itself.
#[derive(Debug, Default)]
pub(crate) struct StreamCursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Validate an incoming sequence number against the stream's cursor.
    ///
    /// The first event of a stream may carry any positive sequence number
    /// (stores start at 1); after that, strict +1 increments are required.
    pub(crate) fn check(
        &self,
        aggregate_id: AggregateId,
        sequence_number: u64,
    ) -> Result<CursorCheck, ProjectionError> {
        let cursors = self
            .inner
            .read()
            .map_err(|_| ProjectionError::Deserialize("cursor lock poisoned".to_string()))?;
        let last = *cursors.get(&aggregate_id).unwrap_or(&0);

        if sequence_number == 0 {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: sequence_number,
            });
        }
        if sequence_number <= last {
            return Ok(CursorCheck::Replay);
        }
        if last != 0 && sequence_number != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: sequence_number,
            });
        }

        Ok(CursorCheck::Fresh)
    }

    /// Advance the cursor after a successful apply.
    pub(crate) fn advance(&self, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.insert(aggregate_id, sequence_number);
        }
    }
}
