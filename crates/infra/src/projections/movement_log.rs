//! Movement audit log read model.
//!
//! One record per `StockAdjusted` event, newest first. The log is a
//! sequence, not keyed rows, so it keeps its own ordered storage instead of
//! going through `ReadStore`.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use glowdesk_core::StaffId;
use glowdesk_events::EventEnvelope;
use glowdesk_inventory::{
    InventoryEvent, ItemId, MovementDirection, MovementReason, MovementReference,
};

use crate::projections::cursor::CursorCheck;
use crate::projections::{ProjectionError, StreamCursors};

/// One immutable ledger entry, as exposed to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovementRecord {
    pub movement_id: Uuid,
    pub item_id: ItemId,
    pub direction: MovementDirection,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub reason: MovementReason,
    pub notes: Option<String>,
    pub reference: Option<MovementReference>,
    pub performed_by: StaffId,
    pub performed_by_name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Movement log projection.
#[derive(Debug, Default)]
pub struct MovementLogProjection {
    records: RwLock<Vec<StockMovementRecord>>,
    cursors: StreamCursors,
}

impl MovementLogProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full history, newest first.
    pub fn list(&self) -> Vec<StockMovementRecord> {
        let records = match self.records.read() {
            Ok(r) => r,
            Err(_) => return vec![],
        };
        records.iter().rev().cloned().collect()
    }

    /// History for one item, newest first.
    pub fn list_for_item(&self, item_id: ItemId) -> Vec<StockMovementRecord> {
        let records = match self.records.read() {
            Ok(r) => r,
            Err(_) => return vec![],
        };
        records
            .iter()
            .rev()
            .filter(|m| m.item_id == item_id)
            .cloned()
            .collect()
    }

    /// Apply a published envelope into the projection.
    ///
    /// Non-movement inventory events advance the cursor without producing a
    /// record.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        if self.cursors.check(aggregate_id, envelope.sequence_number())? == CursorCheck::Replay {
            return Ok(());
        }

        let event: InventoryEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        if let InventoryEvent::StockAdjusted(e) = event {
            if e.item_id.0 != aggregate_id {
                return Err(ProjectionError::StreamMismatch(
                    "event item_id does not match envelope aggregate_id".to_string(),
                ));
            }
            if let Ok(mut records) = self.records.write() {
                records.push(StockMovementRecord {
                    movement_id: envelope.event_id(),
                    item_id: e.item_id,
                    direction: e.direction,
                    quantity: e.quantity,
                    previous_stock: e.previous_stock,
                    new_stock: e.new_stock,
                    reason: e.reason,
                    notes: e.notes,
                    reference: e.reference,
                    performed_by: e.performed_by,
                    performed_by_name: e.performed_by_name,
                    occurred_at: e.occurred_at,
                });
            }
        }

        self.cursors.advance(aggregate_id, envelope.sequence_number());
        Ok(())
    }
}
