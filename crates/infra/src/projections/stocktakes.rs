//! Stocktake session read model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use glowdesk_events::EventEnvelope;
use glowdesk_inventory::ItemId;
use glowdesk_stocktake::{StocktakeEvent, StocktakeId, StocktakeStatus};

use crate::projections::cursor::CursorCheck;
use crate::projections::{ProjectionError, StreamCursors};
use crate::read_model::ReadStore;

/// One stocktake line as exposed to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StocktakeLineReadModel {
    pub item_id: ItemId,
    pub expected_quantity: i64,
    pub unit_cost_cents: i64,
    pub counted_quantity: Option<i64>,
    pub discrepancy: Option<i64>,
    pub discrepancy_value_cents: Option<i64>,
}

/// Queryable stocktake read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StocktakeReadModel {
    pub stocktake_id: StocktakeId,
    pub name: String,
    pub status: StocktakeStatus,
    pub lines: Vec<StocktakeLineReadModel>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StocktakeReadModel {
    /// Net shrinkage/overage value across counted lines.
    pub fn total_discrepancy_value_cents(&self) -> i64 {
        self.lines
            .iter()
            .filter_map(|l| l.discrepancy_value_cents)
            .sum()
    }
}

/// Stocktakes projection.
#[derive(Debug)]
pub struct StocktakesProjection<S>
where
    S: ReadStore<StocktakeId, StocktakeReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> StocktakesProjection<S>
where
    S: ReadStore<StocktakeId, StocktakeReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, stocktake_id: &StocktakeId) -> Option<StocktakeReadModel> {
        self.store.get(stocktake_id)
    }

    pub fn list(&self) -> Vec<StocktakeReadModel> {
        self.store.list()
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        if self.cursors.check(aggregate_id, envelope.sequence_number())? == CursorCheck::Replay {
            return Ok(());
        }

        let event: StocktakeEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let stocktake_id = match &event {
            StocktakeEvent::StocktakeStarted(e) => e.stocktake_id,
            StocktakeEvent::CountRecorded(e) => e.stocktake_id,
            StocktakeEvent::StocktakeCompleted(e) => e.stocktake_id,
            StocktakeEvent::StocktakeCancelled(e) => e.stocktake_id,
        };
        if stocktake_id.0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(
                "event stocktake_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            StocktakeEvent::StocktakeStarted(e) => {
                self.store.upsert(
                    e.stocktake_id,
                    StocktakeReadModel {
                        stocktake_id: e.stocktake_id,
                        name: e.name,
                        status: StocktakeStatus::InProgress,
                        lines: e
                            .lines
                            .iter()
                            .map(|s| StocktakeLineReadModel {
                                item_id: s.item_id,
                                expected_quantity: s.expected_quantity,
                                unit_cost_cents: s.unit_cost_cents,
                                counted_quantity: None,
                                discrepancy: None,
                                discrepancy_value_cents: None,
                            })
                            .collect(),
                        started_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            StocktakeEvent::CountRecorded(e) => {
                if let Some(mut rm) = self.store.get(&e.stocktake_id) {
                    if let Some(line) = rm.lines.iter_mut().find(|l| l.item_id == e.item_id) {
                        line.counted_quantity = Some(e.counted_quantity);
                        line.discrepancy = Some(e.discrepancy);
                        line.discrepancy_value_cents = Some(e.discrepancy * line.unit_cost_cents);
                    }
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.stocktake_id, rm);
                }
            }
            StocktakeEvent::StocktakeCompleted(e) => {
                if let Some(mut rm) = self.store.get(&e.stocktake_id) {
                    rm.status = StocktakeStatus::Completed;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.stocktake_id, rm);
                }
            }
            StocktakeEvent::StocktakeCancelled(e) => {
                if let Some(mut rm) = self.store.get(&e.stocktake_id) {
                    rm.status = StocktakeStatus::Cancelled;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.stocktake_id, rm);
                }
            }
        }

        self.cursors.advance(aggregate_id, envelope.sequence_number());
        Ok(())
    }
}
