//! Item catalog + current stock read model.
//!
//! This is the registry the application layer consults for item lookups, SKU
//! uniqueness checks, supplier references, and stocktake snapshots.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use glowdesk_events::EventEnvelope;
use glowdesk_inventory::{InventoryEvent, ItemId, ItemStatus};
use glowdesk_suppliers::SupplierId;

use crate::projections::cursor::CursorCheck;
use crate::projections::{ProjectionError, StreamCursors};
use crate::read_model::ReadStore;

/// Queryable item read model: catalog attributes + current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReadModel {
    pub item_id: ItemId,
    pub sku: String,
    pub name: String,
    pub supplier_id: Option<SupplierId>,
    pub cost_price_cents: i64,
    pub retail_price_cents: Option<i64>,
    pub current_stock: i64,
    pub low_stock_threshold: i64,
    pub reorder_quantity: i64,
    pub unit_of_measure: String,
    pub status: ItemStatus,
    pub expires_on: Option<NaiveDate>,
    pub allow_negative_stock: bool,
    pub updated_at: DateTime<Utc>,
}

/// Stock levels projection.
#[derive(Debug)]
pub struct StockLevelsProjection<S>
where
    S: ReadStore<ItemId, ItemReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> StockLevelsProjection<S>
where
    S: ReadStore<ItemId, ItemReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// Query read model for one item.
    pub fn get(&self, item_id: &ItemId) -> Option<ItemReadModel> {
        self.store.get(item_id)
    }

    /// List all items (disposable read model).
    pub fn list(&self) -> Vec<ItemReadModel> {
        self.store.list()
    }

    /// Whether a SKU is already taken by another item.
    pub fn sku_in_use(&self, sku: &str) -> bool {
        self.store.list().iter().any(|rm| rm.sku == sku)
    }

    /// Items currently referencing a supplier (referential-integrity check).
    pub fn items_for_supplier(&self, supplier_id: SupplierId) -> Vec<ItemReadModel> {
        self.store
            .list()
            .into_iter()
            .filter(|rm| rm.supplier_id == Some(supplier_id))
            .collect()
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

        let event: InventoryEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let item_id = match &event {
            InventoryEvent::ItemCreated(e) => e.item_id,
            InventoryEvent::ItemDetailsUpdated(e) => e.item_id,
            InventoryEvent::ItemStatusChanged(e) => e.item_id,
            InventoryEvent::StockAdjusted(e) => e.item_id,
        };
        if item_id.0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(
                "event item_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            InventoryEvent::ItemCreated(e) => {
                self.store.upsert(
                    e.item_id,
                    ItemReadModel {
                        item_id: e.item_id,
                        sku: e.sku,
                        name: e.name,
                        supplier_id: e.supplier_id,
                        cost_price_cents: e.cost_price_cents,
                        retail_price_cents: e.retail_price_cents,
                        current_stock: 0,
                        low_stock_threshold: e.low_stock_threshold,
                        reorder_quantity: e.reorder_quantity,
                        unit_of_measure: e.unit_of_measure,
                        status: ItemStatus::Active,
                        expires_on: e.expires_on,
                        allow_negative_stock: e.allow_negative_stock,
                        updated_at: e.occurred_at,
                    },
                );
            }
            InventoryEvent::ItemDetailsUpdated(e) => {
                if let Some(mut rm) = self.store.get(&e.item_id) {
                    rm.name = e.name;
                    rm.supplier_id = e.supplier_id;
                    rm.cost_price_cents = e.cost_price_cents;
                    rm.retail_price_cents = e.retail_price_cents;
                    rm.low_stock_threshold = e.low_stock_threshold;
                    rm.reorder_quantity = e.reorder_quantity;
                    rm.unit_of_measure = e.unit_of_measure;
                    rm.expires_on = e.expires_on;
                    rm.allow_negative_stock = e.allow_negative_stock;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.item_id, rm);
                }
            }
            InventoryEvent::ItemStatusChanged(e) => {
                if let Some(mut rm) = self.store.get(&e.item_id) {
                    rm.status = e.status;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.item_id, rm);
                }
            }
            InventoryEvent::StockAdjusted(e) => {
                if let Some(mut rm) = self.store.get(&e.item_id) {
                    rm.current_stock = e.new_stock;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.item_id, rm);
                }
            }
        }

        self.cursors.advance(aggregate_id, envelope.sequence_number());
        Ok(())
    }
}
