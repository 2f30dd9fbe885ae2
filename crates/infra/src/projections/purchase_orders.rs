//! Purchase order read model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use glowdesk_events::EventEnvelope;
use glowdesk_inventory::ItemId;
use glowdesk_purchasing::{PurchaseOrderEvent, PurchaseOrderId, PurchaseOrderStatus};
use glowdesk_suppliers::SupplierId;

use crate::projections::cursor::CursorCheck;
use crate::projections::{ProjectionError, StreamCursors};
use crate::read_model::ReadStore;

/// One order line as exposed to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineReadModel {
    pub item_id: ItemId,
    pub quantity_ordered: i64,
    pub quantity_received: i64,
    pub unit_cost_cents: i64,
}

/// Queryable purchase order read model with computed totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderReadModel {
    pub order_id: PurchaseOrderId,
    pub order_number: String,
    pub supplier_id: SupplierId,
    pub status: PurchaseOrderStatus,
    pub lines: Vec<OrderLineReadModel>,
    pub order_date: DateTime<Utc>,
    pub expected_delivery: Option<NaiveDate>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub total_cents: i64,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseOrderReadModel {
    fn recompute_totals(&mut self) {
        self.subtotal_cents = self
            .lines
            .iter()
            .map(|l| l.quantity_ordered * l.unit_cost_cents)
            .sum();
        self.total_cents = self.subtotal_cents + self.tax_cents + self.shipping_cents;
    }
}

/// Purchase orders projection. Deleted drafts drop out of the read model;
/// orders with receipt history never do.
#[derive(Debug)]
pub struct PurchaseOrdersProjection<S>
where
    S: ReadStore<PurchaseOrderId, PurchaseOrderReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> PurchaseOrdersProjection<S>
where
    S: ReadStore<PurchaseOrderId, PurchaseOrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, order_id: &PurchaseOrderId) -> Option<PurchaseOrderReadModel> {
        self.store.get(order_id)
    }

    pub fn list(&self) -> Vec<PurchaseOrderReadModel> {
        self.store.list()
    }

    /// Whether an order number is already taken.
    pub fn order_number_in_use(&self, order_number: &str) -> bool {
        self.store
            .list()
            .iter()
            .any(|rm| rm.order_number == order_number)
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

        let event: PurchaseOrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let order_id = match &event {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.order_id,
            PurchaseOrderEvent::OrderLineAdded(e) => e.order_id,
            PurchaseOrderEvent::OrderLineRemoved(e) => e.order_id,
            PurchaseOrderEvent::OrderDetailsUpdated(e) => e.order_id,
            PurchaseOrderEvent::OrderSubmitted(e) => e.order_id,
            PurchaseOrderEvent::OrderMarkedOrdered(e) => e.order_id,
            PurchaseOrderEvent::GoodsReceived(e) => e.order_id,
            PurchaseOrderEvent::OrderCancelled(e) => e.order_id,
            PurchaseOrderEvent::OrderDeleted(e) => e.order_id,
        };
        if order_id.0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(
                "event order_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                let mut rm = PurchaseOrderReadModel {
                    order_id: e.order_id,
                    order_number: e.order_number,
                    supplier_id: e.supplier_id,
                    status: PurchaseOrderStatus::Draft,
                    lines: Vec::new(),
                    order_date: e.occurred_at,
                    expected_delivery: e.expected_delivery,
                    subtotal_cents: 0,
                    tax_cents: e.tax_cents,
                    shipping_cents: e.shipping_cents,
                    total_cents: 0,
                    updated_at: e.occurred_at,
                };
                rm.recompute_totals();
                self.store.upsert(e.order_id, rm);
            }
            PurchaseOrderEvent::OrderLineAdded(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.lines.push(OrderLineReadModel {
                        item_id: e.item_id,
                        quantity_ordered: e.quantity_ordered,
                        quantity_received: 0,
                        unit_cost_cents: e.unit_cost_cents,
                    });
                    rm.recompute_totals();
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.order_id, rm);
                }
            }
            PurchaseOrderEvent::OrderLineRemoved(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.lines.retain(|l| l.item_id != e.item_id);
                    rm.recompute_totals();
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.order_id, rm);
                }
            }
            PurchaseOrderEvent::OrderDetailsUpdated(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.supplier_id = e.supplier_id;
                    rm.expected_delivery = e.expected_delivery;
                    rm.tax_cents = e.tax_cents;
                    rm.shipping_cents = e.shipping_cents;
                    rm.recompute_totals();
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.order_id, rm);
                }
            }
            PurchaseOrderEvent::OrderSubmitted(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.status = PurchaseOrderStatus::Pending;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.order_id, rm);
                }
            }
            PurchaseOrderEvent::OrderMarkedOrdered(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.status = PurchaseOrderStatus::Ordered;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.order_id, rm);
                }
            }
            PurchaseOrderEvent::GoodsReceived(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    for receipt in &e.receipts {
                        if let Some(line) =
                            rm.lines.iter_mut().find(|l| l.item_id == receipt.item_id)
                        {
                            line.quantity_received = receipt.cumulative_received;
                        }
                    }
                    rm.status = e.status_after;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.order_id, rm);
                }
            }
            PurchaseOrderEvent::OrderCancelled(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.status = PurchaseOrderStatus::Cancelled;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.order_id, rm);
                }
            }
            PurchaseOrderEvent::OrderDeleted(e) => {
                self.store.remove(&e.order_id);
            }
        }

        self.cursors.advance(aggregate_id, envelope.sequence_number());
        Ok(())
    }
}
