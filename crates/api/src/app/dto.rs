use chrono::NaiveDate;
use serde::Deserialize;

use glowdesk_core::StaffId;
use glowdesk_infra::event_store::StoredEvent;
use glowdesk_inventory::{InventoryEvent, ItemStatus, MovementReason};
use glowdesk_suppliers::{ContactInfo, SupplierStatus};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub sku: String,
    pub name: String,
    pub supplier_id: Option<String>,
    pub cost_price_cents: i64,
    pub retail_price_cents: Option<i64>,
    #[serde(default)]
    pub opening_stock: i64,
    pub low_stock_threshold: i64,
    pub reorder_quantity: i64,
    pub unit_of_measure: String,
    pub expires_on: Option<NaiveDate>,
    #[serde(default)]
    pub allow_negative_stock: bool,
    pub performed_by: StaffId,
    pub performed_by_name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub supplier_id: Option<String>,
    pub cost_price_cents: Option<i64>,
    pub retail_price_cents: Option<i64>,
    pub low_stock_threshold: Option<i64>,
    pub reorder_quantity: Option<i64>,
    pub unit_of_measure: Option<String>,
    pub expires_on: Option<NaiveDate>,
    pub allow_negative_stock: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeItemStatusRequest {
    pub status: ItemStatus,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    /// Signed: positive for stock-in, negative for stock-out.
    pub quantity: i64,
    pub reason: MovementReason,
    pub notes: Option<String>,
    pub performed_by: StaffId,
    pub performed_by_name: String,
}

#[derive(Debug, Deserialize)]
pub struct AcknowledgeAlertRequest {
    pub acknowledged_by: StaffId,
    pub acknowledged_by_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterSupplierRequest {
    pub name: String,
    pub contact: Option<ContactInfo>,
    pub payment_terms: Option<String>,
    pub lead_time_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSupplierRequest {
    pub name: Option<String>,
    pub contact: Option<ContactInfo>,
    pub payment_terms: Option<String>,
    pub lead_time_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SetSupplierStatusRequest {
    pub status: SupplierStatus,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub supplier_id: String,
    pub expected_delivery: Option<NaiveDate>,
    #[serde(default)]
    pub tax_cents: i64,
    #[serde(default)]
    pub shipping_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct AddOrderLineRequest {
    pub item_id: String,
    pub quantity_ordered: i64,
    pub unit_cost_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub supplier_id: Option<String>,
    pub expected_delivery: Option<NaiveDate>,
    pub tax_cents: Option<i64>,
    pub shipping_cents: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveLineRequest {
    pub item_id: String,
    pub quantity: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveOrderRequest {
    pub receipts: Vec<ReceiveLineRequest>,
    pub performed_by: StaffId,
    pub performed_by_name: String,
}

#[derive(Debug, Deserialize)]
pub struct StartStocktakeRequest {
    pub name: String,
    /// Optional explicit scope; defaults to every active item.
    pub item_ids: Option<Vec<String>>,
    pub performed_by: StaffId,
    pub performed_by_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordCountRequest {
    pub item_id: String,
    pub counted_quantity: i64,
    pub performed_by: StaffId,
    pub performed_by_name: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteStocktakeRequest {
    pub performed_by: StaffId,
    pub performed_by_name: String,
}

#[derive(Debug, Deserialize)]
pub struct EventQueryParams {
    pub aggregate_id: Option<String>,
    pub aggregate_type: Option<String>,
    pub event_type: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// -------------------------
// Response mapping helpers
// -------------------------

/// Pull the movement out of a committed batch, shaped for the adjust
/// response.
pub fn movement_from_committed(committed: &[StoredEvent]) -> Option<serde_json::Value> {
    for stored in committed {
        if let Ok(InventoryEvent::StockAdjusted(e)) =
            serde_json::from_value::<InventoryEvent>(stored.payload.clone())
        {
            let mut value = serde_json::to_value(&e).ok()?;
            if let Some(map) = value.as_object_mut() {
                map.insert(
                    "movement_id".to_string(),
                    serde_json::json!(stored.event_id),
                );
            }
            return Some(value);
        }
    }
    None
}
