use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use glowdesk_core::AggregateId;
use glowdesk_inventory::{
    AdjustStock, ChangeItemStatus, CreateItem, InventoryCommand, InventoryItem, ItemId,
    UpdateItemDetails,
};
use glowdesk_suppliers::SupplierId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/items", post(create_item).get(list_items))
        .route("/items/:id", get(get_item).patch(update_item))
        .route("/items/:id/status", post(change_item_status))
        .route("/items/:id/adjust", post(adjust_stock))
        .route("/items/:id/movements", get(item_movements))
        .route("/movements", get(all_movements))
}

fn parse_supplier_id(raw: Option<String>) -> Result<Option<SupplierId>, axum::response::Response> {
    match raw {
        None => Ok(None),
        Some(s) => s
            .parse::<AggregateId>()
            .map(|id| Some(SupplierId::new(id)))
            .map_err(|_| {
                errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid supplier id")
            }),
    }
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateItemRequest>,
) -> axum::response::Response {
    let supplier_id = match parse_supplier_id(body.supplier_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let agg = AggregateId::new();
    let item_id = ItemId::new(agg);

    let cmd = CreateItem {
        item_id,
        sku: body.sku,
        name: body.name,
        supplier_id,
        cost_price_cents: body.cost_price_cents,
        retail_price_cents: body.retail_price_cents,
        opening_stock: body.opening_stock,
        low_stock_threshold: body.low_stock_threshold,
        reorder_quantity: body.reorder_quantity,
        unit_of_measure: body.unit_of_measure,
        expires_on: body.expires_on,
        allow_negative_stock: body.allow_negative_stock,
        performed_by: body.performed_by,
        performed_by_name: body.performed_by_name,
        occurred_at: Utc::now(),
    };

    let committed = match services.create_item(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    (StatusCode::OK, Json(services.item_list())).into_response()
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id");
        }
    };

    match services.item_get(&ItemId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(rm)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "item not found"),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateItemRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id");
        }
    };
    let supplier_id = match parse_supplier_id(body.supplier_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let item_id = ItemId::new(agg);
    let cmd = InventoryCommand::UpdateItemDetails(UpdateItemDetails {
        item_id,
        name: body.name,
        supplier_id,
        cost_price_cents: body.cost_price_cents,
        retail_price_cents: body.retail_price_cents,
        low_stock_threshold: body.low_stock_threshold,
        reorder_quantity: body.reorder_quantity,
        unit_of_measure: body.unit_of_measure,
        expires_on: body.expires_on,
        allow_negative_stock: body.allow_negative_stock,
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch::<InventoryItem>(agg, "inventory.item", cmd, |id| {
        InventoryItem::empty(ItemId::new(id))
    }) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn change_item_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeItemStatusRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id");
        }
    };

    let item_id = ItemId::new(agg);
    let cmd = InventoryCommand::ChangeItemStatus(ChangeItemStatus {
        item_id,
        status: body.status,
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch::<InventoryItem>(agg, "inventory.item", cmd, |id| {
        InventoryItem::empty(ItemId::new(id))
    }) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id");
        }
    };

    let item_id = ItemId::new(agg);
    let cmd = AdjustStock {
        item_id,
        quantity: body.quantity,
        reason: body.reason,
        notes: body.notes,
        reference: None,
        performed_by: body.performed_by,
        performed_by_name: body.performed_by_name,
        occurred_at: Utc::now(),
    };

    let committed = match services.ledger_adjust(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "movement": dto::movement_from_committed(&committed),
            "stream_version": committed.last().map(|e| e.sequence_number).unwrap_or(0),
        })),
    )
        .into_response()
}

pub async fn item_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id");
        }
    };

    (
        StatusCode::OK,
        Json(services.movements(Some(ItemId::new(agg)))),
    )
        .into_response()
}

pub async fn all_movements(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    (StatusCode::OK, Json(services.movements(None))).into_response()
}
