use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::Utc;

use glowdesk_core::AggregateId;
use glowdesk_inventory::ItemId;
use glowdesk_purchasing::{
    AddOrderLine, CancelOrder, DeleteOrder, LineReceipt, MarkOrdered, PurchaseOrderCommand,
    PurchaseOrderId, RemoveOrderLine, SubmitOrder, UpdateOrderDetails,
};
use glowdesk_suppliers::SupplierId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route(
            "/orders/:id",
            get(get_order).patch(update_order).delete(delete_order),
        )
        .route("/orders/:id/lines", post(add_line))
        .route("/orders/:id/lines/:item_id", delete(remove_line))
        .route("/orders/:id/submit", post(submit_order))
        .route("/orders/:id/ordered", post(mark_ordered))
        .route("/orders/:id/receive", post(receive_order))
        .route("/orders/:id/cancel", post(cancel_order))
}

fn parse_order_id(id: &str) -> Result<PurchaseOrderId, axum::response::Response> {
    id.parse::<AggregateId>()
        .map(PurchaseOrderId::new)
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id"))
}

fn parse_item_id(id: &str) -> Result<ItemId, axum::response::Response> {
    id.parse::<AggregateId>()
        .map(ItemId::new)
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id"))
}

fn committed_response(
    order_id: PurchaseOrderId,
    status: StatusCode,
    events_committed: usize,
) -> axum::response::Response {
    (
        status,
        Json(serde_json::json!({
            "id": order_id.to_string(),
            "events_committed": events_committed,
        })),
    )
        .into_response()
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateOrderRequest>,
) -> axum::response::Response {
    let supplier_id = match body.supplier_id.parse::<AggregateId>() {
        Ok(v) => SupplierId::new(v),
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_id",
                "invalid supplier id",
            );
        }
    };

    let agg = AggregateId::new();
    let order_id = PurchaseOrderId::new(agg);

    match services.create_order(
        order_id,
        supplier_id,
        body.expected_delivery,
        body.tax_cents,
        body.shipping_cents,
    ) {
        Ok(committed) => committed_response(order_id, StatusCode::CREATED, committed.len()),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    (StatusCode::OK, Json(services.order_list())).into_response()
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.order_get(&order_id) {
        Some(rm) => (StatusCode::OK, Json(rm)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
    }
}

pub async fn update_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateOrderRequest>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let supplier_id = match body.supplier_id {
        None => None,
        Some(raw) => match raw.parse::<AggregateId>() {
            Ok(v) => Some(SupplierId::new(v)),
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid supplier id",
                );
            }
        },
    };

    let cmd = PurchaseOrderCommand::UpdateOrderDetails(UpdateOrderDetails {
        order_id,
        supplier_id,
        expected_delivery: body.expected_delivery,
        tax_cents: body.tax_cents,
        shipping_cents: body.shipping_cents,
        occurred_at: Utc::now(),
    });

    match services.dispatch_order(order_id, cmd) {
        Ok(committed) => committed_response(order_id, StatusCode::OK, committed.len()),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn add_line(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddOrderLineRequest>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let item_id = match parse_item_id(&body.item_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(e) = services.ensure_item_exists(item_id) {
        return errors::dispatch_error_to_response(e);
    }

    let cmd = PurchaseOrderCommand::AddOrderLine(AddOrderLine {
        order_id,
        item_id,
        quantity_ordered: body.quantity_ordered,
        unit_cost_cents: body.unit_cost_cents,
        occurred_at: Utc::now(),
    });

    match services.dispatch_order(order_id, cmd) {
        Ok(committed) => committed_response(order_id, StatusCode::OK, committed.len()),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn remove_line(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, item_id)): Path<(String, String)>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let item_id = match parse_item_id(&item_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = PurchaseOrderCommand::RemoveOrderLine(RemoveOrderLine {
        order_id,
        item_id,
        occurred_at: Utc::now(),
    });

    match services.dispatch_order(order_id, cmd) {
        Ok(committed) => committed_response(order_id, StatusCode::OK, committed.len()),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn submit_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = PurchaseOrderCommand::SubmitOrder(SubmitOrder {
        order_id,
        occurred_at: Utc::now(),
    });

    match services.dispatch_order(order_id, cmd) {
        Ok(committed) => committed_response(order_id, StatusCode::OK, committed.len()),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn mark_ordered(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = PurchaseOrderCommand::MarkOrdered(MarkOrdered {
        order_id,
        occurred_at: Utc::now(),
    });

    match services.dispatch_order(order_id, cmd) {
        Ok(committed) => committed_response(order_id, StatusCode::OK, committed.len()),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn receive_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReceiveOrderRequest>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut receipts = Vec::with_capacity(body.receipts.len());
    for line in body.receipts {
        let item_id = match parse_item_id(&line.item_id) {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        receipts.push(LineReceipt {
            item_id,
            quantity: line.quantity,
            notes: line.notes,
        });
    }

    match services.receive_order(order_id, receipts, body.performed_by, body.performed_by_name) {
        Ok(received) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": order_id.to_string(),
                "status": received.status_after,
                "receipts": received.receipts,
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = PurchaseOrderCommand::CancelOrder(CancelOrder {
        order_id,
        occurred_at: Utc::now(),
    });

    match services.dispatch_order(order_id, cmd) {
        Ok(committed) => committed_response(order_id, StatusCode::OK, committed.len()),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = PurchaseOrderCommand::DeleteOrder(DeleteOrder {
        order_id,
        occurred_at: Utc::now(),
    });

    match services.dispatch_order(order_id, cmd) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
