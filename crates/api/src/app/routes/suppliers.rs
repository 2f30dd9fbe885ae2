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
use glowdesk_suppliers::{
    RegisterSupplier, SetSupplierStatus, SupplierCommand, SupplierId, UpdateSupplier,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_supplier).get(list_suppliers))
        .route(
            "/:id",
            get(get_supplier)
                .patch(update_supplier)
                .delete(delete_supplier),
        )
        .route("/:id/status", post(set_supplier_status))
}

fn parse_id(id: &str) -> Result<SupplierId, axum::response::Response> {
    id.parse::<AggregateId>().map(SupplierId::new).map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid supplier id")
    })
}

pub async fn register_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterSupplierRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();
    let supplier_id = SupplierId::new(agg);

    let cmd = SupplierCommand::RegisterSupplier(RegisterSupplier {
        supplier_id,
        name: body.name,
        contact: body.contact,
        payment_terms: body.payment_terms,
        lead_time_days: body.lead_time_days,
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch_supplier(supplier_id, cmd) {
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

pub async fn list_suppliers(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    (StatusCode::OK, Json(services.supplier_list())).into_response()
}

pub async fn get_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let supplier_id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.supplier_get(&supplier_id) {
        Some(rm) => (StatusCode::OK, Json(rm)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "supplier not found"),
    }
}

pub async fn update_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateSupplierRequest>,
) -> axum::response::Response {
    let supplier_id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = SupplierCommand::UpdateSupplier(UpdateSupplier {
        supplier_id,
        name: body.name,
        contact: body.contact,
        payment_terms: body.payment_terms,
        lead_time_days: body.lead_time_days,
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch_supplier(supplier_id, cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": supplier_id.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn set_supplier_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetSupplierStatusRequest>,
) -> axum::response::Response {
    let supplier_id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = SupplierCommand::SetSupplierStatus(SetSupplierStatus {
        supplier_id,
        status: body.status,
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch_supplier(supplier_id, cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": supplier_id.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn delete_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let supplier_id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.delete_supplier(supplier_id) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
