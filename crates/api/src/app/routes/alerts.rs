use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use glowdesk_core::{AggregateId, DomainError};
use glowdesk_inventory::ItemId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/low-stock", get(list_low_stock))
        .route("/low-stock/:item_id/acknowledge", post(acknowledge))
}

pub async fn list_low_stock(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    (StatusCode::OK, Json(services.active_alerts())).into_response()
}

pub async fn acknowledge(
    Extension(services): Extension<Arc<AppServices>>,
    Path(item_id): Path<String>,
    Json(body): Json<dto::AcknowledgeAlertRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match item_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id");
        }
    };

    match services.acknowledge_alert(
        ItemId::new(agg),
        body.acknowledged_by,
        body.acknowledged_by_name,
    ) {
        Ok(alert) => (StatusCode::OK, Json(alert)).into_response(),
        Err(DomainError::NotFound) => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            "no active low-stock alert for this item",
        ),
        Err(e) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            e.to_string(),
        ),
    }
}
