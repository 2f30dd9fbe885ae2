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
use glowdesk_inventory::ItemId;
use glowdesk_stocktake::{CancelStocktake, RecordCount, StocktakeCommand, StocktakeId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(start_stocktake).get(list_stocktakes))
        .route("/:id", get(get_stocktake))
        .route("/:id/counts", post(record_count))
        .route("/:id/complete", post(complete_stocktake))
        .route("/:id/cancel", post(cancel_stocktake))
}

fn parse_stocktake_id(id: &str) -> Result<StocktakeId, axum::response::Response> {
    id.parse::<AggregateId>().map(StocktakeId::new).map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid stocktake id")
    })
}

pub async fn start_stocktake(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::StartStocktakeRequest>,
) -> axum::response::Response {
    let item_scope = match body.item_ids {
        None => None,
        Some(raw_ids) => {
            let mut ids = Vec::with_capacity(raw_ids.len());
            for raw in raw_ids {
                match raw.parse::<AggregateId>() {
                    Ok(v) => ids.push(ItemId::new(v)),
                    Err(_) => {
                        return errors::json_error(
                            StatusCode::BAD_REQUEST,
                            "invalid_id",
                            "invalid item id in scope",
                        );
                    }
                }
            }
            Some(ids)
        }
    };

    let agg = AggregateId::new();
    let stocktake_id = StocktakeId::new(agg);

    match services.start_stocktake(
        stocktake_id,
        body.name,
        item_scope,
        body.performed_by,
        body.performed_by_name,
    ) {
        Ok(committed) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "id": agg.to_string(),
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_stocktakes(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    (StatusCode::OK, Json(services.stocktake_list())).into_response()
}

pub async fn get_stocktake(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let stocktake_id = match parse_stocktake_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.stocktake_get(&stocktake_id) {
        Some(rm) => (StatusCode::OK, Json(rm)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "stocktake not found"),
    }
}

pub async fn record_count(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordCountRequest>,
) -> axum::response::Response {
    let stocktake_id = match parse_stocktake_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let item_id = match body.item_id.parse::<AggregateId>() {
        Ok(v) => ItemId::new(v),
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id");
        }
    };

    let cmd = StocktakeCommand::RecordCount(RecordCount {
        stocktake_id,
        item_id,
        counted_quantity: body.counted_quantity,
        performed_by: body.performed_by,
        performed_by_name: body.performed_by_name,
        occurred_at: Utc::now(),
    });

    match services.dispatch_stocktake(stocktake_id, cmd) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": stocktake_id.to_string(),
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn complete_stocktake(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::CompleteStocktakeRequest>,
) -> axum::response::Response {
    let stocktake_id = match parse_stocktake_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.complete_stocktake(stocktake_id, body.performed_by, body.performed_by_name) {
        Ok(outcome) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": stocktake_id.to_string(),
                "corrections": outcome.corrections,
                "applied": outcome.applied,
                "skipped": outcome.skipped,
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn cancel_stocktake(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let stocktake_id = match parse_stocktake_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = StocktakeCommand::CancelStocktake(CancelStocktake {
        stocktake_id,
        occurred_at: Utc::now(),
    });

    match services.dispatch_stocktake(stocktake_id, cmd) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": stocktake_id.to_string(),
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
