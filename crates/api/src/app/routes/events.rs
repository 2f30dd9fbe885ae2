use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use glowdesk_core::AggregateId;
use glowdesk_infra::event_store::{EventFilter, Pagination};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", get(query_events))
}

/// Audit inspection: page through stored events, newest first.
pub async fn query_events(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::EventQueryParams>,
) -> axum::response::Response {
    let aggregate_id = match params.aggregate_id {
        None => None,
        Some(raw) => match raw.parse::<AggregateId>() {
            Ok(v) => Some(v),
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid aggregate id",
                );
            }
        },
    };

    let filter = EventFilter {
        aggregate_id,
        aggregate_type: params.aggregate_type,
        event_type: params.event_type,
        occurred_after: None,
        occurred_before: None,
    };
    let pagination = Pagination::new(params.limit, params.offset);

    match services.query_events(filter, pagination).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e:?}"),
        ),
    }
}
