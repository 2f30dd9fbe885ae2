use axum::{
    Router,
    routing::{get, post},
};

pub mod alerts;
pub mod events;
pub mod inventory;
pub mod purchases;
pub mod stocktakes;
pub mod suppliers;
pub mod system;

/// Router for all domain endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/stream", get(system::stream))
        .nest("/inventory", inventory::router())
        .nest("/alerts", alerts::router())
        .nest("/suppliers", suppliers::router())
        .nest("/purchases", purchases::router())
        .nest("/stocktakes", stocktakes::router())
        .nest("/events", events::router())
        // Nested routers only match their collection root without a trailing
        // slash (e.g. `/suppliers`); register the trailing-slash form too so
        // both `/suppliers` and `/suppliers/` resolve to the same handlers.
        .route(
            "/suppliers/",
            post(suppliers::register_supplier).get(suppliers::list_suppliers),
        )
        .route(
            "/stocktakes/",
            post(stocktakes::start_stocktake).get(stocktakes::list_stocktakes),
        )
}
