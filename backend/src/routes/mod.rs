//! Route definitions for the olive mill API

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::session_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    let tenant_routes = Router::new()
        .nest("/deliveries", delivery_routes())
        .nest("/hoppers", hopper_routes())
        .nest("/milling-lots", milling_lot_routes())
        .nest("/production-batches", production_routes())
        .nest("/tanks", tank_routes())
        .merge(outflow_routes())
        .nest("/sync", sync_routes())
        .route_layer(middleware::from_fn(session_middleware));

    Router::new()
        // Health check (no tenant)
        .route("/health", get(handlers::health_check))
        .route("/bottling-formats", get(handlers::list_formats))
        .merge(tenant_routes)
}

/// Grower deliveries
fn delivery_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_deliveries).post(handlers::create_delivery),
        )
        .route("/:id", get(handlers::get_delivery))
        .route("/:id/lab", post(handlers::update_lab))
        .route("/:id/trace", get(handlers::trace_delivery))
}

fn hopper_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_hoppers))
        .route("/:id", get(handlers::get_hopper))
        .route("/:id/start-milling", post(handlers::start_milling))
}

/// Lot ids are passed as `?id=` because they contain slashes
fn milling_lot_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_milling_lots))
        .route("/trace", get(handlers::trace_milling_lot))
}

fn production_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_batches).post(handlers::close_batch))
        .route("/identity", get(handlers::resolve_identity))
        .route("/preview", post(handlers::preview_closure))
        .route("/detail", get(handlers::get_batch))
}

fn tank_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_tanks).post(handlers::create_tank))
        .route("/:id", get(handlers::get_tank))
        .route("/:id/movements", get(handlers::list_movements))
        .route("/:id/cycles", get(handlers::list_cycles))
        .route("/:id/fill", post(handlers::fill_tank))
        .route("/:id/transfer", post(handlers::transfer_oil))
        .route("/:id/close", post(handlers::close_tank))
        .route("/:id/reset", post(handlers::reset_tank))
        .route("/:id/trace", get(handlers::trace_tank))
}

/// Bottling, bulk and pomace exits, packaging materials
fn outflow_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/bottling",
            get(handlers::list_bottling_lots).post(handlers::create_bottling_lot),
        )
        .route(
            "/bulk-exits",
            get(handlers::list_bulk_exits).post(handlers::create_bulk_exit),
        )
        .route(
            "/pomace-exits",
            get(handlers::list_pomace_exits).post(handlers::create_pomace_exit),
        )
        .route(
            "/materials",
            get(handlers::list_materials).post(handlers::save_material),
        )
        .route("/materials/low-stock", get(handlers::low_stock_materials))
}

fn sync_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(handlers::sync_status))
        .route("/flush", post(handlers::flush_queue))
}
