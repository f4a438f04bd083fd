//! Bottling, bulk exit, pomace and material HTTP handlers

use axum::{extract::State, http::StatusCode, Extension, Json};

use shared::models::{AuxiliaryMaterial, BottlingFormat, BottlingLot, BulkExit, PomaceExit};
use shared::types::SessionContext;

use crate::error::AppResult;
use crate::services::outflow::{BottlingRequest, BulkExitRequest, PomaceExitRequest};
use crate::services::OutflowService;
use crate::AppState;

fn outflows(state: &AppState) -> OutflowService {
    OutflowService::new(state.repo.clone(), state.config.mill.clone())
}

pub async fn list_bottling_lots(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> AppResult<Json<Vec<BottlingLot>>> {
    Ok(Json(outflows(&state).list_bottling_lots(&ctx).await?))
}

/// Submit a bottling order
pub async fn create_bottling_lot(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(request): Json<BottlingRequest>,
) -> AppResult<(StatusCode, Json<BottlingLot>)> {
    let lot = outflows(&state).bottle(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(lot)))
}

pub async fn list_bulk_exits(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> AppResult<Json<Vec<BulkExit>>> {
    Ok(Json(outflows(&state).list_bulk_exits(&ctx).await?))
}

pub async fn create_bulk_exit(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(request): Json<BulkExitRequest>,
) -> AppResult<(StatusCode, Json<BulkExit>)> {
    let exit = outflows(&state).bulk_exit(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(exit)))
}

pub async fn list_pomace_exits(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> AppResult<Json<Vec<PomaceExit>>> {
    Ok(Json(outflows(&state).list_pomace_exits(&ctx).await?))
}

pub async fn create_pomace_exit(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(request): Json<PomaceExitRequest>,
) -> AppResult<(StatusCode, Json<PomaceExit>)> {
    let exit = outflows(&state).pomace_exit(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(exit)))
}

pub async fn list_materials(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> AppResult<Json<Vec<AuxiliaryMaterial>>> {
    Ok(Json(outflows(&state).list_materials(&ctx).await?))
}

pub async fn save_material(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(material): Json<AuxiliaryMaterial>,
) -> AppResult<Json<AuxiliaryMaterial>> {
    Ok(Json(outflows(&state).upsert_material(&ctx, material).await?))
}

pub async fn low_stock_materials(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> AppResult<Json<Vec<AuxiliaryMaterial>>> {
    Ok(Json(outflows(&state).low_stock(&ctx).await?))
}

pub async fn list_formats(State(state): State<AppState>) -> Json<Vec<BottlingFormat>> {
    Json(outflows(&state).formats())
}
