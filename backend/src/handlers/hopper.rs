//! Hopper and milling lot HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use shared::hopper::HopperView;
use shared::models::MillingLot;
use shared::traceability::LotTrace;
use shared::types::SessionContext;

use crate::error::AppResult;
use crate::services::{HopperService, TraceabilityService};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StartMillingRequest {
    pub date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub struct LotFilter {
    #[serde(default)]
    pub open: bool,
}

#[derive(Debug, Deserialize)]
pub struct LotIdQuery {
    pub id: String,
}

fn hoppers(state: &AppState) -> HopperService {
    HopperService::new(state.repo.clone(), state.config.mill.clone())
}

pub async fn list_hoppers(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> AppResult<Json<Vec<HopperView>>> {
    Ok(Json(hoppers(&state).list_hoppers(&ctx).await?))
}

pub async fn get_hopper(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<u32>,
) -> AppResult<Json<HopperView>> {
    Ok(Json(hoppers(&state).get_hopper(&ctx, id).await?))
}

/// Open a milling lot from the hopper's active usage batch
pub async fn start_milling(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<u32>,
    Json(body): Json<StartMillingRequest>,
) -> AppResult<(StatusCode, Json<MillingLot>)> {
    let lot = hoppers(&state).start_milling(&ctx, id, body.date).await?;
    Ok((StatusCode::CREATED, Json(lot)))
}

pub async fn list_milling_lots(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Query(filter): Query<LotFilter>,
) -> AppResult<Json<Vec<MillingLot>>> {
    Ok(Json(hoppers(&state).list_milling_lots(&ctx, filter.open).await?))
}

/// Lot ids contain slashes, so they travel as a query parameter
pub async fn trace_milling_lot(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Query(query): Query<LotIdQuery>,
) -> AppResult<Json<LotTrace>> {
    let service = TraceabilityService::new(state.repo.clone());
    Ok(Json(service.trace_milling_lot(&ctx, &query.id).await?))
}
