//! Tank HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;

use shared::models::{Tank, TankCycle, TankMovement};
use shared::types::SessionContext;

use crate::error::AppResult;
use crate::services::tank::{
    CloseRequest, FillRequest, NewTank, ResetRequest, TransferOutcome, TransferRequest,
};
use crate::services::{TankService, TraceabilityService};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TraceQuery {
    pub format: Option<String>,
}

fn tanks(state: &AppState) -> TankService {
    TankService::new(state.repo.clone())
}

pub async fn list_tanks(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> AppResult<Json<Vec<Tank>>> {
    Ok(Json(tanks(&state).list_tanks(&ctx).await?))
}

pub async fn get_tank(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<u32>,
) -> AppResult<Json<Tank>> {
    Ok(Json(tanks(&state).get_tank(&ctx, id).await?))
}

pub async fn create_tank(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(input): Json<NewTank>,
) -> AppResult<(StatusCode, Json<Tank>)> {
    let tank = tanks(&state).create_tank(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(tank)))
}

pub async fn fill_tank(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<u32>,
    Json(request): Json<FillRequest>,
) -> AppResult<Json<Tank>> {
    Ok(Json(tanks(&state).fill(&ctx, id, request).await?))
}

/// Trasiego from this tank into another
pub async fn transfer_oil(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<u32>,
    Json(request): Json<TransferRequest>,
) -> AppResult<Json<TransferOutcome>> {
    Ok(Json(tanks(&state).transfer(&ctx, id, request).await?))
}

pub async fn close_tank(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<u32>,
    body: Option<Json<CloseRequest>>,
) -> AppResult<Json<Tank>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(tanks(&state).close(&ctx, id, request).await?))
}

pub async fn reset_tank(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<u32>,
    Json(request): Json<ResetRequest>,
) -> AppResult<Json<TankCycle>> {
    Ok(Json(tanks(&state).reset(&ctx, id, request).await?))
}

pub async fn list_movements(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<u32>,
) -> AppResult<Json<Vec<TankMovement>>> {
    Ok(Json(tanks(&state).movements(&ctx, id).await?))
}

pub async fn list_cycles(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<u32>,
) -> AppResult<Json<Vec<TankCycle>>> {
    Ok(Json(tanks(&state).cycles(&ctx, id).await?))
}

/// Backward trace of a tank; `?format=csv` downloads the audit document
pub async fn trace_tank(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<u32>,
    Query(query): Query<TraceQuery>,
) -> AppResult<Response> {
    let service = TraceabilityService::new(state.repo.clone());

    if query.format.as_deref() == Some("csv") {
        let csv = service.export_tank_trace(&ctx, id).await?;
        let disposition = format!("attachment; filename=\"tank_{}_trace.csv\"", id);
        Ok((
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            csv,
        )
            .into_response())
    } else {
        Ok(Json(service.trace_tank(&ctx, id).await?).into_response())
    }
}
