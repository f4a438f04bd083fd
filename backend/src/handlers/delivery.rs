//! Delivery (vale) HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use shared::models::{Delivery, LabAnalysis};
use shared::traceability::DeliveryTrace;
use shared::types::SessionContext;

use crate::error::AppResult;
use crate::services::intake::NewDelivery;
use crate::services::{IntakeService, TraceabilityService};
use crate::AppState;

fn intake(state: &AppState) -> IntakeService {
    IntakeService::new(state.repo.clone(), state.config.mill.clone())
}

pub async fn list_deliveries(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> AppResult<Json<Vec<Delivery>>> {
    Ok(Json(intake(&state).list_deliveries(&ctx).await?))
}

pub async fn get_delivery(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<u64>,
) -> AppResult<Json<Delivery>> {
    Ok(Json(intake(&state).get_delivery(&ctx, id).await?))
}

/// Register a delivery at the weighbridge
pub async fn create_delivery(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(input): Json<NewDelivery>,
) -> AppResult<(StatusCode, Json<Delivery>)> {
    let delivery = intake(&state).register_delivery(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(delivery)))
}

pub async fn update_lab(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<u64>,
    Json(lab): Json<LabAnalysis>,
) -> AppResult<Json<Delivery>> {
    Ok(Json(intake(&state).update_lab(&ctx, id, lab).await?))
}

/// Forward trace of a delivery
pub async fn trace_delivery(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<u64>,
) -> AppResult<Json<DeliveryTrace>> {
    let service = TraceabilityService::new(state.repo.clone());
    Ok(Json(service.trace_delivery(&ctx, id).await?))
}
