//! Production batch (tanda) HTTP handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use shared::closure::{ClosurePlan, ClosureRequest, IdentityResolution};
use shared::models::ProductionBatch;
use shared::types::SessionContext;

use crate::error::AppResult;
use crate::services::production::{BatchDetail, ClosureOutcome};
use crate::services::ProductionService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct BatchIdQuery {
    pub id: String,
}

fn production(state: &AppState) -> ProductionService {
    ProductionService::new(state.repo.clone(), state.config.mill.clone())
}

pub async fn list_batches(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> AppResult<Json<Vec<ProductionBatch>>> {
    Ok(Json(production(&state).list_batches(&ctx).await?))
}

pub async fn get_batch(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Query(query): Query<BatchIdQuery>,
) -> AppResult<Json<BatchDetail>> {
    Ok(Json(production(&state).get_batch(&ctx, &query.id).await?))
}

/// Whether a closure on this date would collide with an existing batch
pub async fn resolve_identity(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Query(query): Query<DateQuery>,
) -> AppResult<Json<IdentityResolution>> {
    Ok(Json(production(&state).resolve_identity(&ctx, query.date).await?))
}

pub async fn preview_closure(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(request): Json<ClosureRequest>,
) -> AppResult<Json<ClosurePlan>> {
    Ok(Json(production(&state).preview(&ctx, &request).await?))
}

/// Close milling lots into a production batch and fill the target tank
pub async fn close_batch(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(request): Json<ClosureRequest>,
) -> AppResult<(StatusCode, Json<ClosureOutcome>)> {
    let outcome = production(&state).close(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
