//! Offline queue handlers

use axum::{extract::State, http::StatusCode, Extension, Json};

use shared::types::SessionContext;

use crate::services::sync::{FlushReport, SyncStatus};
use crate::AppState;

/// Writes of this tenant still waiting for the store
pub async fn sync_status(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> Json<SyncStatus> {
    Json(state.repo.queue().status(ctx.tenant_id).await)
}

/// Retry the queue now instead of waiting for the background task.
///
/// Rejected write sets are listed in the report and answered with 207.
pub async fn flush_queue(State(state): State<AppState>) -> (StatusCode, Json<FlushReport>) {
    let report = state.repo.flush_queue().await;
    tracing::info!(
        applied = report.applied,
        requeued = report.requeued,
        rejected = report.rejected.len(),
        "Sync queue flushed on request"
    );
    let status = if report.has_rejections() {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::OK
    };
    (status, Json(report))
}
