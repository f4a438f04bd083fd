//! Session context middleware
//!
//! Resolves the tenant and operator of a request from its headers and hands
//! them to handlers as an explicit `SessionContext` extension.

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use shared::types::SessionContext;

use crate::error::AppError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";

/// Rejects requests without a valid `X-Tenant-Id`
pub async fn session_middleware(mut request: Request, next: Next) -> Response {
    let session = match session_from_headers(request.headers()) {
        Ok(session) => session,
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(session);
    next.run(request).await
}

fn session_from_headers(headers: &HeaderMap) -> Result<SessionContext, AppError> {
    let tenant_id = header_uuid(headers, TENANT_HEADER)
        .ok_or_else(|| AppError::MissingContext("X-Tenant-Id".to_string()))?;

    let session = SessionContext::new(tenant_id);
    match headers.get(USER_HEADER) {
        None => Ok(session),
        Some(_) => header_uuid(headers, USER_HEADER)
            .map(|user_id| session.with_user(user_id))
            .ok_or_else(|| AppError::MissingContext("X-User-Id".to_string())),
    }
}

fn header_uuid(headers: &HeaderMap, name: &str) -> Option<Uuid> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
}
