//! Error handling for the Olive Mill platform
//!
//! Provides consistent error responses in English and Spanish

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use shared::error::MillError;

use crate::store::StoreError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Domain errors and operator warnings from the engine
    #[error(transparent)]
    Mill(#[from] MillError),

    // Request errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_es: String,
    },

    #[error("Missing session context: {0}")]
    MissingContext(String),

    // Persistence errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Saved locally; {pending} writes waiting for the store")]
    SyncQueued { pending: usize },

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Request field to set when resubmitting to accept a soft warning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm_with: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message_en: String, message_es: String) -> Self {
        Self {
            code: code.to_string(),
            message_en,
            message_es,
            field: None,
            confirm_with: None,
        }
    }

    fn field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    fn confirm_with(mut self, flag: &str) -> Self {
        self.confirm_with = Some(flag.to_string());
        self
    }
}

fn mill_error_detail(err: &MillError) -> (StatusCode, ErrorDetail) {
    match err {
        MillError::Validation { field, message } => (
            StatusCode::BAD_REQUEST,
            ErrorDetail::new(
                "VALIDATION_ERROR",
                message.clone(),
                format!("Dato no válido: {}", message),
            )
            .field(field),
        ),
        MillError::CapacityExceeded {
            tank_id,
            requested_kg,
            available_kg,
        } => (
            StatusCode::CONFLICT,
            ErrorDetail::new(
                "CAPACITY_WARNING",
                format!(
                    "Tank {} has room for {} kg but {} kg were requested",
                    tank_id, available_kg, requested_kg
                ),
                format!(
                    "El depósito {} admite {} kg y se solicitan {} kg",
                    tank_id, available_kg, requested_kg
                ),
            )
            .field("tank_id")
            .confirm_with("confirmations.overflow"),
        ),
        MillError::VarietyMismatch {
            target,
            current,
            incoming,
        } => (
            StatusCode::CONFLICT,
            ErrorDetail::new(
                "CAPACITY_WARNING",
                format!("{} holds {}; incoming oil is {}", target, current, incoming),
                format!("{} contiene {}; la entrada es {}", target, current, incoming),
            )
            .field("variety")
            .confirm_with("confirmations.mixing"),
        ),
        MillError::BatchExists { existing_id } => (
            StatusCode::CONFLICT,
            ErrorDetail::new(
                "CONFLICT_WARNING",
                format!(
                    "Production batch {} already exists; choose merge or new series",
                    existing_id
                ),
                format!(
                    "La tanda {} ya existe; elija unir o nueva serie",
                    existing_id
                ),
            )
            .field("production_date")
            .confirm_with("series_choice"),
        ),
        MillError::InsufficientStock {
            source_name,
            requested,
            available,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorDetail::new(
                "INSUFFICIENT_STOCK",
                format!(
                    "Not enough stock in {}: requested {}, available {}",
                    source_name, requested, available
                ),
                format!(
                    "Existencias insuficientes en {}: solicitado {}, disponible {}",
                    source_name, requested, available
                ),
            ),
        ),
        MillError::InvalidTransition(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorDetail::new(
                "INVALID_STATE_TRANSITION",
                msg.clone(),
                format!("Cambio de estado no permitido: {}", msg),
            ),
        ),
        MillError::NotFound(resource) => (
            StatusCode::NOT_FOUND,
            ErrorDetail::new(
                "NOT_FOUND",
                format!("{} not found", resource),
                format!("No se encontró {}", resource),
            ),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Mill(err) => mill_error_detail(err),
            AppError::Validation {
                field,
                message,
                message_es,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", message.clone(), message_es.clone())
                    .field(field),
            ),
            AppError::MissingContext(header) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new(
                    "MISSING_CONTEXT",
                    format!("Header {} is missing or malformed", header),
                    format!("Falta la cabecera {} o no es válida", header),
                )
                .field(header),
            ),
            AppError::Store(StoreError::Rejected(msg)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "STORE_REJECTED",
                    format!("The store rejected the record: {}", msg),
                    format!("El almacén rechazó el registro: {}", msg),
                ),
            ),
            AppError::Store(StoreError::Unavailable(_)) | AppError::Store(StoreError::Server(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail::new(
                    "STORE_UNAVAILABLE",
                    "The record store is temporarily unavailable".to_string(),
                    "El almacén de datos no está disponible temporalmente".to_string(),
                ),
            ),
            AppError::Store(StoreError::Serialization(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "STORE_ERROR",
                    "A stored record could not be read".to_string(),
                    "No se pudo leer un registro almacenado".to_string(),
                ),
            ),
            AppError::SyncQueued { pending } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail::new(
                    "SYNC_QUEUED",
                    format!(
                        "Saved locally; {} writes will be sent when the store is reachable",
                        pending
                    ),
                    format!(
                        "Guardado en local; {} escrituras se enviarán al recuperar la conexión",
                        pending
                    ),
                ),
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "CONFIGURATION_ERROR",
                    format!("Configuration error: {}", msg),
                    format!("Error de configuración: {}", msg),
                ),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    msg.clone(),
                    "Error interno del servidor".to_string(),
                ),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    "Error interno del servidor".to_string(),
                ),
            ),
        };

        match &self {
            AppError::Mill(err) if err.is_confirmable() => {
                tracing::debug!(code = %error_detail.code, "Awaiting operator confirmation: {}", self);
            }
            _ if status.is_server_error() => tracing::error!("Error: {:?}", self),
            _ => tracing::debug!("Request rejected: {}", self),
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_soft_warnings_are_conflicts_with_a_confirm_flag() {
        let warnings = [
            MillError::CapacityExceeded {
                tank_id: 1,
                requested_kg: Decimal::from(1500),
                available_kg: Decimal::from(1000),
            },
            MillError::VarietyMismatch {
                target: "tank D.01".to_string(),
                current: "Picual".to_string(),
                incoming: "Arbequina".to_string(),
            },
            MillError::BatchExists {
                existing_id: "LP-10/11/25".to_string(),
            },
        ];
        for warning in warnings {
            assert!(warning.is_confirmable());
            let (status, detail) = mill_error_detail(&warning);
            assert_eq!(status, StatusCode::CONFLICT);
            assert!(detail.confirm_with.is_some());
        }
    }

    #[test]
    fn test_hard_errors_carry_no_confirm_flag() {
        let errors = [
            MillError::validation("grower", "Grower is required"),
            MillError::NotFound("Tank 4".to_string()),
            MillError::InvalidTransition("Tank D.01 is Full".to_string()),
        ];
        for err in errors {
            assert!(!err.is_confirmable());
            let (status, detail) = mill_error_detail(&err);
            assert_ne!(status, StatusCode::CONFLICT);
            assert!(detail.confirm_with.is_none());
        }
    }
}
