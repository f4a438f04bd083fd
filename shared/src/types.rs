//! Common types used across the platform

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant and operator on whose behalf an operation runs.
///
/// Passed explicitly into every operation instead of living in ambient state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionContext {
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
}

impl SessionContext {
    pub fn new(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// Operator answers to soft warnings, sent alongside a mutating request
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Confirmations {
    /// Accept a tank overflow
    #[serde(default)]
    pub overflow: bool,
    /// Accept blending different varieties
    #[serde(default)]
    pub mixing: bool,
}

/// Date range for queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: chrono::NaiveDate,
    pub end: chrono::NaiveDate,
}
