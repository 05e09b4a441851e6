use axum::{extract::State, Extension, Json};
use serde_json::Value;

use crate::app::AppState;
use crate::core::access::Identity;
use crate::core::integrity::run_integrity_check;
use crate::error::ApiError;

use super::{require_admin, success};

/// POST /api/admin/integrity-check - on-demand full-store diagnostic.
/// Read-only, exhaustive, and potentially slow; admin only.
pub async fn check(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&identity)?;

    let report = run_integrity_check(state.store.as_ref()).await?;
    success(report)
}
