use axum::{Extension, Json};
use serde_json::Value;

use crate::core::access::Identity;
use crate::error::ApiError;

use super::success;

/// POST /api/auth/whoami - echo the resolved identity
pub async fn whoami(Extension(identity): Extension<Identity>) -> Result<Json<Value>, ApiError> {
    success(identity)
}
