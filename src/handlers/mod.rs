//! HTTP handlers. Uniformly POST with JSON bodies; every project-scoped
//! mutation routes through the access guard before touching the store,
//! and privileged mutations append to the audit trail on the way out.

pub mod auth;
pub mod documents;
pub mod financials;
pub mod integrations;
pub mod integrity;
pub mod notifications;
pub mod projects;
pub mod rfis;
pub mod tasks;

use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::core::access::Identity;
use crate::error::ApiError;

/// Admin gate for endpoints outside any single project's scope.
pub(crate) fn require_admin(identity: &Identity) -> Result<(), ApiError> {
    if !identity.is_admin() {
        return Err(ApiError::forbidden("administrator access required"));
    }
    Ok(())
}

/// Wrap handler output in the success envelope.
pub(crate) fn success<T: Serialize>(data: T) -> Result<Json<Value>, ApiError> {
    let data = serde_json::to_value(data).map_err(|e| {
        tracing::error!("failed to serialize response data: {}", e);
        ApiError::internal("Failed to format response")
    })?;
    Ok(Json(json!({ "success": true, "data": data })))
}

/// Best-effort client address for the audit trail, from proxy headers.
pub(crate) fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        })
}

/// Reject out-of-domain percent-complete values at the boundary.
pub(crate) fn validate_percent(value: f64) -> Result<(), ApiError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ApiError::validation(
            "percent_complete must be between 0 and 100",
        ));
    }
    Ok(())
}
