use axum::{extract::State, Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::config;
use crate::core::access::Identity;
use crate::error::ApiError;
use crate::store::entities::{from_record, to_record, PushSubscription};
use crate::store::{EntityKind, EntityStore};

use super::success;

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

/// POST /api/notifications/public-key - public route. Only the
/// designated public key is ever exposed; the private key stays in
/// config.
pub async fn public_key() -> Result<Json<Value>, ApiError> {
    match &config::config().push.vapid_public_key {
        Some(key) => success(json!({ "public_key": key })),
        None => Err(ApiError::not_found("push notifications are not configured")),
    }
}

/// POST /api/notifications/subscribe - register the caller's push
/// subscription.
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.endpoint.trim().is_empty() || req.p256dh.trim().is_empty() || req.auth.trim().is_empty()
    {
        return Err(ApiError::validation(
            "endpoint, p256dh and auth are required",
        ));
    }

    let subscription = PushSubscription {
        id: Uuid::new_v4().to_string(),
        user_email: identity.email.clone(),
        endpoint: req.endpoint,
        p256dh: req.p256dh,
        auth: req.auth,
        created_at: Utc::now(),
    };

    let created = state
        .store
        .create(
            EntityKind::PushSubscription,
            to_record(EntityKind::PushSubscription, &subscription)?,
        )
        .await?;
    let subscription: PushSubscription = from_record(EntityKind::PushSubscription, created)?;

    success(subscription)
}
