use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::config;
use crate::core::access::Identity;
use crate::error::ApiError;

use super::success;

/// POST /api/integrations/status - which optional providers are
/// configured. Reports booleans only; key material never leaves the
/// process.
pub async fn status(Extension(_identity): Extension<Identity>) -> Result<Json<Value>, ApiError> {
    let integrations = &config::config().integrations;

    success(json!({
        "chat": integrations.chat_webhook_url.is_some(),
        "accounting": integrations.accounting_api_key.is_some(),
        "weather": integrations.weather_api_key.is_some(),
        "llm": integrations.llm_api_key.is_some(),
    }))
}
