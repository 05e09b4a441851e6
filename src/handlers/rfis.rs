use axum::{extract::State, http::HeaderMap, Extension, Json};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::core::access::{require_project_access, Identity};
use crate::error::ApiError;
use crate::store::entities::{from_record, to_record, Rfi};
use crate::store::{find_by_id, EntityKind, EntityStore, Filter, Record};

use super::{client_ip, success};

#[derive(Debug, Deserialize)]
pub struct RfiListRequest {
    pub project_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RfiCreateRequest {
    pub project_id: String,
    pub subject: String,
    pub question: String,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct RfiUpdateRequest {
    pub rfi_id: String,
    pub answer: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct RfiDeleteRequest {
    pub rfi_id: String,
}

async fn fetch_rfi(store: &dyn EntityStore, rfi_id: &str) -> Result<Rfi, ApiError> {
    let record = find_by_id(store, EntityKind::Rfi, rfi_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("RFI {} not found", rfi_id)))?;
    Ok(from_record(EntityKind::Rfi, record)?)
}

/// POST /api/rfis/list
pub async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<RfiListRequest>,
) -> Result<Json<Value>, ApiError> {
    require_project_access(state.store.as_ref(), &identity, &req.project_id).await?;

    let records = state
        .store
        .filter(EntityKind::Rfi, &Filter::new().eq("project_id", req.project_id))
        .await?;
    let rfis = records
        .into_iter()
        .map(|record| from_record::<Rfi>(EntityKind::Rfi, record))
        .collect::<Result<Vec<_>, _>>()?;

    success(rfis)
}

/// POST /api/rfis/create
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Json(req): Json<RfiCreateRequest>,
) -> Result<Json<Value>, ApiError> {
    require_project_access(state.store.as_ref(), &identity, &req.project_id).await?;

    if req.subject.trim().is_empty() || req.question.trim().is_empty() {
        return Err(ApiError::validation("subject and question are required"));
    }

    let rfi = Rfi {
        id: Uuid::new_v4().to_string(),
        project_id: req.project_id,
        subject: req.subject,
        question: req.question,
        answer: None,
        status: "open".to_string(),
        due_date: req.due_date,
        created_at: Utc::now(),
    };

    let created = state
        .store
        .create(EntityKind::Rfi, to_record(EntityKind::Rfi, &rfi)?)
        .await?;
    let rfi: Rfi = from_record(EntityKind::Rfi, created)?;

    state
        .audit
        .record(
            "rfi.create",
            &identity,
            json!({"project_id": rfi.project_id, "rfi_id": rfi.id}),
            client_ip(&headers),
        )
        .await;

    success(rfi)
}

/// POST /api/rfis/update - answering an open RFI moves it to answered
/// unless the caller sets the status explicitly.
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Json(req): Json<RfiUpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    let rfi = fetch_rfi(state.store.as_ref(), &req.rfi_id).await?;
    require_project_access(state.store.as_ref(), &identity, &rfi.project_id).await?;

    let mut patch = Record::new();
    if let Some(answer) = req.answer {
        if answer.trim().is_empty() {
            return Err(ApiError::validation("answer must not be empty"));
        }
        patch.insert("answer".to_string(), Value::String(answer));
        if req.status.is_none() {
            patch.insert("status".to_string(), Value::String("answered".to_string()));
        }
    }
    if let Some(status) = req.status {
        patch.insert("status".to_string(), Value::String(status));
    }
    if let Some(date) = req.due_date {
        patch.insert("due_date".to_string(), json!(date));
    }
    if patch.is_empty() {
        return Err(ApiError::validation("no fields to update"));
    }

    let updated = state.store.update(EntityKind::Rfi, &req.rfi_id, patch).await?;
    let updated: Rfi = from_record(EntityKind::Rfi, updated)?;

    state
        .audit
        .record(
            "rfi.update",
            &identity,
            json!({"project_id": updated.project_id, "rfi_id": updated.id}),
            client_ip(&headers),
        )
        .await;

    success(updated)
}

/// POST /api/rfis/delete
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Json(req): Json<RfiDeleteRequest>,
) -> Result<Json<Value>, ApiError> {
    let rfi = fetch_rfi(state.store.as_ref(), &req.rfi_id).await?;
    require_project_access(state.store.as_ref(), &identity, &rfi.project_id).await?;

    state.store.delete(EntityKind::Rfi, &req.rfi_id).await?;

    state
        .audit
        .record(
            "rfi.delete",
            &identity,
            json!({"project_id": rfi.project_id, "rfi_id": req.rfi_id}),
            client_ip(&headers),
        )
        .await;

    success(json!({"rfi_id": req.rfi_id, "deleted": true}))
}
