use axum::{extract::State, http::HeaderMap, Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::core::access::{require_project_access, Identity};
use crate::error::ApiError;
use crate::store::entities::{from_record, to_record, Document, DocumentLink};
use crate::store::{find_by_id, EntityKind, EntityStore, Filter};

use super::{client_ip, success};

#[derive(Debug, Deserialize)]
pub struct DocumentListRequest {
    pub project_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DocumentCreateRequest {
    pub project_id: String,
    pub title: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentDeleteRequest {
    pub document_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DocumentLinkRequest {
    pub document_id: String,
    /// "tasks" or "rfis"
    pub target_kind: String,
    pub target_id: String,
}

async fn fetch_document(store: &dyn EntityStore, document_id: &str) -> Result<Document, ApiError> {
    let record = find_by_id(store, EntityKind::Document, document_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("document {} not found", document_id)))?;
    Ok(from_record(EntityKind::Document, record)?)
}

/// POST /api/documents/list
pub async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<DocumentListRequest>,
) -> Result<Json<Value>, ApiError> {
    require_project_access(state.store.as_ref(), &identity, &req.project_id).await?;

    let records = state
        .store
        .filter(
            EntityKind::Document,
            &Filter::new().eq("project_id", req.project_id),
        )
        .await?;
    let documents = records
        .into_iter()
        .map(|record| from_record::<Document>(EntityKind::Document, record))
        .collect::<Result<Vec<_>, _>>()?;

    success(documents)
}

/// POST /api/documents/create
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Json(req): Json<DocumentCreateRequest>,
) -> Result<Json<Value>, ApiError> {
    require_project_access(state.store.as_ref(), &identity, &req.project_id).await?;

    if req.title.trim().is_empty() {
        return Err(ApiError::validation("title is required"));
    }

    let document = Document {
        id: Uuid::new_v4().to_string(),
        project_id: req.project_id,
        title: req.title,
        url: req.url,
        created_at: Utc::now(),
    };

    let created = state
        .store
        .create(EntityKind::Document, to_record(EntityKind::Document, &document)?)
        .await?;
    let document: Document = from_record(EntityKind::Document, created)?;

    state
        .audit
        .record(
            "document.create",
            &identity,
            json!({"project_id": document.project_id, "document_id": document.id}),
            client_ip(&headers),
        )
        .await;

    success(document)
}

/// POST /api/documents/delete
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Json(req): Json<DocumentDeleteRequest>,
) -> Result<Json<Value>, ApiError> {
    let document = fetch_document(state.store.as_ref(), &req.document_id).await?;
    require_project_access(state.store.as_ref(), &identity, &document.project_id).await?;

    state
        .store
        .delete(EntityKind::Document, &req.document_id)
        .await?;

    state
        .audit
        .record(
            "document.delete",
            &identity,
            json!({"project_id": document.project_id, "document_id": req.document_id}),
            client_ip(&headers),
        )
        .await;

    success(json!({"document_id": req.document_id, "deleted": true}))
}

/// POST /api/documents/link - attach a document to a task or RFI in the
/// same project.
pub async fn link(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Json(req): Json<DocumentLinkRequest>,
) -> Result<Json<Value>, ApiError> {
    let document = fetch_document(state.store.as_ref(), &req.document_id).await?;
    require_project_access(state.store.as_ref(), &identity, &document.project_id).await?;

    let target_kind = match req.target_kind.as_str() {
        "tasks" => EntityKind::Task,
        "rfis" => EntityKind::Rfi,
        _ => {
            return Err(ApiError::validation(
                "target_kind must be \"tasks\" or \"rfis\"",
            ))
        }
    };

    let target = find_by_id(state.store.as_ref(), target_kind, &req.target_id)
        .await?
        .ok_or_else(|| {
            ApiError::not_found(format!("{} {} not found", target_kind, req.target_id))
        })?;
    let target_project = target.get("project_id").and_then(Value::as_str);
    if target_project != Some(document.project_id.as_str()) {
        return Err(ApiError::validation(
            "document and link target must belong to the same project",
        ));
    }

    let link = DocumentLink {
        id: Uuid::new_v4().to_string(),
        project_id: document.project_id.clone(),
        document_id: req.document_id,
        target_kind: req.target_kind,
        target_id: req.target_id,
        created_at: Utc::now(),
    };

    let created = state
        .store
        .create(
            EntityKind::DocumentLink,
            to_record(EntityKind::DocumentLink, &link)?,
        )
        .await?;
    let link: DocumentLink = from_record(EntityKind::DocumentLink, created)?;

    state
        .audit
        .record(
            "document.link",
            &identity,
            json!({
                "project_id": link.project_id,
                "document_id": link.document_id,
                "target_kind": link.target_kind,
                "target_id": link.target_id,
            }),
            client_ip(&headers),
        )
        .await;

    success(link)
}
