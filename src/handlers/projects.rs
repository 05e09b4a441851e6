use axum::{extract::State, http::HeaderMap, Extension, Json};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::core::access::{evaluate, require_project_access, AccessDecision, Identity, RoleTier};
use crate::core::cascade::cascade_delete;
use crate::error::ApiError;
use crate::store::entities::{from_record, to_record, Project};
use crate::store::{EntityKind, EntityStore};

use super::{client_ip, require_admin, success};

#[derive(Debug, Deserialize)]
pub struct ProjectCreateRequest {
    pub name: String,
    pub project_manager: String,
    pub superintendent: String,
    #[serde(default)]
    pub assigned_users: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectIdRequest {
    pub project_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectUpdateRequest {
    pub project_id: String,
    pub name: Option<String>,
    pub project_manager: Option<String>,
    pub superintendent: Option<String>,
    pub assigned_users: Option<Vec<String>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// POST /api/projects/create - admin only
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Json(req): Json<ProjectCreateRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&identity)?;

    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    if req.project_manager.trim().is_empty() || req.superintendent.trim().is_empty() {
        return Err(ApiError::validation(
            "project_manager and superintendent are required",
        ));
    }
    validate_date_pair(req.start_date, req.end_date)?;

    let project = Project {
        id: Uuid::new_v4().to_string(),
        name: req.name,
        project_manager: req.project_manager,
        superintendent: req.superintendent,
        assigned_users: req.assigned_users,
        start_date: req.start_date,
        end_date: req.end_date,
        created_at: Utc::now(),
    };

    let created = state
        .store
        .create(EntityKind::Project, to_record(EntityKind::Project, &project)?)
        .await?;
    let project: Project = from_record(EntityKind::Project, created)?;

    state
        .audit
        .record(
            "project.create",
            &identity,
            json!({"project_id": project.id, "name": project.name}),
            client_ip(&headers),
        )
        .await;

    success(project)
}

/// POST /api/projects/list - projects visible to the caller
pub async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Value>, ApiError> {
    let records = state.store.list(EntityKind::Project, Some("name")).await?;

    let mut projects = Vec::new();
    for record in records {
        let project: Project = from_record(EntityKind::Project, record)?;
        if matches!(evaluate(&identity, &project), AccessDecision::Allow(_)) {
            projects.push(project);
        }
    }

    success(projects)
}

/// POST /api/projects/get
pub async fn get(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ProjectIdRequest>,
) -> Result<Json<Value>, ApiError> {
    let (project, _) =
        require_project_access(state.store.as_ref(), &identity, &req.project_id).await?;
    success(project)
}

/// POST /api/projects/update - admin or manager tier
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Json(req): Json<ProjectUpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    let (project, tier) =
        require_project_access(state.store.as_ref(), &identity, &req.project_id).await?;
    if tier == RoleTier::Member {
        return Err(ApiError::forbidden(
            "only administrators and project managers can update a project",
        ));
    }

    let start = req.start_date.or(project.start_date);
    let end = req.end_date.or(project.end_date);
    validate_date_pair(start, end)?;

    let mut patch = crate::store::Record::new();
    let mut changed = Vec::new();
    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(ApiError::validation("name must not be empty"));
        }
        patch.insert("name".to_string(), Value::String(name));
        changed.push("name");
    }
    if let Some(pm) = req.project_manager {
        patch.insert("project_manager".to_string(), Value::String(pm));
        changed.push("project_manager");
    }
    if let Some(supe) = req.superintendent {
        patch.insert("superintendent".to_string(), Value::String(supe));
        changed.push("superintendent");
    }
    if let Some(users) = req.assigned_users {
        patch.insert("assigned_users".to_string(), json!(users));
        changed.push("assigned_users");
    }
    if let Some(date) = req.start_date {
        patch.insert("start_date".to_string(), json!(date));
        changed.push("start_date");
    }
    if let Some(date) = req.end_date {
        patch.insert("end_date".to_string(), json!(date));
        changed.push("end_date");
    }

    if changed.is_empty() {
        return Err(ApiError::validation("no fields to update"));
    }

    let updated = state
        .store
        .update(EntityKind::Project, &req.project_id, patch)
        .await?;
    let updated: Project = from_record(EntityKind::Project, updated)?;

    state
        .audit
        .record(
            "project.update",
            &identity,
            json!({"project_id": req.project_id, "fields": changed}),
            client_ip(&headers),
        )
        .await;

    success(updated)
}

/// POST /api/projects/delete - admin only; cascades through every
/// dependent collection and reports what happened, partial failures
/// included.
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Json(req): Json<ProjectIdRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&identity)?;

    let report = cascade_delete(state.store.as_ref(), &req.project_id).await;

    state
        .audit
        .record(
            "project.delete",
            &identity,
            json!({
                "project_id": req.project_id,
                "deleted": report.deleted,
                "failures": report.errors.len(),
            }),
            client_ip(&headers),
        )
        .await;

    let mut body = json!({
        "success": true,
        "data": {
            "deleted": report.deleted,
            "errors": report.errors,
            "total_deleted": report.total_deleted(),
        }
    });
    if !report.is_clean() {
        body["warning"] = Value::String("cascade completed with partial failures".to_string());
    }
    Ok(Json(body))
}

fn validate_date_pair(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<(), ApiError> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(ApiError::validation("start_date must not be after end_date"));
        }
    }
    Ok(())
}
