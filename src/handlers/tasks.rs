use axum::{extract::State, http::HeaderMap, Extension, Json};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::core::access::{require_project_access, Identity};
use crate::error::ApiError;
use crate::store::entities::{from_record, to_record, ScheduleAuditLog, Task};
use crate::store::{find_by_id, EntityKind, EntityStore, Filter, Record};

use super::{client_ip, success, validate_percent};

#[derive(Debug, Deserialize)]
pub struct TaskListRequest {
    pub project_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TaskCreateRequest {
    pub project_id: String,
    pub title: String,
    pub status: Option<String>,
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub percent_complete: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct TaskUpdateRequest {
    pub task_id: String,
    pub title: Option<String>,
    pub status: Option<String>,
    pub assigned_to: Option<String>,
    pub percent_complete: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct TaskDeleteRequest {
    pub task_id: String,
}

/// Resolve a task by client-supplied id. The caller is responsible for
/// guarding the owning project before mutating anything.
async fn fetch_task(store: &dyn EntityStore, task_id: &str) -> Result<Task, ApiError> {
    let record = find_by_id(store, EntityKind::Task, task_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("task {} not found", task_id)))?;
    Ok(from_record(EntityKind::Task, record)?)
}

/// POST /api/tasks/list
pub async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<TaskListRequest>,
) -> Result<Json<Value>, ApiError> {
    require_project_access(state.store.as_ref(), &identity, &req.project_id).await?;

    let records = state
        .store
        .filter(EntityKind::Task, &Filter::new().eq("project_id", req.project_id))
        .await?;
    let tasks = records
        .into_iter()
        .map(|record| from_record::<Task>(EntityKind::Task, record))
        .collect::<Result<Vec<_>, _>>()?;

    success(tasks)
}

/// POST /api/tasks/create
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Json(req): Json<TaskCreateRequest>,
) -> Result<Json<Value>, ApiError> {
    require_project_access(state.store.as_ref(), &identity, &req.project_id).await?;

    if req.title.trim().is_empty() {
        return Err(ApiError::validation("title is required"));
    }
    validate_percent(req.percent_complete)?;
    validate_date_pair(req.start_date, req.end_date)?;

    let task = Task {
        id: Uuid::new_v4().to_string(),
        project_id: req.project_id,
        title: req.title,
        status: req.status.unwrap_or_else(|| "open".to_string()),
        assigned_to: req.assigned_to,
        percent_complete: req.percent_complete,
        start_date: req.start_date,
        end_date: req.end_date,
        created_at: Utc::now(),
    };

    let created = state
        .store
        .create(EntityKind::Task, to_record(EntityKind::Task, &task)?)
        .await?;
    let task: Task = from_record(EntityKind::Task, created)?;

    state
        .audit
        .record(
            "task.create",
            &identity,
            json!({"project_id": task.project_id, "task_id": task.id}),
            client_ip(&headers),
        )
        .await;

    success(task)
}

/// POST /api/tasks/update - schedule-date changes are recorded in the
/// task's change history.
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Json(req): Json<TaskUpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    let task = fetch_task(state.store.as_ref(), &req.task_id).await?;
    require_project_access(state.store.as_ref(), &identity, &task.project_id).await?;

    if let Some(percent) = req.percent_complete {
        validate_percent(percent)?;
    }
    let start = req.start_date.or(task.start_date);
    let end = req.end_date.or(task.end_date);
    validate_date_pair(start, end)?;

    let mut patch = Record::new();
    if let Some(title) = req.title {
        if title.trim().is_empty() {
            return Err(ApiError::validation("title must not be empty"));
        }
        patch.insert("title".to_string(), Value::String(title));
    }
    if let Some(status) = req.status {
        patch.insert("status".to_string(), Value::String(status));
    }
    if let Some(assigned_to) = req.assigned_to {
        patch.insert("assigned_to".to_string(), Value::String(assigned_to));
    }
    if let Some(percent) = req.percent_complete {
        patch.insert("percent_complete".to_string(), json!(percent));
    }
    if let Some(date) = req.start_date {
        patch.insert("start_date".to_string(), json!(date));
    }
    if let Some(date) = req.end_date {
        patch.insert("end_date".to_string(), json!(date));
    }
    if patch.is_empty() {
        return Err(ApiError::validation("no fields to update"));
    }

    let updated = state
        .store
        .update(EntityKind::Task, &req.task_id, patch)
        .await?;
    let updated: Task = from_record(EntityKind::Task, updated)?;

    record_schedule_changes(&state, &identity, &task, &updated).await;

    state
        .audit
        .record(
            "task.update",
            &identity,
            json!({"project_id": updated.project_id, "task_id": updated.id}),
            client_ip(&headers),
        )
        .await;

    success(updated)
}

/// POST /api/tasks/delete
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Json(req): Json<TaskDeleteRequest>,
) -> Result<Json<Value>, ApiError> {
    let task = fetch_task(state.store.as_ref(), &req.task_id).await?;
    require_project_access(state.store.as_ref(), &identity, &task.project_id).await?;

    state.store.delete(EntityKind::Task, &req.task_id).await?;

    state
        .audit
        .record(
            "task.delete",
            &identity,
            json!({"project_id": task.project_id, "task_id": req.task_id}),
            client_ip(&headers),
        )
        .await;

    success(json!({"task_id": req.task_id, "deleted": true}))
}

/// Append one history entry per changed schedule date. History is
/// best-effort: a store failure here must not fail the update itself.
async fn record_schedule_changes(state: &AppState, identity: &Identity, before: &Task, after: &Task) {
    let changes = [
        ("start_date", before.start_date, after.start_date),
        ("end_date", before.end_date, after.end_date),
    ];

    for (field, old, new) in changes {
        if old == new {
            continue;
        }
        let entry = ScheduleAuditLog {
            id: Uuid::new_v4().to_string(),
            project_id: after.project_id.clone(),
            task_id: after.id.clone(),
            field: field.to_string(),
            old_value: old.map(|d| d.to_string()),
            new_value: new.map(|d| d.to_string()),
            changed_by: identity.email.clone(),
            changed_at: Utc::now(),
        };
        let record = match to_record(EntityKind::ScheduleAuditLog, &entry) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(task_id = %after.id, error = %e, "failed to serialize schedule history entry");
                continue;
            }
        };
        if let Err(e) = state.store.create(EntityKind::ScheduleAuditLog, record).await {
            tracing::warn!(task_id = %after.id, error = %e, "failed to append schedule history entry");
        }
    }
}

fn validate_date_pair(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<(), ApiError> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(ApiError::validation("start_date must not be after end_date"));
        }
    }
    Ok(())
}
