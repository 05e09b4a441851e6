use axum::{extract::State, http::HeaderMap, Extension, Json};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::core::access::{require_project_access, Identity};
use crate::error::ApiError;
use crate::store::entities::{from_record, to_record, CostCode, FinancialLine};
use crate::store::{find_by_id, EntityKind, EntityStore, Filter};

use super::{client_ip, success, validate_percent};

#[derive(Debug, Deserialize)]
pub struct ProjectScopedListRequest {
    pub project_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LineCreateRequest {
    pub project_id: String,
    pub description: String,
    pub amount: Decimal,
    pub cost_code_id: Option<String>,
    #[serde(default)]
    pub percent_complete: f64,
}

#[derive(Debug, Deserialize)]
pub struct LineDeleteRequest {
    pub line_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CodeCreateRequest {
    pub project_id: String,
    pub code: String,
    pub description: Option<String>,
    pub budget: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CodeDeleteRequest {
    pub cost_code_id: String,
}

/// POST /api/financials/list
pub async fn lines_list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ProjectScopedListRequest>,
) -> Result<Json<Value>, ApiError> {
    require_project_access(state.store.as_ref(), &identity, &req.project_id).await?;

    let records = state
        .store
        .filter(
            EntityKind::FinancialLine,
            &Filter::new().eq("project_id", req.project_id),
        )
        .await?;
    let lines = records
        .into_iter()
        .map(|record| from_record::<FinancialLine>(EntityKind::FinancialLine, record))
        .collect::<Result<Vec<_>, _>>()?;

    success(lines)
}

/// POST /api/financials/create - amounts are signed; deductive change
/// orders are legitimate negative lines.
pub async fn line_create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Json(req): Json<LineCreateRequest>,
) -> Result<Json<Value>, ApiError> {
    require_project_access(state.store.as_ref(), &identity, &req.project_id).await?;

    if req.description.trim().is_empty() {
        return Err(ApiError::validation("description is required"));
    }
    validate_percent(req.percent_complete)?;

    if let Some(cost_code_id) = &req.cost_code_id {
        let code = fetch_cost_code(state.store.as_ref(), cost_code_id).await?;
        if code.project_id != req.project_id {
            return Err(ApiError::validation(
                "cost code does not belong to this project",
            ));
        }
    }

    let line = FinancialLine {
        id: Uuid::new_v4().to_string(),
        project_id: req.project_id,
        cost_code_id: req.cost_code_id,
        description: req.description,
        amount: req.amount,
        percent_complete: req.percent_complete,
        created_at: Utc::now(),
    };

    let created = state
        .store
        .create(
            EntityKind::FinancialLine,
            to_record(EntityKind::FinancialLine, &line)?,
        )
        .await?;
    let line: FinancialLine = from_record(EntityKind::FinancialLine, created)?;

    state
        .audit
        .record(
            "financial.create",
            &identity,
            json!({"project_id": line.project_id, "line_id": line.id, "amount": line.amount}),
            client_ip(&headers),
        )
        .await;

    success(line)
}

/// POST /api/financials/delete
pub async fn line_delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Json(req): Json<LineDeleteRequest>,
) -> Result<Json<Value>, ApiError> {
    let record = find_by_id(state.store.as_ref(), EntityKind::FinancialLine, &req.line_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("financial line {} not found", req.line_id)))?;
    let line: FinancialLine = from_record(EntityKind::FinancialLine, record)?;
    require_project_access(state.store.as_ref(), &identity, &line.project_id).await?;

    state
        .store
        .delete(EntityKind::FinancialLine, &req.line_id)
        .await?;

    state
        .audit
        .record(
            "financial.delete",
            &identity,
            json!({"project_id": line.project_id, "line_id": req.line_id}),
            client_ip(&headers),
        )
        .await;

    success(json!({"line_id": req.line_id, "deleted": true}))
}

/// POST /api/cost-codes/list
pub async fn codes_list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ProjectScopedListRequest>,
) -> Result<Json<Value>, ApiError> {
    require_project_access(state.store.as_ref(), &identity, &req.project_id).await?;

    let records = state
        .store
        .filter(
            EntityKind::CostCode,
            &Filter::new().eq("project_id", req.project_id),
        )
        .await?;
    let codes = records
        .into_iter()
        .map(|record| from_record::<CostCode>(EntityKind::CostCode, record))
        .collect::<Result<Vec<_>, _>>()?;

    success(codes)
}

/// POST /api/cost-codes/create - cost codes are unique per project.
pub async fn code_create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Json(req): Json<CodeCreateRequest>,
) -> Result<Json<Value>, ApiError> {
    require_project_access(state.store.as_ref(), &identity, &req.project_id).await?;

    if req.code.trim().is_empty() {
        return Err(ApiError::validation("code is required"));
    }
    if req.budget < Decimal::ZERO {
        return Err(ApiError::validation("budget must be non-negative"));
    }

    let duplicates = state
        .store
        .filter(
            EntityKind::CostCode,
            &Filter::new()
                .eq("project_id", req.project_id.clone())
                .eq("code", req.code.clone()),
        )
        .await?;
    if !duplicates.is_empty() {
        return Err(ApiError::conflict(format!(
            "cost code {} already exists on this project",
            req.code
        )));
    }

    let code = CostCode {
        id: Uuid::new_v4().to_string(),
        project_id: req.project_id,
        code: req.code,
        description: req.description,
        budget: req.budget,
        created_at: Utc::now(),
    };

    let created = state
        .store
        .create(EntityKind::CostCode, to_record(EntityKind::CostCode, &code)?)
        .await?;
    let code: CostCode = from_record(EntityKind::CostCode, created)?;

    state
        .audit
        .record(
            "cost_code.create",
            &identity,
            json!({"project_id": code.project_id, "cost_code_id": code.id, "code": code.code}),
            client_ip(&headers),
        )
        .await;

    success(code)
}

/// POST /api/cost-codes/delete
pub async fn code_delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Json(req): Json<CodeDeleteRequest>,
) -> Result<Json<Value>, ApiError> {
    let code = fetch_cost_code(state.store.as_ref(), &req.cost_code_id).await?;
    require_project_access(state.store.as_ref(), &identity, &code.project_id).await?;

    state
        .store
        .delete(EntityKind::CostCode, &req.cost_code_id)
        .await?;

    state
        .audit
        .record(
            "cost_code.delete",
            &identity,
            json!({"project_id": code.project_id, "cost_code_id": req.cost_code_id}),
            client_ip(&headers),
        )
        .await;

    success(json!({"cost_code_id": req.cost_code_id, "deleted": true}))
}

async fn fetch_cost_code(store: &dyn EntityStore, cost_code_id: &str) -> Result<CostCode, ApiError> {
    let record = find_by_id(store, EntityKind::CostCode, cost_code_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("cost code {} not found", cost_code_id)))?;
    Ok(from_record(EntityKind::CostCode, record)?)
}
