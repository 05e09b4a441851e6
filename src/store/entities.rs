//! Typed schemas for the entity kinds this service treats as first-class.
//!
//! Store records are schemaless JSON objects; these structs are the access
//! boundary. Malformed shapes are rejected when a record is read rather
//! than letting untyped data flow through the core. Unknown fields are
//! ignored so the store schema can evolve ahead of this service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{EntityKind, Record, StoreError};

/// Deserialize a store record into its typed schema.
pub fn from_record<T: DeserializeOwned>(kind: EntityKind, record: Record) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(record)).map_err(|e| StoreError::InvalidRecord {
        kind,
        message: e.to_string(),
    })
}

/// Serialize a typed value into the store's record shape.
pub fn to_record<T: Serialize>(kind: EntityKind, value: &T) -> Result<Record, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(StoreError::InvalidRecord {
            kind,
            message: "expected a JSON object".to_string(),
        }),
        Err(e) => Err(StoreError::InvalidRecord {
            kind,
            message: e.to_string(),
        }),
    }
}

/// Root of an access-scope tree. Owns every dependent entity that carries
/// its id as `project_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub project_manager: String,
    pub superintendent: String,
    #[serde(default)]
    pub assigned_users: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default = "default_open_status")]
    pub status: String,
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub percent_complete: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rfi {
    pub id: String,
    pub project_id: String,
    pub subject: String,
    pub question: String,
    pub answer: Option<String>,
    #[serde(default = "default_open_status")]
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// A single budget or actual line. Amounts are signed: deductive change
/// orders are legitimate negative values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialLine {
    pub id: String,
    pub project_id: String,
    pub cost_code_id: Option<String>,
    pub description: String,
    pub amount: Decimal,
    #[serde(default)]
    pub percent_complete: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostCode {
    pub id: String,
    pub project_id: String,
    pub code: String,
    pub description: Option<String>,
    pub budget: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Attachment of a document to a task or RFI within the same project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentLink {
    pub id: String,
    pub project_id: String,
    pub document_id: String,
    pub target_kind: String,
    pub target_id: String,
    pub created_at: DateTime<Utc>,
}

/// One recorded change to a task's schedule dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleAuditLog {
    pub id: String,
    pub project_id: String,
    pub task_id: String,
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
}

/// Append-only trail of privileged mutations. Never mutated or deleted by
/// normal operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogRecord {
    pub id: String,
    pub action: String,
    pub user_email: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: Value,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscription {
    pub id: String,
    pub user_email: String,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub created_at: DateTime<Utc>,
}

fn default_open_status() -> String {
    "open".to_string()
}
