//! Entity store abstraction.
//!
//! All durable state lives in an externally-owned document store reached
//! through a small list/filter/create/update/delete contract. The store is
//! modelled as a trait so the authorization and integrity core can run
//! against an in-memory adapter in tests and development.

pub mod entities;
pub mod gate;
pub mod memory;
pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use gate::RequestGate;
pub use memory::MemoryStore;
pub use remote::RemoteStore;

/// The wire shape of a store record: an opaque JSON object.
pub type Record = Map<String, Value>;

/// Entity collections this service touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Task,
    Rfi,
    FinancialLine,
    CostCode,
    Document,
    DocumentLink,
    ScheduleAuditLog,
    AuditLog,
    PushSubscription,
}

impl EntityKind {
    /// Store collection name for this kind.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Project => "projects",
            EntityKind::Task => "tasks",
            EntityKind::Rfi => "rfis",
            EntityKind::FinancialLine => "financial_lines",
            EntityKind::CostCode => "cost_codes",
            EntityKind::Document => "documents",
            EntityKind::DocumentLink => "document_links",
            EntityKind::ScheduleAuditLog => "schedule_audit_logs",
            EntityKind::AuditLog => "audit_logs",
            EntityKind::PushSubscription => "push_subscriptions",
        }
    }

    /// Dependent kinds carrying a `project_id` foreign key, ordered so that
    /// a kind referencing another kind appears before the kind it references
    /// (document links before documents, schedule history before tasks,
    /// financial lines before the cost codes they point at). Audit logs are
    /// append-only and never project-cascaded.
    pub const PROJECT_SCOPED: [EntityKind; 7] = [
        EntityKind::DocumentLink,
        EntityKind::Document,
        EntityKind::ScheduleAuditLog,
        EntityKind::Task,
        EntityKind::FinancialLine,
        EntityKind::CostCode,
        EntityKind::Rfi,
    ];
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.collection())
    }
}

/// Conjunction of field equality predicates - the only query shape the
/// managed platform contract guarantees.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filter {
    pub conditions: Vec<FilterCondition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(FilterCondition {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// True when every condition matches the record exactly.
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions
            .iter()
            .all(|c| record.get(&c.field) == Some(&c.value))
    }
}

/// Errors that can occur talking to the entity store. Cloneable so a
/// coalesced in-flight request can hand the same failure to every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} record not found: {id}")]
    NotFound { kind: EntityKind, id: String },
    #[error("unknown entity kind: {0}")]
    KindNotFound(EntityKind),
    #[error("malformed {kind} record: {message}")]
    InvalidRecord { kind: EntityKind, message: String },
    #[error("entity store transport error: {0}")]
    Transport(String),
}

/// The four-operation contract of the managed entity store, extended with
/// `update` for the CRUD surface. `delete` is idempotent by contract:
/// deleting an id that no longer exists is a no-op success, so cascade
/// deletion is always safe to retry.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn list(&self, kind: EntityKind, sort: Option<&str>) -> Result<Vec<Record>, StoreError>;

    async fn filter(&self, kind: EntityKind, filter: &Filter) -> Result<Vec<Record>, StoreError>;

    async fn create(&self, kind: EntityKind, fields: Record) -> Result<Record, StoreError>;

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        fields: Record,
    ) -> Result<Record, StoreError>;

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), StoreError>;
}

/// Fetch a single record by id, or `None` when absent.
pub async fn find_by_id(
    store: &dyn EntityStore,
    kind: EntityKind,
    id: &str,
) -> Result<Option<Record>, StoreError> {
    let records = store.filter(kind, &Filter::new().eq("id", id)).await?;
    Ok(records.into_iter().next())
}
