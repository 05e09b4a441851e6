//! Cascade deletion engine.
//!
//! Removes a project together with every dependent record reachable by
//! `project_id`. The store offers no multi-record transaction, so the
//! cascade is best-effort: each failure is recorded and the engine moves
//! on, maximizing total cleanup. Callers must already be authorized as
//! admin; no authorization is applied here.
//!
//! Deletion order is `EntityKind::PROJECT_SCOPED`: kinds that reference
//! another kind are processed before the kind they reference, so no
//! surviving record points at a parent removed earlier in the same
//! cascade. The root project record goes last. Audit logs are never
//! touched.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::store::{find_by_id, EntityKind, EntityStore, Filter, StoreError};

#[derive(Debug, Clone, Serialize)]
pub struct CascadeFailure {
    pub entity_kind: String,
    /// Absent for kind-level fetch failures.
    pub id: Option<String>,
    pub message: String,
}

#[derive(Debug, Default, Serialize)]
pub struct CascadeReport {
    /// Deleted record count per collection.
    pub deleted: BTreeMap<String, usize>,
    pub errors: Vec<CascadeFailure>,
}

impl CascadeReport {
    pub fn total_deleted(&self) -> usize {
        self.deleted.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Delete every dependent record of `project_id`, then the project itself.
/// Re-running on an id that no longer exists is a no-op success with zero
/// counts, so deletion is safe to retry.
pub async fn cascade_delete(store: &dyn EntityStore, project_id: &str) -> CascadeReport {
    let mut report = CascadeReport::default();

    for kind in EntityKind::PROJECT_SCOPED {
        let filter = Filter::new().eq("project_id", project_id);
        let records = match store.filter(kind, &filter).await {
            Ok(records) => records,
            // A kind the store does not know yet has nothing to delete
            Err(StoreError::KindNotFound(_)) => {
                report.deleted.insert(kind.collection().to_string(), 0);
                continue;
            }
            Err(e) => {
                report.errors.push(CascadeFailure {
                    entity_kind: kind.collection().to_string(),
                    id: None,
                    message: e.to_string(),
                });
                continue;
            }
        };

        let mut count = 0;
        for record in records {
            let id = match record.get("id").and_then(|v| v.as_str()) {
                Some(id) => id.to_string(),
                None => {
                    report.errors.push(CascadeFailure {
                        entity_kind: kind.collection().to_string(),
                        id: None,
                        message: "record has no id".to_string(),
                    });
                    continue;
                }
            };
            match store.delete(kind, &id).await {
                Ok(()) => count += 1,
                Err(e) => report.errors.push(CascadeFailure {
                    entity_kind: kind.collection().to_string(),
                    id: Some(id),
                    message: e.to_string(),
                }),
            }
        }
        report.deleted.insert(kind.collection().to_string(), count);
    }

    // The root goes last; count it only if it still existed.
    let root_collection = EntityKind::Project.collection().to_string();
    match find_by_id(store, EntityKind::Project, project_id).await {
        Ok(Some(_)) => match store.delete(EntityKind::Project, project_id).await {
            Ok(()) => {
                report.deleted.insert(root_collection, 1);
            }
            Err(e) => {
                report.deleted.insert(root_collection, 0);
                report.errors.push(CascadeFailure {
                    entity_kind: EntityKind::Project.collection().to_string(),
                    id: Some(project_id.to_string()),
                    message: e.to_string(),
                });
            }
        },
        Ok(None) => {
            report.deleted.insert(root_collection, 0);
        }
        Err(e) => {
            report.deleted.insert(root_collection, 0);
            report.errors.push(CascadeFailure {
                entity_kind: EntityKind::Project.collection().to_string(),
                id: Some(project_id.to_string()),
                message: e.to_string(),
            });
        }
    }

    if report.is_clean() {
        tracing::info!(
            project_id,
            total = report.total_deleted(),
            "cascade delete complete"
        );
    } else {
        tracing::warn!(
            project_id,
            total = report.total_deleted(),
            failures = report.errors.len(),
            "cascade delete completed with partial failures"
        );
    }

    report
}
