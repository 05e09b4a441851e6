//! Referential integrity auditor.
//!
//! An on-demand, read-only diagnostic over the whole entity store: orphaned
//! foreign keys, inverted or implausible date ranges, and out-of-domain
//! numeric fields. The scan is intentionally exhaustive rather than
//! incremental, and a store failure mid-scan fails the whole check - a
//! partial orphan report would hide real issues behind false negatives.

use std::collections::HashMap;

use chrono::{DateTime, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::store::entities::{from_record, CostCode, FinancialLine, Project, Task};
use crate::store::{EntityKind, EntityStore, StoreError};

/// Schedule dates further out than this are treated as data entry errors.
const FUTURE_HORIZON_YEARS: u32 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct OrphanedRecord {
    pub entity_kind: String,
    pub id: String,
    pub project_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DateViolation {
    pub entity_kind: String,
    pub id: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NumericViolation {
    pub entity_kind: String,
    pub id: String,
    pub field: String,
    pub value: Value,
    pub message: String,
}

#[derive(Debug, Default, Serialize)]
pub struct IntegrityReport {
    pub orphaned_records: Vec<OrphanedRecord>,
    pub date_violations: Vec<DateViolation>,
    pub numeric_violations: Vec<NumericViolation>,
    pub total_issues: usize,
}

/// Full-scan integrity check. Never mutates state.
pub async fn run_integrity_check(
    store: &dyn EntityStore,
) -> Result<IntegrityReport, StoreError> {
    let mut report = IntegrityReport::default();

    // Known projects, with creation times for schedule sanity checks
    let mut project_created: HashMap<String, DateTime<Utc>> = HashMap::new();
    for record in store.list(EntityKind::Project, None).await? {
        let project: Project = from_record(EntityKind::Project, record)?;
        check_date_pair(
            &mut report,
            EntityKind::Project,
            &project.id,
            project.start_date,
            project.end_date,
        );
        project_created.insert(project.id, project.created_at);
    }

    let horizon = Utc::now().date_naive() + Months::new(12 * FUTURE_HORIZON_YEARS);

    for kind in EntityKind::PROJECT_SCOPED {
        let records = match store.list(kind, None).await {
            Ok(records) => records,
            // The schema evolves; a kind the store has never seen is empty
            Err(StoreError::KindNotFound(_)) => continue,
            Err(e) => return Err(e),
        };

        for record in records {
            let id = record
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let project_id = record
                .get("project_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            let parent_created = project_created.get(&project_id).copied();
            if parent_created.is_none() {
                report.orphaned_records.push(OrphanedRecord {
                    entity_kind: kind.collection().to_string(),
                    id: id.clone(),
                    project_id: project_id.clone(),
                });
            }

            match kind {
                EntityKind::Task => {
                    let task: Task = from_record(kind, record)?;
                    check_date_pair(&mut report, kind, &task.id, task.start_date, task.end_date);
                    check_schedule_bounds(
                        &mut report,
                        kind,
                        &task.id,
                        task.start_date,
                        task.end_date,
                        parent_created,
                        horizon,
                    );
                    check_percent(&mut report, kind, &task.id, task.percent_complete);
                }
                EntityKind::FinancialLine => {
                    let line: FinancialLine = from_record(kind, record)?;
                    check_percent(&mut report, kind, &line.id, line.percent_complete);
                    // Amounts are explicitly signed; negative is legitimate
                }
                EntityKind::CostCode => {
                    let code: CostCode = from_record(kind, record)?;
                    if code.budget < Decimal::ZERO {
                        report.numeric_violations.push(NumericViolation {
                            entity_kind: kind.collection().to_string(),
                            id: code.id.clone(),
                            field: "budget".to_string(),
                            value: Value::String(code.budget.to_string()),
                            message: "budget must be non-negative".to_string(),
                        });
                    }
                }
                _ => {}
            }
        }
    }

    report.total_issues = report.orphaned_records.len()
        + report.date_violations.len()
        + report.numeric_violations.len();

    tracing::info!(
        orphans = report.orphaned_records.len(),
        date_violations = report.date_violations.len(),
        numeric_violations = report.numeric_violations.len(),
        "integrity check complete"
    );

    Ok(report)
}

fn check_date_pair(
    report: &mut IntegrityReport,
    kind: EntityKind,
    id: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            report.date_violations.push(DateViolation {
                entity_kind: kind.collection().to_string(),
                id: id.to_string(),
                start_date: Some(start),
                end_date: Some(end),
                message: "start date is after end date".to_string(),
            });
        }
    }
}

fn check_schedule_bounds(
    report: &mut IntegrityReport,
    kind: EntityKind,
    id: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    parent_created: Option<DateTime<Utc>>,
    horizon: NaiveDate,
) {
    if let (Some(start), Some(created)) = (start, parent_created) {
        if start < created.date_naive() {
            report.date_violations.push(DateViolation {
                entity_kind: kind.collection().to_string(),
                id: id.to_string(),
                start_date: Some(start),
                end_date: end,
                message: "start date predates the project".to_string(),
            });
        }
    }
    if let Some(end) = end {
        if end > horizon {
            report.date_violations.push(DateViolation {
                entity_kind: kind.collection().to_string(),
                id: id.to_string(),
                start_date: start,
                end_date: Some(end),
                message: "end date is implausibly far in the future".to_string(),
            });
        }
    }
}

fn check_percent(report: &mut IntegrityReport, kind: EntityKind, id: &str, value: f64) {
    if !(0.0..=100.0).contains(&value) {
        report.numeric_violations.push(NumericViolation {
            entity_kind: kind.collection().to_string(),
            id: id.to_string(),
            field: "percent_complete".to_string(),
            value: Value::from(value),
            message: "percent complete must be between 0 and 100".to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Filter, MemoryStore, Record};
    use async_trait::async_trait;
    use serde_json::json;

    fn fields(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    async fn store_with_project() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create(
                EntityKind::Project,
                fields(json!({
                    "id": "p1", "name": "Depot Renovation",
                    "project_manager": "pm@example.com",
                    "superintendent": "supe@example.com",
                    "created_at": "2026-01-01T00:00:00Z"
                })),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn clean_store_reports_zero_issues() {
        let store = store_with_project().await;
        store
            .create(
                EntityKind::Task,
                fields(json!({
                    "project_id": "p1", "title": "Demo walls",
                    "start_date": "2026-02-01", "end_date": "2026-03-01",
                    "percent_complete": 40.0
                })),
            )
            .await
            .unwrap();

        let report = run_integrity_check(&store).await.unwrap();
        assert_eq!(report.total_issues, 0);
    }

    #[tokio::test]
    async fn ghost_project_reference_is_exactly_one_orphan() {
        let store = store_with_project().await;
        store
            .create(
                EntityKind::Task,
                fields(json!({"project_id": "ghost", "title": "Stray task"})),
            )
            .await
            .unwrap();

        let report = run_integrity_check(&store).await.unwrap();
        assert_eq!(report.orphaned_records.len(), 1);
        assert_eq!(report.orphaned_records[0].entity_kind, "tasks");
        assert_eq!(report.orphaned_records[0].project_id, "ghost");
        assert_eq!(report.total_issues, 1);
    }

    #[tokio::test]
    async fn inverted_date_range_is_exactly_one_date_violation() {
        let store = store_with_project().await;
        store
            .create(
                EntityKind::Task,
                fields(json!({
                    "project_id": "p1", "title": "Backwards task",
                    "start_date": "2026-06-01", "end_date": "2026-05-01"
                })),
            )
            .await
            .unwrap();

        let report = run_integrity_check(&store).await.unwrap();
        assert_eq!(report.date_violations.len(), 1);
        assert_eq!(report.date_violations[0].message, "start date is after end date");
        assert_eq!(report.total_issues, 1);
    }

    #[tokio::test]
    async fn task_starting_before_project_creation_is_flagged() {
        let store = store_with_project().await;
        store
            .create(
                EntityKind::Task,
                fields(json!({
                    "project_id": "p1", "title": "Premature task",
                    "start_date": "2025-06-01", "end_date": "2026-02-01"
                })),
            )
            .await
            .unwrap();

        let report = run_integrity_check(&store).await.unwrap();
        assert_eq!(report.date_violations.len(), 1);
        assert_eq!(
            report.date_violations[0].message,
            "start date predates the project"
        );
    }

    #[tokio::test]
    async fn negative_percent_complete_is_exactly_one_numeric_violation() {
        let store = store_with_project().await;
        store
            .create(
                EntityKind::FinancialLine,
                fields(json!({
                    "project_id": "p1", "description": "Sitework",
                    "amount": "5000.00", "percent_complete": -10.0
                })),
            )
            .await
            .unwrap();

        let report = run_integrity_check(&store).await.unwrap();
        assert_eq!(report.numeric_violations.len(), 1);
        assert_eq!(report.numeric_violations[0].entity_kind, "financial_lines");
        assert_eq!(report.numeric_violations[0].field, "percent_complete");
        assert_eq!(report.total_issues, 1);
    }

    #[tokio::test]
    async fn negative_amount_is_not_a_violation() {
        let store = store_with_project().await;
        store
            .create(
                EntityKind::FinancialLine,
                fields(json!({
                    "project_id": "p1", "description": "Deductive change order",
                    "amount": "-2500.00", "percent_complete": 0.0
                })),
            )
            .await
            .unwrap();

        let report = run_integrity_check(&store).await.unwrap();
        assert_eq!(report.total_issues, 0);
    }

    #[tokio::test]
    async fn negative_cost_code_budget_is_flagged() {
        let store = store_with_project().await;
        store
            .create(
                EntityKind::CostCode,
                fields(json!({
                    "project_id": "p1", "code": "03-3000", "budget": "-1.00"
                })),
            )
            .await
            .unwrap();

        let report = run_integrity_check(&store).await.unwrap();
        assert_eq!(report.numeric_violations.len(), 1);
        assert_eq!(report.numeric_violations[0].field, "budget");
    }

    /// Store wrapper that fails listing one kind mid-scan.
    struct FailingList {
        inner: MemoryStore,
        failing_kind: EntityKind,
    }

    #[async_trait]
    impl EntityStore for FailingList {
        async fn list(
            &self,
            kind: EntityKind,
            sort: Option<&str>,
        ) -> Result<Vec<Record>, StoreError> {
            if kind == self.failing_kind {
                return Err(StoreError::Transport("simulated outage".to_string()));
            }
            self.inner.list(kind, sort).await
        }

        async fn filter(&self, kind: EntityKind, filter: &Filter) -> Result<Vec<Record>, StoreError> {
            self.inner.filter(kind, filter).await
        }

        async fn create(&self, kind: EntityKind, fieldset: Record) -> Result<Record, StoreError> {
            self.inner.create(kind, fieldset).await
        }

        async fn update(
            &self,
            kind: EntityKind,
            id: &str,
            fieldset: Record,
        ) -> Result<Record, StoreError> {
            self.inner.update(kind, id, fieldset).await
        }

        async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), StoreError> {
            self.inner.delete(kind, id).await
        }
    }

    #[tokio::test]
    async fn mid_scan_failure_fails_the_whole_check() {
        let store = FailingList {
            inner: store_with_project().await,
            failing_kind: EntityKind::Task,
        };
        let result = run_integrity_check(&store).await;
        assert!(matches!(result, Err(StoreError::Transport(_))));
    }
}
