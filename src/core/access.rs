//! Project-scoped access policy.
//!
//! `require_project_access` is the single authorization choke-point: every
//! handler that mutates an entity keyed by a client-supplied id resolves
//! the owning project through it before touching the store, so a bare id
//! in a request body can never reach a mutation unchecked.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::entities::{from_record, Project};
use crate::store::{EntityKind, EntityStore, Filter, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// The caller's resolved identity, injected by the auth middleware.
/// Immutable for the duration of a request.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Which tier granted access: full admin, a project manager or
/// superintendent match, or plain assigned membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleTier {
    Admin,
    Manager,
    Member,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow(RoleTier),
    Deny,
}

/// Pure decision over already-fetched state. Callers fetch the project
/// once and reuse it; this function never touches the store.
pub fn evaluate(identity: &Identity, project: &Project) -> AccessDecision {
    if identity.is_admin() {
        return AccessDecision::Allow(RoleTier::Admin);
    }
    if identity.email == project.project_manager || identity.email == project.superintendent {
        return AccessDecision::Allow(RoleTier::Manager);
    }
    if project.assigned_users.contains(&identity.email) {
        return AccessDecision::Allow(RoleTier::Member);
    }
    AccessDecision::Deny
}

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("project {0} not found")]
    ProjectNotFound(String),
    #[error("not assigned to this project")]
    Denied,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fetch a project by id, or fail with `ProjectNotFound`.
pub async fn fetch_project(
    store: &dyn EntityStore,
    project_id: &str,
) -> Result<Project, AccessError> {
    let records = store
        .filter(EntityKind::Project, &Filter::new().eq("id", project_id))
        .await?;
    let record = records
        .into_iter()
        .next()
        .ok_or_else(|| AccessError::ProjectNotFound(project_id.to_string()))?;
    Ok(from_record(EntityKind::Project, record)?)
}

/// Resolve the target project and evaluate the caller against it. Returns
/// the fetched project alongside the granted tier so callers do not read
/// it a second time.
pub async fn require_project_access(
    store: &dyn EntityStore,
    identity: &Identity,
    project_id: &str,
) -> Result<(Project, RoleTier), AccessError> {
    let project = fetch_project(store, project_id).await?;
    match evaluate(identity, &project) {
        AccessDecision::Allow(tier) => Ok((project, tier)),
        AccessDecision::Deny => {
            tracing::warn!(
                user = %identity.email,
                project_id,
                "project access denied"
            );
            Err(AccessError::Denied)
        }
    }
}
