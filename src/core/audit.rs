//! Audit trail recorder.
//!
//! Appends one immutable record for every privileged mutation. Append
//! failures are absorbed here and logged operationally: a gap in the audit
//! trail is acceptable, a blocked business operation is not.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::core::access::Identity;
use crate::store::{EntityKind, EntityStore};

#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn EntityStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Append one audit record with a server-generated timestamp.
    /// Fire-and-forget: never returns an error to the caller.
    pub async fn record(
        &self,
        action: &str,
        identity: &Identity,
        details: Value,
        ip_address: Option<String>,
    ) {
        let record = json!({
            "id": Uuid::new_v4().to_string(),
            "action": action,
            "user_email": identity.email,
            "timestamp": Utc::now(),
            "details": details,
            "ip_address": ip_address,
        });

        let fields = match record {
            Value::Object(map) => map,
            _ => unreachable!("audit record is always an object"),
        };

        if let Err(e) = self.store.create(EntityKind::AuditLog, fields).await {
            tracing::warn!(action, error = %e, "audit log append failed; continuing");
        }
    }
}
