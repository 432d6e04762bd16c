//! Append-only, privacy-compliant action log.

use std::sync::Arc;

use chrono::Utc;
use refuge_db::Database;
use refuge_types::models::AuditLogEntry;
use tracing::warn;
use uuid::Uuid;

/// One fact to append. Carries hashes and ids only, never PII.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub success: bool,
    pub origin_hash: Option<String>,
}

impl AuditEvent {
    pub fn new(action: &str) -> Self {
        Self {
            user_id: None,
            action: action.to_string(),
            resource_type: None,
            resource_id: None,
            success: true,
            origin_hash: None,
        }
    }

    pub fn user(mut self, id: Uuid) -> Self {
        self.user_id = Some(id);
        self
    }

    pub fn resource(mut self, resource_type: &str, resource_id: impl ToString) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn origin(mut self, origin_hash: Option<String>) -> Self {
        self.origin_hash = origin_hash;
        self
    }

    pub fn failure(mut self) -> Self {
        self.success = false;
        self
    }
}

/// Best-effort recorder. A write failure is logged and swallowed — the
/// audit trail is not part of any primary operation's invariant set, so
/// it must never reverse one.
#[derive(Clone)]
pub struct AuditRecorder {
    db: Arc<Database>,
}

impl AuditRecorder {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn record(&self, event: AuditEvent) {
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            user_id: event.user_id,
            action: event.action,
            resource_type: event.resource_type,
            resource_id: event.resource_id,
            success: event.success,
            origin_hash: event.origin_hash,
            created_at: Utc::now(),
        };

        if let Err(err) = self.db.insert_audit_entry(&entry) {
            warn!(action = %entry.action, %err, "audit write failed");
        }
    }
}
