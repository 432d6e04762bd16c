//! The anonymization engine — builds the redaction plan and drives the
//! store's single-transaction pipeline.

use std::sync::Arc;

use refuge_db::{AnonymizationOutcome, AnonymizationPlan, AnonymizeOps, Database};
use refuge_types::error::{RefugeError, RefugeResult};
use tracing::info;
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditRecorder};
use crate::hash;

/// Marker overwriting free-text fields that may carry anything.
const REDACTION_MARKER: &str = "[redacted]";

#[derive(Debug, Clone, Copy)]
pub struct AnonymizeOptions {
    pub preserve_audit: bool,
    pub permanent: bool,
}

impl Default for AnonymizeOptions {
    fn default() -> Self {
        Self {
            preserve_audit: true,
            permanent: false,
        }
    }
}

#[derive(Clone)]
pub struct Anonymizer {
    db: Arc<Database>,
    audit: AuditRecorder,
}

impl Anonymizer {
    pub fn new(db: Arc<Database>, audit: AuditRecorder) -> Self {
        Self { db, audit }
    }

    /// Irreversibly strips PII from a user and every dependent record,
    /// atomically. Idempotent: a second run on the same user reports
    /// success without changing observable state.
    pub fn anonymize(
        &self,
        user_id: Uuid,
        opts: AnonymizeOptions,
    ) -> RefugeResult<AnonymizationOutcome> {
        let plan = AnonymizationPlan {
            user_id,
            anon_display_name: hash::anonymous_display_name(),
            redaction_marker: REDACTION_MARKER.to_string(),
            preserve_audit: opts.preserve_audit,
            permanent: opts.permanent,
        };
        let ops = AnonymizeOps {
            fresh_label: &hash::anonymous_label,
            rehash: &|h: &str| hash::sha256_hex(h),
        };

        let outcome = self
            .db
            .anonymize_user(&plan, &ops)?
            .ok_or(RefugeError::NotFound { entity: "user" })?;

        info!(
            user = %user_id,
            permanent = opts.permanent,
            already = outcome.already_anonymized,
            sessions = outcome.sessions_redacted,
            attendance = outcome.attendance_severed,
            links = outcome.links_cleared,
            "anonymization complete"
        );

        // A fresh audit row may only carry the user id if the id is
        // meant to stay queryable — otherwise it would re-link what the
        // run just severed. A no-op rerun records nothing, keeping the
        // operation idempotent down to the audit trail.
        if !outcome.already_anonymized || outcome.user_deleted {
            let action = if opts.permanent {
                "user_deleted_permanently"
            } else {
                "user_anonymized"
            };
            let mut event = AuditEvent::new(action);
            if opts.preserve_audit && !opts.permanent {
                event = event.user(user_id).resource("user", user_id);
            }
            self.audit.record(event);
        }

        Ok(outcome)
    }
}
