//! Multi-table anonymization executed as a single transaction.
//!
//! Each step is an explicit, named severance or redaction — no cascade
//! magic. The whole run commits or none of it does, so partial
//! redaction is never observable.

use anyhow::Result;
use chrono::{DateTime, Utc};
use refuge_types::models::NotificationPrefs;
use rusqlite::Transaction;
use uuid::Uuid;

use crate::Database;

/// What the engine decided to do. Label/hash generation stays outside
/// the db layer.
#[derive(Debug, Clone)]
pub struct AnonymizationPlan {
    pub user_id: Uuid,
    /// Replacement display name, e.g. `Anonymous_3k9f2a1c`.
    pub anon_display_name: String,
    /// Fixed marker overwriting free-text assignment notes.
    pub redaction_marker: String,
    pub preserve_audit: bool,
    pub permanent: bool,
}

/// Callbacks the transaction uses for fresh identifiers and one-way
/// re-hashing. Injected so the store stays free of crypto concerns.
pub struct AnonymizeOps<'a> {
    pub fresh_label: &'a dyn Fn(&str) -> String,
    pub rehash: &'a dyn Fn(&str) -> String,
}

/// Describes what a run irreversibly cleared, hashed, or preserved.
/// Makes anonymization observable and idempotent.
#[derive(Debug, Clone, Default)]
pub struct AnonymizationOutcome {
    pub already_anonymized: bool,
    pub sessions_redacted: usize,
    pub attendance_severed: usize,
    pub assignments_redacted: usize,
    pub links_cleared: usize,
    pub audit_severed: usize,
    pub user_deleted: bool,
}

impl Database {
    /// Runs the full anonymization pipeline for one user inside a
    /// single transaction. Returns `None` when the user does not exist.
    ///
    /// Re-running on an already-anonymized user skips the redaction
    /// steps (their fields are already null or redacted) and still
    /// succeeds.
    pub fn anonymize_user(
        &self,
        plan: &AnonymizationPlan,
        ops: &AnonymizeOps<'_>,
    ) -> Result<Option<AnonymizationOutcome>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let now = Utc::now();

            let Some((email, phone, anonymized_at)) = load_target(&tx, plan.user_id)? else {
                return Ok(None);
            };

            let mut outcome = AnonymizationOutcome::default();

            if anonymized_at.is_none() {
                redact_user(&tx, plan, now)?;
                outcome.sessions_redacted = redact_sessions(&tx, plan, ops)?;
                outcome.attendance_severed = sever_attendance(&tx, plan, ops)?;
                outcome.assignments_redacted = redact_assignments(&tx, plan, now)?;
                outcome.links_cleared =
                    clear_magic_links(&tx, email.as_deref(), phone.as_deref(), ops)?;
                if !plan.preserve_audit {
                    outcome.audit_severed = sever_audit(&tx, plan.user_id, ops)?;
                }
            } else {
                outcome.already_anonymized = true;
            }

            if plan.permanent {
                delete_user(&tx, plan.user_id, &mut outcome)?;
            }

            tx.commit()?;
            Ok(Some(outcome))
        })
    }
}

fn load_target(
    tx: &Transaction,
    user_id: Uuid,
) -> Result<Option<(Option<String>, Option<String>, Option<DateTime<Utc>>)>> {
    let mut stmt =
        tx.prepare("SELECT email, phone, anonymized_at FROM users WHERE id = ?1")?;
    match stmt.query_row([user_id.to_string()], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    }) {
        Ok(row) => Ok(Some(row)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Step 1: the user row itself. Role is untouched — it is not PII.
fn redact_user(tx: &Transaction, plan: &AnonymizationPlan, now: DateTime<Utc>) -> Result<()> {
    let muted = serde_json::to_string(&NotificationPrefs::muted())?;
    tx.execute(
        "UPDATE users SET email = NULL, email_verified = 0, phone = NULL, \
         phone_verified = 0, display_name = ?2, sobriety_date = NULL, \
         show_in_directory = 0, show_sobriety_date = 0, allow_contact = 0, \
         notification_prefs = ?3, is_active = 0, anonymized_at = ?4, updated_at = ?4 \
         WHERE id = ?1",
        rusqlite::params![plan.user_id.to_string(), plan.anon_display_name, muted, now],
    )?;
    Ok(())
}

/// Step 2: sessions keep existence but lose correlatability. The stored
/// hashes are re-hashed one way — the originals were never persisted.
fn redact_sessions(
    tx: &Transaction,
    plan: &AnonymizationPlan,
    ops: &AnonymizeOps<'_>,
) -> Result<usize> {
    let rows: Vec<(String, Option<String>, Option<String>, Option<String>)> = {
        let mut stmt = tx.prepare(
            "SELECT id, device_fingerprint_hash, user_agent_hash, origin_hash \
             FROM login_sessions WHERE user_id = ?1",
        )?;
        stmt.query_map([plan.user_id.to_string()], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?
    };

    for (id, device, agent, origin) in &rows {
        tx.execute(
            "UPDATE login_sessions SET device_fingerprint_hash = ?2, \
             user_agent_hash = ?3, origin_hash = ?4, is_active = 0 \
             WHERE id = ?1",
            rusqlite::params![
                id,
                device.as_deref().map(|h| (ops.rehash)(h)),
                agent.as_deref().map(|h| (ops.rehash)(h)),
                origin.as_deref().map(|h| (ops.rehash)(h)),
            ],
        )?;
    }
    Ok(rows.len())
}

/// Step 3: attendance rows survive with a fresh anonymous label each.
fn sever_attendance(
    tx: &Transaction,
    plan: &AnonymizationPlan,
    ops: &AnonymizeOps<'_>,
) -> Result<usize> {
    let ids: Vec<String> = {
        let mut stmt =
            tx.prepare("SELECT id FROM meeting_attendance WHERE user_id = ?1")?;
        stmt.query_map([plan.user_id.to_string()], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    for id in &ids {
        tx.execute(
            "UPDATE meeting_attendance SET user_id = NULL, anonymous_label = ?2, \
             share_attendance = 0 WHERE id = ?1",
            rusqlite::params![id, (ops.fresh_label)("attendance")],
        )?;
    }
    Ok(ids.len())
}

/// Step 4: notes are free text and may carry anything — overwrite with
/// the fixed marker. The user reference is severed only on permanent
/// deletion.
fn redact_assignments(
    tx: &Transaction,
    plan: &AnonymizationPlan,
    now: DateTime<Utc>,
) -> Result<usize> {
    let changed = tx.execute(
        "UPDATE service_assignments SET notes = ?2, updated_at = ?3 WHERE user_id = ?1",
        rusqlite::params![plan.user_id.to_string(), plan.redaction_marker, now],
    )?;
    Ok(changed)
}

/// Step 5: links matching the pre-anonymization destination lose it;
/// the recorded origin of use is re-hashed.
fn clear_magic_links(
    tx: &Transaction,
    email: Option<&str>,
    phone: Option<&str>,
    ops: &AnonymizeOps<'_>,
) -> Result<usize> {
    let rows: Vec<(String, Option<String>)> = {
        let mut stmt = tx.prepare(
            "SELECT id, used_by_origin_hash FROM magic_links \
             WHERE (email IS NOT NULL AND email = ?1) \
                OR (phone IS NOT NULL AND phone = ?2)",
        )?;
        stmt.query_map(rusqlite::params![email, phone], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?
    };

    for (id, origin) in &rows {
        tx.execute(
            "UPDATE magic_links SET email = NULL, phone = NULL, \
             used_by_origin_hash = ?2 WHERE id = ?1",
            rusqlite::params![id, origin.as_deref().map(|h| (ops.rehash)(h))],
        )?;
    }
    Ok(rows.len())
}

/// Step 6 (preserve_audit = false): audit rows stay but lose the user
/// and resource references.
fn sever_audit(tx: &Transaction, user_id: Uuid, ops: &AnonymizeOps<'_>) -> Result<usize> {
    let rows: Vec<(String, Option<String>)> = {
        let mut stmt = tx.prepare(
            "SELECT id, origin_hash FROM user_audit_logs WHERE user_id = ?1",
        )?;
        stmt.query_map([user_id.to_string()], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    for (id, origin) in &rows {
        tx.execute(
            "UPDATE user_audit_logs SET user_id = NULL, resource_id = NULL, \
             origin_hash = ?2 WHERE id = ?1",
            rusqlite::params![id, origin.as_deref().map(|h| (ops.rehash)(h))],
        )?;
    }
    Ok(rows.len())
}

/// Hard deletion: every remaining reference is severed before the user
/// row goes away, so no table ever points at a vanished id.
fn delete_user(
    tx: &Transaction,
    user_id: Uuid,
    outcome: &mut AnonymizationOutcome,
) -> Result<()> {
    let id = user_id.to_string();
    tx.execute(
        "UPDATE login_sessions SET user_id = NULL, is_active = 0 WHERE user_id = ?1",
        [&id],
    )?;
    tx.execute(
        "UPDATE meeting_attendance SET user_id = NULL WHERE user_id = ?1",
        [&id],
    )?;
    tx.execute(
        "UPDATE service_assignments SET user_id = NULL WHERE user_id = ?1",
        [&id],
    )?;
    tx.execute(
        "UPDATE service_assignments SET created_by = NULL WHERE created_by = ?1",
        [&id],
    )?;
    let severed = tx.execute(
        "UPDATE user_audit_logs SET user_id = NULL WHERE user_id = ?1",
        [&id],
    )?;
    outcome.audit_severed = outcome.audit_severed.max(severed);

    tx.execute("DELETE FROM users WHERE id = ?1", [&id])?;
    outcome.user_deleted = true;
    Ok(())
}
