use anyhow::Result;
use chrono::{DateTime, Utc};
use refuge_types::models::AuditLogEntry;
use rusqlite::Row;
use uuid::Uuid;

use super::parse_uuid;
use crate::Database;

fn read_audit(row: &Row) -> rusqlite::Result<(String, Option<String>, String, Option<String>, Option<String>, bool, Option<String>, DateTime<Utc>)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

impl Database {
    /// Append-only. No update or delete path exists outside
    /// anonymization severance.
    pub fn insert_audit_entry(&self, entry: &AuditLogEntry) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO user_audit_logs (id, user_id, action, resource_type, \
                 resource_id, success, origin_hash, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    entry.id.to_string(),
                    entry.user_id.map(|u| u.to_string()),
                    entry.action,
                    entry.resource_type,
                    entry.resource_id,
                    entry.success,
                    entry.origin_hash,
                    entry.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn audit_entries_for_user(&self, user_id: Uuid) -> Result<Vec<AuditLogEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, action, resource_type, resource_id, success, \
                 origin_hash, created_at \
                 FROM user_audit_logs WHERE user_id = ?1 ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([user_id.to_string()], read_audit)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, user_id, action, resource_type, resource_id, success, origin_hash, created_at)| {
                    Ok(AuditLogEntry {
                        id: parse_uuid(&id)?,
                        user_id: user_id.as_deref().map(parse_uuid).transpose()?,
                        action,
                        resource_type,
                        resource_id,
                        success,
                        origin_hash,
                        created_at,
                    })
                })
                .collect()
        })
    }

    /// Row counts per table still referencing a user. Feeds the privacy
    /// report; counts only, never content.
    pub fn retention_counts(&self, user_id: Uuid) -> Result<(u64, u64, u64, u64)> {
        self.with_conn(|conn| {
            let id = user_id.to_string();
            let count = |sql: &str| -> Result<u64> {
                let mut stmt = conn.prepare(sql)?;
                Ok(stmt.query_row([&id], |row| row.get::<_, i64>(0))? as u64)
            };
            Ok((
                count("SELECT COUNT(*) FROM user_audit_logs WHERE user_id = ?1")?,
                count("SELECT COUNT(*) FROM login_sessions WHERE user_id = ?1")?,
                count("SELECT COUNT(*) FROM meeting_attendance WHERE user_id = ?1")?,
                count("SELECT COUNT(*) FROM service_assignments WHERE user_id = ?1")?,
            ))
        })
    }
}
