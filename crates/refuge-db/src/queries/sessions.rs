use anyhow::Result;
use chrono::{DateTime, Utc};
use refuge_types::models::LoginSession;
use rusqlite::Row;
use uuid::Uuid;

use super::{OptionalExt, parse_uuid};
use crate::Database;

const SESSION_COLUMNS: &str = "id, user_id, token_version, device_fingerprint_hash, \
     user_agent_hash, origin_hash, is_active, expires_at, last_activity, created_at";

struct SessionRow {
    id: String,
    user_id: Option<String>,
    token_version: i64,
    device_fingerprint_hash: Option<String>,
    user_agent_hash: Option<String>,
    origin_hash: Option<String>,
    is_active: bool,
    expires_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

fn read_session(row: &Row) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        token_version: row.get(2)?,
        device_fingerprint_hash: row.get(3)?,
        user_agent_hash: row.get(4)?,
        origin_hash: row.get(5)?,
        is_active: row.get(6)?,
        expires_at: row.get(7)?,
        last_activity: row.get(8)?,
        created_at: row.get(9)?,
    })
}

impl SessionRow {
    fn try_into_session(self) -> Result<LoginSession> {
        Ok(LoginSession {
            id: parse_uuid(&self.id)?,
            user_id: self.user_id.as_deref().map(parse_uuid).transpose()?,
            token_version: self.token_version,
            device_fingerprint_hash: self.device_fingerprint_hash,
            user_agent_hash: self.user_agent_hash,
            origin_hash: self.origin_hash,
            is_active: self.is_active,
            expires_at: self.expires_at,
            last_activity: self.last_activity,
            created_at: self.created_at,
        })
    }
}

impl Database {
    pub fn insert_session(&self, session: &LoginSession) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO login_sessions (id, user_id, token_version, \
                 device_fingerprint_hash, user_agent_hash, origin_hash, is_active, \
                 expires_at, last_activity, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    session.id.to_string(),
                    session.user_id.map(|u| u.to_string()),
                    session.token_version,
                    session.device_fingerprint_hash,
                    session.user_agent_hash,
                    session.origin_hash,
                    session.is_active,
                    session.expires_at,
                    session.last_activity,
                    session.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_session(&self, id: Uuid) -> Result<Option<LoginSession>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {SESSION_COLUMNS} FROM login_sessions WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt
                .query_row([id.to_string()], read_session)
                .optional()?;
            row.map(SessionRow::try_into_session).transpose()
        })
    }

    /// Compare-and-set rotation. Bumps the token version and advances
    /// expiry if and only if the session is active, unexpired, and still
    /// at the expected version — of two concurrent refreshes carrying
    /// the same pair, exactly one sees `true`.
    pub fn rotate_session(
        &self,
        id: Uuid,
        expected_version: i64,
        new_expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE login_sessions SET token_version = token_version + 1, \
                 expires_at = ?3, last_activity = ?4 \
                 WHERE id = ?1 AND token_version = ?2 AND is_active = 1 AND expires_at > ?4",
                rusqlite::params![id.to_string(), expected_version, new_expiry, now],
            )?;
            Ok(changed == 1)
        })
    }

    /// Idempotent. Invalidated is terminal — nothing reactivates a
    /// session.
    pub fn deactivate_session(&self, id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE login_sessions SET is_active = 0 WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(())
        })
    }

    pub fn deactivate_sessions_for_user(&self, user_id: Uuid) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE login_sessions SET is_active = 0 WHERE user_id = ?1 AND is_active = 1",
                [user_id.to_string()],
            )?;
            Ok(changed)
        })
    }

    /// Expired sessions are read-checked, not swept — this is the
    /// explicit maintenance entry point.
    pub fn deactivate_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE login_sessions SET is_active = 0 \
                 WHERE is_active = 1 AND expires_at <= ?1",
                rusqlite::params![now],
            )?;
            Ok(changed)
        })
    }

    pub fn sessions_for_user(&self, user_id: Uuid) -> Result<Vec<LoginSession>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM login_sessions \
                 WHERE user_id = ?1 ORDER BY created_at"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id.to_string()], read_session)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(SessionRow::try_into_session).collect()
        })
    }
}
