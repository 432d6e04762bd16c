use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use refuge_types::models::{Destination, MagicLink, MagicLinkPurpose};
use rusqlite::Row;
use uuid::Uuid;

use super::{OptionalExt, parse_uuid};
use crate::Database;

const LINK_COLUMNS: &str = "id, token, email, phone, purpose, is_used, used_at, \
     used_by_origin_hash, expires_at, created_at";

struct LinkRow {
    id: String,
    token: String,
    email: Option<String>,
    phone: Option<String>,
    purpose: String,
    is_used: bool,
    used_at: Option<DateTime<Utc>>,
    used_by_origin_hash: Option<String>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

fn read_link(row: &Row) -> rusqlite::Result<LinkRow> {
    Ok(LinkRow {
        id: row.get(0)?,
        token: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        purpose: row.get(4)?,
        is_used: row.get(5)?,
        used_at: row.get(6)?,
        used_by_origin_hash: row.get(7)?,
        expires_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

impl LinkRow {
    fn try_into_link(self) -> Result<MagicLink> {
        Ok(MagicLink {
            id: parse_uuid(&self.id)?,
            token: self.token,
            email: self.email,
            phone: self.phone,
            purpose: self
                .purpose
                .parse::<MagicLinkPurpose>()
                .map_err(|e| anyhow!("corrupt purpose column: {e}"))?,
            is_used: self.is_used,
            used_at: self.used_at,
            used_by_origin_hash: self.used_by_origin_hash,
            expires_at: self.expires_at,
            created_at: self.created_at,
        })
    }
}

impl Database {
    pub fn insert_magic_link(&self, link: &MagicLink) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO magic_links (id, token, email, phone, purpose, is_used, \
                 used_at, used_by_origin_hash, expires_at, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    link.id.to_string(),
                    link.token,
                    link.email,
                    link.phone,
                    link.purpose.as_str(),
                    link.is_used,
                    link.used_at,
                    link.used_by_origin_hash,
                    link.expires_at,
                    link.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_magic_link_by_token(&self, token: &str) -> Result<Option<MagicLink>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {LINK_COLUMNS} FROM magic_links WHERE token = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt.query_row([token], read_link).optional()?;
            row.map(LinkRow::try_into_link).transpose()
        })
    }

    /// Creation time of the newest unused, non-expired link for a
    /// destination. Drives the request cooldown.
    pub fn latest_pending_link_at(
        &self,
        destination: &Destination,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let (clause, value) = match destination {
            Destination::Email(e) => ("email = ?1", e.as_str()),
            Destination::Phone(p) => ("phone = ?1", p.as_str()),
        };
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT created_at FROM magic_links \
                 WHERE {clause} AND is_used = 0 AND expires_at > ?2 \
                 ORDER BY created_at DESC LIMIT 1"
            );
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_row(rusqlite::params![value, now], |row| row.get(0))
                .optional()
        })
    }

    /// Compare-and-set redemption. Marks the link used if and only if it
    /// is still unused and unexpired — of two concurrent redeemers,
    /// exactly one sees `true`.
    pub fn mark_magic_link_used(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        origin_hash: Option<&str>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE magic_links SET is_used = 1, used_at = ?2, used_by_origin_hash = ?3 \
                 WHERE id = ?1 AND is_used = 0 AND expires_at > ?2",
                rusqlite::params![id.to_string(), now, origin_hash],
            )?;
            Ok(changed == 1)
        })
    }
}
