use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use refuge_types::models::{NotificationPrefs, Role, User};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::{OptionalExt, parse_uuid};
use crate::Database;

const USER_COLUMNS: &str = "id, email, email_verified, phone, phone_verified, display_name, \
     sobriety_date, role, is_active, is_verified, show_in_directory, \
     show_sobriety_date, allow_contact, notification_prefs, anonymized_at, \
     created_at, updated_at, last_login";

struct UserRow {
    id: String,
    email: Option<String>,
    email_verified: bool,
    phone: Option<String>,
    phone_verified: bool,
    display_name: Option<String>,
    sobriety_date: Option<DateTime<Utc>>,
    role: String,
    is_active: bool,
    is_verified: bool,
    show_in_directory: bool,
    show_sobriety_date: bool,
    allow_contact: bool,
    notification_prefs: String,
    anonymized_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    last_login: Option<DateTime<Utc>>,
}

fn read_user(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        email_verified: row.get(2)?,
        phone: row.get(3)?,
        phone_verified: row.get(4)?,
        display_name: row.get(5)?,
        sobriety_date: row.get(6)?,
        role: row.get(7)?,
        is_active: row.get(8)?,
        is_verified: row.get(9)?,
        show_in_directory: row.get(10)?,
        show_sobriety_date: row.get(11)?,
        allow_contact: row.get(12)?,
        notification_prefs: row.get(13)?,
        anonymized_at: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
        last_login: row.get(17)?,
    })
}

impl UserRow {
    fn try_into_user(self) -> Result<User> {
        Ok(User {
            id: parse_uuid(&self.id)?,
            email: self.email,
            email_verified: self.email_verified,
            phone: self.phone,
            phone_verified: self.phone_verified,
            display_name: self.display_name,
            sobriety_date: self.sobriety_date,
            role: self
                .role
                .parse::<Role>()
                .map_err(|e| anyhow!("corrupt role column: {e}"))?,
            is_active: self.is_active,
            is_verified: self.is_verified,
            show_in_directory: self.show_in_directory,
            show_sobriety_date: self.show_sobriety_date,
            allow_contact: self.allow_contact,
            notification_prefs: serde_json::from_str(&self.notification_prefs)
                .unwrap_or_default(),
            anonymized_at: self.anonymized_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_login: self.last_login,
        })
    }
}

fn query_user(conn: &Connection, where_clause: &str, param: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {where_clause}");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([param], read_user).optional()?;
    row.map(UserRow::try_into_user).transpose()
}

fn prefs_json(prefs: &NotificationPrefs) -> Result<String> {
    serde_json::to_string(prefs).map_err(|e| anyhow!("encode notification prefs: {e}"))
}

impl Database {
    pub fn insert_user(&self, user: &User) -> Result<()> {
        let prefs = prefs_json(&user.notification_prefs)?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, email_verified, phone, phone_verified, \
                 display_name, sobriety_date, role, is_active, is_verified, \
                 show_in_directory, show_sobriety_date, allow_contact, \
                 notification_prefs, anonymized_at, created_at, updated_at, last_login) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                rusqlite::params![
                    user.id.to_string(),
                    user.email,
                    user.email_verified,
                    user.phone,
                    user.phone_verified,
                    user.display_name,
                    user.sobriety_date,
                    user.role.as_str(),
                    user.is_active,
                    user.is_verified,
                    user.show_in_directory,
                    user.show_sobriety_date,
                    user.allow_contact,
                    prefs,
                    user.anonymized_at,
                    user.created_at,
                    user.updated_at,
                    user.last_login,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id.to_string()))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    pub fn get_user_by_phone(&self, phone: &str) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, "phone = ?1", phone))
    }

    /// Writes back every mutable profile field. Identity columns (id,
    /// created_at) are never touched.
    pub fn update_user(&self, user: &User) -> Result<()> {
        let prefs = prefs_json(&user.notification_prefs)?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET email = ?2, email_verified = ?3, phone = ?4, \
                 phone_verified = ?5, display_name = ?6, sobriety_date = ?7, role = ?8, \
                 is_active = ?9, is_verified = ?10, show_in_directory = ?11, \
                 show_sobriety_date = ?12, allow_contact = ?13, notification_prefs = ?14, \
                 anonymized_at = ?15, updated_at = ?16, last_login = ?17 \
                 WHERE id = ?1",
                rusqlite::params![
                    user.id.to_string(),
                    user.email,
                    user.email_verified,
                    user.phone,
                    user.phone_verified,
                    user.display_name,
                    user.sobriety_date,
                    user.role.as_str(),
                    user.is_active,
                    user.is_verified,
                    user.show_in_directory,
                    user.show_sobriety_date,
                    user.allow_contact,
                    prefs,
                    user.anonymized_at,
                    user.updated_at,
                    user.last_login,
                ],
            )?;
            Ok(())
        })
    }

    /// Active users who opted into the directory.
    pub fn list_directory_users(&self) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users \
                 WHERE is_active = 1 AND show_in_directory = 1 \
                 ORDER BY created_at"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], read_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(UserRow::try_into_user).collect()
        })
    }
}
