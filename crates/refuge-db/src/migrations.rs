use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                  TEXT PRIMARY KEY,
            email               TEXT UNIQUE,
            email_verified      INTEGER NOT NULL DEFAULT 0,
            phone               TEXT UNIQUE,
            phone_verified      INTEGER NOT NULL DEFAULT 0,
            display_name        TEXT,
            sobriety_date       TEXT,
            role                TEXT NOT NULL DEFAULT 'guest',
            is_active           INTEGER NOT NULL DEFAULT 1,
            is_verified         INTEGER NOT NULL DEFAULT 0,
            show_in_directory   INTEGER NOT NULL DEFAULT 1,
            show_sobriety_date  INTEGER NOT NULL DEFAULT 0,
            allow_contact       INTEGER NOT NULL DEFAULT 0,
            notification_prefs  TEXT NOT NULL DEFAULT '{}',
            anonymized_at       TEXT,
            created_at          TEXT NOT NULL,
            updated_at          TEXT,
            last_login          TEXT
        );

        CREATE TABLE IF NOT EXISTS magic_links (
            id                    TEXT PRIMARY KEY,
            token                 TEXT NOT NULL UNIQUE,
            email                 TEXT,
            phone                 TEXT,
            purpose               TEXT NOT NULL DEFAULT 'login',
            is_used               INTEGER NOT NULL DEFAULT 0,
            used_at               TEXT,
            used_by_origin_hash   TEXT,
            expires_at            TEXT NOT NULL,
            created_at            TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_magic_links_email
            ON magic_links(email);
        CREATE INDEX IF NOT EXISTS idx_magic_links_phone
            ON magic_links(phone);

        CREATE TABLE IF NOT EXISTS login_sessions (
            id                        TEXT PRIMARY KEY,
            user_id                   TEXT REFERENCES users(id),
            token_version             INTEGER NOT NULL DEFAULT 0,
            device_fingerprint_hash   TEXT,
            user_agent_hash           TEXT,
            origin_hash               TEXT,
            is_active                 INTEGER NOT NULL DEFAULT 1,
            expires_at                TEXT NOT NULL,
            last_activity             TEXT NOT NULL,
            created_at                TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_login_sessions_user
            ON login_sessions(user_id);

        CREATE TABLE IF NOT EXISTS user_audit_logs (
            id              TEXT PRIMARY KEY,
            user_id         TEXT,
            action          TEXT NOT NULL,
            resource_type   TEXT,
            resource_id     TEXT,
            success         INTEGER NOT NULL DEFAULT 1,
            origin_hash     TEXT,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_audit_user
            ON user_audit_logs(user_id, created_at);

        CREATE TABLE IF NOT EXISTS meeting_attendance (
            id                TEXT PRIMARY KEY,
            user_id           TEXT REFERENCES users(id),
            meeting_id        TEXT NOT NULL,
            joined_at         TEXT NOT NULL,
            left_at           TEXT,
            duration_minutes  INTEGER,
            anonymous_label   TEXT,
            share_attendance  INTEGER NOT NULL DEFAULT 0,
            created_at        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_attendance_user
            ON meeting_attendance(user_id);

        CREATE TABLE IF NOT EXISTS service_assignments (
            id           TEXT PRIMARY KEY,
            user_id      TEXT REFERENCES users(id),
            position     TEXT NOT NULL,
            group_id     TEXT,
            meeting_id   TEXT,
            start_date   TEXT NOT NULL,
            end_date     TEXT,
            is_active    INTEGER NOT NULL DEFAULT 1,
            notes        TEXT,
            created_by   TEXT REFERENCES users(id),
            created_at   TEXT NOT NULL,
            updated_at   TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_assignments_user
            ON service_assignments(user_id, position);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
