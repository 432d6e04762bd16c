//! Dependent domain tables that reference users through nullable
//! foreign keys: meeting attendance and service assignments.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use refuge_types::models::{MeetingAttendance, ServiceAssignment, ServicePosition};
use rusqlite::Row;
use uuid::Uuid;

use super::parse_uuid;
use crate::Database;

struct AttendanceRow {
    id: String,
    user_id: Option<String>,
    meeting_id: String,
    joined_at: DateTime<Utc>,
    left_at: Option<DateTime<Utc>>,
    duration_minutes: Option<i64>,
    anonymous_label: Option<String>,
    share_attendance: bool,
    created_at: DateTime<Utc>,
}

fn read_attendance(row: &Row) -> rusqlite::Result<AttendanceRow> {
    Ok(AttendanceRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        meeting_id: row.get(2)?,
        joined_at: row.get(3)?,
        left_at: row.get(4)?,
        duration_minutes: row.get(5)?,
        anonymous_label: row.get(6)?,
        share_attendance: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl AttendanceRow {
    fn try_into_attendance(self) -> Result<MeetingAttendance> {
        Ok(MeetingAttendance {
            id: parse_uuid(&self.id)?,
            user_id: self.user_id.as_deref().map(parse_uuid).transpose()?,
            meeting_id: parse_uuid(&self.meeting_id)?,
            joined_at: self.joined_at,
            left_at: self.left_at,
            duration_minutes: self.duration_minutes,
            anonymous_label: self.anonymous_label,
            share_attendance: self.share_attendance,
            created_at: self.created_at,
        })
    }
}

struct AssignmentRow {
    id: String,
    user_id: Option<String>,
    position: String,
    group_id: Option<String>,
    meeting_id: Option<String>,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    is_active: bool,
    notes: Option<String>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

fn read_assignment(row: &Row) -> rusqlite::Result<AssignmentRow> {
    Ok(AssignmentRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        position: row.get(2)?,
        group_id: row.get(3)?,
        meeting_id: row.get(4)?,
        start_date: row.get(5)?,
        end_date: row.get(6)?,
        is_active: row.get(7)?,
        notes: row.get(8)?,
        created_by: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

impl AssignmentRow {
    fn try_into_assignment(self) -> Result<ServiceAssignment> {
        Ok(ServiceAssignment {
            id: parse_uuid(&self.id)?,
            user_id: self.user_id.as_deref().map(parse_uuid).transpose()?,
            position: self
                .position
                .parse::<ServicePosition>()
                .map_err(|e| anyhow!("corrupt position column: {e}"))?,
            group_id: self.group_id.as_deref().map(parse_uuid).transpose()?,
            meeting_id: self.meeting_id.as_deref().map(parse_uuid).transpose()?,
            start_date: self.start_date,
            end_date: self.end_date,
            is_active: self.is_active,
            notes: self.notes,
            created_by: self.created_by.as_deref().map(parse_uuid).transpose()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl Database {
    // -- Meeting attendance --

    pub fn insert_attendance(&self, record: &MeetingAttendance) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO meeting_attendance (id, user_id, meeting_id, joined_at, \
                 left_at, duration_minutes, anonymous_label, share_attendance, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    record.id.to_string(),
                    record.user_id.map(|u| u.to_string()),
                    record.meeting_id.to_string(),
                    record.joined_at,
                    record.left_at,
                    record.duration_minutes,
                    record.anonymous_label,
                    record.share_attendance,
                    record.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn attendance_for_user(&self, user_id: Uuid) -> Result<Vec<MeetingAttendance>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, meeting_id, joined_at, left_at, duration_minutes, \
                 anonymous_label, share_attendance, created_at \
                 FROM meeting_attendance WHERE user_id = ?1 ORDER BY joined_at",
            )?;
            let rows = stmt
                .query_map([user_id.to_string()], read_attendance)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(AttendanceRow::try_into_attendance)
                .collect()
        })
    }

    pub fn all_attendance(&self) -> Result<Vec<MeetingAttendance>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, meeting_id, joined_at, left_at, duration_minutes, \
                 anonymous_label, share_attendance, created_at \
                 FROM meeting_attendance ORDER BY joined_at",
            )?;
            let rows = stmt
                .query_map([], read_attendance)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(AttendanceRow::try_into_attendance)
                .collect()
        })
    }

    // -- Service assignments --

    pub fn has_active_assignment(&self, user_id: Uuid, position: ServicePosition) -> Result<bool> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT COUNT(*) FROM service_assignments \
                 WHERE user_id = ?1 AND position = ?2 AND is_active = 1",
            )?;
            let count: i64 = stmt.query_row(
                rusqlite::params![user_id.to_string(), position.as_str()],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn insert_assignment(&self, assignment: &ServiceAssignment) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO service_assignments (id, user_id, position, group_id, \
                 meeting_id, start_date, end_date, is_active, notes, created_by, \
                 created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    assignment.id.to_string(),
                    assignment.user_id.map(|u| u.to_string()),
                    assignment.position.as_str(),
                    assignment.group_id.map(|u| u.to_string()),
                    assignment.meeting_id.map(|u| u.to_string()),
                    assignment.start_date,
                    assignment.end_date,
                    assignment.is_active,
                    assignment.notes,
                    assignment.created_by.map(|u| u.to_string()),
                    assignment.created_at,
                    assignment.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn assignments_for_user(&self, user_id: Uuid) -> Result<Vec<ServiceAssignment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, position, group_id, meeting_id, start_date, end_date, \
                 is_active, notes, created_by, created_at, updated_at \
                 FROM service_assignments WHERE user_id = ?1 ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([user_id.to_string()], read_assignment)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(AssignmentRow::try_into_assignment)
                .collect()
        })
    }
}
