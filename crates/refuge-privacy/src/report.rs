//! Privacy-compliance report: a monotonic score over a user's privacy
//! posture plus per-table retention counts.
//!
//! The weights are illustrative, not load-bearing — any monotonic
//! scoring function would do. Keeping more data private never lowers
//! the score.

use std::sync::Arc;

use refuge_db::Database;
use refuge_types::api::{DataRetention, PrivacyReport};
use refuge_types::error::{RefugeError, RefugeResult};
use refuge_types::models::{Role, User};
use uuid::Uuid;

const MAX_SCORE: u32 = 8;

fn privacy_score(user: &User) -> u32 {
    let mut score = 0;
    if user.email.is_none() {
        score += 1;
    }
    if user.phone.is_none() {
        score += 1;
    }
    if !user.show_sobriety_date {
        score += 1;
    }
    if !user.show_in_directory {
        score += 1;
    }
    if !user.allow_contact {
        score += 1;
    }
    if user.role == Role::Anonymous {
        score += 2;
    }
    if !user.is_verified {
        score += 1;
    }
    score
}

fn privacy_level(score: u32) -> &'static str {
    let pct = score * 100 / MAX_SCORE;
    match pct {
        80.. => "Maximum",
        60..80 => "High",
        40..60 => "Medium",
        _ => "Low",
    }
}

pub fn privacy_report(db: &Arc<Database>, user_id: Uuid) -> RefugeResult<PrivacyReport> {
    let user = db
        .get_user(user_id)?
        .ok_or(RefugeError::NotFound { entity: "user" })?;

    let (audit_logs, login_sessions, meeting_attendance, service_assignments) =
        db.retention_counts(user_id)?;

    let score = privacy_score(&user);
    Ok(PrivacyReport {
        user_id,
        privacy_score: score,
        max_score: MAX_SCORE,
        privacy_level: privacy_level(score).to_string(),
        data_retention: DataRetention {
            audit_logs,
            login_sessions,
            meeting_attendance,
            service_assignments,
        },
    })
}
