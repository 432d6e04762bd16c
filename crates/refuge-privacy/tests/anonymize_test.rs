//! Anonymization pipeline properties: irreversibility, referential
//! integrity, idempotence, and audit policy.

use std::sync::Arc;

use chrono::{Duration, Utc};
use refuge_db::Database;
use refuge_privacy::anonymize::{AnonymizeOptions, Anonymizer};
use refuge_privacy::audit::{AuditEvent, AuditRecorder};
use refuge_types::error::RefugeError;
use refuge_types::models::{
    LoginSession, MagicLink, MagicLinkPurpose, MeetingAttendance, NotificationPrefs, Role,
    ServiceAssignment, ServicePosition, User,
};
use uuid::Uuid;

struct Seeded {
    db: Arc<Database>,
    engine: Anonymizer,
    user: User,
    admin: User,
}

/// One user with the full dependent graph: two sessions, three
/// attendance rows, one assignment, one magic link, plus audit trail.
fn seed() -> Seeded {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let audit = AuditRecorder::new(db.clone());
    let engine = Anonymizer::new(db.clone(), audit.clone());
    let now = Utc::now();

    let admin = User {
        id: Uuid::new_v4(),
        email: Some("admin@example.org".into()),
        email_verified: true,
        phone: None,
        phone_verified: false,
        display_name: Some("Admin".into()),
        sobriety_date: None,
        role: Role::Admin,
        is_active: true,
        is_verified: true,
        show_in_directory: false,
        show_sobriety_date: false,
        allow_contact: false,
        notification_prefs: NotificationPrefs::default(),
        anonymized_at: None,
        created_at: now,
        updated_at: None,
        last_login: None,
    };
    db.insert_user(&admin).unwrap();

    let user = User {
        id: Uuid::new_v4(),
        email: Some("target@example.org".into()),
        email_verified: true,
        phone: None,
        phone_verified: false,
        display_name: Some("Jordan".into()),
        sobriety_date: Some(now - Duration::days(365)),
        role: Role::Member,
        is_active: true,
        is_verified: true,
        show_in_directory: true,
        show_sobriety_date: true,
        allow_contact: true,
        notification_prefs: NotificationPrefs::default(),
        anonymized_at: None,
        created_at: now,
        updated_at: None,
        last_login: Some(now),
    };
    db.insert_user(&user).unwrap();

    for _ in 0..2 {
        db.insert_session(&LoginSession {
            id: Uuid::new_v4(),
            user_id: Some(user.id),
            token_version: 0,
            device_fingerprint_hash: Some("d".repeat(64)),
            user_agent_hash: Some("u".repeat(64)),
            origin_hash: Some("o".repeat(64)),
            is_active: true,
            expires_at: now + Duration::minutes(30),
            last_activity: now,
            created_at: now,
        })
        .unwrap();
    }

    for _ in 0..3 {
        db.insert_attendance(&MeetingAttendance {
            id: Uuid::new_v4(),
            user_id: Some(user.id),
            meeting_id: Uuid::new_v4(),
            joined_at: now,
            left_at: None,
            duration_minutes: Some(60),
            anonymous_label: None,
            share_attendance: true,
            created_at: now,
        })
        .unwrap();
    }

    db.insert_assignment(&ServiceAssignment {
        id: Uuid::new_v4(),
        user_id: Some(user.id),
        position: ServicePosition::Treasurer,
        group_id: None,
        meeting_id: None,
        start_date: now,
        end_date: None,
        is_active: true,
        notes: Some("prefers evening meetings, call after 6".into()),
        created_by: Some(admin.id),
        created_at: now,
        updated_at: None,
    })
    .unwrap();

    db.insert_magic_link(&MagicLink {
        id: Uuid::new_v4(),
        token: "seeded-link".into(),
        email: Some("target@example.org".into()),
        phone: None,
        purpose: MagicLinkPurpose::Login,
        is_used: true,
        used_at: Some(now),
        used_by_origin_hash: Some("h".repeat(64)),
        expires_at: now + Duration::minutes(15),
        created_at: now,
    })
    .unwrap();

    audit.record(AuditEvent::new("login").user(user.id));
    audit.record(AuditEvent::new("profile_updated").user(user.id));

    Seeded {
        db,
        engine,
        user,
        admin,
    }
}

#[test]
fn anonymize_strips_user_pii() {
    let s = seed();
    s.engine
        .anonymize(s.user.id, AnonymizeOptions::default())
        .unwrap();

    let user = s.db.get_user(s.user.id).unwrap().unwrap();
    assert!(user.email.is_none());
    assert!(user.phone.is_none());
    assert!(user.sobriety_date.is_none());
    assert!(user.display_name.as_deref().unwrap().starts_with("Anonymous_"));
    assert!(!user.show_in_directory);
    assert!(!user.show_sobriety_date);
    assert!(!user.allow_contact);
    assert!(!user.is_active);
    assert_eq!(user.notification_prefs, NotificationPrefs::muted());
    // Role is not PII and survives.
    assert_eq!(user.role, Role::Member);
    assert!(user.anonymized_at.is_some());
}

#[test]
fn sessions_are_rehashed_and_deactivated() {
    let s = seed();
    s.engine
        .anonymize(s.user.id, AnonymizeOptions::default())
        .unwrap();

    let sessions = s.db.sessions_for_user(s.user.id).unwrap();
    assert_eq!(sessions.len(), 2, "sessions still countable");
    for session in sessions {
        assert!(!session.is_active);
        // One-way re-hash of the stored hash, never cleared — the row
        // still proves a session existed.
        let device = session.device_fingerprint_hash.unwrap();
        assert_ne!(device, "d".repeat(64));
        assert_eq!(device.len(), 64);
        assert_ne!(session.origin_hash.unwrap(), "o".repeat(64));
    }
}

#[test]
fn attendance_is_severed_with_fresh_labels() {
    let s = seed();
    s.engine
        .anonymize(s.user.id, AnonymizeOptions::default())
        .unwrap();

    assert!(s.db.attendance_for_user(s.user.id).unwrap().is_empty());

    let rows = s.db.all_attendance().unwrap();
    assert_eq!(rows.len(), 3);
    let mut labels = Vec::new();
    for row in rows {
        assert!(row.user_id.is_none());
        assert!(!row.share_attendance);
        let label = row.anonymous_label.unwrap();
        assert!(label.starts_with("attendance_"));
        labels.push(label);
    }
    labels.sort();
    labels.dedup();
    assert_eq!(labels.len(), 3, "each row gets its own fresh label");
}

#[test]
fn assignment_notes_are_redacted_but_reference_retained() {
    let s = seed();
    s.engine
        .anonymize(s.user.id, AnonymizeOptions::default())
        .unwrap();

    let assignments = s.db.assignments_for_user(s.user.id).unwrap();
    assert_eq!(assignments.len(), 1, "non-permanent run keeps the reference");
    assert_eq!(assignments[0].notes.as_deref(), Some("[redacted]"));
}

#[test]
fn magic_links_lose_destination() {
    let s = seed();
    s.engine
        .anonymize(s.user.id, AnonymizeOptions::default())
        .unwrap();

    let link = s.db.get_magic_link_by_token("seeded-link").unwrap().unwrap();
    assert!(link.email.is_none());
    assert!(link.phone.is_none());
    assert_ne!(link.used_by_origin_hash.unwrap(), "h".repeat(64));
}

#[test]
fn preserve_audit_keeps_rows_queryable_by_user() {
    let s = seed();
    s.engine
        .anonymize(
            s.user.id,
            AnonymizeOptions {
                preserve_audit: true,
                permanent: false,
            },
        )
        .unwrap();

    let entries = s.db.audit_entries_for_user(s.user.id).unwrap();
    assert!(entries.iter().any(|e| e.action == "login"));
    assert!(entries.iter().any(|e| e.action == "user_anonymized"));
}

#[test]
fn discarding_audit_severs_every_row() {
    let s = seed();
    s.engine
        .anonymize(
            s.user.id,
            AnonymizeOptions {
                preserve_audit: false,
                permanent: false,
            },
        )
        .unwrap();

    assert!(
        s.db.audit_entries_for_user(s.user.id).unwrap().is_empty(),
        "no audit row may retain the user id"
    );
}

#[test]
fn anonymize_is_idempotent() {
    let s = seed();
    let opts = AnonymizeOptions::default();

    let first = s.engine.anonymize(s.user.id, opts).unwrap();
    assert!(!first.already_anonymized);

    let user_after_first = s.db.get_user(s.user.id).unwrap().unwrap();
    let attendance_after_first: Vec<_> = s
        .db
        .all_attendance()
        .unwrap()
        .into_iter()
        .map(|a| a.anonymous_label)
        .collect();
    let audit_after_first = s.db.audit_entries_for_user(s.user.id).unwrap().len();

    let second = s.engine.anonymize(s.user.id, opts).unwrap();
    assert!(second.already_anonymized);

    let user_after_second = s.db.get_user(s.user.id).unwrap().unwrap();
    assert_eq!(user_after_first.display_name, user_after_second.display_name);
    assert_eq!(user_after_first.anonymized_at, user_after_second.anonymized_at);

    let attendance_after_second: Vec<_> = s
        .db
        .all_attendance()
        .unwrap()
        .into_iter()
        .map(|a| a.anonymous_label)
        .collect();
    assert_eq!(attendance_after_first, attendance_after_second);
    assert_eq!(
        audit_after_first,
        s.db.audit_entries_for_user(s.user.id).unwrap().len()
    );
}

#[test]
fn permanent_delete_removes_user_and_severs_everything() {
    let s = seed();
    let outcome = s
        .engine
        .anonymize(
            s.user.id,
            AnonymizeOptions {
                preserve_audit: true,
                permanent: true,
            },
        )
        .unwrap();
    assert!(outcome.user_deleted);

    assert!(s.db.get_user(s.user.id).unwrap().is_none());

    // Three attendance rows survive, severed, each with a fresh label.
    let rows = s.db.all_attendance().unwrap();
    assert_eq!(rows.len(), 3);
    for row in &rows {
        assert!(row.user_id.is_none());
        assert!(row.anonymous_label.is_some());
    }

    // Assignment reference severed on hard delete.
    assert!(s.db.assignments_for_user(s.user.id).unwrap().is_empty());

    // Audit rows survive but no longer point at the vanished id.
    assert!(s.db.audit_entries_for_user(s.user.id).unwrap().is_empty());

    // Admin untouched.
    assert!(s.db.get_user(s.admin.id).unwrap().is_some());
}

#[test]
fn permanent_delete_severs_creator_references() {
    let s = seed();
    // The admin created the target's assignment; deleting the admin
    // must not leave a dangling created_by.
    s.engine
        .anonymize(
            s.admin.id,
            AnonymizeOptions {
                preserve_audit: true,
                permanent: true,
            },
        )
        .unwrap();

    let assignments = s.db.assignments_for_user(s.user.id).unwrap();
    assert_eq!(assignments.len(), 1);
    assert!(assignments[0].created_by.is_none());
}

#[test]
fn unknown_user_is_not_found() {
    let s = seed();
    assert!(matches!(
        s.engine.anonymize(Uuid::new_v4(), AnonymizeOptions::default()),
        Err(RefugeError::NotFound { .. })
    ));
}

#[test]
fn hard_delete_after_anonymize_still_succeeds() {
    let s = seed();
    s.engine
        .anonymize(s.user.id, AnonymizeOptions::default())
        .unwrap();
    let outcome = s
        .engine
        .anonymize(
            s.user.id,
            AnonymizeOptions {
                preserve_audit: true,
                permanent: true,
            },
        )
        .unwrap();

    assert!(outcome.already_anonymized);
    assert!(outcome.user_deleted);
    assert!(s.db.get_user(s.user.id).unwrap().is_none());
}
