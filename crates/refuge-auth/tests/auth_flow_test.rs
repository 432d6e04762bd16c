//! End-to-end flows over an in-memory store: link issuance, redemption
//! races, token rotation, and guard behavior.

use std::sync::{Arc, Barrier, Mutex};

use chrono::{Duration, Utc};
use refuge_auth::config::AuthConfig;
use refuge_auth::guard::{Guard, require_role};
use refuge_auth::magic_link::MagicLinkService;
use refuge_auth::notify::Notifier;
use refuge_auth::session::SessionManager;
use refuge_auth::accounts::AccountService;
use refuge_db::Database;
use refuge_privacy::audit::AuditRecorder;
use refuge_types::api::{AdminCreateUserRequest, UpdateProfileRequest};
use refuge_types::error::RefugeError;
use refuge_types::models::{
    Destination, DeviceInfo, MagicLink, MagicLinkPurpose, Role,
};
use uuid::Uuid;

/// Test notifier that remembers every token instead of delivering it.
#[derive(Default)]
struct CapturingNotifier {
    sent: Mutex<Vec<String>>,
}

impl CapturingNotifier {
    fn last_token(&self) -> String {
        self.sent.lock().unwrap().last().cloned().expect("no link sent")
    }
}

impl Notifier for CapturingNotifier {
    fn send(
        &self,
        token: &str,
        _destination: &Destination,
        _purpose: MagicLinkPurpose,
    ) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(token.to_string());
        Ok(())
    }
}

struct Harness {
    db: Arc<Database>,
    links: MagicLinkService,
    sessions: SessionManager,
    accounts: AccountService,
    guard: Guard,
    notifier: Arc<CapturingNotifier>,
}

fn harness_with_config(config: AuthConfig) -> Harness {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let audit = AuditRecorder::new(db.clone());
    let sessions = SessionManager::new(db.clone(), config.clone());
    let notifier = Arc::new(CapturingNotifier::default());
    let links = MagicLinkService::new(
        db.clone(),
        sessions.clone(),
        notifier.clone(),
        audit.clone(),
        config.clone(),
    );
    let accounts = AccountService::new(db.clone(), sessions.clone(), audit);
    let guard = Guard::new(db.clone(), config);
    Harness {
        db,
        links,
        sessions,
        accounts,
        guard,
        notifier,
    }
}

fn harness() -> Harness {
    harness_with_config(AuthConfig {
        jwt_secret: "test-secret".into(),
        ..AuthConfig::default()
    })
}

fn device() -> DeviceInfo {
    DeviceInfo {
        origin: Some("203.0.113.7".into()),
        user_agent: Some("test-agent/1.0".into()),
    }
}

fn email_dest(addr: &str) -> Destination {
    Destination::Email(addr.to_string())
}

#[test]
fn request_then_verify_creates_user_and_session() {
    let h = harness();
    let issued = h
        .links
        .request(&email_dest("a@x.com"), MagicLinkPurpose::Login, &device())
        .unwrap();
    assert_eq!(issued.expires_in, 15 * 60);

    let token = h.notifier.last_token();
    let login = h.links.verify(&token, &device()).unwrap();

    assert_eq!(login.user.email.as_deref(), Some("a@x.com"));
    assert!(login.user.email_verified);
    assert_eq!(login.user.role, Role::Guest);
    assert!(login.user.last_login.is_some());

    // The issued access token resolves back to the same user.
    let resolved = h.guard.resolve(&login.tokens.access_token).unwrap();
    assert_eq!(resolved.id, login.user.id);

    // Device details land hashed, not raw.
    let sessions = h.db.sessions_for_user(login.user.id).unwrap();
    assert_eq!(sessions.len(), 1);
    let stored = sessions[0].user_agent_hash.as_deref().unwrap();
    assert_ne!(stored, "test-agent/1.0");
    assert_eq!(stored.len(), 64);
}

#[test]
fn second_request_within_cooldown_is_rate_limited() {
    let h = harness();
    let dest = email_dest("cooldown@x.com");
    h.links
        .request(&dest, MagicLinkPurpose::Login, &device())
        .unwrap();

    match h.links.request(&dest, MagicLinkPurpose::Login, &device()) {
        Err(RefugeError::RateLimited { retry_after_secs }) => {
            assert!(retry_after_secs > 0 && retry_after_secs <= 300);
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[test]
fn unknown_token_is_invalid() {
    let h = harness();
    assert!(matches!(
        h.links.verify("no-such-token", &device()),
        Err(RefugeError::Invalid)
    ));
}

#[test]
fn expired_link_is_invalid() {
    let h = harness();
    let link = MagicLink {
        id: Uuid::new_v4(),
        token: "expired-link-token".into(),
        email: Some("late@x.com".into()),
        phone: None,
        purpose: MagicLinkPurpose::Login,
        is_used: false,
        used_at: None,
        used_by_origin_hash: None,
        expires_at: Utc::now() - Duration::minutes(1),
        created_at: Utc::now() - Duration::minutes(16),
    };
    h.db.insert_magic_link(&link).unwrap();

    assert!(matches!(
        h.links.verify("expired-link-token", &device()),
        Err(RefugeError::Invalid)
    ));
}

#[test]
fn used_link_is_invalid_on_second_redemption() {
    let h = harness();
    h.links
        .request(&email_dest("once@x.com"), MagicLinkPurpose::Login, &device())
        .unwrap();
    let token = h.notifier.last_token();

    h.links.verify(&token, &device()).unwrap();
    assert!(matches!(
        h.links.verify(&token, &device()),
        Err(RefugeError::Invalid)
    ));
}

#[test]
fn concurrent_redemption_has_exactly_one_winner() {
    let h = harness();
    h.links
        .request(&email_dest("race@x.com"), MagicLinkPurpose::Login, &device())
        .unwrap();
    let token = h.notifier.last_token();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let links = h.links.clone();
            let token = token.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                links.verify(&token, &DeviceInfo::default())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|j| j.join().unwrap()).collect();
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one concurrent redemption must succeed");
    assert!(
        results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(RefugeError::Invalid)))
    );
}

#[test]
fn reset_link_never_grants_login() {
    let h = harness();
    h.links
        .request(&email_dest("reset@x.com"), MagicLinkPurpose::Reset, &device())
        .unwrap();
    let token = h.notifier.last_token();

    assert!(matches!(
        h.links.verify(&token, &device()),
        Err(RefugeError::Invalid)
    ));

    // Rejection must not consume the link.
    let link = h.db.get_magic_link_by_token(&token).unwrap().unwrap();
    assert!(!link.is_used);
}

#[test]
fn refresh_rotates_pair_and_keeps_session_id() {
    let h = harness();
    h.links
        .request(&email_dest("r@x.com"), MagicLinkPurpose::Login, &device())
        .unwrap();
    let login = h.links.verify(&h.notifier.last_token(), &device()).unwrap();

    let rotated = h.sessions.refresh(&login.tokens.refresh_token).unwrap();
    assert_eq!(rotated.session_id, login.tokens.session_id);
    assert_ne!(rotated.refresh_token, login.tokens.refresh_token);

    // The pre-rotation pair is spent as a refresh input.
    assert!(matches!(
        h.sessions.refresh(&login.tokens.refresh_token),
        Err(RefugeError::Unauthorized)
    ));

    // The rotated pair still works.
    h.sessions.refresh(&rotated.refresh_token).unwrap();
}

#[test]
fn access_token_is_not_a_refresh_token() {
    let h = harness();
    h.links
        .request(&email_dest("t@x.com"), MagicLinkPurpose::Login, &device())
        .unwrap();
    let login = h.links.verify(&h.notifier.last_token(), &device()).unwrap();

    assert!(matches!(
        h.sessions.refresh(&login.tokens.access_token),
        Err(RefugeError::Unauthorized)
    ));
}

#[test]
fn logout_invalidates_every_session() {
    let h = harness();
    h.links
        .request(&email_dest("out@x.com"), MagicLinkPurpose::Login, &device())
        .unwrap();
    let login = h.links.verify(&h.notifier.last_token(), &device()).unwrap();

    let count = h.sessions.invalidate_all_for_user(login.user.id).unwrap();
    assert_eq!(count, 1);
    assert!(matches!(
        h.sessions.refresh(&login.tokens.refresh_token),
        Err(RefugeError::Unauthorized)
    ));

    // Invalidation is idempotent.
    assert_eq!(h.sessions.invalidate_all_for_user(login.user.id).unwrap(), 0);
}

#[test]
fn expired_session_cannot_refresh() {
    let h = harness_with_config(AuthConfig {
        jwt_secret: "test-secret".into(),
        access_ttl_secs: 0,
        ..AuthConfig::default()
    });
    h.links
        .request(&email_dest("exp@x.com"), MagicLinkPurpose::Login, &device())
        .unwrap();
    let login = h.links.verify(&h.notifier.last_token(), &device()).unwrap();

    assert!(matches!(
        h.sessions.refresh(&login.tokens.refresh_token),
        Err(RefugeError::Unauthorized)
    ));
}

#[test]
fn cleanup_deactivates_expired_sessions() {
    let h = harness_with_config(AuthConfig {
        jwt_secret: "test-secret".into(),
        access_ttl_secs: 0,
        ..AuthConfig::default()
    });
    h.links
        .request(&email_dest("sweep@x.com"), MagicLinkPurpose::Login, &device())
        .unwrap();
    let login = h.links.verify(&h.notifier.last_token(), &device()).unwrap();

    assert_eq!(h.sessions.cleanup_expired().unwrap(), 1);
    let sessions = h.db.sessions_for_user(login.user.id).unwrap();
    assert!(!sessions[0].is_active);
}

#[test]
fn anonymous_account_defaults() {
    let h = harness();
    let login = h.accounts.create_anonymous_account(&device()).unwrap();

    assert_eq!(login.user.role, Role::Anonymous);
    assert!(!login.user.show_in_directory);
    assert!(!login.user.allow_contact);
    assert!(login.user.email.is_none());
    assert!(login.user.phone.is_none());
    assert!(
        login
            .user
            .display_name
            .as_deref()
            .unwrap()
            .starts_with("Anonymous_")
    );

    // Immediately usable session.
    let resolved = h.guard.resolve(&login.tokens.access_token).unwrap();
    assert_eq!(resolved.role, Role::Anonymous);
}

#[test]
fn guard_rejects_deactivated_user() {
    let h = harness();
    h.links
        .request(&email_dest("gone@x.com"), MagicLinkPurpose::Login, &device())
        .unwrap();
    let login = h.links.verify(&h.notifier.last_token(), &device()).unwrap();

    h.accounts
        .deactivate_account(login.user.clone(), false)
        .unwrap();

    assert!(matches!(
        h.guard.resolve(&login.tokens.access_token),
        Err(RefugeError::Unauthorized)
    ));
}

#[test]
fn role_whitelist_is_exact() {
    let h = harness();
    h.links
        .request(&email_dest("m@x.com"), MagicLinkPurpose::Login, &device())
        .unwrap();
    let login = h.links.verify(&h.notifier.last_token(), &device()).unwrap();

    // Freshly created via magic link → guest, not in {admin, secretary}.
    assert!(matches!(
        require_role(&login.user, &[Role::Admin, Role::Secretary]),
        Err(RefugeError::Forbidden)
    ));
}

#[test]
fn duplicate_email_is_a_conflict() {
    let h = harness();
    let admin_id = Uuid::new_v4();
    let req = AdminCreateUserRequest {
        email: Some("dup@x.com".into()),
        phone: None,
        display_name: None,
        role: Some(Role::Member),
    };
    h.accounts.create_user(&req, admin_id).unwrap();

    assert!(matches!(
        h.accounts.create_user(&req, admin_id),
        Err(RefugeError::Conflict(_))
    ));
}

#[test]
fn duplicate_active_assignment_is_a_conflict() {
    let h = harness();
    let admin_id = Uuid::new_v4();
    let user = h
        .accounts
        .create_user(
            &AdminCreateUserRequest {
                email: Some("srv@x.com".into()),
                phone: None,
                display_name: None,
                role: Some(Role::Member),
            },
            admin_id,
        )
        .unwrap();

    let req = refuge_types::api::CreateAssignmentRequest {
        position: refuge_types::models::ServicePosition::Treasurer,
        group_id: None,
        meeting_id: None,
        start_date: Utc::now(),
        end_date: None,
        notes: Some("handles the seventh tradition".into()),
    };
    h.accounts.create_assignment(user.id, &req, admin_id).unwrap();

    assert!(matches!(
        h.accounts.create_assignment(user.id, &req, admin_id),
        Err(RefugeError::Conflict(_))
    ));
}

#[test]
fn profile_update_persists_privacy_toggles() {
    let h = harness();
    h.links
        .request(&email_dest("p@x.com"), MagicLinkPurpose::Login, &device())
        .unwrap();
    let login = h.links.verify(&h.notifier.last_token(), &device()).unwrap();

    let req = UpdateProfileRequest {
        display_name: Some("River".into()),
        show_in_directory: Some(false),
        allow_contact: Some(true),
        ..UpdateProfileRequest::default()
    };
    let updated = h.accounts.update_profile(login.user, &req).unwrap();
    assert_eq!(updated.display_name.as_deref(), Some("River"));
    assert!(!updated.show_in_directory);

    let loaded = h.db.get_user(updated.id).unwrap().unwrap();
    assert!(!loaded.show_in_directory);
    assert!(loaded.allow_contact);
    assert!(loaded.updated_at.is_some());
}

#[test]
fn login_writes_audit_trail() {
    let h = harness();
    h.links
        .request(&email_dest("audit@x.com"), MagicLinkPurpose::Login, &device())
        .unwrap();
    let login = h.links.verify(&h.notifier.last_token(), &device()).unwrap();

    let entries = h.db.audit_entries_for_user(login.user.id).unwrap();
    assert!(entries.iter().any(|e| e.action == "login" && e.success));
    // The origin is recorded only as a hash.
    let login_entry = entries.iter().find(|e| e.action == "login").unwrap();
    let origin = login_entry.origin_hash.as_deref().unwrap();
    assert_ne!(origin, "203.0.113.7");
    assert_eq!(origin.len(), 64);
}
