//! Passwordless login: single-use magic link issuance and redemption.

use std::sync::Arc;

use chrono::{Duration, Utc};
use refuge_db::Database;
use refuge_privacy::audit::{AuditEvent, AuditRecorder};
use refuge_privacy::hash;
use refuge_types::error::{RefugeError, RefugeResult};
use refuge_types::models::{
    Destination, DeviceInfo, MagicLink, MagicLinkPurpose, NotificationPrefs, Role, User,
};
use tracing::warn;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::notify::Notifier;
use crate::session::{SessionManager, SessionTokens};
use crate::token;

/// Result of requesting a link.
#[derive(Debug, Clone, Copy)]
pub struct IssuedLink {
    /// Seconds until the link expires.
    pub expires_in: u64,
}

/// Result of a successful redemption.
#[derive(Debug, Clone)]
pub struct VerifiedLogin {
    pub user: User,
    pub tokens: SessionTokens,
}

#[derive(Clone)]
pub struct MagicLinkService {
    db: Arc<Database>,
    sessions: SessionManager,
    notifier: Arc<dyn Notifier>,
    audit: AuditRecorder,
    config: AuthConfig,
}

impl MagicLinkService {
    pub fn new(
        db: Arc<Database>,
        sessions: SessionManager,
        notifier: Arc<dyn Notifier>,
        audit: AuditRecorder,
        config: AuthConfig,
    ) -> Self {
        Self {
            db,
            sessions,
            notifier,
            audit,
            config,
        }
    }

    /// Issue a link for a destination. Rejected with RateLimited while
    /// an unused, unexpired link for the same destination sits inside
    /// the cooldown window. The cooldown check is advisory — a race may
    /// let a near-simultaneous duplicate through, but never an expired
    /// or used link.
    pub fn request(
        &self,
        destination: &Destination,
        purpose: MagicLinkPurpose,
        device: &DeviceInfo,
    ) -> RefugeResult<IssuedLink> {
        let now = Utc::now();
        let cooldown = self.config.magic_link_cooldown_secs as i64;

        if let Some(created) = self.db.latest_pending_link_at(destination, now)? {
            let elapsed = (now - created).num_seconds();
            if elapsed < cooldown {
                return Err(RefugeError::RateLimited {
                    retry_after_secs: cooldown - elapsed,
                });
            }
        }

        let raw = token::generate_link_token();
        let link = MagicLink {
            id: Uuid::new_v4(),
            token: raw.clone(),
            email: destination.email().map(str::to_string),
            phone: destination.phone().map(str::to_string),
            purpose,
            is_used: false,
            used_at: None,
            used_by_origin_hash: None,
            expires_at: now + Duration::seconds(self.config.magic_link_ttl_secs as i64),
            created_at: now,
        };
        self.db.insert_magic_link(&link)?;

        // The link is committed; delivery failure must not unwind it.
        if let Err(err) = self.notifier.send(&raw, destination, purpose) {
            warn!(channel = %destination, %err, "magic link delivery failed");
        }

        self.audit.record(
            AuditEvent::new("magic_link_requested")
                .origin(device.origin.as_deref().map(hash::sha256_hex)),
        );

        Ok(IssuedLink {
            expires_in: self.config.magic_link_ttl_secs,
        })
    }

    /// Redeem a link. The compare-and-set on the used flag is the
    /// central correctness property here: two concurrent redemptions of
    /// the same token yield exactly one session — the loser observes
    /// Invalid, never a duplicate.
    pub fn verify(&self, raw_token: &str, device: &DeviceInfo) -> RefugeResult<VerifiedLogin> {
        let now = Utc::now();
        let origin_hash = device.origin.as_deref().map(hash::sha256_hex);

        let link = self
            .db
            .get_magic_link_by_token(raw_token)?
            .ok_or(RefugeError::Invalid)?;

        // A reset link is a capability for a different flow; it never
        // grants a session.
        if !link.purpose.grants_login() {
            return Err(RefugeError::Invalid);
        }

        // Used, expired, or lost the race — all collapse to Invalid.
        if !self
            .db
            .mark_magic_link_used(link.id, now, origin_hash.as_deref())?
        {
            return Err(RefugeError::Invalid);
        }

        let destination = match (&link.email, &link.phone) {
            (Some(email), _) => Destination::Email(email.clone()),
            (_, Some(phone)) => Destination::Phone(phone.clone()),
            (None, None) => return Err(RefugeError::Invalid),
        };

        let mut user = self.resolve_or_create_user(&destination, now)?;
        if !user.is_active {
            return Err(RefugeError::Unauthorized);
        }

        match destination {
            Destination::Email(_) if !user.email_verified => user.email_verified = true,
            Destination::Phone(_) if !user.phone_verified => user.phone_verified = true,
            _ => {}
        }
        user.last_login = Some(now);
        self.db.update_user(&user)?;

        let tokens = self.sessions.create_session(user.id, device)?;

        self.audit
            .record(AuditEvent::new("login").user(user.id).origin(origin_hash));

        Ok(VerifiedLogin { user, tokens })
    }

    fn resolve_or_create_user(
        &self,
        destination: &Destination,
        now: chrono::DateTime<Utc>,
    ) -> RefugeResult<User> {
        let existing = match destination {
            Destination::Email(email) => self.db.get_user_by_email(email)?,
            Destination::Phone(phone) => self.db.get_user_by_phone(phone)?,
        };
        if let Some(user) = existing {
            return Ok(user);
        }

        let user = User {
            id: Uuid::new_v4(),
            email: destination.email().map(str::to_string),
            email_verified: false,
            phone: destination.phone().map(str::to_string),
            phone_verified: false,
            display_name: None,
            sobriety_date: None,
            role: Role::Guest,
            is_active: true,
            is_verified: false,
            show_in_directory: true,
            show_sobriety_date: false,
            allow_contact: false,
            notification_prefs: NotificationPrefs::default(),
            anonymized_at: None,
            created_at: now,
            updated_at: None,
            last_login: None,
        };
        self.db.insert_user(&user)?;
        Ok(user)
    }
}
