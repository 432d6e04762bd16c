//! Session lifecycle: issuance, rotation, invalidation.
//!
//! Per session: Active → Expired (time-based, read-checked) →
//! Invalidated (explicit, terminal). Nothing reactivates a session.

use std::sync::Arc;

use chrono::{Duration, Utc};
use refuge_db::Database;
use refuge_privacy::hash;
use refuge_types::api::TokenKind;
use refuge_types::error::{RefugeError, RefugeResult};
use refuge_types::models::{DeviceInfo, LoginSession};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::token;

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub session_id: Uuid,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

#[derive(Clone)]
pub struct SessionManager {
    db: Arc<Database>,
    config: AuthConfig,
}

impl SessionManager {
    pub fn new(db: Arc<Database>, config: AuthConfig) -> Self {
        Self { db, config }
    }

    /// Create a session and issue its first token pair. Device details
    /// are hashed here — the raw values never reach the store.
    pub fn create_session(
        &self,
        user_id: Uuid,
        device: &DeviceInfo,
    ) -> RefugeResult<SessionTokens> {
        let now = Utc::now();
        let session = LoginSession {
            id: Uuid::new_v4(),
            user_id: Some(user_id),
            token_version: 0,
            device_fingerprint_hash: fingerprint(device),
            user_agent_hash: device.user_agent.as_deref().map(hash::sha256_hex),
            origin_hash: device.origin.as_deref().map(hash::sha256_hex),
            is_active: true,
            expires_at: now + Duration::seconds(self.config.access_ttl_secs as i64),
            last_activity: now,
            created_at: now,
        };
        self.db.insert_session(&session)?;

        self.issue_pair(user_id, session.id, 0)
    }

    /// Rotate a pair. The compare-and-set on the session's token
    /// version guarantees that of two concurrent refreshes carrying the
    /// same token, exactly one wins; the loser (and any replay of the
    /// pre-rotation pair) observes Unauthorized. The session id never
    /// changes.
    pub fn refresh(&self, refresh_token: &str) -> RefugeResult<SessionTokens> {
        let claims = token::decode(refresh_token, TokenKind::Refresh, &self.config)?;
        let now = Utc::now();

        let session = self
            .db
            .get_session(claims.sid)?
            .ok_or(RefugeError::Unauthorized)?;
        if !session.is_active || session.expires_at <= now {
            return Err(RefugeError::Unauthorized);
        }

        let user_id = session.user_id.ok_or(RefugeError::Unauthorized)?;
        let user = self
            .db
            .get_user(user_id)?
            .ok_or(RefugeError::Unauthorized)?;
        if !user.is_active {
            return Err(RefugeError::Unauthorized);
        }

        let new_expiry = now + Duration::seconds(self.config.access_ttl_secs as i64);
        if !self
            .db
            .rotate_session(session.id, claims.ver, new_expiry, now)?
        {
            return Err(RefugeError::Unauthorized);
        }

        self.issue_pair(user_id, session.id, claims.ver + 1)
    }

    /// Idempotent.
    pub fn invalidate(&self, session_id: Uuid) -> RefugeResult<()> {
        self.db.deactivate_session(session_id)?;
        Ok(())
    }

    /// Idempotent. Used on logout, account deletion, and anonymization.
    pub fn invalidate_all_for_user(&self, user_id: Uuid) -> RefugeResult<usize> {
        Ok(self.db.deactivate_sessions_for_user(user_id)?)
    }

    /// Sweep sessions whose expiry has passed. Returns how many were
    /// deactivated.
    pub fn cleanup_expired(&self) -> RefugeResult<usize> {
        Ok(self.db.deactivate_expired_sessions(Utc::now())?)
    }

    fn issue_pair(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        version: i64,
    ) -> RefugeResult<SessionTokens> {
        let access_token =
            token::issue(user_id, session_id, version, TokenKind::Access, &self.config)?;
        let refresh_token =
            token::issue(user_id, session_id, version, TokenKind::Refresh, &self.config)?;
        Ok(SessionTokens {
            access_token,
            refresh_token,
            session_id,
            expires_in: self.config.access_ttl_secs,
        })
    }
}

/// Combined device fingerprint over origin and user agent. `None` when
/// neither is present.
fn fingerprint(device: &DeviceInfo) -> Option<String> {
    if device.origin.is_none() && device.user_agent.is_none() {
        return None;
    }
    let raw = format!(
        "{}|{}",
        device.origin.as_deref().unwrap_or(""),
        device.user_agent.as_deref().unwrap_or("")
    );
    Some(hash::sha256_hex(&raw))
}
