//! Bearer-token resolution and role gating.

use std::sync::Arc;

use refuge_db::Database;
use refuge_types::api::TokenKind;
use refuge_types::error::{RefugeError, RefugeResult};
use refuge_types::models::{Role, User};

use crate::config::AuthConfig;
use crate::token;

#[derive(Clone)]
pub struct Guard {
    db: Arc<Database>,
    config: AuthConfig,
}

impl Guard {
    pub fn new(db: Arc<Database>, config: AuthConfig) -> Self {
        Self { db, config }
    }

    /// Resolve a bearer token to its active user. Anything short of a
    /// valid, unexpired access token bound to an existing, active user
    /// is Unauthorized.
    pub fn resolve(&self, bearer: &str) -> RefugeResult<User> {
        let claims = token::decode(bearer, TokenKind::Access, &self.config)?;
        let user = self
            .db
            .get_user(claims.sub)?
            .ok_or(RefugeError::Unauthorized)?;
        if !user.is_active {
            return Err(RefugeError::Unauthorized);
        }
        Ok(user)
    }
}

/// Whitelist check. Every gated operation names its exact allowed set —
/// roles are never inferred from a hierarchy, so a role absent from the
/// list is Forbidden no matter how privileged it looks.
pub fn require_role(user: &User, allowed: &[Role]) -> RefugeResult<()> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(RefugeError::Forbidden)
    }
}
