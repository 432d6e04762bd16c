//! Signed token pairs and opaque magic-link token generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use refuge_types::api::{Claims, TokenKind};
use refuge_types::error::{RefugeError, RefugeResult};
use uuid::Uuid;

use crate::config::AuthConfig;

/// Issue one signed HS256 token of the given kind, bound to a user,
/// session, and rotation version.
pub fn issue(
    user_id: Uuid,
    session_id: Uuid,
    version: i64,
    kind: TokenKind,
    config: &AuthConfig,
) -> RefugeResult<String> {
    let now = Utc::now().timestamp();
    let ttl = match kind {
        TokenKind::Access => config.access_ttl_secs,
        TokenKind::Refresh => config.refresh_ttl_secs,
    };
    let claims = Claims {
        sub: user_id,
        sid: session_id,
        ver: version,
        typ: kind,
        iat: now,
        exp: now + ttl as i64,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| RefugeError::Internal(format!("token encode: {e}")))
}

/// Verify signature and expiry, then require the expected kind — an
/// access token presented where a refresh token belongs (or the other
/// way round) is rejected outright.
pub fn decode(token: &str, expected: TokenKind, config: &AuthConfig) -> RefugeResult<Claims> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|_| RefugeError::Unauthorized)?;

    if data.claims.typ != expected {
        return Err(RefugeError::Unauthorized);
    }
    Ok(data.claims)
}

/// Cryptographically random single-use link token
/// (32 bytes → base64url-encoded, no padding — 256 bits of entropy).
pub fn generate_link_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rand::Rng::random(&mut rng);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".into(),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn roundtrip() {
        let config = config();
        let user = Uuid::new_v4();
        let session = Uuid::new_v4();

        let token = issue(user, session, 3, TokenKind::Access, &config).unwrap();
        let claims = decode(&token, TokenKind::Access, &config).unwrap();

        assert_eq!(claims.sub, user);
        assert_eq!(claims.sid, session);
        assert_eq!(claims.ver, 3);
        assert_eq!(claims.typ, TokenKind::Access);
    }

    #[test]
    fn refresh_token_rejected_as_access() {
        let config = config();
        let token =
            issue(Uuid::new_v4(), Uuid::new_v4(), 0, TokenKind::Refresh, &config).unwrap();
        assert!(matches!(
            decode(&token, TokenKind::Access, &config),
            Err(RefugeError::Unauthorized)
        ));
    }

    #[test]
    fn access_token_rejected_as_refresh() {
        let config = config();
        let token =
            issue(Uuid::new_v4(), Uuid::new_v4(), 0, TokenKind::Access, &config).unwrap();
        assert!(matches!(
            decode(&token, TokenKind::Refresh, &config),
            Err(RefugeError::Unauthorized)
        ));
    }

    #[test]
    fn wrong_secret_rejected() {
        let config = config();
        let other = AuthConfig {
            jwt_secret: "other-secret".into(),
            ..AuthConfig::default()
        };
        let token = issue(Uuid::new_v4(), Uuid::new_v4(), 0, TokenKind::Access, &config).unwrap();
        assert!(decode(&token, TokenKind::Access, &other).is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let config = config();
        let past = Utc::now().timestamp() - 600;
        let claims = Claims {
            sub: Uuid::new_v4(),
            sid: Uuid::new_v4(),
            ver: 0,
            typ: TokenKind::Access,
            iat: past - 60,
            exp: past,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            decode(&token, TokenKind::Access, &config),
            Err(RefugeError::Unauthorized)
        ));
    }

    #[test]
    fn link_tokens_are_url_safe_and_unique() {
        let token = generate_link_token();
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(token, generate_link_token());
    }
}
