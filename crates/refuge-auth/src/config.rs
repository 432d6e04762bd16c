/// Authentication configuration, passed explicitly to every service
/// constructor. No process-wide settings object exists.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for access and refresh token signatures.
    pub jwt_secret: String,
    /// Access token lifetime. The session record's expiry tracks this.
    pub access_ttl_secs: u64,
    /// Refresh token lifetime.
    pub refresh_ttl_secs: u64,
    /// Magic link lifetime.
    pub magic_link_ttl_secs: u64,
    /// Cooldown between link requests for the same destination.
    pub magic_link_cooldown_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret-change-me".to_string(),
            access_ttl_secs: 30 * 60,
            refresh_ttl_secs: 7 * 24 * 60 * 60,
            magic_link_ttl_secs: 15 * 60,
            magic_link_cooldown_secs: 5 * 60,
        }
    }
}
