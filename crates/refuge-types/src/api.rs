use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    MagicLinkPurpose, NotificationPrefs, Role, ServicePosition, User,
};

// -- JWT Claims --

/// Which half of a token pair a JWT is. The discriminator is embedded
/// in the claims so an access token can never be replayed as a refresh
/// token or vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims shared by access and refresh tokens. Canonical definition
/// lives here so the auth and api crates agree on the shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — user id.
    pub sub: Uuid,
    /// Session id the pair is bound to.
    pub sid: Uuid,
    /// Session rotation counter at issue time.
    pub ver: i64,
    /// `access` or `refresh`.
    pub typ: TokenKind,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MagicLinkRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default = "default_purpose")]
    pub purpose: MagicLinkPurpose,
}

fn default_purpose() -> MagicLinkPurpose {
    MagicLinkPurpose::Login
}

#[derive(Debug, Serialize)]
pub struct MagicLinkResponse {
    pub message: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MagicLinkVerifyRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenRefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: ProfileResponse,
}

/// Rotation result: a fresh pair, same session.
#[derive(Debug, Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

// -- Profile --

/// A user's own view of their account. Full detail — privacy toggles
/// only shape what *others* see.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: Option<String>,
    pub email_verified: bool,
    pub phone: Option<String>,
    pub phone_verified: bool,
    pub display_name: Option<String>,
    pub sobriety_date: Option<DateTime<Utc>>,
    pub role: Role,
    pub is_active: bool,
    pub is_verified: bool,
    pub show_in_directory: bool,
    pub show_sobriety_date: bool,
    pub allow_contact: bool,
    pub notification_prefs: NotificationPrefs,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for ProfileResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            email_verified: user.email_verified,
            phone: user.phone.clone(),
            phone_verified: user.phone_verified,
            display_name: user.display_name.clone(),
            sobriety_date: user.sobriety_date,
            role: user.role,
            is_active: user.is_active,
            is_verified: user.is_verified,
            show_in_directory: user.show_in_directory,
            show_sobriety_date: user.show_sobriety_date,
            allow_contact: user.allow_contact,
            notification_prefs: user.notification_prefs.clone(),
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub sobriety_date: Option<DateTime<Utc>>,
    pub show_in_directory: Option<bool>,
    pub show_sobriety_date: Option<bool>,
    pub allow_contact: Option<bool>,
    pub notification_prefs: Option<NotificationPrefs>,
}

// -- Directory --

/// What other members may see. Shaped by the owner's privacy toggles
/// before it leaves the server.
#[derive(Debug, Serialize)]
pub struct DirectoryEntry {
    pub id: Uuid,
    pub display_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sobriety_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sobriety_days: Option<i64>,
    pub contact_allowed: bool,
}

// -- Admin --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminCreateUserRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteUserRequest {
    #[serde(default)]
    pub permanent: bool,
    #[serde(default = "default_true")]
    pub preserve_audit: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnonymizeRequest {
    #[serde(default = "default_true")]
    pub preserve_audit: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAssignmentRequest {
    pub position: ServicePosition,
    pub group_id: Option<Uuid>,
    pub meeting_id: Option<Uuid>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub position: ServicePosition,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
}

// -- Privacy report --

/// Per-table counts of rows still referencing a user.
#[derive(Debug, Serialize)]
pub struct DataRetention {
    pub audit_logs: u64,
    pub login_sessions: u64,
    pub meeting_attendance: u64,
    pub service_assignments: u64,
}

#[derive(Debug, Serialize)]
pub struct PrivacyReport {
    pub user_id: Uuid,
    pub privacy_score: u32,
    pub max_score: u32,
    pub privacy_level: String,
    pub data_retention: DataRetention,
}

// -- Generic --

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
