use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Roles a user can hold. Authorization is whitelist-based — every
/// gated operation names the exact set of roles it accepts, so there is
/// no implied hierarchy between these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Anonymous,
    Guest,
    Member,
    Secretary,
    Treasurer,
    Host,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Anonymous => "anonymous",
            Role::Guest => "guest",
            Role::Member => "member",
            Role::Secretary => "secretary",
            Role::Treasurer => "treasurer",
            Role::Host => "host",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anonymous" => Ok(Role::Anonymous),
            "guest" => Ok(Role::Guest),
            "member" => Ok(Role::Member),
            "secretary" => Ok(Role::Secretary),
            "treasurer" => Ok(Role::Treasurer),
            "host" => Ok(Role::Host),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service positions within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServicePosition {
    Chairperson,
    Secretary,
    Treasurer,
    Chair,
    CoChair,
    Host,
    CoHost,
    TechHost,
    Literature,
    Outreach,
    TwelfthStep,
}

impl ServicePosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServicePosition::Chairperson => "chairperson",
            ServicePosition::Secretary => "secretary",
            ServicePosition::Treasurer => "treasurer",
            ServicePosition::Chair => "chair",
            ServicePosition::CoChair => "co_chair",
            ServicePosition::Host => "host",
            ServicePosition::CoHost => "co_host",
            ServicePosition::TechHost => "tech_host",
            ServicePosition::Literature => "literature",
            ServicePosition::Outreach => "outreach",
            ServicePosition::TwelfthStep => "twelfth_step",
        }
    }
}

impl FromStr for ServicePosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chairperson" => Ok(ServicePosition::Chairperson),
            "secretary" => Ok(ServicePosition::Secretary),
            "treasurer" => Ok(ServicePosition::Treasurer),
            "chair" => Ok(ServicePosition::Chair),
            "co_chair" => Ok(ServicePosition::CoChair),
            "host" => Ok(ServicePosition::Host),
            "co_host" => Ok(ServicePosition::CoHost),
            "tech_host" => Ok(ServicePosition::TechHost),
            "literature" => Ok(ServicePosition::Literature),
            "outreach" => Ok(ServicePosition::Outreach),
            "twelfth_step" => Ok(ServicePosition::TwelfthStep),
            other => Err(format!("unknown service position: {other}")),
        }
    }
}

impl fmt::Display for ServicePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a magic link is for. A `Reset` link can never be redeemed for a
/// login session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagicLinkPurpose {
    Login,
    VerifyEmail,
    VerifyPhone,
    Reset,
}

impl MagicLinkPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            MagicLinkPurpose::Login => "login",
            MagicLinkPurpose::VerifyEmail => "verify_email",
            MagicLinkPurpose::VerifyPhone => "verify_phone",
            MagicLinkPurpose::Reset => "reset",
        }
    }

    /// Whether redeeming a link of this purpose may establish a session.
    pub fn grants_login(&self) -> bool {
        !matches!(self, MagicLinkPurpose::Reset)
    }
}

impl FromStr for MagicLinkPurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(MagicLinkPurpose::Login),
            "verify_email" => Ok(MagicLinkPurpose::VerifyEmail),
            "verify_phone" => Ok(MagicLinkPurpose::VerifyPhone),
            "reset" => Ok(MagicLinkPurpose::Reset),
            other => Err(format!("unknown magic link purpose: {other}")),
        }
    }
}

/// Where a magic link is delivered. Exactly one of email or phone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Email(String),
    Phone(String),
}

impl Destination {
    pub fn email(&self) -> Option<&str> {
        match self {
            Destination::Email(e) => Some(e),
            Destination::Phone(_) => None,
        }
    }

    pub fn phone(&self) -> Option<&str> {
        match self {
            Destination::Phone(p) => Some(p),
            Destination::Email(_) => None,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Email(_) => f.write_str("email"),
            Destination::Phone(_) => f.write_str("phone"),
        }
    }
}

/// Per-user notification channel toggles, stored as a JSON map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPrefs {
    pub email_notifications: bool,
    pub meeting_reminders: bool,
    pub service_updates: bool,
    pub marketing: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            email_notifications: true,
            meeting_reminders: true,
            service_updates: false,
            marketing: false,
        }
    }
}

impl NotificationPrefs {
    /// Defaults for anonymous accounts — no outbound channels except
    /// meeting reminders.
    pub fn anonymous() -> Self {
        Self {
            email_notifications: false,
            meeting_reminders: true,
            service_updates: false,
            marketing: false,
        }
    }

    /// Everything off. Applied during anonymization.
    pub fn muted() -> Self {
        Self {
            email_notifications: false,
            meeting_reminders: false,
            service_updates: false,
            marketing: false,
        }
    }
}

/// A member account. Email and phone are both optional — anonymous
/// accounts carry neither. The display name is never required to be a
/// real name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
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
    pub anonymized_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Single-use passwordless login token. Transitions Pending → Used
/// exactly once, or Pending → Expired by time. Never revived.
#[derive(Debug, Clone)]
pub struct MagicLink {
    pub id: Uuid,
    pub token: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub purpose: MagicLinkPurpose,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by_origin_hash: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A live authentication context. Device details are hashed before they
/// ever reach storage — the raw values are never persisted.
///
/// `token_version` is the rotation counter: the current access/refresh
/// pair embeds it, and a refresh bumps it atomically so that exactly
/// one valid pair exists per session at any time.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub token_version: i64,
    pub device_fingerprint_hash: Option<String>,
    pub user_agent_hash: Option<String>,
    pub origin_hash: Option<String>,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit fact. `user_id` is a weak back-reference — it is
/// nulled by anonymization severance but the row itself is never
/// deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub success: bool,
    pub origin_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Optional meeting attendance record. `user_id` is nullable so the row
/// survives anonymization with only a fresh anonymous label.
#[derive(Debug, Clone)]
pub struct MeetingAttendance {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub meeting_id: Uuid,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub anonymous_label: Option<String>,
    pub share_attendance: bool,
    pub created_at: DateTime<Utc>,
}

/// Service position assignment. At most one active assignment per
/// (user, position).
#[derive(Debug, Clone)]
pub struct ServiceAssignment {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub position: ServicePosition,
    pub group_id: Option<Uuid>,
    pub meeting_id: Option<Uuid>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Raw request context captured at login. Only hashes of these values
/// are persisted.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub origin: Option<String>,
    pub user_agent: Option<String>,
}
