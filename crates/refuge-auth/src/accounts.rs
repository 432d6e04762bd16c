//! Account management flows that sit next to authentication: anonymous
//! self-registration, admin-created users, profile updates, and
//! soft deletion.

use std::sync::Arc;

use chrono::Utc;
use refuge_db::Database;
use refuge_privacy::audit::{AuditEvent, AuditRecorder};
use refuge_privacy::hash;
use refuge_types::api::{AdminCreateUserRequest, CreateAssignmentRequest, UpdateProfileRequest};
use refuge_types::error::{RefugeError, RefugeResult};
use refuge_types::models::{
    DeviceInfo, NotificationPrefs, Role, ServiceAssignment, User,
};
use uuid::Uuid;

use crate::magic_link::VerifiedLogin;
use crate::session::SessionManager;

#[derive(Clone)]
pub struct AccountService {
    db: Arc<Database>,
    sessions: SessionManager,
    audit: AuditRecorder,
}

impl AccountService {
    pub fn new(db: Arc<Database>, sessions: SessionManager, audit: AuditRecorder) -> Self {
        Self {
            db,
            sessions,
            audit,
        }
    }

    /// Anonymous self-registration: no email, no phone, hidden from the
    /// directory, nothing to verify. Logs the account in immediately.
    pub fn create_anonymous_account(&self, device: &DeviceInfo) -> RefugeResult<VerifiedLogin> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: None,
            email_verified: false,
            phone: None,
            phone_verified: false,
            display_name: Some(hash::anonymous_display_name()),
            sobriety_date: None,
            role: Role::Anonymous,
            is_active: true,
            is_verified: false,
            show_in_directory: false,
            show_sobriety_date: false,
            allow_contact: false,
            notification_prefs: NotificationPrefs::anonymous(),
            anonymized_at: None,
            created_at: now,
            updated_at: None,
            last_login: Some(now),
        };
        self.db.insert_user(&user)?;

        let tokens = self.sessions.create_session(user.id, device)?;

        self.audit.record(
            AuditEvent::new("anonymous_account_created")
                .user(user.id)
                .origin(device.origin.as_deref().map(hash::sha256_hex)),
        );

        Ok(VerifiedLogin { user, tokens })
    }

    /// Admin-created account with privacy-first defaults: hidden from
    /// the directory, no contact, pending verification.
    pub fn create_user(
        &self,
        req: &AdminCreateUserRequest,
        created_by: Uuid,
    ) -> RefugeResult<User> {
        if let Some(email) = req.email.as_deref() {
            if self.db.get_user_by_email(email)?.is_some() {
                return Err(RefugeError::Conflict(
                    "a user with this email already exists".into(),
                ));
            }
        }
        if let Some(phone) = req.phone.as_deref() {
            if self.db.get_user_by_phone(phone)?.is_some() {
                return Err(RefugeError::Conflict(
                    "a user with this phone already exists".into(),
                ));
            }
        }

        let display_name = req
            .display_name
            .clone()
            .unwrap_or_else(|| format!("Member_{}", hash::random_token(8)));

        let user = User {
            id: Uuid::new_v4(),
            email: req.email.clone(),
            email_verified: false,
            phone: req.phone.clone(),
            phone_verified: false,
            display_name: Some(display_name),
            sobriety_date: None,
            role: req.role.unwrap_or(Role::Guest),
            is_active: true,
            is_verified: false,
            show_in_directory: false,
            show_sobriety_date: false,
            allow_contact: false,
            notification_prefs: NotificationPrefs::default(),
            anonymized_at: None,
            created_at: Utc::now(),
            updated_at: None,
            last_login: None,
        };
        self.db.insert_user(&user)?;

        self.audit.record(
            AuditEvent::new("user_created_by_admin")
                .user(created_by)
                .resource("user", user.id),
        );

        Ok(user)
    }

    /// Self-service profile and privacy-toggle update.
    pub fn update_profile(
        &self,
        mut user: User,
        changes: &UpdateProfileRequest,
    ) -> RefugeResult<User> {
        if let Some(name) = &changes.display_name {
            user.display_name = Some(name.clone());
        }
        if let Some(date) = changes.sobriety_date {
            user.sobriety_date = Some(date);
        }
        if let Some(show) = changes.show_in_directory {
            user.show_in_directory = show;
        }
        if let Some(show) = changes.show_sobriety_date {
            user.show_sobriety_date = show;
        }
        if let Some(allow) = changes.allow_contact {
            user.allow_contact = allow;
        }
        if let Some(prefs) = &changes.notification_prefs {
            user.notification_prefs = prefs.clone();
        }
        user.updated_at = Some(Utc::now());
        self.db.update_user(&user)?;

        self.audit
            .record(AuditEvent::new("profile_updated").user(user.id));

        Ok(user)
    }

    /// Soft delete: strip contact details and deactivate, keeping the
    /// row. All sessions are invalidated. The full anonymization
    /// pipeline is a separate, admin-driven operation.
    pub fn deactivate_account(&self, mut user: User, by_admin: bool) -> RefugeResult<()> {
        let user_id = user.id;
        user.email = None;
        user.email_verified = false;
        user.phone = None;
        user.phone_verified = false;
        user.display_name = Some(format!("Deleted_User_{}", hash::random_token(8)));
        user.is_active = false;
        user.updated_at = Some(Utc::now());
        self.db.update_user(&user)?;

        self.sessions.invalidate_all_for_user(user_id)?;

        let action = if by_admin {
            "user_deactivated_by_admin"
        } else {
            "account_deleted"
        };
        self.audit.record(AuditEvent::new(action).user(user_id));

        Ok(())
    }

    /// Assign a service position. At most one active assignment per
    /// (user, position) — a duplicate is a Conflict.
    pub fn create_assignment(
        &self,
        user_id: Uuid,
        req: &CreateAssignmentRequest,
        created_by: Uuid,
    ) -> RefugeResult<ServiceAssignment> {
        if self.db.get_user(user_id)?.is_none() {
            return Err(RefugeError::NotFound { entity: "user" });
        }
        if self.db.has_active_assignment(user_id, req.position)? {
            return Err(RefugeError::Conflict(format!(
                "user already holds an active {} assignment",
                req.position
            )));
        }

        let assignment = ServiceAssignment {
            id: Uuid::new_v4(),
            user_id: Some(user_id),
            position: req.position,
            group_id: req.group_id,
            meeting_id: req.meeting_id,
            start_date: req.start_date,
            end_date: req.end_date,
            is_active: true,
            notes: req.notes.clone(),
            created_by: Some(created_by),
            created_at: Utc::now(),
            updated_at: None,
        };
        self.db.insert_assignment(&assignment)?;

        self.audit.record(
            AuditEvent::new("service_assignment_created")
                .user(user_id)
                .resource("service_assignment", assignment.id),
        );

        Ok(assignment)
    }
}
