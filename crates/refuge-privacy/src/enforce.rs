//! Privacy-setting enforcement for anything a user exposes to others.

use chrono::Utc;
use refuge_types::api::DirectoryEntry;
use refuge_types::models::User;

/// Shapes one user for the member directory. Returns `None` when the
/// user opted out entirely; otherwise every field is filtered through
/// the owner's toggles.
pub fn directory_entry(user: &User) -> Option<DirectoryEntry> {
    if !user.is_active || !user.show_in_directory {
        return None;
    }

    let (sobriety_date, sobriety_days) = if user.show_sobriety_date {
        match user.sobriety_date {
            Some(date) => {
                let days = (Utc::now() - date).num_days();
                (Some(date), Some(days))
            }
            None => (None, None),
        }
    } else {
        (None, None)
    };

    Some(DirectoryEntry {
        id: user.id,
        display_name: user
            .display_name
            .clone()
            .unwrap_or_else(|| "Anonymous".to_string()),
        role: user.role,
        sobriety_date,
        sobriety_days,
        contact_allowed: user.allow_contact,
    })
}
