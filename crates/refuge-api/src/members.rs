//! Privacy-enforced member directory.

use axum::{Json, extract::State, response::IntoResponse};
use refuge_privacy::enforce;
use refuge_types::api::DirectoryEntry;

use crate::error::{ApiError, run_blocking};
use crate::state::AppState;

/// Only users who opted in appear, and every entry is shaped by its
/// owner's privacy toggles before leaving the server.
pub async fn directory(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let entries: Vec<DirectoryEntry> = run_blocking(move || {
        let users = db.list_directory_users()?;
        Ok(users.iter().filter_map(enforce::directory_entry).collect())
    })
    .await?;

    Ok(Json(entries))
}
