//! Role-gated administrative endpoints. Each handler names its exact
//! allowed role set — nothing is inferred from hierarchy.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use refuge_auth::require_role;
use refuge_privacy::anonymize::AnonymizeOptions;
use refuge_privacy::report;
use refuge_types::api::{
    AdminCreateUserRequest, AnonymizeRequest, AssignmentResponse, CreateAssignmentRequest,
    DeleteUserRequest, MessageResponse, ProfileResponse,
};
use refuge_types::error::RefugeError;
use refuge_types::models::Role;
use uuid::Uuid;

use crate::error::{ApiError, run_blocking};
use crate::middleware::CurrentUser;
use crate::state::AppState;

pub async fn create_user(
    State(state): State<AppState>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
    Json(req): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&caller, &[Role::Admin])?;

    let accounts = state.accounts.clone();
    let user = run_blocking(move || accounts.create_user(&req, caller.id)).await?;

    Ok((StatusCode::CREATED, Json(ProfileResponse::from(&user))))
}

/// Soft-deactivate by default; `permanent` runs the full anonymization
/// pipeline and then removes the user row.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<DeleteUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&caller, &[Role::Admin])?;

    if req.permanent {
        let anonymizer = state.anonymizer.clone();
        run_blocking(move || {
            anonymizer.anonymize(
                user_id,
                AnonymizeOptions {
                    preserve_audit: req.preserve_audit,
                    permanent: true,
                },
            )
        })
        .await?;
    } else {
        let db = state.db.clone();
        let accounts = state.accounts.clone();
        run_blocking(move || {
            let user = db
                .get_user(user_id)?
                .ok_or(RefugeError::NotFound { entity: "user" })?;
            accounts.deactivate_account(user, true)
        })
        .await?;
    }

    Ok(Json(MessageResponse {
        message: "user deleted".to_string(),
    }))
}

pub async fn anonymize_user(
    State(state): State<AppState>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AnonymizeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&caller, &[Role::Admin])?;

    let anonymizer = state.anonymizer.clone();
    run_blocking(move || {
        anonymizer.anonymize(
            user_id,
            AnonymizeOptions {
                preserve_audit: req.preserve_audit,
                permanent: false,
            },
        )
    })
    .await?;

    Ok(Json(MessageResponse {
        message: "user anonymized".to_string(),
    }))
}

pub async fn create_assignment(
    State(state): State<AppState>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<CreateAssignmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&caller, &[Role::Admin, Role::Secretary])?;

    let accounts = state.accounts.clone();
    let assignment =
        run_blocking(move || accounts.create_assignment(user_id, &req, caller.id)).await?;

    Ok((
        StatusCode::CREATED,
        Json(AssignmentResponse {
            id: assignment.id,
            user_id: assignment.user_id,
            position: assignment.position,
            start_date: assignment.start_date,
            end_date: assignment.end_date,
            is_active: assignment.is_active,
        }),
    ))
}

pub async fn privacy_report(
    State(state): State<AppState>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&caller, &[Role::Admin])?;

    let db = state.db.clone();
    let report = run_blocking(move || report::privacy_report(&db, user_id)).await?;

    Ok(Json(report))
}
