//! Authentication endpoints: magic links, token refresh, logout, and
//! the caller's own account.

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use refuge_privacy::audit::AuditEvent;
use refuge_types::api::{
    LoginResponse, MagicLinkRequest, MagicLinkResponse, MagicLinkVerifyRequest,
    MessageResponse, ProfileResponse, TokenPairResponse, TokenRefreshRequest,
    UpdateProfileRequest,
};
use refuge_types::models::Destination;

use crate::error::{ApiError, run_blocking};
use crate::middleware::{CurrentUser, device_info};
use crate::state::AppState;

pub async fn request_magic_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MagicLinkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let destination = match (req.email, req.phone) {
        (Some(email), None) => Destination::Email(email),
        (None, Some(phone)) => Destination::Phone(phone),
        _ => {
            return Err(ApiError::bad_request(
                "exactly one of email or phone is required",
            ));
        }
    };
    let device = device_info(&headers);

    let links = state.magic_links.clone();
    let issued =
        run_blocking(move || links.request(&destination, req.purpose, &device)).await?;

    Ok(Json(MagicLinkResponse {
        message: "magic link sent".to_string(),
        expires_in: issued.expires_in,
    }))
}

pub async fn verify_magic_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MagicLinkVerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let device = device_info(&headers);

    let links = state.magic_links.clone();
    let login = run_blocking(move || links.verify(&req.token, &device)).await?;

    Ok(Json(LoginResponse {
        access_token: login.tokens.access_token,
        refresh_token: login.tokens.refresh_token,
        expires_in: login.tokens.expires_in,
        user: ProfileResponse::from(&login.user),
    }))
}

pub async fn refresh_tokens(
    State(state): State<AppState>,
    Json(req): Json<TokenRefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state.sessions.clone();
    let tokens = run_blocking(move || sessions.refresh(&req.refresh_token)).await?;

    Ok(Json(TokenPairResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state.sessions.clone();
    let audit = state.audit.clone();
    let user_id = user.id;
    run_blocking(move || {
        sessions.invalidate_all_for_user(user_id)?;
        audit.record(AuditEvent::new("logout").user(user_id));
        Ok(())
    })
    .await?;

    Ok(Json(MessageResponse {
        message: "logged out".to_string(),
    }))
}

pub async fn create_anonymous_account(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let device = device_info(&headers);

    let accounts = state.accounts.clone();
    let login = run_blocking(move || accounts.create_anonymous_account(&device)).await?;

    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            access_token: login.tokens.access_token,
            refresh_token: login.tokens.refresh_token,
            expires_in: login.tokens.expires_in,
            user: ProfileResponse::from(&login.user),
        }),
    ))
}

pub async fn get_profile(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<ProfileResponse> {
    Json(ProfileResponse::from(&user))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let accounts = state.accounts.clone();
    let updated = run_blocking(move || accounts.update_profile(user, &req)).await?;

    Ok(Json(ProfileResponse::from(&updated)))
}

pub async fn delete_own_account(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let accounts = state.accounts.clone();
    run_blocking(move || accounts.deactivate_account(user, false)).await?;

    Ok(Json(MessageResponse {
        message: "account deleted".to_string(),
    }))
}
