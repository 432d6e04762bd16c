use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use refuge_types::error::RefugeError;
use refuge_types::models::{DeviceInfo, User};

use crate::error::{ApiError, run_blocking};
use crate::state::AppState;

/// The resolved caller, injected into request extensions by
/// [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Extract the bearer token, resolve it to an active user, and make
/// the user available to handlers. Anything short of a valid access
/// token is a 401 before the handler runs.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(RefugeError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(RefugeError::Unauthorized)?
        .to_string();

    let guard = state.guard.clone();
    let user = run_blocking(move || guard.resolve(&token)).await?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Request context worth keeping — as hashes only, never raw.
pub fn device_info(headers: &HeaderMap) -> DeviceInfo {
    let origin = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    DeviceInfo { origin, user_agent }
}
