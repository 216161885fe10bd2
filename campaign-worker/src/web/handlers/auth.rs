//! Login, logout and session lookup.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::SuccessResponse;
use crate::store::{UserRepo, UserView};
use crate::web::error::{AppError, AppResult};
use crate::web::extract::CurrentUser;
use crate::web::password::verify_password;
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub user: Option<UserView>,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    let user = UserRepo::find_by_email(&state.pool, req.email.trim()).await?;

    let verified = match &user {
        Some(user) => verify_password(&req.password, &user.password_hash).unwrap_or_else(|e| {
            warn!(uid = user.id, error = %e, "login_hash_unreadable");
            false
        }),
        None => false,
    };

    let Some(user) = user.filter(|_| verified) else {
        warn!(email = %req.email, "login_failed");
        let body = LoginResponse {
            success: false,
            user: None,
            message: Some("Invalid email or password"),
        };
        return Ok((StatusCode::UNAUTHORIZED, Json(body)).into_response());
    };

    let view = UserView::from(&user);
    let cookie = state.sessions.cookie_for(&view).map_err(|e| {
        warn!(uid = view.uid, error = %e, "session_issue_failed");
        AppError::Internal("Could not start a session".into())
    })?;
    info!(uid = view.uid, role = view.role.as_str(), "login_succeeded");

    let body = LoginResponse {
        success: true,
        user: Some(view),
        message: None,
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, state.sessions.clear_cookie())],
        SuccessResponse::ok(),
    )
}

pub async fn session(user: Option<CurrentUser>) -> Json<SessionResponse> {
    Json(SessionResponse {
        user: user.map(|CurrentUser(user)| user),
    })
}

/// Map a password hashing failure to a 500.
pub(crate) fn hash_error(e: argon2::password_hash::Error) -> AppError {
    AppError::Internal(format!("Could not hash password: {e}"))
}
