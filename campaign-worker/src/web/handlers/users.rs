//! Admin user management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::auth::hash_error;
use super::SuccessResponse;
use crate::store::{DbId, NewUser, Role, UserChanges, UserRepo, UserView};
use crate::web::error::{AppError, AppResult};
use crate::web::extract::AdminUser;
use crate::web::password::hash_password;
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub role: Option<Role>,
    pub password: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<Vec<UserView>>> {
    let users = UserRepo::list(&state.pool).await?;
    Ok(Json(users.iter().map(UserView::from).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserView>)> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest("Email and password are required".into()));
    }
    if UserRepo::find_by_email(&state.pool, email).await?.is_some() {
        return Err(AppError::BadRequest("Email is already in use".into()));
    }

    let input = NewUser {
        email: email.to_string(),
        password_hash: hash_password(&req.password).map_err(hash_error)?,
        role: req.role.unwrap_or(Role::Standard),
    };
    let user = UserRepo::create(&state.pool, &input).await?;

    info!(uid = user.id, role = user.role.as_str(), by = admin.uid, "user_created");
    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}

pub async fn update(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<DbId>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<Json<UserView>> {
    let email = req
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    if let Some(email) = email {
        if let Some(existing) = UserRepo::find_by_email(&state.pool, email).await? {
            if existing.id != id {
                return Err(AppError::BadRequest("Email is already in use".into()));
            }
        }
    }

    // An empty password leaves the current one in place
    let password_hash = match req.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => Some(hash_password(password).map_err(hash_error)?),
        None => None,
    };

    let changes = UserChanges {
        email: email.map(str::to_string),
        role: req.role,
        password_hash,
    };

    let user = UserRepo::update(&state.pool, id, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    info!(uid = user.id, by = admin.uid, "user_updated");
    Ok(Json(UserView::from(&user)))
}

pub async fn delete(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<SuccessResponse>> {
    if id == admin.uid {
        return Err(AppError::BadRequest("You cannot delete your own account".into()));
    }
    if !UserRepo::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("User not found".into()));
    }

    info!(uid = id, by = admin.uid, "user_deleted");
    Ok(SuccessResponse::ok())
}
