//! Session extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::store::{DbId, Role, UserView};
use crate::web::error::AppError;
use crate::web::state::AppState;

/// The logged-in user, from a valid session cookie. Rejects with 403.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserView);

impl CurrentUser {
    pub fn id(&self) -> DbId {
        self.0.uid
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state
            .sessions
            .from_headers(&parts.headers)
            .map(|claims| CurrentUser(claims.user))
            .ok_or(AppError::Unauthorized)
    }
}

/// A logged-in admin. Rejects with 403 otherwise.
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserView);

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(AppError::Forbidden("Admin role required".into()));
        }
        Ok(AdminUser(user))
    }
}
