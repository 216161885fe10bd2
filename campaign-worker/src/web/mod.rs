//! HTTP API for users, templates, campaigns and reports.
//!
//! Handlers are thin: campaign intake validates the upload, stores the
//! campaign and its recipient file, enqueues a dispatch job and returns
//! `202 Accepted`. Sending happens in the worker.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod password;
pub mod session;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult};
pub use extract::{AdminUser, CurrentUser};
pub use session::{SessionClaims, SessionError, SessionSigner, SESSION_COOKIE};
pub use state::AppState;

use handlers::{auth, campaigns, health, reports, templates, users};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let max_upload = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/api/session", get(auth::session))
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/:id", put(users::update).delete(users::delete))
        .route("/api/templates", get(templates::list).post(templates::create))
        .route("/api/campaigns", get(campaigns::list).post(campaigns::create))
        .route("/api/campaigns/:id", delete(campaigns::delete))
        .route("/api/campaigns/:id/errors", get(campaigns::errors))
        .route("/api/reports", get(reports::report))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
