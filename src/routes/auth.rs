use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;

use crate::auth::handlers;
use crate::routes::uploads::MAX_UPLOAD_BYTES;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth", post(handlers::authenticate))
        .route("/api/auth/me", get(handlers::me))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/auth/otp/verify", post(handlers::verify_otp))
        .route("/api/auth/otp/resend", post(handlers::resend_otp))
        .route("/api/auth/profile", put(handlers::update_profile))
        .route(
            "/api/auth/avatar",
            put(handlers::update_avatar).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/auth/admin-request", post(handlers::request_admin))
}
