pub mod admin;
pub mod auth;
pub mod comments;
pub mod posts;
pub mod subscriptions;
pub mod uploads;

use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full HTTP surface, ready to serve.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.client_url);

    Router::new()
        .merge(auth::router())
        .merge(posts::router())
        .merge(comments::router())
        .merge(subscriptions::router())
        .merge(admin::router())
        .route("/uploads/{*path}", get(uploads::serve))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The web client runs on its own origin and sends the session cookie.
fn cors_layer(client_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    match HeaderValue::from_str(client_url.trim_end_matches('/')) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!(client_url, "Invalid client URL; cross-origin requests disabled");
            layer
        }
    }
}
