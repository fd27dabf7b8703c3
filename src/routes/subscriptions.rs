use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::ability::{Action, Subject};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::state::AppState;
use crate::{subscriptions, users};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/authors/{id}/subscription",
            get(subscription_status).post(toggle_subscription),
        )
        .route("/api/me/subscriptions", get(my_subscriptions))
}

/// POST /api/authors/{id}/subscription — toggles. Verified accounts only.
async fn toggle_subscription(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(author_id): Path<String>,
) -> AppResult<Response> {
    // Subscribing is granted with the verified tier's read-everything rule.
    user.ability().require(Action::Read, Subject::All)?;
    let CurrentUser(user) = user;
    if user.id == author_id {
        return Err(AppError::BadRequest("You cannot subscribe to yourself".into()));
    }

    let conn = state.db.get()?;
    if users::find_by_id(&conn, &author_id)?.is_none() {
        return Err(AppError::NotFound);
    }
    let subscribed = subscriptions::toggle(&conn, &user.id, &author_id)?;
    let subscriber_count = subscriptions::subscriber_count(&conn, &author_id)?;
    tracing::info!(user_id = %user.id, author_id = %author_id, subscribed, "Toggled subscription");

    Ok(Json(json!({ "subscribed": subscribed, "subscriber_count": subscriber_count }))
        .into_response())
}

/// GET /api/authors/{id}/subscription
async fn subscription_status(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(author_id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let subscribed = match &user {
        Some(u) => subscriptions::is_subscribed(&conn, &u.id, &author_id)?,
        None => false,
    };
    let subscriber_count = subscriptions::subscriber_count(&conn, &author_id)?;

    Ok(Json(json!({ "subscribed": subscribed, "subscriber_count": subscriber_count }))
        .into_response())
}

/// GET /api/me/subscriptions
async fn my_subscriptions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let authors = subscriptions::list_for_user(&conn, &user.id)?;
    Ok(Json(json!({ "subscriptions": authors })).into_response())
}
