use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::ability::{Action, Subject};
use crate::comments::{self, build_comment_tree, thread_view, DEFAULT_MAX_DEPTH, MAX_COMMENT_LEN};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::posts;
use crate::state::AppState;

/// Deepest thread view a client may request.
const MAX_DEPTH_PARAM: usize = 16;

#[derive(Deserialize)]
pub struct ThreadQuery {
    pub depth: Option<usize>,
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/posts/{id}/comments",
        get(list_comments).post(create_comment),
    )
}

/// GET /api/posts/{id}/comments
async fn list_comments(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(post_id): Path<String>,
    Query(query): Query<ThreadQuery>,
) -> AppResult<Response> {
    user.ability().require(Action::Read, Subject::Comment)?;

    let rows = {
        let conn = state.db.get()?;
        if posts::find_published(&conn, &post_id)?.is_none() {
            return Err(AppError::NotFound);
        }
        comments::list_for_post(&conn, &post_id)?
    };

    let total = rows.len();
    let depth = query
        .depth
        .unwrap_or(DEFAULT_MAX_DEPTH)
        .clamp(1, MAX_DEPTH_PARAM);
    let forest = build_comment_tree(rows);
    let threads = thread_view(&forest, depth);

    Ok(Json(json!({ "comments": threads, "total": total })).into_response())
}

fn validate_content(raw: &str) -> AppResult<&str> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".into()));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::BadRequest(format!(
            "Comment must be at most {} characters",
            MAX_COMMENT_LEN
        )));
    }
    Ok(content)
}

/// POST /api/posts/{id}/comments
async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<Response> {
    user.ability().require(Action::Create, Subject::Comment)?;
    let CurrentUser(user) = user;
    let content = validate_content(&req.content)?;
    let parent_id = req.parent_id.as_deref().filter(|p| !p.is_empty());

    let conn = state.db.get()?;
    if posts::find_published(&conn, &post_id)?.is_none() {
        return Err(AppError::NotFound);
    }
    if let Some(parent) = parent_id {
        // Replies must stay within the parent's post.
        if comments::post_of(&conn, parent)?.as_deref() != Some(post_id.as_str()) {
            return Err(AppError::BadRequest("Parent comment not found on this post".into()));
        }
    }

    let comment = comments::insert(&conn, &post_id, parent_id, &user.id, content)?;
    tracing::info!(comment_id = %comment.id, post_id = %post_id, "Comment added");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Comment added successfully", "comment": comment })),
    )
        .into_response())
}
