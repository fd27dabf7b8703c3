use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::ability::{Action, Subject};
use crate::db::format_timestamp;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::posts::{self, NewPost};
use crate::routes::uploads::{store_image, MAX_UPLOAD_BYTES};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/posts",
            post(create_post).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/admin/posts/scheduled", get(scheduled_posts))
        .route("/api/me/posts", get(my_posts))
}

/// Raw multipart fields of the new-post form.
#[derive(Default)]
struct PostForm {
    title: String,
    description: String,
    content: String,
    tags: String,
    category: String,
    scheduled_at: Option<String>,
    image: Option<(String, Vec<u8>)>,
}

async fn read_post_form(mut multipart: Multipart) -> AppResult<PostForm> {
    let mut form = PostForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            form.image = Some((file_name, bytes.to_vec()));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        match name.as_str() {
            "title" => form.title = value,
            "description" => form.description = value,
            "content" => form.content = value,
            "tags" => form.tags = value,
            "category" => form.category = value,
            "scheduled_at" if !value.trim().is_empty() => form.scheduled_at = Some(value),
            _ => {}
        }
    }

    Ok(form)
}

/// Tags arrive as a JSON array of strings.
fn parse_tags(raw: &str) -> AppResult<Vec<String>> {
    serde_json::from_str::<Vec<String>>(raw)
        .map_err(|_| AppError::BadRequest("Invalid tags format".into()))
}

/// `None` publishes immediately. A schedule must lie in the future.
fn parse_schedule(raw: Option<&str>, now: DateTime<Utc>) -> AppResult<Option<String>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let at = DateTime::parse_from_rfc3339(raw.trim())
        .map_err(|_| AppError::BadRequest("scheduled_at must be an RFC 3339 timestamp".into()))?
        .with_timezone(&Utc);
    if at <= now {
        return Err(AppError::BadRequest("scheduled_at must be in the future".into()));
    }
    Ok(Some(format_timestamp(&at)))
}

/// POST /api/admin/posts
async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    user.ability().require(Action::Manage, Subject::All)?;
    let CurrentUser(user) = user;

    let form = read_post_form(multipart).await?;
    let title = form.title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title is required".into()));
    }
    let tags = parse_tags(&form.tags)?;
    let scheduled_at = parse_schedule(form.scheduled_at.as_deref(), Utc::now())?;
    let (file_name, bytes) = form
        .image
        .filter(|(_, bytes)| !bytes.is_empty())
        .ok_or_else(|| AppError::BadRequest("No banner uploaded".into()))?;
    let image = store_image(&state, &file_name, &bytes).await?;

    let new_post = NewPost {
        author_id: user.id.clone(),
        title: title.to_string(),
        description: form.description.trim().to_string(),
        content: form.content,
        image: Some(image),
        tags,
        category: form.category.trim().to_string(),
        scheduled_at,
    };
    let post = {
        let conn = state.db.get()?;
        posts::insert(&conn, &new_post)?
    };

    if post.is_scheduled {
        tracing::info!(post_id = %post.id, scheduled_at = ?post.scheduled_at, "Post scheduled");
    } else {
        tracing::info!(post_id = %post.id, "Post published");
        if let Err(e) = state.cache.invalidate_all().await {
            tracing::warn!("Failed to invalidate listing cache: {}", e);
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Post added successfully", "post": post })),
    )
        .into_response())
}

/// GET /api/admin/posts/scheduled
async fn scheduled_posts(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Response> {
    user.ability().require(Action::Manage, Subject::All)?;
    let conn = state.db.get()?;
    let scheduled = posts::list_scheduled(&conn)?;
    Ok(Json(json!({ "posts": scheduled })).into_response())
}

/// GET /api/me/posts — everything the caller authored, scheduled included.
async fn my_posts(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    user.ability().require(Action::Create, Subject::Post)?;
    let conn = state.db.get()?;
    let authored = posts::list_by_author(&conn, &user.0.id)?;
    Ok(Json(json!({ "posts": authored })).into_response())
}
