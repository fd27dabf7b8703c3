use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::ability::{Action, Subject};
use crate::cache::listing_key;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::posts::{self, Filter, PageRequest, SortOrder, DEFAULT_PAGE_SIZE};
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct ListQuery {
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts))
        .route("/api/posts/search", get(search_posts))
        .route("/api/posts/category/{category}", get(posts_in_category))
        .route("/api/posts/{id}", get(get_post))
        .route("/api/posts/{id}/like", post(toggle_like))
        .route("/api/me/liked-posts", get(liked_posts))
}

fn json_body(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// GET /api/posts — the home feed. Served from the listing cache when warm.
async fn list_posts(
    State(state): State<AppState>,
    user: MaybeUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Response> {
    user.ability().require(Action::Read, Subject::Post)?;

    let sort = SortOrder::parse(query.sort.as_deref());
    let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let key = listing_key(sort.as_str(), page.page, page.limit);

    match state.cache.get(&key).await {
        Ok(Some(body)) => {
            tracing::debug!(%key, "Listing cache hit");
            return Ok(json_body(body));
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("Listing cache read failed: {}", e),
    }

    // Read before the query so a publish that lands in between wins.
    let generation = match state.cache.generation().await {
        Ok(generation) => Some(generation),
        Err(e) => {
            tracing::warn!("Listing cache generation read failed: {}", e);
            None
        }
    };

    let listing = {
        let conn = state.db.get()?;
        posts::list_published(&conn, Filter::All, sort, page)?
    };
    let body = serde_json::to_string(&listing)?;

    // Pages past the end are all empty; leave them out of the cache.
    let in_range = page.page <= listing.pagination.total_pages.max(1);
    if let Some(generation) = generation.filter(|_| in_range) {
        if let Err(e) = state.cache.set(&key, body.clone(), generation).await {
            tracing::warn!("Listing cache write failed: {}", e);
        }
    }
    Ok(json_body(body))
}

/// GET /api/posts/search?q=
async fn search_posts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Response> {
    let term = query.q.trim();
    if term.is_empty() {
        return Err(AppError::BadRequest("Search query is required".into()));
    }

    let sort = SortOrder::parse(query.sort.as_deref());
    let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let conn = state.db.get()?;
    let listing = posts::list_published(&conn, Filter::Search(term), sort, page)?;
    Ok(Json(listing).into_response())
}

/// GET /api/posts/category/{category}
async fn posts_in_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<Response> {
    let sort = SortOrder::parse(query.sort.as_deref());
    let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let conn = state.db.get()?;
    let listing = posts::list_published(&conn, Filter::Category(category.trim()), sort, page)?;
    Ok(Json(listing).into_response())
}

/// GET /api/posts/{id} — counts as a view.
async fn get_post(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let mut post = posts::find_published(&conn, &id)?.ok_or(AppError::NotFound)?;
    posts::increment_views(&conn, &id)?;
    post.views += 1;

    let likes = posts::like_count(&conn, &id)?;
    let liked = match &user {
        Some(u) => posts::has_liked(&conn, &u.id, &id)?,
        None => false,
    };

    Ok(Json(json!({ "post": post, "likes": likes, "liked": liked })).into_response())
}

/// POST /api/posts/{id}/like — toggles.
async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    user.ability().require(Action::Like, Subject::Post)?;
    let CurrentUser(user) = user;

    let conn = state.db.get()?;
    if posts::find_published(&conn, &id)?.is_none() {
        return Err(AppError::NotFound);
    }
    let liked = posts::toggle_like(&conn, &user.id, &id)?;
    let likes = posts::like_count(&conn, &id)?;
    tracing::debug!(user_id = %user.id, post_id = %id, liked, "Toggled like");

    Ok(Json(json!({ "liked": liked, "likes": likes })).into_response())
}

/// GET /api/me/liked-posts
async fn liked_posts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let liked = posts::liked_by(&conn, &user.id)?;
    Ok(Json(json!({ "posts": liked })).into_response())
}
