//! Post storage and discovery queries.
//!
//! Scheduled posts (`is_scheduled = 1`) never leave this module through a
//! public query; only the author listing and the admin scheduled listing see
//! them.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};
use serde::{Deserialize, Serialize};

use crate::db::models::{Post, PostSummary};

pub const DEFAULT_PAGE_SIZE: u32 = 8;
pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Latest,
    Oldest,
    Popular,
}

impl SortOrder {
    /// Unknown values fall back to `Latest`.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("oldest") => SortOrder::Oldest,
            Some("popular") | Some("most popular") | Some("most_popular") => SortOrder::Popular,
            _ => SortOrder::Latest,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Latest => "latest",
            SortOrder::Oldest => "oldest",
            SortOrder::Popular => "popular",
        }
    }

    fn order_by(self) -> &'static str {
        match self {
            SortOrder::Latest => "ORDER BY p.created_at DESC, p.id DESC",
            SortOrder::Oldest => "ORDER BY p.created_at ASC, p.id ASC",
            SortOrder::Popular => "ORDER BY p.views DESC, p.created_at DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Clamps to page >= 1 and 1 <= limit <= MAX_PAGE_SIZE.
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
        }
    }

    fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_posts: i64,
    pub posts_per_page: u32,
}

impl Pagination {
    pub fn new(page: PageRequest, total: i64) -> Self {
        let limit = i64::from(page.limit);
        let total_pages = ((total + limit - 1) / limit) as u32;
        Self {
            current_page: page.page,
            total_pages,
            total_posts: total,
            posts_per_page: page.limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostPage {
    pub posts: Vec<PostSummary>,
    pub pagination: Pagination,
}

/// Filter applied on top of "published only".
#[derive(Debug, Clone, Copy)]
pub enum Filter<'a> {
    All,
    Category(&'a str),
    Search(&'a str),
}

impl Filter<'_> {
    fn clause(&self) -> (&'static str, Option<String>) {
        match self {
            Filter::All => ("", None),
            Filter::Category(category) => (" AND p.category = ?1", Some(category.to_string())),
            Filter::Search(term) => (
                " AND (p.title LIKE ?1 ESCAPE '\\' OR p.description LIKE ?1 ESCAPE '\\')",
                Some(format!("%{}%", escape_like(term))),
            ),
        }
    }
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// One page of published posts matching `filter`, with pagination metadata.
pub fn list_published(
    conn: &Connection,
    filter: Filter<'_>,
    sort: SortOrder,
    page: PageRequest,
) -> rusqlite::Result<PostPage> {
    let (clause, arg) = filter.clause();
    let args: Vec<&dyn ToSql> = arg.iter().map(|a| a as &dyn ToSql).collect();

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM posts p WHERE p.is_scheduled = 0{clause}"),
        params_from_iter(args.iter()),
        |row| row.get(0),
    )?;

    let limit = i64::from(page.limit);
    let offset = page.offset();
    let n = args.len();
    let sql = format!(
        "SELECT {} FROM posts p JOIN users u ON u.id = p.user_id
         WHERE p.is_scheduled = 0{clause}
         {} LIMIT ?{} OFFSET ?{}",
        PostSummary::COLUMNS,
        sort.order_by(),
        n + 1,
        n + 2,
    );
    let mut all_args = args.clone();
    all_args.push(&limit);
    all_args.push(&offset);

    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(params_from_iter(all_args.iter()), PostSummary::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(PostPage {
        posts,
        pagination: Pagination::new(page, total),
    })
}

/// A published post by id. Scheduled posts read as missing.
pub fn find_published(conn: &Connection, id: &str) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM posts p JOIN users u ON u.id = p.user_id
             WHERE p.id = ?1 AND p.is_scheduled = 0",
            Post::COLUMNS
        ),
        params![id],
        Post::from_row,
    )
    .optional()
}

pub fn increment_views(conn: &Connection, id: &str) -> rusqlite::Result<()> {
    conn.execute("UPDATE posts SET views = views + 1 WHERE id = ?1", params![id])?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub image: Option<String>,
    pub tags: Vec<String>,
    pub category: String,
    /// Storage-formatted timestamp; `Some` creates the post scheduled.
    pub scheduled_at: Option<String>,
}

pub fn insert(conn: &Connection, post: &NewPost) -> rusqlite::Result<Post> {
    let id = uuid::Uuid::now_v7().to_string();
    let tags = serde_json::to_string(&post.tags)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "INSERT INTO posts (id, user_id, title, description, content, image, tags, category,
                            is_scheduled, scheduled_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            id,
            post.author_id,
            post.title,
            post.description,
            post.content,
            post.image,
            tags,
            post.category,
            post.scheduled_at.is_some(),
            post.scheduled_at,
        ],
    )?;
    conn.query_row(
        &format!(
            "SELECT {} FROM posts p JOIN users u ON u.id = p.user_id WHERE p.id = ?1",
            Post::COLUMNS
        ),
        params![id],
        Post::from_row,
    )
}

/// Posts still waiting for promotion, soonest first.
pub fn list_scheduled(conn: &Connection) -> rusqlite::Result<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM posts p JOIN users u ON u.id = p.user_id
         WHERE p.is_scheduled = 1
         ORDER BY p.scheduled_at ASC",
        Post::COLUMNS
    ))?;
    let rows = stmt.query_map([], Post::from_row)?;
    rows.collect()
}

/// Everything an author wrote, scheduled posts included.
pub fn list_by_author(conn: &Connection, author_id: &str) -> rusqlite::Result<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM posts p JOIN users u ON u.id = p.user_id
         WHERE p.user_id = ?1
         ORDER BY p.created_at DESC",
        Post::COLUMNS
    ))?;
    let rows = stmt.query_map(params![author_id], Post::from_row)?;
    rows.collect()
}

/// Like if not liked, otherwise unlike. Returns the new state.
pub fn toggle_like(conn: &Connection, user_id: &str, post_id: &str) -> rusqlite::Result<bool> {
    let removed = conn.execute(
        "DELETE FROM likes WHERE user_id = ?1 AND post_id = ?2",
        params![user_id, post_id],
    )?;
    if removed > 0 {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO likes (user_id, post_id) VALUES (?1, ?2)",
        params![user_id, post_id],
    )?;
    Ok(true)
}

pub fn like_count(conn: &Connection, post_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM likes WHERE post_id = ?1",
        params![post_id],
        |row| row.get(0),
    )
}

pub fn has_liked(conn: &Connection, user_id: &str, post_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM likes WHERE user_id = ?1 AND post_id = ?2",
        params![user_id, post_id],
        |row| row.get(0),
    )
}

pub fn liked_by(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<PostSummary>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM likes l
         JOIN posts p ON p.id = l.post_id
         JOIN users u ON u.id = p.user_id
         WHERE l.user_id = ?1 AND p.is_scheduled = 0
         ORDER BY l.created_at DESC",
        PostSummary::COLUMNS
    ))?;
    let rows = stmt.query_map(params![user_id], PostSummary::from_row)?;
    rows.collect()
}
