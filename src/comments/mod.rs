pub mod tree;

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::Comment;

pub use tree::{build_comment_tree, thread_view, CommentNode, CommentThread, DEFAULT_MAX_DEPTH};

pub const MAX_COMMENT_LEN: usize = 2000;

/// All comments on a post in insertion order.
pub fn list_for_post(conn: &Connection, post_id: &str) -> rusqlite::Result<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM comments c
         JOIN users u ON u.id = c.user_id
         WHERE c.post_id = ?1
         ORDER BY c.created_at ASC, c.rowid ASC",
        Comment::COLUMNS
    ))?;
    let rows = stmt.query_map(params![post_id], Comment::from_row)?;
    rows.collect()
}

/// Post that a comment belongs to, if the comment exists.
pub fn post_of(conn: &Connection, comment_id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT post_id FROM comments WHERE id = ?1",
        params![comment_id],
        |row| row.get(0),
    )
    .optional()
}

pub fn insert(
    conn: &Connection,
    post_id: &str,
    parent_id: Option<&str>,
    author_id: &str,
    content: &str,
) -> rusqlite::Result<Comment> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO comments (id, post_id, parent_id, user_id, content) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, post_id, parent_id, author_id, content],
    )?;
    conn.query_row(
        &format!(
            "SELECT {} FROM comments c JOIN users u ON u.id = c.user_id WHERE c.id = ?1",
            Comment::COLUMNS
        ),
        params![id],
        Comment::from_row,
    )
}
