use rusqlite::{params, Connection};

use crate::db::models::Subscription;

/// Subscribe if not subscribed, otherwise unsubscribe. Returns the new state.
pub fn toggle(conn: &Connection, user_id: &str, author_id: &str) -> rusqlite::Result<bool> {
    let removed = conn.execute(
        "DELETE FROM subscriptions WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
    )?;
    if removed > 0 {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO subscriptions (user_id, author_id) VALUES (?1, ?2)",
        params![user_id, author_id],
    )?;
    Ok(true)
}

pub fn is_subscribed(conn: &Connection, user_id: &str, author_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM subscriptions WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
        |row| row.get(0),
    )
}

pub fn subscriber_count(conn: &Connection, author_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM subscriptions WHERE author_id = ?1",
        params![author_id],
        |row| row.get(0),
    )
}

/// Email addresses of everyone subscribed to `author_id`.
pub fn subscriber_emails(conn: &Connection, author_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT u.email FROM subscriptions s
         JOIN users u ON u.id = s.user_id
         WHERE s.author_id = ?1
         ORDER BY s.created_at ASC",
    )?;
    let rows = stmt.query_map(params![author_id], |row| row.get(0))?;
    rows.collect()
}

/// Authors `user_id` follows, most recent first.
pub fn list_for_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Subscription>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.name, u.avatar, s.created_at FROM subscriptions s
         JOIN users u ON u.id = s.author_id
         WHERE s.user_id = ?1
         ORDER BY s.created_at DESC",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(Subscription {
            author_id: row.get(0)?,
            author_name: row.get(1)?,
            author_avatar: row.get(2)?,
            subscribed_at: row.get(3)?,
        })
    })?;
    rows.collect()
}
