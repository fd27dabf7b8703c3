use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::User;

/// Create a new session for a user. Returns the session token.
///
/// Expired sessions of every user are swept first.
pub fn create_session(conn: &Connection, user_id: &str, hours: u64) -> rusqlite::Result<String> {
    let purged = purge_expired(conn)?;
    if purged > 0 {
        tracing::debug!(purged, "Removed expired sessions");
    }

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Delete a session by token.
pub fn delete_session(conn: &Connection, token: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Delete every session past its expiry. Returns how many were removed.
pub fn purge_expired(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM sessions WHERE expires_at <= datetime('now')", [])
}

/// The user owning an unexpired session.
pub fn user_for_token(conn: &Connection, token: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT u.id, u.email, u.name, u.avatar, u.is_admin, u.is_verified, u.created_at
         FROM sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token = ?1 AND s.expires_at > datetime('now')",
        params![token],
        User::from_row,
    )
    .optional()
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
