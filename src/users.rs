use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::User;

/// Account row with credential columns, only used inside the auth flow.
pub struct Credentials {
    pub user: User,
    pub password_hash: Option<String>,
    pub otp: Option<String>,
}

pub fn find_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
        params![id],
        User::from_row,
    )
    .optional()
}

fn credentials_where(
    conn: &Connection,
    clause: &str,
    value: &str,
) -> rusqlite::Result<Option<Credentials>> {
    conn.query_row(
        &format!(
            "SELECT {}, password_hash, otp FROM users WHERE {clause} = ?1",
            User::COLUMNS
        ),
        params![value],
        |row| {
            Ok(Credentials {
                user: User::from_row(row)?,
                password_hash: row.get(7)?,
                otp: row.get(8)?,
            })
        },
    )
    .optional()
}

pub fn credentials_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<Credentials>> {
    credentials_where(conn, "email", email)
}

pub fn credentials_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Credentials>> {
    credentials_where(conn, "id", id)
}

pub fn create(conn: &Connection, email: &str, password_hash: &str) -> rusqlite::Result<User> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO users (id, email, password_hash) VALUES (?1, ?2, ?3)",
        params![id, email, password_hash],
    )?;
    find_by_id(conn, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

pub fn set_otp(conn: &Connection, user_id: &str, otp: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET otp = ?1 WHERE id = ?2",
        params![otp, user_id],
    )?;
    Ok(())
}

pub fn mark_verified(conn: &Connection, user_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET is_verified = 1, otp = NULL WHERE id = ?1",
        params![user_id],
    )?;
    Ok(())
}

pub fn update_profile(
    conn: &Connection,
    user_id: &str,
    name: Option<&str>,
    password_hash: Option<&str>,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET name = COALESCE(?1, name), password_hash = COALESCE(?2, password_hash)
         WHERE id = ?3",
        params![name, password_hash, user_id],
    )?;
    Ok(())
}

pub fn set_avatar(conn: &Connection, user_id: &str, avatar: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET avatar = ?1 WHERE id = ?2",
        params![avatar, user_id],
    )?;
    Ok(())
}
