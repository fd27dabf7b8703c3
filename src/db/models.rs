use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Public view of an account. Password hash and OTP never leave the database layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub is_admin: bool,
    pub is_verified: bool,
    pub created_at: String,
}

impl User {
    pub const COLUMNS: &'static str = "id, email, name, avatar, is_admin, is_verified, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            avatar: row.get(3)?,
            is_admin: row.get(4)?,
            is_verified: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

/// Full post row joined with its author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub image: Option<String>,
    pub tags: Vec<String>,
    pub category: String,
    pub views: i64,
    pub is_scheduled: bool,
    pub scheduled_at: Option<String>,
    pub created_at: String,
    pub author_name: Option<String>,
    pub author_email: String,
    pub author_avatar: Option<String>,
}

impl Post {
    /// Select list for `posts p JOIN users u ON u.id = p.user_id`.
    pub const COLUMNS: &'static str = "p.id, p.user_id, p.title, p.description, p.content, \
         p.image, p.tags, p.category, p.views, p.is_scheduled, p.scheduled_at, p.created_at, \
         u.name, u.email, u.avatar";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let tags: String = row.get(6)?;
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            content: row.get(4)?,
            image: row.get(5)?,
            tags: parse_tags(&tags),
            category: row.get(7)?,
            views: row.get(8)?,
            is_scheduled: row.get(9)?,
            scheduled_at: row.get(10)?,
            created_at: row.get(11)?,
            author_name: row.get(12)?,
            author_email: row.get(13)?,
            author_avatar: row.get(14)?,
        })
    }
}

/// Listing card: a post without its body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub views: i64,
    pub tags: Vec<String>,
    pub category: String,
    pub created_at: String,
    pub author_id: String,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
}

impl PostSummary {
    pub const COLUMNS: &'static str = "p.id, p.title, p.description, p.image, p.views, \
         p.tags, p.category, p.created_at, u.id, u.name, u.avatar";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let tags: String = row.get(5)?;
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            image: row.get(3)?,
            views: row.get(4)?,
            tags: parse_tags(&tags),
            category: row.get(6)?,
            created_at: row.get(7)?,
            author_id: row.get(8)?,
            author_name: row.get(9)?,
            author_avatar: row.get(10)?,
        })
    }
}

/// A comment row joined with its author's display fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub parent_id: Option<String>,
    pub author_id: String,
    pub content: String,
    pub created_at: String,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
}

impl Comment {
    pub const COLUMNS: &'static str = "c.id, c.post_id, c.parent_id, c.user_id, c.content, \
         c.created_at, u.name, u.avatar";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            post_id: row.get(1)?,
            parent_id: row.get(2)?,
            author_id: row.get(3)?,
            content: row.get(4)?,
            created_at: row.get(5)?,
            author_name: row.get(6)?,
            author_avatar: row.get(7)?,
        })
    }
}

/// An author a user follows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub author_id: String,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
    pub subscribed_at: String,
}

/// Tags are stored as a JSON array. Unparseable legacy values read as empty.
pub fn parse_tags(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}
