use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::Arc;

use crate::cache::FeedCache;
use crate::db::format_timestamp;
use crate::mail::templates::NewPostEmail;
use crate::mail::Mailer;
use crate::state::{AppState, DbPool};
use crate::{subscriptions, users};

/// A post that was flipped from scheduled to published by this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotedPost {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
}

/// Publish every scheduled post due at or before `now`.
///
/// One conditional `UPDATE ... RETURNING`: the `is_scheduled = 1` guard makes
/// the statement a compare-and-swap, so a row is returned by exactly one call
/// no matter how many ticks overlap.
pub fn promote_due_posts(
    conn: &Connection,
    now: &DateTime<Utc>,
) -> rusqlite::Result<Vec<PromotedPost>> {
    let mut stmt = conn.prepare(
        "UPDATE posts SET is_scheduled = 0, created_at = ?1
         WHERE is_scheduled = 1 AND scheduled_at <= ?1
         RETURNING id, user_id, title, description, image",
    )?;
    let rows = stmt.query_map(params![format_timestamp(now)], |row| {
        Ok(PromotedPost {
            id: row.get(0)?,
            author_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            image: row.get(4)?,
        })
    })?;
    rows.collect()
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub promoted: usize,
    pub notified: usize,
    pub notify_failures: usize,
}

/// Everything one promotion tick needs.
#[derive(Clone)]
pub struct Promoter {
    pub db: DbPool,
    pub mailer: Arc<dyn Mailer>,
    pub cache: Arc<dyn FeedCache>,
    pub client_url: String,
}

impl Promoter {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            mailer: state.mailer.clone(),
            cache: state.cache.clone(),
            client_url: state.config.server.client_url.clone(),
        }
    }

    pub async fn tick(&self) -> anyhow::Result<TickReport> {
        self.tick_at(Utc::now()).await
    }

    /// Promote due posts, then notify subscribers post by post. A failed
    /// notification is logged and dropped; the post stays published.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> anyhow::Result<TickReport> {
        let promoted = {
            let conn = self.db.get()?;
            promote_due_posts(&conn, &now)?
        };

        let mut report = TickReport {
            promoted: promoted.len(),
            ..TickReport::default()
        };
        if promoted.is_empty() {
            return Ok(report);
        }

        tracing::info!(count = promoted.len(), "Promoted scheduled posts");
        if let Err(e) = self.cache.invalidate_all().await {
            tracing::warn!("Failed to invalidate listing cache: {}", e);
        }

        for post in &promoted {
            match self.notify_subscribers(post, &now).await {
                Ok(sent) => {
                    if sent > 0 {
                        report.notified += 1;
                    }
                }
                Err(e) => {
                    report.notify_failures += 1;
                    tracing::error!(post_id = %post.id, "Failed to notify subscribers: {:#}", e);
                }
            }
        }

        Ok(report)
    }

    /// Returns the number of subscribers mailed.
    async fn notify_subscribers(
        &self,
        post: &PromotedPost,
        now: &DateTime<Utc>,
    ) -> anyhow::Result<usize> {
        let (author, emails) = {
            let conn = self.db.get()?;
            let Some(author) = users::find_by_id(&conn, &post.author_id)? else {
                tracing::warn!(post_id = %post.id, "Author of promoted post not found");
                return Ok(0);
            };
            let emails = subscriptions::subscriber_emails(&conn, &post.author_id)?;
            (author, emails)
        };

        if emails.is_empty() {
            return Ok(0);
        }

        let post_link = format!("{}/post/{}", self.client_url.trim_end_matches('/'), post.id);
        let post_date = now.format("%a %b %d %Y").to_string();
        let count = emails.len();
        let mail = NewPostEmail {
            author_name: author.display_name(),
            author_avatar: author.avatar.as_deref().unwrap_or(""),
            post_link: &post_link,
            post_image: post.image.as_deref().unwrap_or(""),
            post_title: &post.title,
            post_description: &post.description,
            post_date: &post_date,
        }
        .to_mail(emails)?;

        self.mailer.send(mail).await?;
        tracing::info!(post_id = %post.id, subscribers = count, "Sent new post notification");
        Ok(count)
    }
}
