use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::sync::Arc;

use crate::cache::FeedCache;
use crate::config::Config;
use crate::mail::Mailer;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub mailer: Arc<dyn Mailer>,
    pub cache: Arc<dyn FeedCache>,
}
