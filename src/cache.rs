//! Short-lived cache for public post listings.
//!
//! Values are opaque JSON strings. Invalidation drops every listing at once;
//! listings are cheap to rebuild and any publish can reorder all of them.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::CacheConfig;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[async_trait]
pub trait FeedCache: Send + Sync {
    /// Current invalidation generation. Read it before loading the data to
    /// cache and hand it back to [`FeedCache::set`].
    async fn generation(&self) -> Result<u64, CacheError>;
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    /// Store `value` unless an invalidation happened after `generation` was read.
    async fn set(&self, key: &str, value: String, generation: u64) -> Result<(), CacheError>;
    async fn invalidate_all(&self) -> Result<(), CacheError>;
}

pub fn listing_key(sort: &str, page: u32, limit: u32) -> String {
    format!("posts:{sort}:{page}:{limit}")
}

/// Upper bound on live entries in [`MemoryFeedCache`].
pub const MAX_ENTRIES: usize = 512;

#[derive(Default)]
struct MemoryState {
    generation: u64,
    entries: HashMap<String, (Instant, String)>,
}

/// In-process cache used when no Redis URL is configured. Expired entries are
/// purged on every write and the oldest entry is evicted at capacity.
pub struct MemoryFeedCache {
    ttl: Duration,
    capacity: usize,
    state: Mutex<MemoryState>,
}

impl MemoryFeedCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, MAX_ENTRIES)
    }

    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            state: Mutex::new(MemoryState::default()),
        }
    }
}

#[async_trait]
impl FeedCache for MemoryFeedCache {
    async fn generation(&self) -> Result<u64, CacheError> {
        Ok(self.state.lock().await.generation)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut state = self.state.lock().await;
        match state.entries.get(key) {
            Some((expires, value)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                state.entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, generation: u64) -> Result<(), CacheError> {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::debug!(%key, "Skipping listing cache write from a stale generation");
            return Ok(());
        }

        let now = Instant::now();
        state.entries.retain(|_, (expires, _)| *expires > now);
        if state.entries.len() >= self.capacity && !state.entries.contains_key(key) {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, (expires, _))| *expires)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
            }
        }
        state
            .entries
            .insert(key.to_string(), (now + self.ttl, value));
        Ok(())
    }

    async fn invalidate_all(&self) -> Result<(), CacheError> {
        let mut state = self.state.lock().await;
        state.generation += 1;
        state.entries.clear();
        Ok(())
    }
}

/// Redis-backed cache. Keys are namespaced by a generation counter so that
/// invalidation is a single `INCR` instead of a key scan.
#[derive(Clone)]
pub struct RedisFeedCache {
    redis: ConnectionManager,
    ttl: Duration,
}

const GENERATION_KEY: &str = "scribe:posts:generation";

impl RedisFeedCache {
    pub async fn connect(url: &str, ttl: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self { redis, ttl })
    }

    fn namespaced(generation: u64, key: &str) -> String {
        format!("scribe:{generation}:{key}")
    }
}

#[async_trait]
impl FeedCache for RedisFeedCache {
    async fn generation(&self) -> Result<u64, CacheError> {
        let mut conn = self.redis.clone();
        let generation: Option<u64> = conn.get(GENERATION_KEY).await?;
        Ok(generation.unwrap_or(0))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let key = Self::namespaced(self.generation().await?, key);
        let mut conn = self.redis.clone();
        let value: Option<String> = conn.get(&key).await?;
        tracing::debug!(%key, hit = value.is_some(), "listing cache lookup");
        Ok(value)
    }

    // A stale generation writes under a namespace no reader looks at any more,
    // and the entry ages out with its TTL.
    async fn set(&self, key: &str, value: String, generation: u64) -> Result<(), CacheError> {
        let key = Self::namespaced(generation, key);
        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(&key, value, self.ttl.as_secs()).await?;
        Ok(())
    }

    async fn invalidate_all(&self) -> Result<(), CacheError> {
        let mut conn = self.redis.clone();
        conn.incr::<_, _, ()>(GENERATION_KEY, 1).await?;
        Ok(())
    }
}

pub async fn from_config(config: &CacheConfig) -> Result<Box<dyn FeedCache>, CacheError> {
    let ttl = Duration::from_secs(config.ttl_secs);
    if config.redis_url.trim().is_empty() {
        tracing::info!("Using in-process listing cache");
        return Ok(Box::new(MemoryFeedCache::new(ttl)));
    }
    let cache = RedisFeedCache::connect(&config.redis_url, ttl).await?;
    tracing::info!("Using Redis listing cache");
    Ok(Box::new(cache))
}
