use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use scribe::cache::{self, FeedCache, MemoryFeedCache};
use scribe::config::{Cli, Config};
use scribe::scheduler::{self, Promoter};
use scribe::state::AppState;
use scribe::{db, mail, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    std::fs::create_dir_all(config.uploads_path())?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    let mailer: Arc<dyn mail::Mailer> = Arc::from(mail::from_config(&config.mail)?);

    // A cache outage should not keep the blog offline.
    let feed_cache: Arc<dyn FeedCache> = match cache::from_config(&config.cache).await {
        Ok(c) => Arc::from(c),
        Err(e) => {
            tracing::warn!("Redis unavailable ({}); falling back to in-process cache", e);
            Arc::new(MemoryFeedCache::new(Duration::from_secs(config.cache.ttl_secs)))
        }
    };

    let state = AppState {
        db: pool,
        config: config.clone(),
        mailer,
        cache: feed_cache,
    };

    if config.scheduler.enabled {
        let period = Duration::from_secs(config.scheduler.interval_secs.max(1));
        scheduler::spawn(Promoter::from_state(&state), period);
    } else {
        tracing::info!("Scheduled post promoter disabled");
    }

    let app = routes::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
