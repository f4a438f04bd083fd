//! Olive Mill Production & Traceability - Backend Server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use olive_mill_backend::{
    config::Config,
    create_app,
    services::SyncQueue,
    store::{MemoryStore, PgStore, Repository, Store},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mill_server=debug,olive_mill_backend=debug,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Olive Mill Server");
    tracing::info!("Environment: {}", config.environment);

    let store: Arc<dyn Store> = if config.database.in_memory {
        tracing::warn!("Using the in-memory store; records are lost on restart");
        Arc::new(MemoryStore::new())
    } else {
        tracing::info!("Connecting to database...");
        let db_pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.database.url)
            .await?;
        tracing::info!("Database connection established");

        // Run migrations in development
        if config.environment == "development" {
            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&db_pool).await?;
            tracing::info!("Migrations completed");
        }
        Arc::new(PgStore::new(db_pool))
    };

    let queue = Arc::new(SyncQueue::new());
    let repo = Repository::new(store, queue);
    spawn_sync_flush(repo.clone(), Duration::from_secs(config.sync.retry_interval_secs));

    // Create application state
    let state = AppState {
        repo,
        config: Arc::new(config.clone()),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Retry queued writes in the background
fn spawn_sync_flush(repo: Repository, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
        loop {
            interval.tick().await;
            if repo.queue().is_empty().await {
                continue;
            }
            let report = repo.flush_queue().await;
            tracing::info!(
                applied = report.applied,
                requeued = report.requeued,
                rejected = report.rejected.len(),
                "Sync queue flushed"
            );
        }
    });
}
