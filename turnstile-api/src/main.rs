use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use turnstile_api::{app, worker, AppState};
use turnstile_core::{BookingStore, SystemClock};
use turnstile_store::app_config::{Config, StorageBackend};
use turnstile_store::seed::{demo_events, demo_seats};
use turnstile_store::{CatalogLoader, DbClient, MemoryStore, PostgresStore, RedisClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "turnstile_api=debug,turnstile_hold=info,turnstile_order=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!("Starting Turnstile API on port {}", config.server.port);

    let store: Arc<dyn BookingStore> = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database).await?;
            db.migrate().await?;
            let store = PostgresStore::new(db.pool.clone());
            if config.storage.seed_demo {
                seed_demo(&store).await?;
            }
            Arc::new(store)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store; nothing survives a restart");
            let store = MemoryStore::new();
            if config.storage.seed_demo {
                seed_demo(&store).await?;
            }
            Arc::new(store)
        }
    };

    let mut app_state = AppState::new(store, Arc::new(SystemClock), config.booking.clone())?;
    if let Some(redis) = &config.redis {
        let redis_client = RedisClient::new(&redis.url)?;
        app_state = app_state.with_rate_limit(redis_client, config.rate_limit.clone());
        tracing::info!("Rate limiting enabled");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = worker::spawn_expiry_sweeper(&app_state, shutdown_rx);

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", err);
        }
    })
    .await?;

    tracing::info!("Shutting down");
    let _ = shutdown_tx.send(true);
    sweeper.await?;
    Ok(())
}

async fn seed_demo(loader: &dyn CatalogLoader) -> anyhow::Result<()> {
    loader.load_catalog(&demo_events(), &demo_seats()).await?;
    tracing::info!("Demo catalog loaded");
    Ok(())
}
