use std::net::SocketAddr;
use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatepass::api::{self, AppState};
use gatepass::config::Config;
use gatepass::db;
use gatepass::jobs;
use gatepass::storage::{MemoryStorage, PgStorage, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatepass=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting gatepass server...");

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let storage: Arc<dyn Storage> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations completed");

            Arc::new(PgStorage::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, running on in-memory storage");
            Arc::new(MemoryStorage::new())
        }
    };

    // Schedule the expiry sweep
    let scheduler = JobScheduler::new().await?;
    let sweep_storage = storage.clone();
    scheduler
        .add(Job::new_async(
            config.expiry_sweep_schedule.as_str(),
            move |_id, _lock| {
                let storage = sweep_storage.clone();
                Box::pin(async move {
                    jobs::expiry_sweep::run(storage.as_ref()).await;
                })
            },
        )?)
        .await?;
    scheduler.start().await?;
    tracing::info!(schedule = %config.expiry_sweep_schedule, "Expiry sweep scheduled");

    let state = AppState { storage };

    let app = api::router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, cleaning up...");
}
