use anyhow::Result;
use dockyard_api::{create_app, logging, start_schedule_scan, AccessGate, AppState, Config};
use dockyard_store::db::{backup_database, create_pool, run_migrations};
use dockyard_store::{ConsoleStore, FsBlobStore};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing();

    info!("Starting dockyard-api service...");

    let config = Config::from_env();
    info!(
        "Configuration loaded: bind_addr={}, db_path={}, blob_dir={}",
        config.bind_addr,
        config.db_path.display(),
        config.blob_dir.display()
    );

    let db_path = &config.db_path;

    // Backup before migrations
    if db_path.exists() {
        let backup_path = backup_database(db_path)?;
        info!("Database backed up to: {}", backup_path.display());
    }

    let pool = create_pool(db_path).await?;
    info!("Running database migrations...");
    run_migrations(&pool).await?;
    info!("Migrations complete");

    let store = ConsoleStore::new(pool);
    let blobs = Arc::new(FsBlobStore::new(&config.blob_dir));

    let gate = AccessGate::from_config(&config);
    if gate.is_dev_mode() {
        warn!("Access gate in dev mode: every request is allowed as dev@localhost");
    }

    tokio::spawn(start_schedule_scan(store.clone(), config.scan_interval_secs));
    info!("Schedule scan started (interval: {}s)", config.scan_interval_secs);

    let app = create_app(AppState::new(store, blobs, gate));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
