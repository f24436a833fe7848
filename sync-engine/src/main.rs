use anyhow::{Context, Result};
use merchsync::config::{load_config, AppConfig};
use merchsync::link::LinkStore;
use merchsync::snapshot::{FsObjectStore, SnapshotWriter};
use merchsync::tenant::TenantStore;
use std::sync::Arc;
use sync_engine::api::{router, ApiState};
use sync_engine::orchestrator::Orchestrator;
use sync_engine::providers::{default_adapters, SyncContext};
use sync_engine::scheduler::ScheduleTrigger;
use sync_engine::token::TokenManager;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sync_engine=info,merchsync=info".into()),
        )
        .init();

    tracing::info!("Sync engine starting...");

    // Explicit config path must load; the default path may be absent
    let config = match std::env::var("MERCHSYNC_CONFIG") {
        Ok(path) => load_config(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        Err(_) if std::path::Path::new("merchsync.toml").exists() => {
            load_config("merchsync.toml")?
        }
        Err(_) => AppConfig::default(),
    };

    let encryption_key = std::env::var("MERCHSYNC_ENCRYPTION_KEY")
        .context("MERCHSYNC_ENCRYPTION_KEY is required (base64-encoded 32-byte key)")?;

    tracing::info!(
        db_path = %config.store.db_path,
        snapshot_root = %config.snapshot.root_dir,
        schedule = format!("{:02}:{:02} UTC", config.schedule.hour, config.schedule.minute),
        api_port = config.api.port,
        "Configuration loaded"
    );

    let tenants = Arc::new(
        TenantStore::new(&config.store.db_path).context("Failed to initialize tenant store")?,
    );
    let links = Arc::new(
        LinkStore::new(&config.store.db_path, &encryption_key)
            .context("Failed to initialize link store")?,
    );
    tracing::info!("Stores initialized");

    let snapshots = Arc::new(SnapshotWriter::new(Arc::new(FsObjectStore::new(
        &config.snapshot.root_dir,
    ))));
    let tokens = Arc::new(TokenManager::new(Arc::clone(&links)));

    let ctx = SyncContext {
        links,
        tokens,
        snapshots,
        page_size: config.sync.page_size,
        max_pages: config.sync.max_pages,
    };

    let orchestrator = Arc::new(Orchestrator::new(
        tenants,
        ctx,
        default_adapters(),
        config.sync.pacing_ms,
        config.sync.min_sync_interval_hours,
    ));

    // Daily schedule trigger
    let trigger = ScheduleTrigger::new(
        Arc::clone(&orchestrator),
        config.schedule.hour,
        config.schedule.minute,
    );
    let schedule_handle = tokio::spawn(trigger.run());

    // Manual trigger API
    let api = router(ApiState {
        orchestrator: Arc::clone(&orchestrator),
    });
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.api.port))
        .await
        .context("Failed to bind API port")?;
    tracing::info!(port = config.api.port, "Sync API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, api).await {
            tracing::error!(error = %e, "Sync API server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    tracing::info!("Shutdown signal received");

    schedule_handle.abort();
    server_handle.abort();
    tracing::info!("Sync engine stopped");

    Ok(())
}
