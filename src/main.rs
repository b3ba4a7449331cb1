use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use tempmail::sweeper::start_sweeper;
use tempmail::web::{AppState, WebServer};
use tempmail::{AttachmentStore, Broadcaster, Config, Database, ExpirySweeper};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let config = match Config::load_with_env(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = tempmail::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        tempmail::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "tempmail stopped with an error");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> tempmail::Result<()> {
    config.validate()?;

    info!("tempmail - disposable email backend");

    let db = Database::open(&config.database.path).await?;
    info!(path = %config.database.path, "Database opened");

    let store = AttachmentStore::new(
        &config.storage.attachments_path,
        config.storage.max_attachment_bytes(),
    )?;
    info!(path = %store.root().display(), "Attachment storage initialized");

    let broadcaster = Arc::new(Broadcaster::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        }
    });

    let sweeper_handle = if config.cleanup.enabled {
        let sweeper = ExpirySweeper::new(
            db.clone(),
            store.clone(),
            Duration::from_secs(config.cleanup.interval_minutes * 60),
        );
        Some(start_sweeper(sweeper, shutdown_rx.clone()))
    } else {
        info!("Expiry sweeper disabled");
        None
    };

    let state = Arc::new(AppState::new(db, store, broadcaster, &config));
    let server = WebServer::new(&config.server, state)?;

    let mut server_shutdown = shutdown_rx;
    server
        .run(async move {
            let _ = server_shutdown.changed().await;
        })
        .await?;

    if let Some(handle) = sweeper_handle {
        let _ = handle.await;
    }
    info!("tempmail stopped");
    Ok(())
}
