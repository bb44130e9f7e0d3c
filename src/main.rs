//! MeshAuth Server - authentication core for the service mesh.
//!
//! Wires the auth components over in-memory stores and runs the periodic
//! cleanup until shutdown.

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use meshauth_auth::AuthServices;
use meshauth_core::config::AppConfig;
use meshauth_core::error::AppError;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from `config/` and the environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("MESHAUTH_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting MeshAuth v{}", env!("CARGO_PKG_VERSION"));

    let cleanup_enabled = config.cleanup.enabled;
    let services = AuthServices::in_memory(config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let cleanup_handle = if cleanup_enabled {
        let scheduler = services.scheduler();
        let handle = tokio::spawn(async move {
            scheduler.run(shutdown_rx).await;
        });
        tracing::info!("Cleanup scheduler started");
        Some(handle)
    } else {
        tracing::info!("Cleanup scheduler disabled");
        None
    };

    tracing::info!(service = %services.config.service.name, "MeshAuth ready");

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping background tasks...");
    let _ = shutdown_tx.send(true);

    if let Some(handle) = cleanup_handle {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(30), handle).await;
    }

    tracing::info!("MeshAuth shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
