use std::net::SocketAddr;

use anyhow::Result;
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use safedrive_service::{
    api::{self, AppState, RouterConfig},
    config::{Config, Environment, StoreBackend},
    db, monitor,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present; variables may also come from the environment.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    std::panic::set_hook(Box::new(|panic| {
        error!(panic = %panic, "Uncaught panic");
    }));

    Config::log_env_report();
    let config = Config::from_env()?;
    info!(config = ?config, "Configuration loaded");

    match &config.store {
        StoreBackend::Postgres { .. } => info!("Using PostgreSQL store"),
        StoreBackend::Sqlite { path } => info!(path = %path.display(), "Using SQLite store"),
    }

    // Pools connect lazily; an unreachable database degrades reads to
    // fallback payloads instead of aborting startup.
    let store = db::connect(&config.store, config.db_max_connections)?;
    match store.migrate().await {
        Ok(()) => info!("Database ready"),
        Err(e) => error!(error = %e, "Database migration failed; continuing without schema"),
    }

    if config.environment != Environment::Test {
        monitor::spawn_memory_logger(monitor::MEMORY_LOG_INTERVAL);
    }

    let state = AppState::new(store.clone(), &config.api_key);
    let app = api::router(state, RouterConfig::from(&config));

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, env = %config.environment, "HTTP server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    store.close().await;
    info!("Store closed");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}
