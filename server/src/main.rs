//! Turnstile HTTP server.
//!
//! Wires the ticket store, issuance/verification services, and the Axum
//! router together, then serves until a shutdown signal arrives.

mod config;

use crate::config::{Config, StoreBackend};
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use turnstile_core::{MemoryTicketStore, TicketStore};
use turnstile_postgres::PostgresTicketStore;
use turnstile_web::{AppState, StaticTokenVerifier, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turnstile=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Turnstile server");

    // Load configuration
    let config = Config::from_env();
    info!(
        backend = ?config.store_backend,
        host = %config.server.host,
        port = config.server.port,
        shutdown_timeout_secs = config.server.shutdown_timeout,
        offline_payloads = config.base_url.is_none(),
        "Configuration loaded"
    );

    if config.scanner_credentials.is_empty() {
        warn!("SCANNER_TOKENS is empty; no scanner will be able to authenticate");
    }

    // Expose metrics for Prometheus scraping
    let metrics_addr: SocketAddr =
        format!("{}:{}", config.server.metrics_host, config.server.metrics_port).parse()?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()?;
    info!(address = %metrics_addr, "Metrics exporter listening");

    // Build the ticket store
    let store: Arc<dyn TicketStore> = match config.store_backend {
        StoreBackend::Postgres => {
            info!("Connecting to ticket database...");
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .acquire_timeout(Duration::from_secs(config.database.connect_timeout))
                .idle_timeout(Duration::from_secs(config.database.idle_timeout))
                .connect(&config.database.url)
                .await?;
            PostgresTicketStore::run_migrations(&pool).await?;
            info!("Ticket database ready");
            Arc::new(PostgresTicketStore::from_pool(pool))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory ticket store; tickets will not survive a restart");
            Arc::new(MemoryTicketStore::new())
        }
    };

    // Assemble application state and router
    let verifier = Arc::new(StaticTokenVerifier::new(config.scanner_credentials.clone()));
    let state = AppState::new(store, verifier, None, config.base_url.clone());
    let app = build_router(state);

    // Serve with graceful shutdown
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Duration::from_secs(
            config.server.shutdown_timeout,
        )))
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Graceful shutdown signal handler.
///
/// Waits for Ctrl+C (SIGINT) or SIGTERM. Once a signal arrives, a
/// watchdog gives in-flight requests `deadline` to drain before the
/// process is terminated.
async fn shutdown_signal(deadline: Duration) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }

    tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        error!("Shutdown deadline exceeded, terminating");
        std::process::exit(1);
    });
}
