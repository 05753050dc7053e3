//! Teaching Record System webhook delivery worker.
//!
//! Runs the polling delivery loop alongside an axum management API for
//! endpoint registration and delivery history.

mod config;
mod health;
mod logging;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use config::Config;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use trs_webhooks::{
    webhooks_router, DeliveryWorker, EndpointCache, RequestSigner, WebhookSender, WebhooksState,
    WorkerConfig,
};

#[tokio::main]
async fn main() {
    // Load configuration (fail-fast on missing required values)
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.rust_log);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.host,
        port = config.port,
        env = %config.app_env,
        "Starting webhook delivery worker"
    );

    let pool = match trs_db::connect(&config.database_url, 10).await {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to connect to database: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = trs_db::run_migrations(&pool).await {
        error!("Failed to run migrations: {e}");
        std::process::exit(1);
    }
    info!("Database migrations applied");

    let signer = match RequestSigner::from_pem(&config.signing_key_pem, &config.signing_key_id) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load signing key: {e}");
            std::process::exit(1);
        }
    };

    let sender = match WebhookSender::new(signer, config.cloud_event_source.clone()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to build webhook sender: {e}");
            std::process::exit(1);
        }
    };

    let cache = Arc::new(EndpointCache::new(pool.clone()));

    let cancel = CancellationToken::new();
    let worker = DeliveryWorker::new(
        pool.clone(),
        sender,
        WorkerConfig {
            poll_interval: config.poll_interval,
            batch_size: config.batch_size,
            ..WorkerConfig::default()
        },
        cancel.clone(),
    );
    let worker_handle = tokio::spawn(worker.run());

    let allow_http = !config.app_env.is_production();
    let state = WebhooksState::new(pool.clone(), cache, allow_http);

    let app = Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/ready",
            get(health::ready_handler).with_state(pool.clone()),
        )
        .merge(webhooks_router(state));

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(a) => a,
        Err(e) => {
            error!("Invalid bind address: {e}");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    info!(%addr, "Management API listening");

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Err(e) = serve_result {
        error!("Server error: {e}");
    }

    // Stop the delivery loop and wait for the in-flight batch to commit.
    cancel.cancel();
    if let Err(e) = worker_handle.await {
        error!("Delivery worker task panicked: {e}");
    }

    info!("Shutdown complete");
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
