//! upt-server binary.
//!
//! Serves a flat upload directory (upload, list, delete) and a fixed set of
//! operator-configured maintenance commands over a small JSON API, next to
//! a static frontend.

mod atomic;
mod commands;
mod config;
mod error;
mod files;
mod frontend;
mod http;
mod logging;
mod reply;
mod router;
mod runner;
mod storage;
mod upload;

use axum_server::Handle;
use clap::Parser;
use shadow_rs::shadow;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use crate::config::{AppConfig, Args};
use crate::runner::CommandRunner;
use crate::storage::Storage;

shadow!(build);

/// Starts the server and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let config = Arc::new(AppConfig::from(Args::parse()));
    let storage = Arc::new(Storage::new(config.upload_dir.clone()));
    storage.ensure_root().await.map_err(|err| {
        std::io::Error::new(
            err.kind(),
            format!(
                "failed to create upload directory {}: {err}",
                config.upload_dir.display()
            ),
        )
    })?;
    let runner = Arc::new(CommandRunner::new(config.command_timeout));

    let addr = SocketAddr::new(config.bind, config.port);
    info!("🚀 Starting HTTP server at {}", addr);
    info!(
        upload_dir = %storage.root_path().display(),
        limit_bytes = config.upload_limit_bytes,
        "📁 Upload directory ready"
    );

    let app = router::build_router(config, storage, runner);
    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
}

/// Waits for Ctrl+C or SIGTERM, then gives open connections 10s to finish.
async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal, shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
