#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;
mod telemetry;

use std::process;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use postbox_server::handler::router;
use postbox_server::middleware::{RouterObservabilityExt, RouterRecoveryExt};
use postbox_server::service::ServiceState;
use postbox_server::worker::ConsumerWorker;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Cli, MiddlewareConfig};

// Tracing target constants
pub const TRACING_TARGET_SERVER_STARTUP: &str = "postbox_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "postbox_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "postbox_cli::config";
pub const TRACING_TARGET_WORKER: &str = "postbox_cli::worker";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            "Application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = format!("{error:#}"),
            "Application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    telemetry::init_tracing()?;
    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        "Starting postbox"
    );

    cli.log();
    cli.validate()?;

    let state = ServiceState::from_config(&cli.service)
        .await
        .context("failed to create service state")?;

    let cancel = CancellationToken::new();
    let worker = spawn_consumer_worker(&state, cancel.clone());
    let router = create_router(state, &cli.middleware);

    let served = server::serve(router, cli.server.clone(), cancel.clone()).await;

    cancel.cancel();
    let stopped = match worker {
        Some(worker) => stop_consumer_worker(worker, cli.server.shutdown_timeout()).await,
        None => Ok(()),
    };

    served?;
    stopped
}

/// Creates the router with all middleware layers applied.
///
/// Middleware is applied in reverse order (last added = outermost):
/// 1. Recovery (outermost) - catches panics and enforces timeouts
/// 2. Observability - request IDs and tracing spans
/// 3. Routes (innermost) - relay handlers and OpenAPI document
fn create_router(state: ServiceState, middleware: &MiddlewareConfig) -> Router {
    router(state, middleware.openapi.clone())
        .with_observability()
        .with_recovery(&middleware.recovery)
}

/// Starts the queue consumer when the relay runs in delegated mode.
///
/// The worker cancels `cancel` when it exits for any reason, panics included,
/// so the server never keeps accepting messages nobody stores.
fn spawn_consumer_worker(
    state: &ServiceState,
    cancel: CancellationToken,
) -> Option<JoinHandle<postbox_server::Result<()>>> {
    let mode = state.relay_config().mode;
    if !mode.requires_consumer() {
        tracing::info!(
            target: TRACING_TARGET_WORKER,
            mode = %mode,
            "Consumer worker not required"
        );
        return None;
    }

    let worker = ConsumerWorker::from_state(state);
    Some(tokio::spawn(async move {
        let _shutdown = cancel.clone().drop_guard();
        worker.run(cancel).await
    }))
}

/// Waits for the cancelled consumer worker, bounded by the shutdown timeout.
///
/// A worker that failed or panicked is reported as an error.
async fn stop_consumer_worker(
    handle: JoinHandle<postbox_server::Result<()>>,
    shutdown_timeout: Duration,
) -> anyhow::Result<()> {
    match tokio::time::timeout(shutdown_timeout, handle).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(err))) => {
            tracing::error!(
                target: TRACING_TARGET_WORKER,
                error = %err,
                "Consumer worker exited with error"
            );
            Err(err).context("consumer worker failed")
        }
        Ok(Err(join_err)) => {
            tracing::error!(
                target: TRACING_TARGET_WORKER,
                error = %join_err,
                "Consumer worker task failed"
            );
            Err(join_err).context("consumer worker task failed")
        }
        Err(_) => {
            tracing::warn!(
                target: TRACING_TARGET_WORKER,
                timeout_secs = shutdown_timeout.as_secs(),
                "Consumer worker did not stop within the shutdown timeout"
            );
            Ok(())
        }
    }
}
