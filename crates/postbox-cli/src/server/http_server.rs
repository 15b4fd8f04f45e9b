//! HTTP server startup.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::TRACING_TARGET_SERVER_STARTUP;
use crate::config::ServerConfig;
use crate::server::{
    ServerError, ServerResult, drain_within, serve_with_shutdown, shutdown_trigger,
};

/// Starts an HTTP server with graceful shutdown.
///
/// Shuts down on Ctrl+C, SIGTERM or cancellation of `cancel`, then gives
/// in-flight requests up to the configured shutdown timeout to complete.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the address cannot be
/// bound, the server fails while running, or draining exceeds the timeout.
pub async fn serve_http(
    app: Router,
    server_config: ServerConfig,
    cancel: CancellationToken,
) -> ServerResult<()> {
    if let Err(validation_error) = server_config.validate() {
        tracing::error!(
            target: TRACING_TARGET_SERVER_STARTUP,
            error = %validation_error,
            "Invalid server configuration"
        );

        return Err(ServerError::invalid_config(&validation_error));
    }

    let server_addr = server_config.server_addr();

    let listener = match TcpListener::bind(server_addr).await {
        Ok(listener) => {
            tracing::info!(
                target: TRACING_TARGET_SERVER_STARTUP,
                addr = %server_addr,
                "Server is ready and listening for connections"
            );

            listener
        }
        Err(listener_err) => {
            let error = ServerError::bind_error(&server_addr.to_string(), listener_err);

            tracing::error!(
                target: TRACING_TARGET_SERVER_STARTUP,
                error = %error,
                error_code = error.error_code(),
                network_error = error.is_network_error(),
                suggestion = error.suggestion(),
                "Failed to bind to address"
            );

            return Err(error);
        }
    };

    let draining = CancellationToken::new();
    let shutdown_signal = {
        let draining = draining.clone();
        async move {
            shutdown_trigger(cancel).await;
            draining.cancel();
        }
    };

    let drain_timeout = server_config.shutdown_timeout();
    serve_with_shutdown(&server_config, || async move {
        let server = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal);

        drain_within(server.into_future(), draining, drain_timeout).await
    })
    .await
    .map_err(ServerError::Runtime)
}
