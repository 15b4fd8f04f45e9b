//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── server: ServerConfig          # Host, port, shutdown
//! ├── middleware: MiddlewareConfig  # OpenAPI paths, request timeout
//! └── service: ServiceConfig        # Relay names and mode, NATS, object store
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.

mod middleware;
mod server;

use std::process;

use anyhow::Context;
use clap::Parser;
pub use middleware::MiddlewareConfig;
use postbox_server::service::ServiceConfig;
use serde::{Deserialize, Serialize};
pub use server::ServerConfig;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_SERVER_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "postbox")]
#[command(about = "Message relay over a work queue and an object store")]
#[command(version)]
pub struct Cli {
    /// Server network and lifecycle configuration.
    #[clap(flatten)]
    pub server: ServerConfig,

    /// HTTP middleware configuration (OpenAPI, timeouts).
    #[clap(flatten)]
    pub middleware: MiddlewareConfig,

    /// Relay and backend configuration.
    #[clap(flatten)]
    pub service: ServiceConfig,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded first so clap's `env` fallbacks can see its values.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .validate()
            .context("invalid server configuration")?;
        self.service
            .validate()
            .context("invalid service configuration")?;
        Ok(())
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        Self::log_build_info();
        self.server.log();
        self.middleware.log();

        let relay = &self.service.relay;
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            queue = %relay.queue_name,
            bucket = %relay.bucket_name,
            mode = %relay.mode,
            object_store = %self.service.object_store,
            "Relay configuration"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            nats_url = %self.service.nats.nats_url,
            client_name = %self.service.nats.name(),
            token_configured = self.service.nats.token().is_some(),
            storage_backend = %self.service.storage.backend_type,
            "Backend configuration"
        );
    }

    fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_SERVER_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );
    }

    fn enabled_features() -> Vec<&'static str> {
        [
            cfg!(feature = "dotenv").then_some("dotenv"),
            cfg!(feature = "s3").then_some("s3"),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use postbox_server::service::ObjectStoreKind;

    use super::*;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_minimal_arguments() {
        let cli = Cli::try_parse_from([
            "postbox",
            "--queue-name",
            "message-queue",
            "--bucket-name",
            "message-bucket",
        ])
        .unwrap();

        assert_eq!(cli.service.relay.queue_name, "message-queue");
        assert_eq!(cli.service.relay.bucket_name, "message-bucket");
        assert_eq!(cli.service.object_store, ObjectStoreKind::Nats);
        assert_eq!(cli.server.port, 3000);
        assert_eq!(cli.middleware.recovery.request_timeout, 30);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn parses_delegated_opendal() {
        let cli = Cli::try_parse_from([
            "postbox",
            "--queue-name",
            "q",
            "--bucket-name",
            "b",
            "--relay-mode",
            "delegated",
            "--object-store",
            "opendal",
        ])
        .unwrap();

        assert!(cli.service.relay.mode.requires_consumer());
        assert_eq!(cli.service.object_store, ObjectStoreKind::Opendal);
    }

    #[test]
    fn rejects_privileged_port() {
        let cli = Cli::try_parse_from([
            "postbox",
            "--queue-name",
            "q",
            "--bucket-name",
            "b",
            "--port",
            "80",
        ])
        .unwrap();

        assert!(cli.validate().is_err());
    }
}
