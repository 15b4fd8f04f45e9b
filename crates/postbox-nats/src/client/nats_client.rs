//! NATS client wrapper and connection management.
//!
//! The `NatsClient` uses the underlying `async-nats` client, which keeps one
//! multiplexed TCP connection. Cloning the client is cheap and clones share the
//! connection, so the relay's queue and object store backends hold clones of a
//! single client.

use std::sync::Arc;
use std::time::Duration;

use async_nats::{Client, ConnectOptions, jetstream};
use tokio::time::timeout;

use super::nats_config::NatsConfig;
use crate::{Error, Result, TRACING_TARGET_CLIENT, TRACING_TARGET_CONNECTION};

/// Upper bound for a single ping round trip.
const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for the reconnect backoff.
const MAX_RECONNECT_DELAY_MS: u64 = 30_000;

/// NATS client wrapper with connection management.
///
/// This wrapper is cheaply cloneable and thread-safe.
#[derive(Debug, Clone)]
pub struct NatsClient {
    inner: Arc<NatsClientInner>,
}

#[derive(Debug)]
struct NatsClientInner {
    client: Client,
    jetstream: jetstream::Context,
    config: NatsConfig,
}

impl NatsClient {
    /// Create a new NATS client and connect
    #[tracing::instrument(skip(config), fields(url = %config.nats_url))]
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        config.validate().map_err(Error::invalid_config)?;

        tracing::info!(
            target: TRACING_TARGET_CONNECTION,
            "Connecting to NATS servers: {}", config.nats_url
        );

        let connect_timeout = config.connect_timeout();
        let mut connect_opts = ConnectOptions::new()
            .name(config.name())
            .ping_interval(config.ping_interval())
            .connection_timeout(connect_timeout);

        if let Some(token) = config.token() {
            connect_opts = connect_opts.token(token.to_owned());
        }

        if let Some(max_reconnects) = config.max_reconnects_option() {
            connect_opts = connect_opts.max_reconnects(max_reconnects);
        }

        let reconnect_delay_ms = config.reconnect_delay().as_millis().min(u64::MAX as u128) as u64;
        connect_opts = connect_opts.reconnect_delay_callback(move |attempts| {
            Duration::from_millis(std::cmp::min(
                reconnect_delay_ms.saturating_mul(2_u64.saturating_pow(attempts.min(32) as u32)),
                MAX_RECONNECT_DELAY_MS,
            ))
        });

        let client = timeout(
            connect_timeout,
            async_nats::connect_with_options(&config.nats_url, connect_opts),
        )
        .await
        .map_err(|_| Error::timeout(connect_timeout))?
        .map_err(|e| Error::Connection(Box::new(e)))?;

        let jetstream = jetstream::new(client.clone());

        let server_info = client.server_info();
        tracing::info!(
            target: TRACING_TARGET_CONNECTION,
            server_host = %server_info.host,
            server_version = %server_info.version,
            server_id = %server_info.server_id,
            max_payload = server_info.max_payload,
            "Successfully connected to NATS"
        );

        Ok(Self {
            inner: Arc::new(NatsClientInner {
                client,
                jetstream,
                config,
            }),
        })
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &NatsConfig {
        &self.inner.config
    }

    /// Returns the JetStream context.
    #[must_use]
    pub fn jetstream(&self) -> &jetstream::Context {
        &self.inner.jetstream
    }

    /// Test connectivity with a ping
    #[tracing::instrument(skip(self), target = TRACING_TARGET_CONNECTION)]
    pub async fn ping(&self) -> Result<Duration> {
        let start = std::time::Instant::now();

        timeout(PING_TIMEOUT, self.inner.client.flush())
            .await
            .map_err(|_| Error::timeout(PING_TIMEOUT))?
            .map_err(|e| Error::Connection(Box::new(e)))?;

        let ping_time = start.elapsed();
        tracing::debug!(
            target: TRACING_TARGET_CLIENT,
            duration_ms = ping_time.as_millis(),
            "NATS ping successful"
        );
        Ok(ping_time)
    }

    /// Check if the client is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(
            self.inner.client.connection_state(),
            async_nats::connection::State::Connected
        )
    }

    /// Reports connection health from a ping round trip.
    pub async fn health(&self) -> postbox_core::ServiceHealth {
        use postbox_core::ServiceHealth;

        if !self.is_connected() {
            return ServiceHealth::unhealthy("NATS connection is not established");
        }

        match self.ping().await {
            Ok(elapsed) if elapsed > PING_TIMEOUT / 2 => {
                ServiceHealth::degraded("NATS ping is slow").with_response_time(elapsed)
            }
            Ok(elapsed) => ServiceHealth::healthy().with_response_time(elapsed),
            Err(err) => ServiceHealth::unhealthy(err.to_string()),
        }
    }
}
