//! NATS connection configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

/// Configuration for NATS connections with sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct NatsConfig {
    /// NATS server URL (comma-separated for clustering)
    #[cfg_attr(
        feature = "config",
        arg(long = "nats-url", env = "NATS_URL", default_value = "nats://127.0.0.1:4222")
    )]
    pub nats_url: String,

    /// Authentication token (optional)
    #[cfg_attr(feature = "config", arg(long = "nats-token", env = "NATS_TOKEN"))]
    #[serde(skip_serializing)]
    pub nats_token: Option<String>,

    /// Client connection name for debugging and monitoring
    #[cfg_attr(
        feature = "config",
        arg(long = "nats-client-name", env = "NATS_CLIENT_NAME")
    )]
    pub nats_client_name: Option<String>,

    /// Connection timeout in seconds (optional)
    #[cfg_attr(
        feature = "config",
        arg(long = "nats-connect-timeout", env = "NATS_CONNECT_TIMEOUT_SECS")
    )]
    pub nats_connect_timeout: Option<u64>,

    /// Maximum number of reconnection attempts (0 = unlimited)
    #[cfg_attr(
        feature = "config",
        arg(long = "nats-max-reconnects", env = "NATS_MAX_RECONNECTS")
    )]
    pub nats_max_reconnects: Option<usize>,

    /// Maximum age in seconds of a queued message before the stream discards it
    #[cfg_attr(
        feature = "config",
        arg(long = "nats-queue-max-age", env = "NATS_QUEUE_MAX_AGE_SECS")
    )]
    pub nats_queue_max_age: Option<u64>,

    /// Maximum size in bytes of a queue stream; the oldest messages are discarded first
    #[cfg_attr(
        feature = "config",
        arg(long = "nats-queue-max-bytes", env = "NATS_QUEUE_MAX_BYTES")
    )]
    pub nats_queue_max_bytes: Option<u64>,
}

// Default values
const DEFAULT_NAME: &str = "postbox";
const DEFAULT_MAX_RECONNECTS: usize = 10;
const DEFAULT_RECONNECT_DELAY_SECS: u64 = 2;
const DEFAULT_PING_INTERVAL_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_QUEUE_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_QUEUE_MAX_BYTES: u64 = 1024 * 1024 * 1024;

impl Default for NatsConfig {
    fn default() -> Self {
        Self::new("nats://127.0.0.1:4222")
    }
}

impl NatsConfig {
    /// Create a new configuration with a server URL and no token.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            nats_url: server_url.into(),
            nats_token: None,
            nats_client_name: None,
            nats_connect_timeout: None,
            nats_max_reconnects: None,
            nats_queue_max_age: None,
            nats_queue_max_bytes: None,
        }
    }

    /// Returns the client name, using the default if not set.
    #[inline]
    pub fn name(&self) -> &str {
        self.nats_client_name.as_deref().unwrap_or(DEFAULT_NAME)
    }

    /// Returns the authentication token, if one is configured.
    #[inline]
    pub fn token(&self) -> Option<&str> {
        self.nats_token.as_deref().filter(|token| !token.is_empty())
    }

    /// Returns the server URLs (splits comma-separated URLs).
    pub fn servers(&self) -> Vec<&str> {
        self.nats_url.split(',').map(str::trim).collect()
    }

    /// Returns the connection timeout, falling back to the default.
    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.nats_connect_timeout
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    /// Returns the reconnect delay as a Duration.
    #[inline]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(DEFAULT_RECONNECT_DELAY_SECS)
    }

    /// Returns the ping interval as a Duration.
    #[inline]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(DEFAULT_PING_INTERVAL_SECS)
    }

    /// Returns the max reconnects as Option (0 means unlimited).
    #[inline]
    pub fn max_reconnects_option(&self) -> Option<usize> {
        let max = self.nats_max_reconnects.unwrap_or(DEFAULT_MAX_RECONNECTS);
        if max == 0 { None } else { Some(max) }
    }

    /// Returns how long a queued message is kept (7 days by default).
    #[inline]
    pub fn queue_max_age(&self) -> Duration {
        Duration::from_secs(self.nats_queue_max_age.unwrap_or(DEFAULT_QUEUE_MAX_AGE_SECS))
    }

    /// Returns the size limit of a queue stream (1 GiB by default).
    #[inline]
    pub fn queue_max_bytes(&self) -> u64 {
        self.nats_queue_max_bytes.unwrap_or(DEFAULT_QUEUE_MAX_BYTES)
    }

    /// Set the authentication token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.nats_token = Some(token.into());
        self
    }

    /// Set the client connection name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.nats_client_name = Some(name.into());
        self
    }

    /// Set the connection timeout in seconds.
    #[must_use]
    pub fn with_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.nats_connect_timeout = Some(secs);
        self
    }

    /// Set maximum reconnection attempts (0 for unlimited).
    #[must_use]
    pub fn with_max_reconnects(mut self, max_reconnects: usize) -> Self {
        self.nats_max_reconnects = Some(max_reconnects);
        self
    }

    /// Set the retention limits of queue streams.
    #[must_use]
    pub fn with_queue_limits(mut self, max_age_secs: u64, max_bytes: u64) -> Self {
        self.nats_queue_max_age = Some(max_age_secs);
        self.nats_queue_max_bytes = Some(max_bytes);
        self
    }

    /// Validate the configuration and return any issues.
    pub fn validate(&self) -> Result<(), String> {
        for server in self.servers() {
            if server.is_empty() {
                return Err("Server URL cannot be empty".to_string());
            }
            if !server.starts_with("nats://") && !server.starts_with("tls://") {
                return Err(format!("Invalid server URL format: {}", server));
            }
        }

        if self.nats_connect_timeout == Some(0) {
            return Err("Connect timeout must be greater than zero".to_string());
        }

        // Zero means unlimited to JetStream.
        if self.nats_queue_max_age == Some(0) || self.nats_queue_max_bytes == Some(0) {
            return Err("Queue retention limits must be greater than zero".to_string());
        }

        if i64::try_from(self.queue_max_bytes()).is_err() {
            return Err("Queue max bytes is too large".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config() {
        let config = NatsConfig::new("nats://localhost:4222");
        assert_eq!(config.servers(), vec!["nats://localhost:4222"]);
        assert_eq!(config.token(), None);
        assert_eq!(config.name(), "postbox");
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_reconnects_option(), Some(10));
        assert_eq!(config.queue_max_age(), Duration::from_secs(604_800));
        assert_eq!(config.queue_max_bytes(), 1 << 30);
    }

    #[test]
    fn test_config_builder() {
        let config = NatsConfig::new("nats://localhost:4222")
            .with_token("secret")
            .with_name("relay-1")
            .with_connect_timeout_secs(5)
            .with_max_reconnects(5);

        assert_eq!(config.token(), Some("secret"));
        assert_eq!(config.name(), "relay-1");
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_reconnects_option(), Some(5));
    }

    #[test]
    fn test_empty_token_is_ignored() {
        let config = NatsConfig::new("nats://localhost:4222").with_token("");
        assert_eq!(config.token(), None);
    }

    #[test]
    fn test_unlimited_reconnects() {
        let config = NatsConfig::new("nats://localhost:4222").with_max_reconnects(0);
        assert_eq!(config.max_reconnects_option(), None);
    }

    #[test]
    fn test_config_validation() {
        assert!(NatsConfig::new("nats://localhost:4222").validate().is_ok());
        assert!(NatsConfig::new("tls://nats.internal:4222").validate().is_ok());
        assert!(NatsConfig::new("").validate().is_err());
        assert!(NatsConfig::new("http://localhost:4222").validate().is_err());
        assert!(
            NatsConfig::new("nats://localhost:4222")
                .with_connect_timeout_secs(0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_queue_limits() {
        let config = NatsConfig::new("nats://localhost:4222").with_queue_limits(3600, 4096);
        assert_eq!(config.queue_max_age(), Duration::from_secs(3600));
        assert_eq!(config.queue_max_bytes(), 4096);
        assert!(config.validate().is_ok());

        let unlimited = NatsConfig::new("nats://localhost:4222").with_queue_limits(0, 4096);
        assert!(unlimited.validate().is_err());

        let oversized = NatsConfig::new("nats://localhost:4222").with_queue_limits(60, u64::MAX);
        assert!(oversized.validate().is_err());
    }

    #[test]
    fn test_multiple_servers() {
        let config = NatsConfig::new("nats://localhost:4222, nats://localhost:4223");
        assert_eq!(
            config.servers(),
            vec!["nats://localhost:4222", "nats://localhost:4223"]
        );
    }

    #[test]
    fn test_token_is_not_serialized() {
        let config = NatsConfig::new("nats://localhost:4222").with_token("secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
