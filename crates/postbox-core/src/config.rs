//! Relay configuration.

#[cfg(feature = "config")]
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Error, Result};

/// How the write path reaches the object store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "config", derive(ValueEnum))]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub enum RelayMode {
    /// Publish to the queue, then upload to the store in the same request.
    #[default]
    Direct,
    /// Publish to the queue only; the queue consumer performs the upload.
    Delegated,
}

impl RelayMode {
    /// Returns `true` if the relay itself uploads message content.
    #[inline]
    pub fn uploads_inline(self) -> bool {
        matches!(self, Self::Direct)
    }

    /// Returns `true` if a queue consumer is required to materialize messages.
    #[inline]
    pub fn requires_consumer(self) -> bool {
        matches!(self, Self::Delegated)
    }
}

/// Destination names and mode, read once at startup.
///
/// Shared as `Arc<RelayConfig>` and never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct RelayConfig {
    /// Queue that receives published messages.
    #[cfg_attr(feature = "config", arg(long = "queue-name", env = "APP_QUEUE"))]
    pub queue_name: String,

    /// Bucket that holds message content keyed by UUID.
    #[cfg_attr(feature = "config", arg(long = "bucket-name", env = "APP_BUCKET"))]
    pub bucket_name: String,

    /// Relay mode for the write path.
    #[cfg_attr(
        feature = "config",
        arg(long = "relay-mode", env = "APP_RELAY_MODE", value_enum, default_value_t = RelayMode::Direct)
    )]
    #[serde(default)]
    pub mode: RelayMode,
}

impl RelayConfig {
    /// Creates a new configuration in [`RelayMode::Direct`].
    pub fn new(queue_name: impl Into<String>, bucket_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            bucket_name: bucket_name.into(),
            mode: RelayMode::Direct,
        }
    }

    /// Sets the relay mode.
    pub fn with_mode(mut self, mode: RelayMode) -> Self {
        self.mode = mode;
        self
    }

    /// Validates that both destination names are present.
    pub fn validate(&self) -> Result<()> {
        if self.queue_name.trim().is_empty() {
            return Err(Error::configuration().with_message("queue name cannot be empty"));
        }

        if self.bucket_name.trim().is_empty() {
            return Err(Error::configuration().with_message("bucket name cannot be empty"));
        }

        Ok(())
    }
}
