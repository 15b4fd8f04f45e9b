use std::sync::Arc;

#[cfg(feature = "config")]
use clap::{Args, ValueEnum};
use derive_builder::Builder;
use postbox_core::{ObjectStorage, RelayConfig};
use postbox_nats::{NatsClient, NatsConfig, NatsObjectStorage};
use postbox_opendal::{StorageBackend, StorageConfig};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Error, Result};

/// Object store holding message content.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "config", derive(ValueEnum))]
pub enum ObjectStoreKind {
    /// NATS JetStream object store on the same connection as the queue.
    #[default]
    Nats,
    /// OpenDAL storage backend (S3 or in-memory).
    Opendal,
}

/// App [`state`] configuration.
///
/// [`state`]: crate::service::ServiceState
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
#[builder(
    pattern = "owned",
    setter(into, strip_option, prefix = "with"),
    build_fn(validate = "Self::validate")
)]
pub struct ServiceConfig {
    /// Queue and bucket names and the relay mode.
    #[cfg_attr(feature = "config", command(flatten))]
    pub relay: RelayConfig,

    /// Object store holding message content.
    #[cfg_attr(
        feature = "config",
        arg(long = "object-store", env = "OBJECT_STORE", value_enum, default_value_t = ObjectStoreKind::Nats)
    )]
    #[builder(default)]
    #[serde(default)]
    pub object_store: ObjectStoreKind,

    /// NATS connection used for the queue and the NATS object store.
    #[cfg_attr(feature = "config", command(flatten))]
    #[builder(default)]
    pub nats: NatsConfig,

    /// OpenDAL backend, used when `object_store` is `opendal`.
    #[cfg_attr(feature = "config", command(flatten))]
    #[builder(default)]
    #[serde(default)]
    pub storage: StorageConfig,
}

impl ServiceConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Validates the relay names and the backend configuration.
    pub fn validate(&self) -> Result<()> {
        self.relay.validate()?;
        self.nats.validate().map_err(Error::config)?;
        validate_names(&self.relay, self.object_store).map_err(Error::config)?;
        Ok(())
    }

    /// Connects to NATS server.
    pub async fn connect_nats(&self) -> Result<NatsClient> {
        NatsClient::connect(self.nats.clone())
            .await
            .map_err(|e| Error::external("nats", "Failed to connect to NATS").with_source(e))
    }

    /// Opens the configured object store.
    pub fn create_storage(&self, nats_client: &NatsClient) -> Result<Arc<dyn ObjectStorage>> {
        match self.object_store {
            ObjectStoreKind::Nats => Ok(Arc::new(NatsObjectStorage::new(nats_client.clone()))),
            ObjectStoreKind::Opendal => {
                let backend = StorageBackend::new(self.storage.clone()).map_err(|e| {
                    Error::config("Failed to initialize OpenDAL storage").with_source(e)
                })?;
                Ok(Arc::new(backend))
            }
        }
    }
}

impl ServiceConfigBuilder {
    /// Wrapper for builder validation that returns String errors.
    fn validate(builder: &ServiceConfigBuilder) -> Result<(), String> {
        if let Some(nats) = &builder.nats {
            nats.validate()?;
        }

        if let Some(relay) = &builder.relay {
            relay.validate().map_err(|e| e.to_string())?;
            validate_names(relay, builder.object_store.unwrap_or_default())?;
        }

        Ok(())
    }
}

/// Checks the names NATS turns into stream and bucket names.
///
/// The bucket name is only constrained when content goes to the NATS object store.
fn validate_names(relay: &RelayConfig, object_store: ObjectStoreKind) -> Result<(), String> {
    postbox_nats::validate_name("queue", &relay.queue_name).map_err(|e| e.to_string())?;

    if object_store == ObjectStoreKind::Nats {
        postbox_nats::validate_name("bucket", &relay.bucket_name)
            .map_err(|e| e.to_string())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use postbox_core::RelayMode;
    use postbox_opendal::BackendType;

    use super::*;

    fn relay() -> RelayConfig {
        RelayConfig::new("message-queue", "message-bucket")
    }

    #[test]
    fn builder_defaults() {
        let config = ServiceConfig::builder().with_relay(relay()).build().unwrap();

        assert_eq!(config.object_store, ObjectStoreKind::Nats);
        assert_eq!(config.nats.nats_url, "nats://127.0.0.1:4222");
        assert_eq!(config.storage.backend_type, BackendType::Memory);
        assert_eq!(config.relay.mode, RelayMode::Direct);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_requires_relay() {
        assert!(ServiceConfig::builder().build().is_err());
    }

    #[test]
    fn builder_rejects_blank_names() {
        let result = ServiceConfig::builder()
            .with_relay(RelayConfig::new("", "message-bucket"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_rejects_invalid_nats_url() {
        let result = ServiceConfig::builder()
            .with_relay(relay())
            .with_nats(NatsConfig::new("http://localhost:4222"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_rejects_names_nats_cannot_use() {
        let result = ServiceConfig::builder()
            .with_relay(RelayConfig::new("messages.in", "message-bucket"))
            .build();
        assert!(result.is_err());

        let result = ServiceConfig::builder()
            .with_relay(RelayConfig::new("message-queue", "bucket/with/slashes"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn opendal_allows_other_bucket_names() {
        let result = ServiceConfig::builder()
            .with_relay(RelayConfig::new("message-queue", "message.bucket"))
            .with_object_store(ObjectStoreKind::Opendal)
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn opendal_memory_storage_is_created() {
        let config = ServiceConfig::builder()
            .with_relay(relay())
            .with_object_store(ObjectStoreKind::Opendal)
            .build()
            .unwrap();
        assert_eq!(config.storage.backend_type, BackendType::Memory);
        assert!(StorageBackend::new(config.storage.clone()).is_ok());
    }

    #[test]
    fn object_store_kind_parses() {
        use std::str::FromStr;

        assert_eq!(<ObjectStoreKind as FromStr>::from_str("opendal").unwrap(), ObjectStoreKind::Opendal);
        assert_eq!(ObjectStoreKind::Nats.to_string(), "nats");
    }

    #[test]
    fn validate_checks_names_without_builder() {
        let mut config = ServiceConfig::builder().with_relay(relay()).build().unwrap();
        config.relay.queue_name = "messages.in".to_owned();
        assert!(config.validate().is_err());

        config.relay.queue_name = "message-queue".to_owned();
        config.relay.bucket_name = "message.bucket".to_owned();
        assert!(config.validate().is_err());

        config.object_store = ObjectStoreKind::Opendal;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn name_errors_mention_the_resource() {
        let error = validate_names(
            &RelayConfig::new("messages.in", "message-bucket"),
            ObjectStoreKind::Nats,
        )
        .unwrap_err();
        assert!(error.contains("queue name 'messages.in'"));

        let error = validate_names(
            &RelayConfig::new("message-queue", ""),
            ObjectStoreKind::Nats,
        )
        .unwrap_err();
        assert!(error.contains("bucket name cannot be empty"));
    }

    #[tokio::test]
    #[ignore = "requires a NATS server at NATS_URL"]
    async fn connects_to_nats() -> anyhow::Result<()> {
        let url = std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".into());
        let config = ServiceConfig::builder()
            .with_relay(relay())
            .with_nats(NatsConfig::new(url))
            .build()?;

        let client = config.connect_nats().await?;
        assert!(client.is_connected());
        Ok(())
    }
}
