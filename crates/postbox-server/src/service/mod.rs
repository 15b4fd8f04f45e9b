//! Application state and dependency injection.

mod config;

use std::fmt;
use std::sync::Arc;

use postbox_core::{
    MessageConsumer, MessageRelay, ObjectStorage, QueuePublisher, QueueSubscriber, RelayConfig,
};

pub use crate::service::config::{ObjectStoreKind, ServiceConfig, ServiceConfigBuilder};
pub use crate::{Error, Result};

/// Tracing target for service initialization.
const TRACING_TARGET: &str = "postbox_server::service";

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection). The relay and the
/// consumer share one immutable [`RelayConfig`] and one object store.
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Clone)]
pub struct ServiceState {
    relay: MessageRelay,
    consumer: MessageConsumer,
    subscriber: Arc<dyn QueueSubscriber>,
}

impl ServiceState {
    /// Creates the state over an already connected queue and object store.
    pub fn new<Q>(config: RelayConfig, queue: Q, storage: Arc<dyn ObjectStorage>) -> Self
    where
        Q: QueuePublisher + QueueSubscriber + 'static,
    {
        let config = Arc::new(config);
        let queue = Arc::new(queue);

        Self {
            relay: MessageRelay::new(config.clone(), queue.clone(), storage.clone()),
            consumer: MessageConsumer::new(config, storage),
            subscriber: queue,
        }
    }

    /// Initializes application state from configuration.
    ///
    /// Validates the configuration, connects to NATS and opens the configured
    /// object store.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;

        let nats_client = config.connect_nats().await?;
        let storage = config.create_storage(&nats_client)?;
        let queue = postbox_nats::NatsQueue::new(nats_client);

        tracing::info!(
            target: TRACING_TARGET,
            queue = %config.relay.queue_name,
            bucket = %config.relay.bucket_name,
            mode = %config.relay.mode,
            object_store = %config.object_store,
            "Service state initialized"
        );

        Ok(Self::new(config.relay.clone(), queue, storage))
    }

    /// Returns the relay configuration.
    pub fn relay_config(&self) -> &RelayConfig {
        self.relay.config()
    }

    /// Returns the subscriber the consumer worker reads from.
    pub fn subscriber(&self) -> Arc<dyn QueueSubscriber> {
        self.subscriber.clone()
    }
}

impl fmt::Debug for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceState")
            .field("relay", &self.relay)
            .finish_non_exhaustive()
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

impl_di!(relay: MessageRelay);
impl_di!(consumer: MessageConsumer);
