//! Message relay: the write and read paths.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use crate::{
    Message, ObjectStorage, QueuePublisher, RelayConfig, RelayMode, Result, ServiceHealth,
    TRACING_TARGET_RELAY,
};

/// Publishes messages to the queue and reads their content back from the store.
///
/// In [`RelayMode::Direct`] the relay uploads content itself after publishing.
/// In [`RelayMode::Delegated`] it only publishes, and a [`MessageConsumer`]
/// materializes the object later.
///
/// [`MessageConsumer`]: crate::MessageConsumer
#[derive(Clone)]
pub struct MessageRelay {
    config: Arc<RelayConfig>,
    publisher: Arc<dyn QueuePublisher>,
    storage: Arc<dyn ObjectStorage>,
}

impl MessageRelay {
    /// Creates a new relay over the given backends.
    pub fn new(
        config: Arc<RelayConfig>,
        publisher: Arc<dyn QueuePublisher>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            config,
            publisher,
            storage,
        }
    }

    /// Returns the relay configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Returns the configured relay mode.
    pub fn mode(&self) -> RelayMode {
        self.config.mode
    }

    /// Creates a message with a fresh identifier and relays it.
    ///
    /// A publish failure aborts before any upload. In direct mode an upload
    /// failure is returned even though the message was already published.
    #[tracing::instrument(skip_all, fields(uuid = tracing::field::Empty, mode = %self.config.mode))]
    pub async fn create(&self, content: impl Into<String>) -> Result<Uuid> {
        let message = Message::new(content);
        tracing::Span::current().record("uuid", tracing::field::display(message.uuid));

        self.publisher
            .publish(&self.config.queue_name, &message)
            .await
            .inspect_err(|err| {
                tracing::error!(
                    target: TRACING_TARGET_RELAY,
                    queue = %self.config.queue_name,
                    error = %err,
                    "Failed to publish message"
                );
            })?;

        tracing::debug!(
            target: TRACING_TARGET_RELAY,
            queue = %self.config.queue_name,
            "Message published"
        );

        if self.config.mode.uploads_inline() {
            let size = message.content.len();
            self.storage
                .upload(
                    &self.config.bucket_name,
                    &message.key(),
                    Bytes::from(message.content.into_bytes()),
                )
                .await
                .inspect_err(|err| {
                    tracing::error!(
                        target: TRACING_TARGET_RELAY,
                        bucket = %self.config.bucket_name,
                        error = %err,
                        "Failed to upload message after publishing"
                    );
                })?;

            tracing::debug!(
                target: TRACING_TARGET_RELAY,
                bucket = %self.config.bucket_name,
                size,
                "Message uploaded"
            );
        }

        Ok(message.uuid)
    }

    /// Reads the message stored under `uuid`.
    #[tracing::instrument(skip(self), fields(bucket = %self.config.bucket_name))]
    pub async fn get(&self, uuid: Uuid) -> Result<Message> {
        let content = self
            .storage
            .download_as_string(&self.config.bucket_name, &uuid.to_string())
            .await?;

        tracing::debug!(
            target: TRACING_TARGET_RELAY,
            size = content.len(),
            "Message retrieved"
        );

        Ok(Message::with_uuid(uuid, content))
    }

    /// Reports the combined health of the queue and the store.
    pub async fn health_check(&self) -> ServiceHealth {
        let queue = self
            .publisher
            .health_check()
            .await
            .unwrap_or_else(|err| ServiceHealth::unhealthy(format!("queue: {err}")));
        let storage = self
            .storage
            .health_check()
            .await
            .unwrap_or_else(|err| ServiceHealth::unhealthy(format!("storage: {err}")));

        queue.combine(storage)
    }
}

impl fmt::Debug for MessageRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRelay")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::{Error, ErrorKind, ServiceStatus};

    #[derive(Default)]
    struct RecordingQueue {
        published: Mutex<Vec<(String, Message)>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl QueuePublisher for RecordingQueue {
        async fn publish(&self, queue: &str, message: &Message) -> Result<()> {
            if self.fail {
                return Err(Error::publish().with_message("queue unavailable"));
            }
            let mut published = self.published.lock().unwrap();
            published.push((queue.to_owned(), message.clone()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct MapStorage {
        objects: Mutex<HashMap<(String, String), Bytes>>,
    }

    #[async_trait::async_trait]
    impl ObjectStorage for MapStorage {
        async fn upload(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
            let mut objects = self.objects.lock().unwrap();
            objects.insert((bucket.to_owned(), key.to_owned()), data);
            Ok(())
        }

        async fn download(&self, bucket: &str, key: &str) -> Result<Bytes> {
            let objects = self.objects.lock().unwrap();
            objects
                .get(&(bucket.to_owned(), key.to_owned()))
                .cloned()
                .ok_or_else(Error::not_found)
        }

        async fn health_check(&self) -> Result<ServiceHealth> {
            Ok(ServiceHealth::degraded("slow disk"))
        }
    }

    fn relay(
        mode: RelayMode,
        queue: Arc<RecordingQueue>,
        storage: Arc<MapStorage>,
    ) -> MessageRelay {
        let config = RelayConfig::new("orders", "order-bodies").with_mode(mode);
        MessageRelay::new(Arc::new(config), queue, storage)
    }

    #[tokio::test]
    async fn direct_publishes_then_uploads() {
        let queue = Arc::new(RecordingQueue::default());
        let storage = Arc::new(MapStorage::default());
        let relay = relay(RelayMode::Direct, queue.clone(), storage.clone());

        let uuid = relay.create("hello").await.unwrap();

        let published = queue.published.lock().unwrap().clone();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "orders");
        assert_eq!(published[0].1, Message::with_uuid(uuid, "hello"));

        let message = relay.get(uuid).await.unwrap();
        assert_eq!(message.content, "hello");
    }

    #[tokio::test]
    async fn delegated_only_publishes() {
        let queue = Arc::new(RecordingQueue::default());
        let storage = Arc::new(MapStorage::default());
        let relay = relay(RelayMode::Delegated, queue.clone(), storage.clone());

        let uuid = relay.create("later").await.unwrap();

        assert_eq!(queue.published.lock().unwrap().len(), 1);
        assert!(storage.objects.lock().unwrap().is_empty());
        let error = relay.get(uuid).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn publish_failure_skips_upload() {
        let queue = Arc::new(RecordingQueue {
            fail: true,
            ..Default::default()
        });
        let storage = Arc::new(MapStorage::default());
        let relay = relay(RelayMode::Direct, queue, storage.clone());

        let error = relay.create("lost").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Publish);
        assert!(storage.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn health_combines_backends() {
        let relay = relay(
            RelayMode::Direct,
            Arc::new(RecordingQueue::default()),
            Arc::new(MapStorage::default()),
        );
        let health = relay.health_check().await;
        assert_eq!(health.status, ServiceStatus::Degraded);
    }
}
