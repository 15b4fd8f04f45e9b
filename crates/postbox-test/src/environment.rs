//! Uniquely named queue and bucket pair backed by in-memory doubles.

use std::sync::Arc;
use std::time::Duration;

use postbox_core::{
    MessageConsumer, MessageRelay, QueueSubscriber, RelayConfig, RelayMode, Result,
};
use uuid::Uuid;

use crate::{MemoryQueue, MemoryStorage, TRACING_TARGET};

/// How long [`EphemeralEnvironment::drain`] waits for a delivery before stopping.
const DRAIN_POLL: Duration = Duration::from_millis(20);

/// A fresh `message-queue-<uuid>` and `message-bucket-<uuid>` pair.
///
/// Every environment gets its own names, so tests sharing one [`MemoryQueue`] or
/// [`MemoryStorage`] cannot observe each other's messages.
#[derive(Debug, Clone)]
pub struct EphemeralEnvironment {
    queue_name: String,
    bucket_name: String,
    queue: MemoryQueue,
    storage: MemoryStorage,
}

impl Default for EphemeralEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl EphemeralEnvironment {
    /// Creates an environment with fresh backends.
    pub fn new() -> Self {
        Self::with_backends(MemoryQueue::new(), MemoryStorage::new())
    }

    /// Creates an environment over existing backends.
    pub fn with_backends(queue: MemoryQueue, storage: MemoryStorage) -> Self {
        let id = Uuid::new_v4();
        Self {
            queue_name: format!("message-queue-{id}"),
            bucket_name: format!("message-bucket-{id}"),
            queue,
            storage,
        }
    }

    /// Returns the queue name.
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Returns the bucket name.
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Returns the in-memory queue.
    pub fn queue(&self) -> &MemoryQueue {
        &self.queue
    }

    /// Returns the in-memory store.
    pub fn storage(&self) -> &MemoryStorage {
        &self.storage
    }

    /// Builds a relay configuration for the given mode.
    pub fn config(&self, mode: RelayMode) -> RelayConfig {
        RelayConfig::new(&self.queue_name, &self.bucket_name).with_mode(mode)
    }

    /// Builds a relay over the in-memory backends.
    pub fn relay(&self, mode: RelayMode) -> MessageRelay {
        MessageRelay::new(
            Arc::new(self.config(mode)),
            Arc::new(self.queue.clone()),
            Arc::new(self.storage.clone()),
        )
    }

    /// Builds a consumer writing to the in-memory store.
    pub fn consumer(&self) -> MessageConsumer {
        MessageConsumer::new(
            Arc::new(self.config(RelayMode::Delegated)),
            Arc::new(self.storage.clone()),
        )
    }

    /// Processes every pending delivery with [`Self::consumer`].
    ///
    /// Stops when the queue is idle or after the first failed delivery, which is
    /// nak'ed. Returns the number of messages stored.
    pub async fn drain(&self) -> Result<usize> {
        let consumer = self.consumer();
        let mut subscription = self.queue.subscribe(&self.queue_name).await?;
        let mut stored = 0;

        while let Some(delivery) = subscription.next_with_timeout(DRAIN_POLL).await? {
            match consumer.handle(delivery.message()).await {
                Ok(()) => {
                    delivery.ack().await?;
                    stored += 1;
                }
                Err(err) => {
                    tracing::debug!(
                        target: TRACING_TARGET,
                        error = %err,
                        "Delivery failed during drain"
                    );
                    delivery.nak().await?;
                    break;
                }
            }
        }

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use postbox_core::{ErrorKind, ObjectStorage};

    use super::*;

    #[tokio::test]
    async fn direct_round_trip() {
        let env = EphemeralEnvironment::new();
        let relay = env.relay(RelayMode::Direct);

        let uuid = relay.create("hello, postbox").await.unwrap();
        let message = relay.get(uuid).await.unwrap();

        assert_eq!(message.uuid, uuid);
        assert_eq!(message.content, "hello, postbox");
        assert_eq!(env.queue().published(env.queue_name()).await.len(), 1);
    }

    #[tokio::test]
    async fn direct_round_trip_with_empty_content() {
        let env = EphemeralEnvironment::new();
        let relay = env.relay(RelayMode::Direct);

        let uuid = relay.create("").await.unwrap();
        assert_eq!(relay.get(uuid).await.unwrap().content, "");
    }

    #[tokio::test]
    async fn delegated_round_trip_after_consumer() {
        let env = EphemeralEnvironment::new();
        let relay = env.relay(RelayMode::Delegated);

        let uuid = relay.create("eventually").await.unwrap();
        let before = relay.get(uuid).await.unwrap_err();
        assert_eq!(before.kind(), ErrorKind::NotFound);
        assert_eq!(env.storage().upload_calls(), 0);

        assert_eq!(env.drain().await.unwrap(), 1);

        let message = relay.get(uuid).await.unwrap();
        assert_eq!(message.content, "eventually");
        assert_eq!(env.queue().acked(), 1);
    }

    #[tokio::test]
    async fn repeated_upload_keeps_one_object() {
        let env = EphemeralEnvironment::new();
        let storage = env.storage();
        let bucket = env.bucket_name();

        storage.upload(bucket, "key", "same".into()).await.unwrap();
        storage.upload(bucket, "key", "same".into()).await.unwrap();

        assert_eq!(storage.object_count(bucket).await, 1);
        assert_eq!(storage.download_as_string(bucket, "key").await.unwrap(), "same");
    }

    #[tokio::test]
    async fn redelivered_message_is_stored_once() {
        let env = EphemeralEnvironment::new();
        let relay = env.relay(RelayMode::Delegated);
        let uuid = relay.create("twice").await.unwrap();

        let consumer = env.consumer();
        let message = env.queue().published(env.queue_name()).await.remove(0);
        consumer.handle(&message).await.unwrap();
        consumer.handle(&message).await.unwrap();

        assert_eq!(env.storage().object_count(env.bucket_name()).await, 1);
        assert_eq!(relay.get(uuid).await.unwrap().content, "twice");
    }

    #[tokio::test]
    async fn unknown_uuid_is_not_found() {
        let env = EphemeralEnvironment::new();
        let relay = env.relay(RelayMode::Direct);
        relay.create("unrelated").await.unwrap();

        let error = relay.get(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn messages_are_isolated_by_uuid() {
        let env = EphemeralEnvironment::new();
        let relay = env.relay(RelayMode::Direct);

        let first = relay.create("first").await.unwrap();
        let second = relay.create("second").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(relay.get(first).await.unwrap().content, "first");
        assert_eq!(relay.get(second).await.unwrap().content, "second");
    }

    #[tokio::test]
    async fn publish_failure_aborts_direct_create() {
        let env = EphemeralEnvironment::new();
        env.queue().set_fail_publish(true);
        let relay = env.relay(RelayMode::Direct);

        let error = relay.create("never stored").await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Publish);
        assert_eq!(env.storage().upload_calls(), 0);
        assert_eq!(env.storage().object_count(env.bucket_name()).await, 0);
    }

    #[tokio::test]
    async fn upload_failure_after_publish_propagates() {
        let env = EphemeralEnvironment::new();
        env.storage().set_fail_upload(true);
        let relay = env.relay(RelayMode::Direct);

        let error = relay.create("half done").await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Upload);
        assert_eq!(env.queue().published(env.queue_name()).await.len(), 1);
    }

    #[tokio::test]
    async fn failed_consumer_delivery_is_redelivered() {
        let env = EphemeralEnvironment::new();
        let relay = env.relay(RelayMode::Delegated);
        let uuid = relay.create("retry").await.unwrap();

        env.storage().set_fail_upload(true);
        assert_eq!(env.drain().await.unwrap(), 0);
        assert_eq!(env.queue().naked(), 1);
        assert_eq!(env.queue().pending(env.queue_name()).await, 1);

        env.storage().set_fail_upload(false);
        assert_eq!(env.drain().await.unwrap(), 1);
        assert_eq!(relay.get(uuid).await.unwrap().content, "retry");
    }

    #[test]
    fn names_are_unique() {
        let a = EphemeralEnvironment::new();
        let b = EphemeralEnvironment::new();
        assert_ne!(a.queue_name(), b.queue_name());
        assert!(a.queue_name().starts_with("message-queue-"));
        assert!(a.bucket_name().starts_with("message-bucket-"));
    }
}
