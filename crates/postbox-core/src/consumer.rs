//! Queue consumer: materializes delivered messages in the store.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::{Error, Message, ObjectStorage, RelayConfig, Result, TRACING_TARGET_CONSUMER};

/// Uploads the content of each delivered message under its UUID.
///
/// Uploads overwrite by key, so handling the same delivery twice leaves a single object.
#[derive(Clone)]
pub struct MessageConsumer {
    config: Arc<RelayConfig>,
    storage: Arc<dyn ObjectStorage>,
}

impl MessageConsumer {
    /// Creates a new consumer writing to the configured bucket.
    pub fn new(config: Arc<RelayConfig>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { config, storage }
    }

    /// Returns the queue this consumer listens on.
    pub fn queue_name(&self) -> &str {
        &self.config.queue_name
    }

    /// Stores the message content.
    ///
    /// Failures are reported as [`ConsumerProcessing`] errors.
    ///
    /// [`ConsumerProcessing`]: crate::ErrorKind::ConsumerProcessing
    #[tracing::instrument(skip_all, fields(uuid = %message.uuid))]
    pub async fn handle(&self, message: &Message) -> Result<()> {
        let bucket = &self.config.bucket_name;
        let data = Bytes::copy_from_slice(message.content.as_bytes());

        self.storage
            .upload(bucket, &message.key(), data)
            .await
            .map_err(|err| {
                Error::consumer_processing()
                    .with_message(format!("failed to store message in '{bucket}'"))
                    .with_source(err)
            })?;

        tracing::debug!(
            target: TRACING_TARGET_CONSUMER,
            bucket = %bucket,
            size = message.content.len(),
            "Delivered message stored"
        );

        Ok(())
    }
}

impl fmt::Debug for MessageConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageConsumer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    struct FailingStorage;

    #[async_trait::async_trait]
    impl ObjectStorage for FailingStorage {
        async fn upload(&self, _bucket: &str, _key: &str, _data: Bytes) -> Result<()> {
            Err(Error::upload().with_message("permission denied"))
        }

        async fn download(&self, _bucket: &str, _key: &str) -> Result<Bytes> {
            Err(Error::not_found())
        }
    }

    #[tokio::test]
    async fn upload_failures_become_consumer_processing() {
        let config = Arc::new(RelayConfig::new("q", "b"));
        let consumer = MessageConsumer::new(config, Arc::new(FailingStorage));

        let error = consumer.handle(&Message::new("x")).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ConsumerProcessing);
        assert_eq!(consumer.queue_name(), "q");
    }
}
