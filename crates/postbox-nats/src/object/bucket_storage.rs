//! [`ObjectStorage`] over JetStream object store buckets.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use postbox_core::{ErrorKind, ObjectStorage, ServiceHealth};
use tokio::sync::RwLock;

use super::object_store::ObjectStore;
use crate::{NatsClient, Result, TRACING_TARGET_OBJECT};

/// Relay object storage backed by NATS.
///
/// Bucket handles are opened on first use and cached for the lifetime of the value.
#[derive(Clone)]
pub struct NatsObjectStorage {
    client: NatsClient,
    buckets: Arc<RwLock<HashMap<String, ObjectStore>>>,
}

impl NatsObjectStorage {
    /// Creates storage over an established connection.
    pub fn new(client: NatsClient) -> Self {
        Self {
            client,
            buckets: Arc::default(),
        }
    }

    /// Returns the handle for `bucket`, opening it if necessary.
    pub async fn bucket(&self, bucket: &str) -> Result<ObjectStore> {
        if let Some(store) = self.buckets.read().await.get(bucket) {
            return Ok(store.clone());
        }

        let mut buckets = self.buckets.write().await;
        if let Some(store) = buckets.get(bucket) {
            return Ok(store.clone());
        }

        let store = ObjectStore::new(self.client.jetstream(), bucket).await?;
        buckets.insert(bucket.to_owned(), store.clone());
        Ok(store)
    }
}

#[async_trait::async_trait]
impl ObjectStorage for NatsObjectStorage {
    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    async fn upload(&self, bucket: &str, key: &str, data: Bytes) -> postbox_core::Result<()> {
        let store = self
            .bucket(bucket)
            .await
            .map_err(|e| e.into_relay(ErrorKind::Upload))?;

        let result = store
            .put(key, &data[..])
            .await
            .map_err(|e| e.into_relay(ErrorKind::Upload))?;

        tracing::debug!(
            target: TRACING_TARGET_OBJECT,
            bucket = %bucket,
            key = %key,
            stored = result.size(),
            sha256 = %result.sha256_hex(),
            "Message content stored"
        );
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn download(&self, bucket: &str, key: &str) -> postbox_core::Result<Bytes> {
        let store = self
            .bucket(bucket)
            .await
            .map_err(|e| e.into_relay(ErrorKind::Io))?;

        let content = store
            .read(key)
            .await
            .map_err(|e| e.into_relay(ErrorKind::Io))?;

        Ok(Bytes::from(content))
    }

    async fn health_check(&self) -> postbox_core::Result<ServiceHealth> {
        Ok(self.client.health().await)
    }
}

impl fmt::Debug for NatsObjectStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NatsObjectStorage")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::NatsConfig;

    async fn connect() -> NatsObjectStorage {
        let url = std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".into());
        let client = NatsClient::connect(NatsConfig::new(url)).await.unwrap();
        NatsObjectStorage::new(client)
    }

    #[tokio::test]
    #[ignore = "requires a running NATS server (NATS_URL)"]
    async fn upload_then_download() {
        let storage = connect().await;
        let bucket = format!("message-bucket-{}", Uuid::new_v4());
        let key = Uuid::new_v4().to_string();

        storage
            .upload(&bucket, &key, Bytes::from_static(b"first"))
            .await
            .unwrap();
        storage
            .upload(&bucket, &key, Bytes::from_static(b"second"))
            .await
            .unwrap();

        let content = storage.download_as_string(&bucket, &key).await.unwrap();
        assert_eq!(content, "second");

        let store = storage.bucket(&bucket).await.unwrap();
        let result = store.put(&key, &b"third"[..]).await.unwrap();
        assert_eq!(result.size(), 5);
        assert_eq!(store.read(&key).await.unwrap(), b"third");
    }

    #[tokio::test]
    #[ignore = "requires a running NATS server (NATS_URL)"]
    async fn missing_object_is_not_found() {
        let storage = connect().await;
        let bucket = format!("message-bucket-{}", Uuid::new_v4());

        let error = storage
            .download(&bucket, &Uuid::new_v4().to_string())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }
}
