//! Single-bucket wrapper around a JetStream object store.

use std::sync::Arc;

use async_nats::jetstream;
use async_nats::jetstream::context::ObjectStoreErrorKind;
use async_nats::jetstream::object_store::{self, GetErrorKind};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::hashing_reader::HashingReader;
use super::object_data::PutResult;
use crate::{Error, Result, TRACING_TARGET_OBJECT, names};

/// A JetStream object store bound to one bucket.
#[derive(Clone)]
pub struct ObjectStore {
    inner: Arc<object_store::ObjectStore>,
    bucket: Arc<str>,
}

impl ObjectStore {
    /// Opens the bucket, creating it if it does not exist yet.
    pub async fn new(jetstream: &jetstream::Context, bucket: &str) -> Result<Self> {
        names::validate("bucket", bucket)?;

        let store = match jetstream.get_object_store(bucket).await {
            Ok(store) => {
                tracing::debug!(
                    target: TRACING_TARGET_OBJECT,
                    bucket = %bucket,
                    "Retrieved existing object store"
                );
                store
            }
            Err(e) if matches!(e.kind(), ObjectStoreErrorKind::GetStore) => {
                tracing::info!(
                    target: TRACING_TARGET_OBJECT,
                    bucket = %bucket,
                    "Creating new object store"
                );

                let config = object_store::Config {
                    bucket: bucket.to_owned(),
                    description: Some("postbox message contents".to_owned()),
                    ..Default::default()
                };

                jetstream.create_object_store(config).await.map_err(|e| {
                    tracing::error!(
                        target: TRACING_TARGET_OBJECT,
                        bucket = %bucket,
                        error = %e,
                        "Failed to create object store"
                    );
                    Error::operation("create_object_store", e.to_string())
                })?
            }
            Err(e) => {
                tracing::error!(
                    target: TRACING_TARGET_OBJECT,
                    bucket = %bucket,
                    error = %e,
                    "Failed to get object store"
                );
                return Err(Error::operation("get_object_store", e.to_string()));
            }
        };

        Ok(Self {
            inner: Arc::new(store),
            bucket: Arc::from(bucket),
        })
    }

    /// Streams `reader` into the object `key`, replacing any previous object.
    ///
    /// Fails if the size recorded by the server differs from the number of bytes
    /// read.
    pub async fn put<R>(&self, key: &str, reader: R) -> Result<PutResult>
    where
        R: AsyncRead + Unpin,
    {
        let meta = object_store::ObjectMetadata {
            name: key.to_owned(),
            ..Default::default()
        };

        let mut hashing_reader = HashingReader::new(reader);
        let info = self
            .inner
            .put(meta, &mut hashing_reader)
            .await
            .map_err(|e| {
                tracing::error!(
                    target: TRACING_TARGET_OBJECT,
                    bucket = %self.bucket,
                    key = %key,
                    error = %e,
                    "Failed to upload object"
                );
                Error::operation("put", e.to_string())
            })?;

        let consumed = hashing_reader.consumed();
        if consumed != info.size as u64 {
            tracing::error!(
                target: TRACING_TARGET_OBJECT,
                bucket = %self.bucket,
                key = %key,
                sent = consumed,
                stored = info.size,
                "Stored object size differs from the uploaded content"
            );
            return Err(Error::operation(
                "put",
                format!("stored {} of {consumed} bytes", info.size),
            ));
        }

        let sha256_hex = hashing_reader.finalize_hex();
        tracing::trace!(
            target: TRACING_TARGET_OBJECT,
            bucket = %self.bucket,
            key = %key,
            nuid = %info.nuid,
            "Object uploaded"
        );

        Ok(PutResult::new(consumed, sha256_hex))
    }

    /// Reads the full content of object `key`.
    pub async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let mut object = self.inner.get(key).await.map_err(|e| {
            if matches!(e.kind(), GetErrorKind::NotFound) {
                Error::object_not_found(&*self.bucket, key)
            } else {
                Error::operation("get", e.to_string())
            }
        })?;

        let mut content = Vec::new();
        object
            .read_to_end(&mut content)
            .await
            .map_err(|e| Error::operation("read", e.to_string()))?;

        Ok(content)
    }
}
