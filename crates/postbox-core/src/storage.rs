//! Object storage abstraction.

use bytes::Bytes;

use crate::{Error, Result, ServiceHealth};

/// Stores and retrieves byte payloads under bucket and key.
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Writes `data` under `key`, replacing any existing object.
    async fn upload(&self, bucket: &str, key: &str, data: Bytes) -> Result<()>;

    /// Reads the object stored under `key`.
    ///
    /// Returns a [`NotFound`] error if no such object exists.
    ///
    /// [`NotFound`]: crate::ErrorKind::NotFound
    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// Reads the object stored under `key` and decodes it as UTF-8.
    async fn download_as_string(&self, bucket: &str, key: &str) -> Result<String> {
        let data = self.download(bucket, key).await?;
        String::from_utf8(data.to_vec()).map_err(|err| {
            Error::io()
                .with_message(format!("object '{key}' in '{bucket}' is not valid UTF-8"))
                .with_source(err)
        })
    }

    /// Reports the health of the storage backend.
    async fn health_check(&self) -> Result<ServiceHealth> {
        Ok(ServiceHealth::healthy())
    }
}
