//! Storage backend implementation.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use opendal::{Operator, services};
use postbox_core::{ErrorKind, ObjectStorage};
use tokio::sync::RwLock;

use crate::TRACING_TARGET;
use crate::config::{BackendType, StorageConfig};
use crate::error::{StorageError, StorageResult};

/// Relay object storage over OpenDAL operators, one per bucket.
#[derive(Clone)]
pub struct StorageBackend {
    config: Arc<StorageConfig>,
    operators: Arc<RwLock<HashMap<String, Operator>>>,
}

impl StorageBackend {
    /// Creates a new storage backend from configuration.
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        config.validate().map_err(StorageError::init)?;

        if config.backend_type == BackendType::S3 && !cfg!(feature = "s3") {
            return Err(StorageError::init(
                "S3 backend is not supported with current features",
            ));
        }

        tracing::info!(
            target: TRACING_TARGET,
            backend = %config.backend_type,
            "Storage backend initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            operators: Arc::default(),
        })
    }

    /// Returns the configuration for this backend.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns the operator for `bucket`, creating it if necessary.
    pub async fn operator(&self, bucket: &str) -> StorageResult<Operator> {
        if let Some(operator) = self.operators.read().await.get(bucket) {
            return Ok(operator.clone());
        }

        let mut operators = self.operators.write().await;
        if let Some(operator) = operators.get(bucket) {
            return Ok(operator.clone());
        }

        let operator = Self::create_operator(&self.config, bucket)?;
        tracing::debug!(
            target: TRACING_TARGET,
            bucket = %bucket,
            backend = %self.config.backend_type,
            "Operator created"
        );

        operators.insert(bucket.to_owned(), operator.clone());
        Ok(operator)
    }

    /// Reads an object.
    pub async fn read(&self, bucket: &str, path: &str) -> StorageResult<Vec<u8>> {
        let operator = self.operator(bucket).await?;
        let data = operator.read(path).await?.to_vec();

        tracing::debug!(
            target: TRACING_TARGET,
            bucket = %bucket,
            path = %path,
            size = data.len(),
            "Object read"
        );

        Ok(data)
    }

    /// Writes an object, replacing any previous content.
    pub async fn write(&self, bucket: &str, path: &str, data: Bytes) -> StorageResult<()> {
        let operator = self.operator(bucket).await?;
        let size = data.len();
        operator.write(path, data).await?;

        tracing::debug!(
            target: TRACING_TARGET,
            bucket = %bucket,
            path = %path,
            size,
            "Object written"
        );

        Ok(())
    }

    /// Checks if an object exists.
    pub async fn exists(&self, bucket: &str, path: &str) -> StorageResult<bool> {
        let operator = self.operator(bucket).await?;
        Ok(operator.exists(path).await?)
    }

    /// Deletes an object.
    pub async fn delete(&self, bucket: &str, path: &str) -> StorageResult<()> {
        let operator = self.operator(bucket).await?;
        operator.delete(path).await?;
        Ok(())
    }

    fn create_operator(config: &StorageConfig, bucket: &str) -> StorageResult<Operator> {
        match config.backend_type {
            BackendType::Memory => Operator::new(services::Memory::default())
                .map(|op| op.finish())
                .map_err(|e| StorageError::init(e.to_string())),

            #[cfg(feature = "s3")]
            BackendType::S3 => {
                let mut builder = services::S3::default().bucket(bucket);

                if let Some(ref region) = config.region {
                    builder = builder.region(region);
                }

                if let Some(ref endpoint) = config.endpoint {
                    builder = builder.endpoint(endpoint);
                }

                if let Some(ref access_key_id) = config.access_key_id {
                    builder = builder.access_key_id(access_key_id);
                }

                if let Some(ref secret_access_key) = config.secret_access_key {
                    builder = builder.secret_access_key(secret_access_key);
                }

                Operator::new(builder)
                    .map(|op| op.finish())
                    .map_err(|e| StorageError::init(e.to_string()))
            }

            #[cfg(not(feature = "s3"))]
            BackendType::S3 => Err(StorageError::init(format!(
                "cannot open bucket '{bucket}': S3 backend is not supported with current features"
            ))),
        }
    }
}

#[async_trait::async_trait]
impl ObjectStorage for StorageBackend {
    async fn upload(&self, bucket: &str, key: &str, data: Bytes) -> postbox_core::Result<()> {
        self.write(bucket, key, data)
            .await
            .map_err(|e| e.into_relay(ErrorKind::Upload))
    }

    async fn download(&self, bucket: &str, key: &str) -> postbox_core::Result<Bytes> {
        self.read(bucket, key)
            .await
            .map(Bytes::from)
            .map_err(|e| e.into_relay(ErrorKind::Io))
    }
}

impl std::fmt::Debug for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageBackend")
            .field("backend_type", &self.config.backend_type)
            .finish_non_exhaustive()
    }
}
