//! Storage configuration types.

#[cfg(feature = "config")]
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Available storage backends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "config", derive(ValueEnum))]
pub enum BackendType {
    /// In-process memory, one store per bucket.
    #[default]
    Memory,
    /// Amazon S3 compatible storage.
    S3,
}

/// Storage backend configuration.
///
/// Bucket names are not part of the configuration; every relay bucket maps to
/// a bucket of the same name on the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct StorageConfig {
    /// Storage backend to use.
    #[cfg_attr(
        feature = "config",
        arg(long = "storage-backend", env = "STORAGE_BACKEND", value_enum, default_value_t = BackendType::Memory)
    )]
    #[serde(default)]
    pub backend_type: BackendType,

    /// S3 region.
    #[cfg_attr(feature = "config", arg(long = "s3-region", env = "S3_REGION"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Custom S3 endpoint URL (for MinIO, R2 and similar).
    #[cfg_attr(feature = "config", arg(long = "s3-endpoint", env = "S3_ENDPOINT"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// S3 access key ID.
    #[cfg_attr(feature = "config", arg(long = "s3-access-key-id", env = "S3_ACCESS_KEY_ID"))]
    #[serde(skip_serializing)]
    pub access_key_id: Option<String>,

    /// S3 secret access key.
    #[cfg_attr(
        feature = "config",
        arg(long = "s3-secret-access-key", env = "S3_SECRET_ACCESS_KEY")
    )]
    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,
}

impl StorageConfig {
    /// Creates an in-memory configuration.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Creates an S3 configuration for `region`.
    pub fn s3(region: impl Into<String>) -> Self {
        Self {
            backend_type: BackendType::S3,
            region: Some(region.into()),
            ..Self::default()
        }
    }

    /// Sets the custom endpoint (for S3-compatible storage).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the access credentials.
    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    /// Validates that the selected backend is fully described.
    pub fn validate(&self) -> Result<(), String> {
        if self.backend_type != BackendType::S3 {
            return Ok(());
        }

        if self.region.as_deref().is_none_or(str::is_empty) {
            return Err("S3 backend requires a region".to_string());
        }

        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(
                "S3 access key ID and secret access key must be provided together".to_string(),
            );
        }

        Ok(())
    }
}
