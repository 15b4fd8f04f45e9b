//! In-memory object store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::Bytes;
use postbox_core::{Error, ObjectStorage, Result, ServiceHealth};
use tokio::sync::RwLock;

/// An object store kept in process memory, keyed by bucket and key.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<StorageState>,
}

#[derive(Debug, Default)]
struct StorageState {
    objects: RwLock<HashMap<(String, String), Bytes>>,
    fail_upload: AtomicBool,
    unhealthy: AtomicBool,
    uploads: AtomicUsize,
    downloads: AtomicUsize,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent upload fail with an upload error.
    pub fn set_fail_upload(&self, fail: bool) {
        self.inner.fail_upload.store(fail, Ordering::SeqCst);
    }

    /// Makes health checks report the store as unhealthy.
    pub fn set_healthy(&self, healthy: bool) {
        self.inner.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    /// Returns the number of upload calls, including failed ones.
    pub fn upload_calls(&self) -> usize {
        self.inner.uploads.load(Ordering::SeqCst)
    }

    /// Returns the number of download calls.
    pub fn download_calls(&self) -> usize {
        self.inner.downloads.load(Ordering::SeqCst)
    }

    /// Returns the number of objects stored in `bucket`.
    pub async fn object_count(&self, bucket: &str) -> usize {
        let objects = self.inner.objects.read().await;
        objects.keys().filter(|(name, _)| name == bucket).count()
    }

    /// Returns the object stored under `key`, if any.
    pub async fn get(&self, bucket: &str, key: &str) -> Option<Bytes> {
        let objects = self.inner.objects.read().await;
        objects.get(&(bucket.to_owned(), key.to_owned())).cloned()
    }

    /// Stores an object directly, bypassing failure injection and counters.
    pub async fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        let mut objects = self.inner.objects.write().await;
        objects.insert((bucket.to_owned(), key.to_owned()), data.into());
    }
}

#[async_trait::async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
        self.inner.uploads.fetch_add(1, Ordering::SeqCst);

        if self.inner.fail_upload.load(Ordering::SeqCst) {
            return Err(Error::upload().with_message(format!("bucket '{bucket}' rejected the write")));
        }

        let mut objects = self.inner.objects.write().await;
        objects.insert((bucket.to_owned(), key.to_owned()), data);
        Ok(())
    }

    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.inner.downloads.fetch_add(1, Ordering::SeqCst);

        self.get(bucket, key).await.ok_or_else(|| {
            Error::not_found().with_message(format!("object '{key}' not found in '{bucket}'"))
        })
    }

    async fn health_check(&self) -> Result<ServiceHealth> {
        if self.inner.unhealthy.load(Ordering::SeqCst) {
            return Ok(ServiceHealth::unhealthy("memory storage marked unhealthy"));
        }
        Ok(ServiceHealth::healthy())
    }
}
