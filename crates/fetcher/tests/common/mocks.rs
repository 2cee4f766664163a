use async_trait::async_trait;
use blockgate_storage::error::{StorageError, StorageResult};
use blockgate_storage::traits::ObjectStore;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::Duration;

/// Wraps a store, delays every `get` and records how many reads overlap.
#[allow(dead_code)]
pub struct InstrumentedStore {
    inner: Arc<dyn ObjectStore>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub gets: AtomicUsize,
}

#[allow(dead_code)]
impl InstrumentedStore {
    pub fn new(inner: Arc<dyn ObjectStore>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner,
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
        })
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for InstrumentedStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.inner.put(key, data).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    fn backend_name(&self) -> &'static str {
        "instrumented"
    }
}

/// Fails every `get` whose key contains `poisoned`, delegating the rest.
#[allow(dead_code)]
pub struct FailingStore {
    inner: Arc<dyn ObjectStore>,
    poisoned: String,
}

#[allow(dead_code)]
impl FailingStore {
    pub fn new(inner: Arc<dyn ObjectStore>, poisoned: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            poisoned: poisoned.into(),
        })
    }
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        if key.contains(&self.poisoned) {
            return Err(StorageError::Io(std::io::Error::other(format!(
                "injected failure reading {key}"
            ))));
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.inner.put(key, data).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}
