//! Tenant-scoped view over a shared bucket.

use crate::error::{StorageError, StorageResult};
use crate::traits::ObjectStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// An [`ObjectStore`] that confines every key to `<tenant>/`.
///
/// Listings return keys relative to the tenant root, so callers never see
/// (or can address) another tenant's objects.
#[derive(Clone)]
pub struct TenantStore {
    tenant: String,
    inner: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for TenantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantStore")
            .field("tenant", &self.tenant)
            .field("backend", &self.inner.backend_name())
            .finish()
    }
}

impl TenantStore {
    /// Scope `inner` to `tenant`. The tenant ID must be a single path segment.
    pub fn new(tenant: impl Into<String>, inner: Arc<dyn ObjectStore>) -> StorageResult<Self> {
        let tenant = tenant.into();
        if tenant.is_empty() || tenant.contains('/') || tenant == "." || tenant == ".." {
            return Err(StorageError::InvalidKey(format!(
                "invalid tenant id: {tenant:?}"
            )));
        }
        Ok(Self { tenant, inner })
    }

    /// The tenant this store is scoped to.
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}/{}", self.tenant, key)
    }

    fn strip_prefix(&self, full_key: &str) -> Option<String> {
        full_key
            .strip_prefix(&self.tenant)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string)
    }

    fn relative_not_found(&self, err: StorageError) -> StorageError {
        match err {
            StorageError::NotFound(key) => {
                StorageError::NotFound(self.strip_prefix(&key).unwrap_or(key))
            }
            other => other,
        }
    }
}

#[async_trait]
impl ObjectStore for TenantStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(&self.full_key(key)).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner
            .get(&self.full_key(key))
            .await
            .map_err(|e| self.relative_not_found(e))
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.inner.put(&self.full_key(key), data).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner
            .delete(&self.full_key(key))
            .await
            .map_err(|e| self.relative_not_found(e))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let keys = self.inner.list(&self.full_key(prefix)).await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| self.strip_prefix(&key))
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.inner.health_check().await
    }
}
