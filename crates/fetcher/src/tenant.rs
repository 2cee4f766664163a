//! Per-tenant filtering cycle.
//!
//! Picks the bucket index path when the index is enabled, present, current
//! and readable, and falls back to reading deletion marks directly otherwise.

use crate::bucket_index::read_index;
use crate::chain::FilterChain;
use crate::deletion::IgnoreDeletionMarkFilter;
use crate::error::{BucketIndexError, FilterError, FilterResult};
use crate::metrics::FetcherMetrics;
use blockgate_core::config::{BucketIndexConfig, FetcherConfig};
use blockgate_core::{BlockId, Clock, DeletionMark, WorkingSet};
use blockgate_storage::{ObjectStore, TenantStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Which path a cycle took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    /// Deletion marks came from the tenant's bucket index.
    BucketIndex,
    /// Deletion marks were read one block at a time.
    Direct,
}

/// The filter chain of one tenant, bound to the shared bucket.
pub struct TenantFilter {
    tenant: String,
    bucket: Arc<dyn ObjectStore>,
    chain: FilterChain,
    deletion: Arc<IgnoreDeletionMarkFilter>,
    bucket_index: BucketIndexConfig,
    clock: Arc<dyn Clock>,
}

impl TenantFilter {
    /// Build the chain for `tenant`. Its gauges carry the tenant as a const
    /// label; register them through [`TenantFilter::metrics`].
    pub fn new(
        tenant: &str,
        bucket: Arc<dyn ObjectStore>,
        config: &FetcherConfig,
        clock: Arc<dyn Clock>,
    ) -> FilterResult<Self> {
        let store = TenantStore::new(tenant, bucket.clone()).map_err(FilterError::Tenant)?;
        let metrics = FetcherMetrics::for_tenant(tenant)?;
        let (chain, deletion) =
            FilterChain::from_config(config, Arc::new(store), metrics, clock.clone())?;
        Ok(Self {
            tenant: tenant.to_string(),
            bucket,
            chain,
            deletion,
            bucket_index: config.bucket_index.clone(),
            clock,
        })
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }

    pub fn metrics(&self) -> &FetcherMetrics {
        self.chain.metrics()
    }

    /// Marks currently known for this tenant, including those still served.
    pub fn deletion_mark_blocks(&self) -> HashMap<BlockId, DeletionMark> {
        self.deletion.deletion_mark_blocks()
    }

    /// Run one filtering cycle over `metas`.
    ///
    /// Only storage failures reading the index abort the cycle; a missing,
    /// stale or unreadable index downgrades it to the direct path.
    #[instrument(skip_all, fields(tenant = %self.tenant, blocks = metas.len()))]
    pub async fn filter(
        &self,
        cancel: &CancellationToken,
        metas: &mut WorkingSet,
    ) -> FilterResult<FilterMode> {
        if !self.bucket_index.enabled {
            self.chain.run(cancel, metas).await?;
            return Ok(FilterMode::Direct);
        }

        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FilterError::Cancelled),
            read = read_index(self.bucket.as_ref(), &self.tenant) => read,
        };

        match read {
            Ok(index) if index.is_stale(self.clock.now(), self.bucket_index.max_stale_period()) => {
                warn!(
                    updated_at = index.updated_at,
                    max_stale_period_secs = self.bucket_index.max_stale_period_secs,
                    "Bucket index is stale, reading deletion marks directly"
                );
            }
            Ok(index) => {
                self.chain.run_with_bucket_index(cancel, metas, &index).await?;
                return Ok(FilterMode::BucketIndex);
            }
            Err(BucketIndexError::NotFound(_)) => {
                info!("Bucket index not found, reading deletion marks directly");
            }
            Err(e @ (BucketIndexError::Corrupted(_) | BucketIndexError::UnsupportedVersion(_))) => {
                warn!(error = %e, "Bucket index unusable, reading deletion marks directly");
            }
            Err(e) => return Err(e.into()),
        }

        self.chain.run(cancel, metas).await?;
        Ok(FilterMode::Direct)
    }
}
