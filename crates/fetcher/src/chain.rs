//! Ordered composition of metadata filters.
//!
//! A chain runs its filters one after the other over a shared working set
//! and publishes the outcome gauges only when every filter succeeded. A
//! failed or cancelled cycle leaves both the caller's working set and the
//! exported gauges as they were after the previous successful cycle.

use crate::bucket_index::BucketIndex;
use crate::deletion::IgnoreDeletionMarkFilter;
use crate::error::{FilterError, FilterResult};
use crate::filter::MetadataFilter;
use crate::metrics::{FetcherMetrics, LOADED};
use crate::recency::IgnoreNonQueryableBlocksFilter;
use blockgate_core::config::FetcherConfig;
use blockgate_core::{Clock, WorkingSet};
use blockgate_storage::ObjectStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

pub struct FilterChain {
    filters: Vec<Arc<dyn MetadataFilter>>,
    metrics: FetcherMetrics,
}

impl FilterChain {
    pub fn new(metrics: FetcherMetrics) -> Self {
        Self {
            filters: Vec::new(),
            metrics,
        }
    }

    /// Append a filter; filters run in insertion order.
    pub fn with_filter(mut self, filter: Arc<dyn MetadataFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Build the standard chain for one tenant: the deletion-aware filter
    /// first, then the recency filter when a window is configured.
    ///
    /// `store` must be scoped to the tenant. The deletion-aware filter is also
    /// returned so callers can inspect its mark cache. `config` is validated
    /// first, so durations that do not fit the mark cache horizon are rejected.
    pub fn from_config(
        config: &FetcherConfig,
        store: Arc<dyn ObjectStore>,
        metrics: FetcherMetrics,
        clock: Arc<dyn Clock>,
    ) -> FilterResult<(Self, Arc<IgnoreDeletionMarkFilter>)> {
        config.validate().map_err(blockgate_core::Error::Config)?;

        let deletion = Arc::new(
            IgnoreDeletionMarkFilter::new(
                store,
                config.ignore_deletion_marks_delay(),
                config.meta_sync_concurrency,
            )
            .with_clock(clock.clone()),
        );

        let mut chain = Self::new(metrics).with_filter(deletion.clone());
        if config.ignore_blocks_within_secs > 0 {
            chain = chain.with_filter(Arc::new(
                IgnoreNonQueryableBlocksFilter::new(config.ignore_blocks_within())
                    .with_clock(clock),
            ));
        }
        Ok((chain, deletion))
    }

    pub fn metrics(&self) -> &FetcherMetrics {
        &self.metrics
    }

    /// Names of the filters in execution order.
    pub fn filter_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Run every filter using direct object storage access.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        metas: &mut WorkingSet,
    ) -> FilterResult<()> {
        self.run_inner(cancel, metas, None).await
    }

    /// Run every filter against a bucket index snapshot.
    pub async fn run_with_bucket_index(
        &self,
        cancel: &CancellationToken,
        metas: &mut WorkingSet,
        index: &BucketIndex,
    ) -> FilterResult<()> {
        self.run_inner(cancel, metas, Some(index)).await
    }

    #[instrument(skip_all, fields(blocks = metas.len(), bucket_index = index.is_some()))]
    async fn run_inner(
        &self,
        cancel: &CancellationToken,
        metas: &mut WorkingSet,
        index: Option<&BucketIndex>,
    ) -> FilterResult<()> {
        let FetcherMetrics { synced, modified } = &self.metrics;
        self.metrics.reset_tx();

        let mut working = metas.clone();
        for filter in &self.filters {
            if cancel.is_cancelled() {
                return Err(FilterError::Cancelled);
            }

            let before = working.len();
            let result = match index {
                Some(index) => {
                    filter
                        .filter_with_index(cancel, &mut working, index, synced, modified)
                        .await
                }
                None => filter.filter(cancel, &mut working, synced, modified).await,
            };

            if let Err(e) = result {
                if e.is_cancelled() {
                    debug!(filter = filter.name(), "Block metadata filtering cancelled");
                } else {
                    warn!(filter = filter.name(), error = %e, "Block metadata filter failed");
                }
                return Err(e);
            }
            debug!(
                filter = filter.name(),
                removed = before.saturating_sub(working.len()),
                "Filter applied"
            );
        }

        synced
            .with_label_values(&[LOADED])
            .set(i64::try_from(working.len()).unwrap_or(i64::MAX));
        self.metrics.submit();
        *metas = working;
        Ok(())
    }
}
