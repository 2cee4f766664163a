//! Filter leaving recent blocks to the ingestion tier.
//!
//! Freshly uploaded blocks overlap with data the ingesters still serve from
//! memory, and may not be fully replicated to every gateway yet. Blocks whose
//! first sample falls within `ignore_within` of now are therefore dropped.

use crate::error::{FilterError, FilterResult};
use crate::filter::MetadataFilter;
use crate::metrics::{TOO_FRESH, TxGaugeVec};
use async_trait::async_trait;
use blockgate_core::{Clock, SystemClock, WorkingSet};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Excludes blocks whose `min_time` is later than `now - ignore_within`.
pub struct IgnoreNonQueryableBlocksFilter {
    ignore_within: Duration,
    clock: Arc<dyn Clock>,
}

impl IgnoreNonQueryableBlocksFilter {
    pub fn new(ignore_within: Duration) -> Self {
        Self {
            ignore_within,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used as reference time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Latest `min_time` (Unix milliseconds) a block may have and still be kept.
    fn cutoff_ms(&self, now: OffsetDateTime) -> i64 {
        let now_ms = i64::try_from(now.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX);
        let window_ms = i64::try_from(self.ignore_within.whole_milliseconds()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(window_ms)
    }
}

#[async_trait]
impl MetadataFilter for IgnoreNonQueryableBlocksFilter {
    fn name(&self) -> &'static str {
        "ignore-non-queryable"
    }

    async fn filter(
        &self,
        cancel: &CancellationToken,
        metas: &mut WorkingSet,
        synced: &TxGaugeVec,
        _modified: &TxGaugeVec,
    ) -> FilterResult<()> {
        if cancel.is_cancelled() {
            return Err(FilterError::Cancelled);
        }

        let cutoff = self.cutoff_ms(self.clock.now());
        let too_fresh = synced.with_label_values(&[TOO_FRESH]);
        metas.retain(|id, meta| {
            if meta.min_time > cutoff {
                debug!(
                    block_id = %id,
                    min_time = meta.min_time,
                    cutoff,
                    "Ignoring block too recent to be queried from storage"
                );
                too_fresh.inc();
                false
            } else {
                true
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::FetcherMetrics;
    use blockgate_core::{BlockId, BlockMeta, FixedClock};
    use time::macros::datetime;

    #[tokio::test]
    async fn test_block_starting_at_cutoff_is_kept() {
        let now = datetime!(2024-03-10 12:00:00 UTC);
        let filter = IgnoreNonQueryableBlocksFilter::new(Duration::hours(1))
            .with_clock(Arc::new(FixedClock::new(now)));
        let cutoff = (now - Duration::hours(1)).unix_timestamp() * 1000;

        let at = BlockId::from_parts(1, 0);
        let after = BlockId::from_parts(2, 0);
        let mut metas = WorkingSet::new();
        metas.insert(at, BlockMeta::new(at, cutoff, cutoff + 10));
        metas.insert(after, BlockMeta::new(after, cutoff + 1, cutoff + 10));

        let metrics = FetcherMetrics::new().unwrap();
        filter
            .filter(
                &CancellationToken::new(),
                &mut metas,
                &metrics.synced,
                &metrics.modified,
            )
            .await
            .unwrap();

        assert!(metas.contains_key(&at));
        assert!(!metas.contains_key(&after));
        assert_eq!(metrics.synced.with_label_values(&[TOO_FRESH]).get(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let filter = IgnoreNonQueryableBlocksFilter::new(Duration::hours(1));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let id = BlockId::from_parts(1, 0);
        let mut metas = WorkingSet::new();
        metas.insert(id, BlockMeta::new(id, i64::MAX - 1, i64::MAX));

        let metrics = FetcherMetrics::new().unwrap();
        let err = filter
            .filter(&cancel, &mut metas, &metrics.synced, &metrics.modified)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(metas.len(), 1);
    }

    #[test]
    fn test_huge_window_does_not_overflow() {
        let filter = IgnoreNonQueryableBlocksFilter::new(Duration::MAX);
        let cutoff = filter.cutoff_ms(datetime!(2024-03-10 12:00:00 UTC));
        assert!(cutoff < 0);
    }
}
