//! Filter hiding blocks whose deletion grace period has elapsed.
//!
//! A deleted block stays in object storage until the compactor removes it.
//! During the grace delay it keeps being served, so queries running while
//! the deletion propagates still see consistent data. Once a mark is at least
//! `delay` old the block is dropped from the working set.
//!
//! Every mark observed is cached, whether or not it already causes
//! exclusion, so collaborators can tell which served blocks are pending
//! deletion. Cached marks older than twice the delay are evicted at the start
//! of each cycle.

use crate::bucket_index::BucketIndex;
use crate::error::{FilterError, FilterResult};
use crate::filter::MetadataFilter;
use crate::marker::{MarkerLookup, read_deletion_mark};
use crate::metrics::{MARKED_FOR_DELETION, TxGaugeVec};
use async_trait::async_trait;
use blockgate_core::{BlockId, Clock, DeletionMark, SystemClock, WorkingSet};
use blockgate_storage::ObjectStore;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use time::{Duration, OffsetDateTime};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

type MarkCache = HashMap<BlockId, DeletionMark>;

fn lock(marks: &Mutex<MarkCache>) -> MutexGuard<'_, MarkCache> {
    marks.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Excludes blocks whose deletion mark is at least `delay` old.
pub struct IgnoreDeletionMarkFilter {
    store: Arc<dyn ObjectStore>,
    delay: Duration,
    concurrency: usize,
    clock: Arc<dyn Clock>,
    marks: Mutex<MarkCache>,
}

impl IgnoreDeletionMarkFilter {
    /// Create a filter reading marks from a tenant-scoped `store`, with at
    /// most `concurrency` reads in flight.
    pub fn new(store: Arc<dyn ObjectStore>, delay: Duration, concurrency: usize) -> Self {
        Self {
            store,
            delay,
            concurrency: concurrency.max(1),
            clock: Arc::new(SystemClock),
            marks: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the clock used as reference time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configured grace delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Snapshot of every cached mark, including those still within the grace delay.
    pub fn deletion_mark_blocks(&self) -> HashMap<BlockId, DeletionMark> {
        lock(&self.marks).clone()
    }

    /// Filter using the marks listed in a bucket index. No storage requests are made.
    pub fn filter_with_bucket_index(
        &self,
        metas: &mut WorkingSet,
        index: &BucketIndex,
        synced: &TxGaugeVec,
    ) {
        let now = self.clock.now();
        self.evict_stale(now);
        {
            let mut marks = lock(&self.marks);
            for mark in &index.block_deletion_marks {
                marks.insert(mark.block_id, mark.to_deletion_mark());
            }
        }

        let excluded = self.exclude_expired(now, metas, synced);
        debug!(
            index_marks = index.block_deletion_marks.len(),
            excluded,
            remaining = metas.len(),
            "Deletion marks applied from bucket index"
        );
    }

    fn evict_stale(&self, now: OffsetDateTime) {
        let horizon = self.delay.saturating_mul(2);
        let mut marks = lock(&self.marks);
        let before = marks.len();
        marks.retain(|_, mark| mark.age(now) <= horizon);
        let evicted = before - marks.len();
        if evicted > 0 {
            debug!(evicted, "Evicted stale deletion marks from cache");
        }
    }

    /// Remove every block of `metas` whose cached mark is old enough.
    fn exclude_expired(
        &self,
        now: OffsetDateTime,
        metas: &mut WorkingSet,
        synced: &TxGaugeVec,
    ) -> usize {
        let marks = lock(&self.marks);
        let mut excluded = 0;
        for (id, mark) in marks.iter() {
            if mark.age(now) >= self.delay && metas.remove(id).is_some() {
                synced.with_label_values(&[MARKED_FOR_DELETION]).inc();
                debug!(
                    block_id = %id,
                    deletion_time = mark.deletion_time,
                    "Ignoring block marked for deletion"
                );
                excluded += 1;
            }
        }
        excluded
    }

    /// Read the mark of every block in `ids`.
    ///
    /// Nothing is returned unless every read completed, so a failed or
    /// cancelled cycle never leaves partial results behind.
    async fn fetch_marks(
        &self,
        cancel: &CancellationToken,
        ids: Vec<BlockId>,
    ) -> FilterResult<Vec<DeletionMark>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = FetchTasks::default();

        for id in ids {
            let store = self.store.clone();
            let semaphore = semaphore.clone();
            tasks.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return Err(FilterError::Cancelled);
                };
                match read_deletion_mark(store.as_ref(), id).await {
                    Ok(MarkerLookup::Found(mark)) => Ok(Some(mark)),
                    Ok(MarkerLookup::NotFound) => Ok(None),
                    Ok(MarkerLookup::Corrupted(reason)) => {
                        warn!(
                            block_id = %id,
                            reason = %reason,
                            "Ignoring unreadable deletion mark; delete it manually if this persists"
                        );
                        Ok(None)
                    }
                    Err(source) => Err(FilterError::Storage {
                        block_id: id,
                        source,
                    }),
                }
            }));
        }

        let mut found = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    semaphore.close();
                    return Err(FilterError::Cancelled);
                }
                next = tasks.next() => match next {
                    None => return Ok(found),
                    Some(Ok(Ok(Some(mark)))) => found.push(mark),
                    Some(Ok(Ok(None))) => {}
                    Some(Ok(Err(e))) => {
                        semaphore.close();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        semaphore.close();
                        return Err(FilterError::Task(e.to_string()));
                    }
                },
            }
        }
    }
}

#[async_trait]
impl MetadataFilter for IgnoreDeletionMarkFilter {
    fn name(&self) -> &'static str {
        "ignore-deletion-mark"
    }

    #[instrument(skip_all, fields(blocks = metas.len(), concurrency = self.concurrency))]
    async fn filter(
        &self,
        cancel: &CancellationToken,
        metas: &mut WorkingSet,
        synced: &TxGaugeVec,
        _modified: &TxGaugeVec,
    ) -> FilterResult<()> {
        let now = self.clock.now();
        self.evict_stale(now);

        let ids: Vec<BlockId> = metas.keys().copied().collect();
        let fetched = self.fetch_marks(cancel, ids).await?;
        let found = fetched.len();
        {
            let mut marks = lock(&self.marks);
            for mark in fetched {
                marks.insert(mark.id, mark);
            }
        }

        let excluded = self.exclude_expired(now, metas, synced);
        debug!(
            found,
            excluded,
            remaining = metas.len(),
            "Deletion marks fetched from object storage"
        );
        Ok(())
    }

    async fn filter_with_index(
        &self,
        cancel: &CancellationToken,
        metas: &mut WorkingSet,
        index: &BucketIndex,
        synced: &TxGaugeVec,
        _modified: &TxGaugeVec,
    ) -> FilterResult<()> {
        if cancel.is_cancelled() {
            return Err(FilterError::Cancelled);
        }
        self.filter_with_bucket_index(metas, index, synced);
        Ok(())
    }
}

/// In-flight mark reads. Dropping the set aborts whatever is still running.
#[derive(Default)]
struct FetchTasks(FuturesUnordered<JoinHandle<FilterResult<Option<DeletionMark>>>>);

impl FetchTasks {
    fn push(&mut self, handle: JoinHandle<FilterResult<Option<DeletionMark>>>) {
        self.0.push(handle);
    }

    async fn next(&mut self) -> Option<Result<FilterResult<Option<DeletionMark>>, JoinError>> {
        self.0.next().await
    }
}

impl Drop for FetchTasks {
    fn drop(&mut self) {
        for handle in self.0.iter() {
            handle.abort();
        }
    }
}
