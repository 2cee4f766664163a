use blockgate_core::{BlockId, BlockMeta, DeletionMark, FixedClock, WorkingSet};
use blockgate_fetcher::{BucketIndex, write_deletion_mark};
use blockgate_storage::{FilesystemBackend, ObjectStore, TenantStore};
use bytes::Bytes;
use std::sync::Arc;
use tempfile::TempDir;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

/// Reference time shared by every scenario.
pub const NOW: OffsetDateTime = datetime!(2024-03-10 12:00:00 UTC);

pub const TENANT: &str = "user-1";

pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(NOW))
}

/// Deterministic block ID with timestamp `n` and no randomness.
pub fn block(n: u64) -> BlockId {
    BlockId::from_parts(n, 0)
}

/// A filesystem bucket in a fresh temporary directory.
pub async fn bucket() -> (TempDir, Arc<dyn ObjectStore>) {
    let dir = tempfile::tempdir().unwrap();
    let backend = FilesystemBackend::new(dir.path()).await.unwrap();
    (dir, Arc::new(backend))
}

/// `bucket` scoped to [`TENANT`].
pub fn tenant_store(bucket: &Arc<dyn ObjectStore>) -> Arc<dyn ObjectStore> {
    Arc::new(TenantStore::new(TENANT, bucket.clone()).unwrap())
}

pub fn mark_ago(id: BlockId, ago: Duration) -> DeletionMark {
    DeletionMark::new(id, (NOW - ago).unix_timestamp())
}

pub fn working_set(ids: &[BlockId]) -> WorkingSet {
    ids.iter().map(|id| (*id, BlockMeta::new(*id, 0, 1))).collect()
}

/// Working set whose blocks span `[NOW + start, NOW + end]`.
pub fn working_set_with_ranges(ranges: &[(BlockId, Duration, Duration)]) -> WorkingSet {
    let ms = |offset: Duration| (NOW + offset).unix_timestamp() * 1000;
    ranges
        .iter()
        .map(|(id, start, end)| (*id, BlockMeta::new(*id, ms(*start), ms(*end))))
        .collect()
}

/// Seed a tenant store with the mixed deletion scenario, with a 48h delay in mind:
/// - block 1 marked 15h ago (still served)
/// - block 2 marked 60h ago (expired)
/// - block 3 with an unparseable mark
/// - block 4 without a mark
///
/// Returns the working set listing all four blocks.
pub async fn seed_deletion_scenario(store: &dyn ObjectStore) -> WorkingSet {
    write_deletion_mark(store, &mark_ago(block(1), Duration::hours(15)))
        .await
        .unwrap();
    write_deletion_mark(store, &mark_ago(block(2), Duration::hours(60)))
        .await
        .unwrap();
    store
        .put(
            &DeletionMark::path_for(block(3)),
            Bytes::from_static(b"not a valid deletion-mark.json"),
        )
        .await
        .unwrap();

    working_set(&[block(1), block(2), block(3), block(4)])
}

/// Bucket index equivalent of [`seed_deletion_scenario`].
pub fn deletion_scenario_index() -> BucketIndex {
    let mut index = BucketIndex::new(NOW - Duration::minutes(5));
    index.block_deletion_marks = vec![
        (&mark_ago(block(1), Duration::hours(15))).into(),
        (&mark_ago(block(2), Duration::hours(60))).into(),
    ];
    index
}
