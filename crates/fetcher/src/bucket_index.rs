//! Tenant bucket index (consumed, never built here).
//!
//! An external updater periodically writes `<tenant>/bucket-index.json.gz`:
//! the tenant's known blocks plus every active deletion mark. Reading it
//! replaces one object-storage request per block with one per tenant, at the
//! cost of lagging reality by the updater's interval.

use crate::error::{BucketIndexError, BucketIndexResult};
use async_compression::tokio::bufread::GzipDecoder;
use async_compression::tokio::write::GzipEncoder;
use blockgate_core::{BlockId, DeletionMark};
use blockgate_storage::{ObjectStore, StorageError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::instrument;

/// Object name of the index inside the tenant's namespace.
pub const BUCKET_INDEX_FILENAME: &str = "bucket-index.json.gz";

/// The only index format version understood by this crate.
pub const BUCKET_INDEX_VERSION_1: u32 = 1;

/// Snapshot of a tenant's blocks and deletion marks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketIndex {
    pub version: u32,
    #[serde(default)]
    pub blocks: Vec<IndexBlock>,
    #[serde(default)]
    pub block_deletion_marks: Vec<IndexDeletionMark>,
    /// When the updater produced this snapshot (Unix seconds).
    pub updated_at: i64,
}

/// A block as recorded in the index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexBlock {
    pub block_id: BlockId,
    pub min_time: i64,
    pub max_time: i64,
    /// When the block finished uploading (Unix seconds), 0 if unknown.
    #[serde(default)]
    pub uploaded_at: i64,
}

/// An active deletion mark as recorded in the index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDeletionMark {
    pub block_id: BlockId,
    /// Unix seconds.
    pub deletion_time: i64,
}

impl IndexDeletionMark {
    /// The equivalent deletion mark document.
    pub fn to_deletion_mark(&self) -> DeletionMark {
        DeletionMark::new(self.block_id, self.deletion_time)
    }
}

impl From<&DeletionMark> for IndexDeletionMark {
    fn from(mark: &DeletionMark) -> Self {
        Self {
            block_id: mark.id,
            deletion_time: mark.deletion_time,
        }
    }
}

impl BucketIndex {
    /// An empty index stamped at `updated_at`.
    pub fn new(updated_at: OffsetDateTime) -> Self {
        Self {
            version: BUCKET_INDEX_VERSION_1,
            blocks: Vec::new(),
            block_deletion_marks: Vec::new(),
            updated_at: updated_at.unix_timestamp(),
        }
    }

    /// IDs of every block known to the index.
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks.iter().map(|b| b.block_id).collect()
    }

    /// Whether the snapshot is older than `max_stale_period` at `now`.
    pub fn is_stale(&self, now: OffsetDateTime, max_stale_period: Duration) -> bool {
        let age = (now - OffsetDateTime::UNIX_EPOCH)
            .saturating_sub(Duration::seconds(self.updated_at));
        age > max_stale_period
    }
}

fn index_key(tenant: &str) -> String {
    format!("{tenant}/{BUCKET_INDEX_FILENAME}")
}

/// Read `tenant`'s bucket index from the shared bucket.
#[instrument(skip(bucket), fields(backend = bucket.backend_name()))]
pub async fn read_index(bucket: &dyn ObjectStore, tenant: &str) -> BucketIndexResult<BucketIndex> {
    let compressed = match bucket.get(&index_key(tenant)).await {
        Ok(data) => data,
        Err(StorageError::NotFound(_)) => {
            return Err(BucketIndexError::NotFound(tenant.to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut decoder = GzipDecoder::new(&compressed[..]);
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .await
        .map_err(|e| BucketIndexError::Corrupted(format!("gzip: {e}")))?;

    let index: BucketIndex = serde_json::from_slice(&json)
        .map_err(|e| BucketIndexError::Corrupted(format!("json: {e}")))?;
    if index.version != BUCKET_INDEX_VERSION_1 {
        return Err(BucketIndexError::UnsupportedVersion(index.version));
    }

    tracing::debug!(
        tenant = %tenant,
        blocks = index.blocks.len(),
        deletion_marks = index.block_deletion_marks.len(),
        updated_at = index.updated_at,
        "Bucket index loaded"
    );
    Ok(index)
}

/// Write `index` as `tenant`'s bucket index.
pub async fn write_index(
    bucket: &dyn ObjectStore,
    tenant: &str,
    index: &BucketIndex,
) -> BucketIndexResult<()> {
    let json = serde_json::to_vec(index)
        .map_err(|e| BucketIndexError::Corrupted(format!("json: {e}")))?;

    let mut encoder = GzipEncoder::new(Vec::new());
    encoder.write_all(&json).await?;
    encoder.shutdown().await?;

    bucket
        .put(&index_key(tenant), Bytes::from(encoder.into_inner()))
        .await?;
    Ok(())
}
