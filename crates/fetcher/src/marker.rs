//! Reading and writing deletion mark documents in object storage.

use crate::error::{FilterError, FilterResult};
use blockgate_core::{BlockId, DeletionMark};
use blockgate_storage::{ObjectStore, StorageError, StorageResult};
use bytes::Bytes;
use tracing::instrument;

/// Outcome of looking up a block's deletion mark.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkerLookup {
    /// A valid mark exists.
    Found(DeletionMark),
    /// The block has no mark.
    NotFound,
    /// A document exists but cannot be used; callers treat this like `NotFound`.
    Corrupted(String),
}

/// Read the deletion mark of block `id` from a tenant-scoped store.
///
/// Only infrastructure failures are returned as errors. A missing document,
/// one that fails to decode, carries an unknown version, or names a different
/// block is reported through [`MarkerLookup`].
#[instrument(skip(store), fields(backend = store.backend_name()))]
pub async fn read_deletion_mark(
    store: &dyn ObjectStore,
    id: BlockId,
) -> StorageResult<MarkerLookup> {
    let data = match store.get(&DeletionMark::path_for(id)).await {
        Ok(data) => data,
        Err(StorageError::NotFound(_)) => return Ok(MarkerLookup::NotFound),
        Err(e) => return Err(e),
    };

    Ok(match DeletionMark::from_json(&data) {
        Ok(mark) if mark.id != id => {
            MarkerLookup::Corrupted(format!("mark belongs to block {}", mark.id))
        }
        Ok(mark) => MarkerLookup::Found(mark),
        Err(e) => MarkerLookup::Corrupted(e.to_string()),
    })
}

/// Write `mark` to its fixed location in a tenant-scoped store.
pub async fn write_deletion_mark(store: &dyn ObjectStore, mark: &DeletionMark) -> FilterResult<()> {
    let data = mark.to_json()?;
    store
        .put(&DeletionMark::path_for(mark.id), Bytes::from(data))
        .await
        .map_err(|source| FilterError::Storage {
            block_id: mark.id,
            source,
        })
}
