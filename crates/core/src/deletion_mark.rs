//! Deletion mark documents.
//!
//! A block that has been logically deleted carries a small JSON document at
//! `<block id>/deletion-mark.json`. The block stays in object storage until
//! a compactor removes it; readers use the mark's age to decide when to stop
//! serving it.

use crate::block::BlockId;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// File name of the deletion mark inside a block's namespace.
pub const DELETION_MARK_FILENAME: &str = "deletion-mark.json";

/// The only deletion mark format version understood by this crate.
pub const DELETION_MARK_VERSION_1: u32 = 1;

/// A block's deletion mark.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionMark {
    /// Block this mark applies to.
    pub id: BlockId,
    /// When the block was marked, in Unix seconds.
    pub deletion_time: i64,
    /// Document format version.
    pub version: u32,
    /// Free-form reason recorded by whoever marked the block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl DeletionMark {
    /// Create a version 1 mark.
    pub fn new(id: BlockId, deletion_time: i64) -> Self {
        Self {
            id,
            deletion_time,
            version: DELETION_MARK_VERSION_1,
            details: None,
        }
    }

    /// Object key of the deletion mark for `id`, relative to the tenant root.
    pub fn path_for(id: BlockId) -> String {
        format!("{id}/{DELETION_MARK_FILENAME}")
    }

    /// Decode a mark document, rejecting unknown versions.
    pub fn from_json(data: &[u8]) -> crate::Result<Self> {
        let mark: Self = serde_json::from_slice(data)
            .map_err(|e| crate::Error::InvalidDeletionMark(e.to_string()))?;
        if mark.version != DELETION_MARK_VERSION_1 {
            return Err(crate::Error::UnsupportedMarkVersion {
                version: mark.version,
                supported: DELETION_MARK_VERSION_1,
            });
        }
        Ok(mark)
    }

    /// Encode the mark as its JSON document.
    pub fn to_json(&self) -> crate::Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    /// Time elapsed between the mark and `now`. Negative for marks from the future.
    pub fn age(&self, now: OffsetDateTime) -> Duration {
        (now - OffsetDateTime::UNIX_EPOCH).saturating_sub(Duration::seconds(self.deletion_time))
    }
}
