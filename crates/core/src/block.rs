//! Block identity and the metadata fields the filters read.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Identifier of a block: a ULID whose leading 48 bits are the creation
/// time in Unix milliseconds, so string order follows creation order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(Ulid);

impl BlockId {
    /// Generate a new block ID stamped with the current time.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Build a block ID from a millisecond timestamp and 80 bits of randomness.
    pub fn from_parts(timestamp_ms: u64, random: u128) -> Self {
        Self(Ulid::from_parts(timestamp_ms, random))
    }

    /// Parse from the canonical 26-character representation.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidBlockId(format!("{s}: {e}")))
    }

    /// Creation time embedded in the ID, in Unix milliseconds.
    pub fn timestamp_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }

    /// Get the underlying ULID.
    pub fn as_ulid(&self) -> &Ulid {
        &self.0
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for BlockId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl From<Ulid> for BlockId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block metadata as stored in a block's `meta.json`.
///
/// Only the identity and time range are interpreted; every other field is
/// carried through untouched in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockMeta {
    #[serde(rename = "ulid")]
    pub id: BlockId,
    /// Earliest sample timestamp (Unix milliseconds, inclusive).
    #[serde(rename = "minTime")]
    pub min_time: i64,
    /// Latest sample timestamp (Unix milliseconds, exclusive).
    #[serde(rename = "maxTime")]
    pub max_time: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BlockMeta {
    /// Create metadata for a block covering `[min_time, max_time)`.
    pub fn new(id: BlockId, min_time: i64, max_time: i64) -> Self {
        Self {
            id,
            min_time,
            max_time,
            extra: serde_json::Map::new(),
        }
    }
}

/// The collection threaded through the filter chain during one fetch cycle.
pub type WorkingSet = HashMap<BlockId, BlockMeta>;
