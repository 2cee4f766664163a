//! Block metadata filters for blockgate.
//!
//! Each sync cycle a store gateway lists the blocks of a tenant and narrows
//! that working set down to what it should actually serve:
//! - [`IgnoreDeletionMarkFilter`] hides blocks whose deletion grace delay elapsed
//! - [`IgnoreNonQueryableBlocksFilter`] leaves blocks too recent for storage to the ingesters
//!
//! Filters compose through [`FilterChain`], which publishes per-state block
//! counts to Prometheus once a cycle completes. [`TenantFilter`] picks between
//! the bucket index and direct object storage reads for each cycle.

pub mod bucket_index;
pub mod chain;
pub mod deletion;
pub mod error;
pub mod filter;
pub mod marker;
pub mod metrics;
pub mod recency;
pub mod tenant;

pub use bucket_index::{BucketIndex, IndexBlock, IndexDeletionMark, read_index, write_index};
pub use chain::FilterChain;
pub use deletion::IgnoreDeletionMarkFilter;
pub use error::{BucketIndexError, BucketIndexResult, FilterError, FilterResult};
pub use filter::MetadataFilter;
pub use marker::{MarkerLookup, read_deletion_mark, write_deletion_mark};
pub use metrics::{FetcherMetrics, TxGaugeVec};
pub use recency::IgnoreNonQueryableBlocksFilter;
pub use tenant::{FilterMode, TenantFilter};
