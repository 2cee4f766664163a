//! The contract shared by every block metadata filter.

use crate::bucket_index::BucketIndex;
use crate::error::FilterResult;
use crate::metrics::TxGaugeVec;
use async_trait::async_trait;
use blockgate_core::WorkingSet;
use tokio_util::sync::CancellationToken;

/// A stage of the filter chain.
///
/// Implementations remove the entries they reject from `metas` and count
/// each removal under their own state in `synced` (or `modified` for
/// filters that rewrite entries). They must not add entries, must not rely
/// on labels other filters produced, must stop promptly once `cancel` fires,
/// and must leave `metas` untouched when they return an error.
#[async_trait]
pub trait MetadataFilter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Filter using direct object storage access where needed.
    async fn filter(
        &self,
        cancel: &CancellationToken,
        metas: &mut WorkingSet,
        synced: &TxGaugeVec,
        modified: &TxGaugeVec,
    ) -> FilterResult<()>;

    /// Filter using a bucket index snapshot. Filters that gain nothing from
    /// the index keep the default, which runs [`MetadataFilter::filter`].
    async fn filter_with_index(
        &self,
        cancel: &CancellationToken,
        metas: &mut WorkingSet,
        _index: &BucketIndex,
        synced: &TxGaugeVec,
        modified: &TxGaugeVec,
    ) -> FilterResult<()> {
        self.filter(cancel, metas, synced, modified).await
    }
}
