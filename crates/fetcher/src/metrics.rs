//! Prometheus metrics for block metadata filtering.
//!
//! Filters report how many blocks ended in each outcome state through
//! [`TxGaugeVec`]s. Increments made during a cycle land in a pending vector
//! and only become visible to scrapers when the cycle calls
//! [`TxGaugeVec::submit`], so a scrape never observes a half-finished cycle.

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{IntGauge, IntGaugeVec, Opts, Registry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Label name carrying the outcome state.
pub const STATE_LABEL: &str = "state";

/// Block removed because its deletion mark is older than the grace delay.
pub const MARKED_FOR_DELETION: &str = "marked-for-deletion";

/// Block removed because it starts inside the ingestion-owned window.
pub const TOO_FRESH: &str = "too-fresh";

/// Block left in the working set after every filter ran.
pub const LOADED: &str = "loaded";

/// A gauge vector whose updates are published in batches.
///
/// `reset_tx` starts a transaction, `with_label_values` hands out gauges of
/// the pending transaction (safe to increment from many tasks), and `submit`
/// swaps the pending values in as the exported ones.
#[derive(Clone)]
pub struct TxGaugeVec {
    desc: Vec<Desc>,
    init_label_values: Arc<Vec<Vec<String>>>,
    state: Arc<Mutex<TxState>>,
}

struct TxState {
    committed: IntGaugeVec,
    pending: IntGaugeVec,
}

impl TxGaugeVec {
    /// Create a vector. Every entry of `init_label_values` is pre-created at
    /// zero on each `reset_tx`, so those series are exported even when a
    /// cycle never touches them.
    pub fn new(
        opts: Opts,
        label_names: &[&str],
        init_label_values: &[&[&str]],
    ) -> prometheus::Result<Self> {
        let committed = IntGaugeVec::new(opts.clone(), label_names)?;
        let pending = IntGaugeVec::new(opts, label_names)?;
        for values in init_label_values {
            committed.get_metric_with_label_values(values)?;
            pending.get_metric_with_label_values(values)?;
        }

        Ok(Self {
            desc: committed.desc().into_iter().cloned().collect(),
            init_label_values: Arc::new(
                init_label_values
                    .iter()
                    .map(|values| values.iter().map(|v| v.to_string()).collect())
                    .collect(),
            ),
            state: Arc::new(Mutex::new(TxState { committed, pending })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, TxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Discard pending values and start a new transaction.
    pub fn reset_tx(&self) {
        let state = self.lock();
        state.pending.reset();
        for values in self.init_label_values.iter() {
            let values: Vec<&str> = values.iter().map(String::as_str).collect();
            state.pending.with_label_values(&values);
        }
    }

    /// Gauge of the pending transaction for the given label values.
    pub fn with_label_values(&self, values: &[&str]) -> IntGauge {
        self.lock().pending.with_label_values(values)
    }

    /// Publish the pending transaction.
    pub fn submit(&self) {
        let mut guard = self.lock();
        let state = &mut *guard;
        std::mem::swap(&mut state.committed, &mut state.pending);
        state.pending.reset();
    }
}

impl Collector for TxGaugeVec {
    fn desc(&self) -> Vec<&Desc> {
        self.desc.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.lock().committed.collect()
    }
}

/// Const label identifying the tenant a pair of vectors reports for.
pub const TENANT_LABEL: &str = "tenant";

/// The pair of outcome vectors shared by every filter of a chain.
///
/// An instance carries one transaction at a time, so it must belong to a
/// single chain. Chains of different tenants registered in the same registry
/// use [`FetcherMetrics::for_tenant`], which tells their series apart.
#[derive(Clone)]
pub struct FetcherMetrics {
    /// Blocks per outcome state.
    pub synced: TxGaugeVec,
    /// Blocks whose metadata a filter rewrote, per state.
    pub modified: TxGaugeVec,
}

impl FetcherMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Self::with_const_labels(HashMap::new())
    }

    /// Vectors labelled with `tenant`, registrable next to other tenants'.
    pub fn for_tenant(tenant: &str) -> prometheus::Result<Self> {
        Self::with_const_labels(HashMap::from([(
            TENANT_LABEL.to_string(),
            tenant.to_string(),
        )]))
    }

    fn with_const_labels(labels: HashMap<String, String>) -> prometheus::Result<Self> {
        let synced = TxGaugeVec::new(
            Opts::new(
                "blockgate_blocks_meta_synced",
                "Number of block metadata synced, by outcome state",
            )
            .const_labels(labels.clone()),
            &[STATE_LABEL],
            &[&[LOADED], &[MARKED_FOR_DELETION], &[TOO_FRESH]],
        )?;
        let modified = TxGaugeVec::new(
            Opts::new(
                "blockgate_blocks_meta_modified",
                "Number of blocks whose metadata changed, by state",
            )
            .const_labels(labels),
            &[STATE_LABEL],
            &[],
        )?;
        Ok(Self { synced, modified })
    }

    /// Register both vectors with `registry`.
    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.synced.clone()))?;
        registry.register(Box::new(self.modified.clone()))?;
        Ok(())
    }

    /// Start a new transaction on both vectors.
    pub fn reset_tx(&self) {
        self.synced.reset_tx();
        self.modified.reset_tx();
    }

    /// Publish both vectors.
    pub fn submit(&self) {
        self.synced.submit();
        self.modified.submit();
    }
}
