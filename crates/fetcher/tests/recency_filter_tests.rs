// Recency filter behavior at a fixed reference time.

mod common;

use blockgate_fetcher::metrics::TOO_FRESH;
use blockgate_fetcher::{FetcherMetrics, IgnoreNonQueryableBlocksFilter, MetadataFilter};
use common::*;
use std::collections::HashSet;
use time::Duration;
use tokio_util::sync::CancellationToken;

fn recency_filter(window: Duration) -> IgnoreNonQueryableBlocksFilter {
    IgnoreNonQueryableBlocksFilter::new(window).with_clock(clock())
}

#[tokio::test]
async fn test_three_hour_window() {
    let mut metas = working_set_with_ranges(&[
        (block(1), Duration::hours(-2), Duration::ZERO),
        (block(2), Duration::hours(-4), Duration::hours(-2)),
        (block(3), Duration::hours(-6), Duration::hours(-4)),
        (block(4), Duration::hours(-8), Duration::hours(-6)),
    ]);

    let metrics = FetcherMetrics::new().unwrap();
    recency_filter(Duration::hours(3))
        .filter(
            &CancellationToken::new(),
            &mut metas,
            &metrics.synced,
            &metrics.modified,
        )
        .await
        .unwrap();

    let remaining: HashSet<_> = metas.keys().copied().collect();
    assert_eq!(remaining, HashSet::from([block(2), block(3), block(4)]));
    assert_eq!(metrics.synced.with_label_values(&[TOO_FRESH]).get(), 1);
}

#[tokio::test]
async fn test_overlapping_block_kept_whole() {
    // Starts before the window and ends inside it.
    let mut metas = working_set_with_ranges(&[(
        block(1),
        Duration::hours(-4),
        Duration::hours(-1),
    )]);
    let original = metas.clone();

    let metrics = FetcherMetrics::new().unwrap();
    recency_filter(Duration::hours(3))
        .filter(
            &CancellationToken::new(),
            &mut metas,
            &metrics.synced,
            &metrics.modified,
        )
        .await
        .unwrap();

    assert_eq!(metas, original);
}

#[tokio::test]
async fn test_blocks_from_the_future_are_removed() {
    let mut metas = working_set_with_ranges(&[(
        block(1),
        Duration::hours(1),
        Duration::hours(2),
    )]);

    let metrics = FetcherMetrics::new().unwrap();
    recency_filter(Duration::ZERO)
        .filter(
            &CancellationToken::new(),
            &mut metas,
            &metrics.synced,
            &metrics.modified,
        )
        .await
        .unwrap();

    assert!(metas.is_empty());
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let mut metas = working_set_with_ranges(&[
        (block(1), Duration::hours(-1), Duration::ZERO),
        (block(2), Duration::hours(-9), Duration::hours(-8)),
    ]);
    let filter = recency_filter(Duration::hours(3));
    let cancel = CancellationToken::new();

    let metrics = FetcherMetrics::new().unwrap();
    filter
        .filter(&cancel, &mut metas, &metrics.synced, &metrics.modified)
        .await
        .unwrap();
    let after_first = metas.clone();

    let metrics = FetcherMetrics::new().unwrap();
    filter
        .filter(&cancel, &mut metas, &metrics.synced, &metrics.modified)
        .await
        .unwrap();

    assert_eq!(metas, after_first);
    assert_eq!(metrics.synced.with_label_values(&[TOO_FRESH]).get(), 0);
}
