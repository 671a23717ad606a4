//! Unit tests for the fetch cache.
#![expect(clippy::expect_used, reason = "tests assert on successful fetches")]

use futures_util::future::join;
use rstest::{fixture, rstest};

use super::*;
use crate::test_support::{SourceCall, StubElementSource};

#[fixture]
fn source() -> StubElementSource {
    StubElementSource::new()
        .with_element(Element::node(1, 1.0, 1.0).with_version(4))
        .with_element(Element::node(2, 2.0, 2.0).with_version(1))
        .with_element(Element::node(3, 3.0, 3.0))
        .with_version(Element::node(1, 0.5, 0.5).with_version(3))
}

fn batches(cache: &FetchCache<StubElementSource>) -> Vec<Vec<ElementId>> {
    cache
        .source()
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            SourceCall::Batch { ids, .. } => Some(ids),
            SourceCall::Version { .. } => None,
        })
        .collect()
}

#[rstest]
#[tokio::test]
async fn versioned_fetches_are_cached(source: StubElementSource) {
    let cache = FetchCache::new(source);
    let first = cache
        .fetch_versioned(ElementType::Node, 1, 3)
        .await
        .expect("version 3 exists");
    let second = cache
        .fetch_versioned(ElementType::Node, 1, 3)
        .await
        .expect("served from cache");
    assert_eq!(first, second);
    assert_eq!(cache.requests_issued(), 1);
    assert_eq!(cache.cached_len(), 1);
}

#[rstest]
#[tokio::test]
async fn failed_versioned_fetch_is_retried(source: StubElementSource) {
    let cache = FetchCache::new(source);
    for _ in 0..2 {
        let err = cache
            .fetch_versioned(ElementType::Node, 1, 9)
            .await
            .expect_err("version 9 is unknown");
        assert!(matches!(err, FetchError::RemoteFetchFailed { status: 404, .. }));
    }
    assert_eq!(cache.requests_issued(), 2, "failures are not cached");
    assert_eq!(cache.cached_len(), 0);
}

#[rstest]
#[tokio::test]
async fn local_elements_are_never_requested(source: StubElementSource) {
    let cache = FetchCache::new(source);
    let mut local = ElementMaps::default();
    local.insert(Element::node(1, 9.0, 9.0));

    let found = cache
        .fetch_many(ElementType::Node, &[1, 2], Some(&local))
        .await
        .expect("fetch succeeds");

    assert_eq!(found.get(&1), Some(&Element::node(1, 9.0, 9.0)));
    assert_eq!(batches(&cache), vec![vec![2]]);
}

#[rstest]
#[tokio::test]
async fn batch_results_populate_latest_and_versioned_keys(source: StubElementSource) {
    let cache = FetchCache::new(source);
    cache
        .fetch_many(ElementType::Node, &[1, 2, 3], None)
        .await
        .expect("fetch succeeds");
    assert_eq!(cache.cached_len(), 5, "three latest plus two versioned entries");

    let again = cache
        .fetch_many(ElementType::Node, &[3, 2, 1], None)
        .await
        .expect("served from cache");
    assert_eq!(again.len(), 3);
    let versioned = cache
        .fetch_versioned(ElementType::Node, 2, 1)
        .await
        .expect("cached by batch");
    assert_eq!(versioned.version, Some(1));
    assert_eq!(cache.requests_issued(), 1);
}

#[rstest]
#[tokio::test]
async fn unknown_ids_are_absent_from_the_result(source: StubElementSource) {
    let cache = FetchCache::new(source);
    let found = cache
        .fetch_many(ElementType::Node, &[2, 99, 2], None)
        .await
        .expect("fetch succeeds");
    assert_eq!(found.len(), 1);
    assert!(!found.contains_key(&99));
    assert_eq!(batches(&cache), vec![vec![2, 99]], "duplicate ids are requested once");
}

#[rstest]
#[tokio::test]
async fn overlapping_concurrent_calls_share_the_batch(source: StubElementSource) {
    let cache = FetchCache::new(source);
    let (left, right) = join(
        cache.fetch_many(ElementType::Node, &[1, 2], None),
        cache.fetch_many(ElementType::Node, &[2, 3], None),
    )
    .await;
    let left = left.expect("left succeeds");
    let right = right.expect("right succeeds");

    assert_eq!(left.len(), 2);
    assert_eq!(right.len(), 2);
    assert_eq!(
        batches(&cache),
        vec![vec![1, 2], vec![3]],
        "the second call only requests its residue"
    );
    assert_eq!(cache.requests_issued(), 2);
}

#[rstest]
#[tokio::test]
async fn failures_reach_every_waiter_and_are_not_cached() {
    let failure = FetchError::Network {
        url: "https://example.org".to_owned(),
        message: "connection reset".to_owned(),
    };
    let cache = FetchCache::new(StubElementSource::new().with_failure(failure.clone()));

    let (left, right) = join(
        cache.fetch_many(ElementType::Way, &[5], None),
        cache.fetch_many(ElementType::Way, &[5], None),
    )
    .await;
    assert_eq!(left.expect_err("left fails"), failure);
    assert_eq!(right.expect_err("right fails"), failure);
    assert_eq!(cache.requests_issued(), 1);

    let retry = cache.fetch_many(ElementType::Way, &[5], None).await;
    assert!(retry.is_err());
    assert_eq!(cache.requests_issued(), 2, "in-flight entry was cleared");
}
