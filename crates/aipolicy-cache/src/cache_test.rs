use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::store::MemorySnapshotStore;

use super::*;

fn policy(ttl: Duration) -> FetchPolicy {
    FetchPolicy::new(ttl, Duration::from_secs(5)).with_retries(2, Duration::ZERO)
}

const HOUR: Duration = Duration::from_secs(3600);

/// Fetcher that counts calls and yields `value` after `delay`.
fn counting(
    calls: &Arc<AtomicU32>,
    value: Vec<String>,
    delay: Duration,
) -> impl Fn() -> BoxFuture<'static, Result<Vec<String>, String>> + Send + Sync + Clone + 'static {
    let calls = Arc::clone(calls);
    move || {
        let calls = Arc::clone(&calls);
        let value = value.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(value)
        }
        .boxed()
    }
}

fn failing(
    calls: &Arc<AtomicU32>,
) -> impl Fn() -> BoxFuture<'static, Result<Vec<String>, String>> + Send + Sync + Clone + 'static {
    let calls = Arc::clone(calls);
    move || {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("upstream unavailable".to_owned())
        }
        .boxed()
    }
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| (*s).to_owned()).collect()
}

#[tokio::test]
async fn fresh_entry_is_served_without_fetching() {
    let cache = DataCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let fetch = counting(&calls, names(&["Kenya"]), Duration::ZERO);

    let first = cache.get_or_fetch("countries", &policy(HOUR), fetch.clone()).await.unwrap();
    let second = cache.get_or_fetch("countries", &policy(HOUR), fetch).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert!(!second.stale);
    assert!(Arc::ptr_eq(&first.data, &second.data));
    assert_eq!(cache.statistics().hits, 1);
}

#[tokio::test]
async fn expired_entry_is_refetched() {
    let cache = DataCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let fetch = counting(&calls, names(&["Kenya"]), Duration::ZERO);

    cache.get_or_fetch("countries", &policy(Duration::ZERO), fetch.clone()).await.unwrap();
    cache.get_or_fetch("countries", &policy(Duration::ZERO), fetch).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn concurrent_callers_share_one_fetch() {
    let cache = DataCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let fetch = counting(&calls, names(&["India"]), Duration::from_millis(50));
    let p = policy(HOUR);

    let (a, b, c) = tokio::join!(
        cache.get_or_fetch("countries", &p, fetch.clone()),
        cache.get_or_fetch("countries", &p, fetch.clone()),
        cache.refresh("countries", &p, fetch),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
    assert!(Arc::ptr_eq(&a.data, &b.data));
    assert!(Arc::ptr_eq(&a.data, &c.data));

    let stats = cache.statistics();
    assert_eq!(stats.fetches, 1);
    assert_eq!(stats.coalesced, 2);
    assert_eq!(stats.in_flight, 0);
    assert_eq!(stats.entries, 1);
}

#[tokio::test]
async fn different_keys_fetch_independently() {
    let cache = DataCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let fetch = counting(&calls, names(&["x"]), Duration::from_millis(10));
    let p = policy(HOUR);

    let (a, b) = tokio::join!(
        cache.get_or_fetch("countries", &p, fetch.clone()),
        cache.get_or_fetch("cached_stats", &p, fetch),
    );
    a.unwrap();
    b.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.keys(), names(&["cached_stats", "countries"]));
}

#[tokio::test]
async fn failure_without_previous_value_retries_then_errors() {
    let cache: DataCache<Vec<String>> = DataCache::new();
    let calls = Arc::new(AtomicU32::new(0));

    let err = cache
        .get_or_fetch("countries", &policy(HOUR), failing(&calls))
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(
        matches!(&err, CacheError::Fetch { attempts: 3, message, .. } if message == "upstream unavailable"),
        "got: {err:?}"
    );
    let stats = cache.statistics();
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.in_flight, 0);
}

#[tokio::test]
async fn failure_with_previous_value_serves_it_stale_without_retrying() {
    let cache = DataCache::new();
    let ok_calls = Arc::new(AtomicU32::new(0));
    let bad_calls = Arc::new(AtomicU32::new(0));

    let original = cache
        .get_or_fetch("countries", &policy(HOUR), counting(&ok_calls, names(&["Kenya"]), Duration::ZERO))
        .await
        .unwrap();

    let refreshed = cache
        .refresh("countries", &policy(HOUR), failing(&bad_calls))
        .await
        .unwrap();

    assert_eq!(bad_calls.load(Ordering::SeqCst), 1, "no retry when a fallback exists");
    assert!(refreshed.stale);
    assert_eq!(*refreshed.data, names(&["Kenya"]));
    assert_eq!(refreshed.fetched_at, original.fetched_at);
    assert_eq!(cache.statistics().stale_served, 1);
}

#[tokio::test]
async fn invalidated_entry_is_refetched_but_kept_as_fallback() {
    let cache = DataCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    cache
        .get_or_fetch("countries", &policy(HOUR), counting(&calls, names(&["a"]), Duration::ZERO))
        .await
        .unwrap();

    assert!(cache.invalidate("countries"));
    assert!(!cache.invalidate("missing"));
    assert!(cache.peek("countries", HOUR).unwrap().stale);

    let bad = Arc::new(AtomicU32::new(0));
    let served = cache
        .get_or_fetch("countries", &policy(HOUR), failing(&bad))
        .await
        .unwrap();
    assert_eq!(bad.load(Ordering::SeqCst), 1);
    assert!(served.stale);
    assert_eq!(*served.data, names(&["a"]));
}

#[tokio::test]
async fn slow_fetch_times_out() {
    let cache = DataCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let p = FetchPolicy::new(HOUR, Duration::from_millis(30)).with_retries(0, Duration::ZERO);

    let err = cache
        .get_or_fetch("countries", &p, counting(&calls, names(&["x"]), Duration::from_secs(10)))
        .await
        .unwrap_err();

    assert!(matches!(err, CacheError::Timeout { attempts: 1, .. }), "got: {err:?}");
    assert_eq!(cache.statistics().in_flight, 0);
}

#[tokio::test]
async fn cancellation_aborts_sole_waiter_fetch() {
    let cache = DataCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = cache
        .get_or_fetch_with_cancel(
            "countries",
            &policy(HOUR),
            counting(&calls, names(&["x"]), Duration::from_secs(10)),
            &token,
        )
        .await
        .unwrap_err();

    assert_eq!(err, CacheError::Cancelled { key: "countries".to_owned() });
    let stats = cache.statistics();
    assert_eq!(stats.in_flight, 0);
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.cancelled, 1);
}

#[tokio::test]
async fn cancellation_with_previous_value_serves_stale() {
    let cache = DataCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    cache
        .get_or_fetch("countries", &policy(HOUR), counting(&calls, names(&["old"]), Duration::ZERO))
        .await
        .unwrap();
    cache.invalidate("countries");

    let token = CancellationToken::new();
    token.cancel();
    let served = cache
        .get_or_fetch_with_cancel(
            "countries",
            &policy(HOUR),
            counting(&calls, names(&["new"]), Duration::from_secs(10)),
            &token,
        )
        .await
        .unwrap();

    assert!(served.stale);
    assert_eq!(*served.data, names(&["old"]));
}

#[tokio::test]
async fn cancelled_waiter_does_not_abort_shared_fetch() {
    let cache = DataCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let fetch = counting(&calls, names(&["shared"]), Duration::from_millis(50));
    let p = policy(HOUR);
    let token = CancellationToken::new();
    token.cancel();

    let (patient, impatient) = tokio::join!(
        cache.get_or_fetch("countries", &p, fetch.clone()),
        cache.get_or_fetch_with_cancel("countries", &p, fetch, &token),
    );

    assert!(matches!(impatient, Err(CacheError::Cancelled { .. })));
    assert_eq!(*patient.unwrap().data, names(&["shared"]));
    assert_eq!(cache.statistics().cancelled, 0);
    assert!(cache.peek("countries", HOUR).is_some());
}

#[tokio::test]
async fn cancel_in_flight_rejects_waiters() {
    let cache = DataCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let fetch = counting(&calls, names(&["x"]), Duration::from_secs(10));

    let waiter = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get_or_fetch("countries", &policy(HOUR), fetch).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(cache.cancel_in_flight("countries"));
    assert!(!cache.cancel_in_flight("countries"));

    let result = waiter.await.unwrap();
    assert!(matches!(result, Err(CacheError::Cancelled { .. })), "got: {result:?}");
    assert_eq!(cache.statistics().entries, 0);
}

#[tokio::test]
async fn successful_fetch_is_persisted_and_hydrated() {
    let store = Arc::new(MemorySnapshotStore::new());
    let calls = Arc::new(AtomicU32::new(0));

    let first = DataCache::with_store(store.clone());
    let fetched = first
        .get_or_fetch("countries", &policy(HOUR), counting(&calls, names(&["Kenya"]), Duration::ZERO))
        .await
        .unwrap();
    assert_eq!(store.len(), 1);

    let second: DataCache<Vec<String>> = DataCache::with_store(store);
    assert!(second.hydrate("countries").unwrap());
    assert!(!second.hydrate("missing").unwrap());

    let bad = Arc::new(AtomicU32::new(0));
    let served = second
        .get_or_fetch("countries", &policy(HOUR), failing(&bad))
        .await
        .unwrap();
    assert_eq!(bad.load(Ordering::SeqCst), 0, "hydrated entry is still fresh");
    assert_eq!(*served.data, names(&["Kenya"]));
    assert_eq!(
        served.fetched_at.timestamp_millis(),
        fetched.fetched_at.timestamp_millis()
    );
}

#[tokio::test]
async fn hydrate_does_not_overwrite_memory() {
    let store = Arc::new(MemorySnapshotStore::new());
    store
        .save(
            "countries",
            &Envelope {
                data: serde_json::json!(["from-disk"]),
                timestamp: 0,
            },
        )
        .unwrap();

    let cache = DataCache::with_store(store);
    let calls = Arc::new(AtomicU32::new(0));
    cache
        .get_or_fetch("countries", &policy(HOUR), counting(&calls, names(&["live"]), Duration::ZERO))
        .await
        .unwrap();

    assert!(!cache.hydrate("countries").unwrap());
    assert_eq!(*cache.peek("countries", HOUR).unwrap().data, names(&["live"]));
}

#[tokio::test]
async fn hydrate_rejects_snapshot_of_wrong_shape() {
    let store = Arc::new(MemorySnapshotStore::new());
    store
        .save(
            "countries",
            &Envelope {
                data: serde_json::json!({ "not": "a list" }),
                timestamp: 0,
            },
        )
        .unwrap();
    let cache: DataCache<Vec<String>> = DataCache::with_store(store);
    assert!(matches!(
        cache.hydrate("countries"),
        Err(StoreError::Serialize { .. })
    ));
}

#[tokio::test]
async fn remove_drops_entry_and_snapshot() {
    let store = Arc::new(MemorySnapshotStore::new());
    let cache = DataCache::with_store(store.clone());
    let calls = Arc::new(AtomicU32::new(0));
    cache
        .get_or_fetch("countries", &policy(HOUR), counting(&calls, names(&["x"]), Duration::ZERO))
        .await
        .unwrap();

    assert!(cache.remove("countries"));
    assert!(!cache.remove("countries"));
    assert!(cache.peek("countries", HOUR).is_none());
    assert!(store.is_empty());
}
