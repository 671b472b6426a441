//! Persisted result cache: TTL, capacity, replacement and bad stored data.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use mindful::cache::{CacheConfig, CacheKey, CalmSummaryEntry, ResultCache, UsefulnessEntry};
use mindful::storage::{
    CALM_SUMMARY_CACHE_KEY, FileStore, KeyValueStore, ManualClock, MemoryStore,
    USEFULNESS_CACHE_KEY,
};

const START: i64 = 1_700_000_000_000;

fn summaries(
    store: Arc<dyn KeyValueStore>,
    clock: Arc<ManualClock>,
) -> ResultCache<CalmSummaryEntry> {
    ResultCache::new(store, clock, CacheConfig::calm_summary())
}

#[tokio::test]
async fn round_trip_then_expiry() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));
    let cache = summaries(store.clone(), clock.clone());
    let key = CacheKey::url("https://a.test/");

    cache.put(key.clone(), "A calm summary.").await.unwrap();
    let entry = cache.get(&key).await.unwrap();
    assert_eq!(entry.summary, "A calm summary.");
    assert_eq!(entry.timestamp, START);

    // Exactly at the TTL the entry is still valid.
    clock.advance_millis(60 * 60 * 1000);
    assert!(cache.get(&key).await.is_some());

    clock.advance_millis(1);
    assert!(cache.get(&key).await.is_none());

    // The expired entry was pruned from the store on read.
    assert_eq!(
        store.get(CALM_SUMMARY_CACHE_KEY).await.unwrap(),
        Some(json!([]))
    );
}

#[tokio::test]
async fn capacity_evicts_exactly_the_oldest() {
    let clock = Arc::new(ManualClock::new(START));
    let cache = ResultCache::<CalmSummaryEntry>::new(
        Arc::new(MemoryStore::new()),
        clock.clone(),
        CacheConfig::new().max_entries(3).ttl(Duration::from_secs(3600)),
    );

    for page in ["a", "b", "c", "d"] {
        cache
            .put(CacheKey::url(format!("https://{page}.test/")), format!("summary {page}"))
            .await
            .unwrap();
        clock.advance_millis(1000);
    }

    assert!(cache.get(&CacheKey::url("https://a.test/")).await.is_none());
    for page in ["b", "c", "d"] {
        assert!(
            cache
                .get(&CacheKey::url(format!("https://{page}.test/")))
                .await
                .is_some(),
            "{page} should survive"
        );
    }
}

#[tokio::test]
async fn same_key_is_replaced_not_duplicated() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));
    let cache = summaries(store.clone(), clock.clone());
    let key = CacheKey::url("https://a.test/");

    cache.put(key.clone(), "first").await.unwrap();
    clock.advance_millis(10);
    cache.put(key.clone(), "second").await.unwrap();
    cache.put(key.clone(), "second").await.unwrap();

    let stored = store.get(CALM_SUMMARY_CACHE_KEY).await.unwrap().unwrap();
    assert_eq!(stored.as_array().unwrap().len(), 1);
    assert_eq!(cache.get(&key).await.unwrap().summary, "second");
}

#[tokio::test]
async fn usefulness_entries_are_keyed_by_intent() {
    let cache = ResultCache::<UsefulnessEntry>::new(
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::new(START)),
        CacheConfig::usefulness(),
    );
    let url = "https://a.test/";
    cache
        .put(CacheKey::with_intent(url, "learn rust"), "Score: 9/10")
        .await
        .unwrap();

    assert!(cache.get(&CacheKey::with_intent(url, "learn rust")).await.is_some());
    assert!(cache.get(&CacheKey::with_intent(url, "bake bread")).await.is_none());
    assert!(cache.get(&CacheKey::url(url)).await.is_none());
}

#[tokio::test]
async fn malformed_stored_data_reads_as_empty() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));

    store
        .set(USEFULNESS_CACHE_KEY, json!({"not": "a list"}))
        .await
        .unwrap();
    let cache = ResultCache::<UsefulnessEntry>::new(
        store.clone(),
        clock.clone(),
        CacheConfig::usefulness(),
    );
    assert!(cache.get(&CacheKey::with_intent("https://a.test/", "x")).await.is_none());

    store
        .set(
            USEFULNESS_CACHE_KEY,
            json!([
                {"url": "https://a.test/", "intent": "x", "assessment": "Score: 5/10", "timestamp": START},
                {"url": "https://b.test/", "intent": "", "assessment": "Score: 5/10", "timestamp": START},
                {"url": "https://c.test/"},
                {"url": "https://e.test/", "intent": "x", "assessment": "Score: 5/10", "timestamp": i64::MIN},
                42
            ]),
        )
        .await
        .unwrap();
    assert!(cache.get(&CacheKey::with_intent("https://a.test/", "x")).await.is_some());
    assert!(cache.get(&CacheKey::with_intent("https://e.test/", "x")).await.is_none());

    let stored = store.get(USEFULNESS_CACHE_KEY).await.unwrap().unwrap();
    assert_eq!(stored.as_array().unwrap().len(), 1);

    // Writing over garbage works too.
    cache
        .put(CacheKey::with_intent("https://d.test/", "x"), "Score: 2/10")
        .await
        .unwrap();
    let stored = store.get(USEFULNESS_CACHE_KEY).await.unwrap().unwrap();
    assert_eq!(stored.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn file_store_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");
    let clock = Arc::new(ManualClock::new(START));
    let key = CacheKey::url("https://a.test/");

    {
        let cache = summaries(Arc::new(FileStore::new(&path)), clock.clone());
        cache.put(key.clone(), "kept on disk").await.unwrap();
    }

    let cache = summaries(Arc::new(FileStore::new(&path)), clock);
    assert_eq!(cache.get(&key).await.unwrap().summary, "kept on disk");
}
