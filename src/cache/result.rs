use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::{CacheConfig, CacheKey, CacheRecord};
use crate::storage::{Clock, KeyValueStore};
use crate::{Result, telemetry};

/// TTL + capacity bounded result list persisted under one store key.
///
/// The stored value is a JSON array of records. Anything unreadable in it
/// (a non-array value, records that fail to deserialize or are blank, expired
/// records) is silently dropped; reads never fail. When a read prunes
/// something the cleaned list is written back.
pub struct ResultCache<E> {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    _record: PhantomData<fn() -> E>,
}

impl<E: CacheRecord> ResultCache<E> {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: CacheConfig) -> Self {
        Self {
            store,
            clock,
            config,
            _record: PhantomData,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a fresh record by key. Emits cache hit/miss metrics.
    pub async fn get(&self, key: &CacheKey) -> Option<E> {
        let (entries, pruned) = self.load_fresh().await;
        if pruned && let Err(e) = self.persist(&entries).await {
            warn!(cache = E::STORE_KEY, error = %e, "failed to persist pruned cache");
        }

        let found = entries.into_iter().find(|e| e.key() == *key);
        if found.is_some() {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => E::STORE_KEY).increment(1);
        } else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => E::STORE_KEY).increment(1);
        }
        found
    }

    /// Store `payload` under `key`, replacing any record with the same key.
    ///
    /// The oldest records are evicted when the list exceeds capacity. Only
    /// the final write can fail.
    pub async fn put(&self, key: CacheKey, payload: impl Into<String>) -> Result<()> {
        let (mut entries, _) = self.load_fresh().await;
        entries.retain(|e| e.key() != key);
        entries.push(E::from_parts(key, payload.into(), self.clock.now_millis()));

        // Stable sort: ties keep insertion order, so the newest write survives.
        entries.sort_by_key(|e| e.timestamp());
        if entries.len() > self.config.max_entries {
            let excess = entries.len() - self.config.max_entries;
            entries.drain(..excess);
            debug!(cache = E::STORE_KEY, evicted = excess, "evicted oldest cache entries");
        }
        self.persist(&entries).await
    }

    /// Load the stored list minus malformed and expired records. The flag
    /// reports whether anything was dropped.
    async fn load_fresh(&self) -> (Vec<E>, bool) {
        let raw = match self.store.get(E::STORE_KEY).await {
            Ok(Some(value)) => value,
            Ok(None) => return (Vec::new(), false),
            Err(e) => {
                warn!(cache = E::STORE_KEY, error = %e, "cache unavailable");
                return (Vec::new(), false);
            }
        };

        let Value::Array(items) = raw else {
            return (Vec::new(), true);
        };
        let total = items.len();
        let now = self.clock.now_millis();
        let ttl_ms = self.config.ttl.as_millis() as i64;

        let entries: Vec<E> = items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<E>(item).ok())
            .filter(|e| e.is_well_formed())
            .filter(|e| {
                now.checked_sub(e.timestamp())
                    .is_some_and(|age| age <= ttl_ms)
            })
            .collect();
        let pruned = entries.len() != total;
        (entries, pruned)
    }

    async fn persist(&self, entries: &[E]) -> Result<()> {
        let value = serde_json::to_value(entries)?;
        self.store.set(E::STORE_KEY, value).await
    }
}
