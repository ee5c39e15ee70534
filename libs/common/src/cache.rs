use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

/// TTL tiers by data volatility: gas prices change block to block, contract
/// reads change per transaction, content-addressed data never changes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CacheTiers {
    pub short: Duration,
    pub default: Duration,
    pub long: Duration,
}

impl Default for CacheTiers {
    fn default() -> Self {
        Self {
            short: Duration::from_secs(300),
            default: Duration::from_secs(3600),
            long: Duration::from_secs(86400),
        }
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    value: Value,
    cached_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= self.ttl
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub keys: usize,
    pub hit_rate: f64,
}

/// Shared TTL key-value cache backing all read paths. Keys are namespaced by
/// prefix (`contract:`, `gas:`, `ipfs:`, `blocks:`, `tx:`) so one consumer's
/// invalidation cannot touch another's entries.
///
/// Concurrent `get_or_set` calls for the same key collapse onto a single
/// producer invocation; waiters observe the produced value instead of firing
/// their own upstream call.
pub struct CacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
        }
    }

    /// Returns the cached value, or None if the key is absent or expired.
    /// Expired entries are dropped on the way out.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let expired = {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            let mut entries = self.entries.write().await;
            if entries.get(key).map(|e| e.is_expired()).unwrap_or(false) {
                entries.remove(key);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    // Lookup without touching the hit/miss counters, used when re-checking
    // after waiting on the in-flight gate.
    async fn peek(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    pub async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                cached_at: Instant::now(),
                ttl,
            },
        );
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    /// Cached read-through: returns the cached value when present, otherwise
    /// runs the producer, stores its result, and returns it. Producer errors
    /// propagate and nothing is cached, so the next lookup retries.
    pub async fn get_or_set<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
    ) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let gate = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let result = {
            let _guard = gate.lock().await;

            // Whoever held the gate before us may have filled the cache.
            if let Some(value) = self.peek(key).await {
                Ok(value)
            } else {
                match producer().await {
                    Ok(value) => {
                        self.set(key, value.clone(), ttl).await;
                        Ok(value)
                    }
                    Err(err) => Err(err),
                }
            }
        };

        let mut inflight = self.inflight.lock().await;
        if let Some(existing) = inflight.get(key) {
            if Arc::ptr_eq(existing, &gate) && Arc::strong_count(&gate) == 2 {
                inflight.remove(key);
            }
        }

        result
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Removes every key under the given namespace prefix, or everything
    /// when no prefix is given.
    pub async fn clear(&self, namespace: Option<&str>) {
        let mut entries = self.entries.write().await;
        match namespace {
            Some(prefix) => entries.retain(|key, _| !key.starts_with(prefix)),
            None => entries.clear(),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };

        CacheStats {
            hits,
            misses,
            sets: self.sets.load(Ordering::Relaxed),
            keys: self.entries.read().await.len(),
            hit_rate,
        }
    }
}
