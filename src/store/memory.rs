use crate::core::cache::{Clock, KeyValueCollection, SystemClock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Size past which a PUT first drops every expired entry.
const SWEEP_THRESHOLD: usize = 512;

struct CacheValue {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// In-memory collection. Expiry is computed from the injected clock. Expired entries
/// are evicted on read, and swept on write once the map grows large.
pub struct MemoryCollection {
    inner: Mutex<HashMap<String, CacheValue>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueCollection for MemoryCollection {
    async fn get(&self, key: &str) -> Option<Value> {
        let mut cache = self.inner.lock().await;
        let now = self.clock.now();
        match cache.get(key) {
            Some(entry) if entry.expires_at <= now => {
                debug!("Cache entry expired for key: {:?}", key);
                cache.remove(key);
                None
            }
            Some(entry) => {
                debug!("Cache HIT for key: {:?}", key);
                Some(entry.value.clone())
            }
            None => {
                debug!("Cache MISS for key: {:?}", key);
                None
            }
        }
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) {
        let now = self.clock.now();
        let Some(expires_at) = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
        else {
            debug!("Ignoring cache PUT for key {:?}: TTL out of range", key);
            return;
        };
        let mut cache = self.inner.lock().await;
        if cache.len() >= SWEEP_THRESHOLD {
            cache.retain(|_, entry| entry.expires_at > now);
            debug!("Swept expired cache entries, {} left", cache.len());
        }
        debug!("Cache PUT for key: {:?}", key);
        cache.insert(key.to_string(), CacheValue { value, expires_at });
    }
}
