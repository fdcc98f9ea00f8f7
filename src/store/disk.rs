use crate::core::cache::{Clock, KeyValueCollection, SystemClock};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const PARTITION: &str = "quotes";

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// Persistent collection backed by a fjall partition. Entries are JSON envelopes
/// carrying their own expiry, checked on read.
pub struct DiskCollection {
    _keyspace: Keyspace,
    partition: PartitionHandle,
    clock: Arc<dyn Clock>,
}

impl DiskCollection {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let keyspace = fjall::Config::new(path).open()?;
        let partition = keyspace.open_partition(PARTITION, PartitionCreateOptions::default())?;
        Ok(Self {
            _keyspace: keyspace,
            partition,
            clock: Arc::new(SystemClock),
        })
    }

    fn read(&self, key: &str) -> Result<Option<Value>> {
        let Some(raw) = self.partition.get(key)? else {
            debug!("Cache MISS for key: {:?}", key);
            return Ok(None);
        };
        let entry: CacheEntry = serde_json::from_slice(&raw)?;
        if entry.expires_at <= self.clock.now() {
            debug!("Cache entry expired for key: {:?}", key);
            self.partition.remove(key)?;
            return Ok(None);
        }
        debug!("Cache HIT for key: {:?}", key);
        Ok(Some(entry.value))
    }

    fn write(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(chrono::Duration::from_std(ttl)?)
            .ok_or_else(|| anyhow!("TTL out of range: {:?}", ttl))?;
        let entry = CacheEntry { value, expires_at };
        self.partition.insert(key, serde_json::to_vec(&entry)?)?;
        debug!("Cache PUT for key: {:?}", key);
        Ok(())
    }
}

#[async_trait]
impl KeyValueCollection for DiskCollection {
    async fn get(&self, key: &str) -> Option<Value> {
        match self.read(key) {
            Ok(value) => value,
            Err(e) => {
                debug!("DiskCollection get error: {}", e);
                None
            }
        }
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) {
        if let Err(e) = self.write(key, value, ttl) {
            debug!("DiskCollection put error: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_disk_cache_get_put() {
        let dir = tempdir().unwrap();
        let cache = DiskCollection::open(dir.path()).unwrap();

        assert!(cache.get("key1").await.is_none());

        cache.put("key1", json!(123), Duration::from_secs(60)).await;

        assert_eq!(cache.get("key1").await, Some(json!(123)));
        assert!(cache.get("key2").await.is_none());
    }

    #[tokio::test]
    async fn test_disk_cache_ttl_expiration() {
        let dir = tempdir().unwrap();
        let cache = DiskCollection::open(dir.path()).unwrap();

        cache.put("key1", json!(123), Duration::from_millis(10)).await;
        sleep(Duration::from_millis(20)).await;
        assert!(cache.get("key1").await.is_none());
    }

    #[tokio::test]
    async fn test_disk_cache_out_of_range_ttl_is_ignored() {
        let dir = tempdir().unwrap();
        let cache = DiskCollection::open(dir.path()).unwrap();

        assert!(
            cache
                .write("key1", json!(1), Duration::from_secs(1_000_000_000_000_000))
                .is_err()
        );
        cache
            .put("key1", json!(1), Duration::from_secs(1_000_000_000_000_000))
            .await;
        assert!(cache.get("key1").await.is_none());
    }
}
