//! Cache port shared by all quote sources
//!
//! Backends live in [`crate::store`]. Both operations are infallible from the caller's
//! point of view: backend failures behave as a miss or a no-op.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const MIN_TTL_SECS: u64 = 1;
pub const MAX_TTL_SECS: u64 = 21_600;

pub const YAHOO_TTL: Duration = Duration::from_secs(90);
pub const QUOTE_TTL: Duration = Duration::from_secs(60);
pub const RESOLVED_URL_TTL: Duration = Duration::from_secs(600);
pub const FALLBACK_TTL: Duration = Duration::from_secs(300);

/// Source of the current time, injectable so expiry can be tested without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;
    async fn put(&self, key: &str, value: Value, ttl: Duration);
}

/// Clamps a TTL into the supported `[1, 21600]` second range.
pub fn clamp_ttl(ttl: Duration) -> Duration {
    Duration::from_secs(ttl.as_secs().clamp(MIN_TTL_SECS, MAX_TTL_SECS))
}

/// Typed read. A value that no longer deserializes is treated as a miss.
pub async fn cache_get<T: DeserializeOwned>(
    cache: &dyn KeyValueCollection,
    key: &str,
) -> Option<T> {
    let value = cache.get(key).await?;
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("Discarding undecodable cache entry for key {}: {}", key, e);
            None
        }
    }
}

/// Typed write with the TTL clamped into range.
pub async fn cache_put<T: Serialize>(
    cache: &dyn KeyValueCollection,
    key: &str,
    value: &T,
    ttl: Duration,
) {
    match serde_json::to_value(value) {
        Ok(v) => cache.put(key, v, clamp_ttl(ttl)).await,
        Err(e) => debug!("Skipping cache write for key {}: {}", key, e),
    }
}
