// bazaar/src/cache.rs

//! Read-through, write-invalidate cache for JSON-serializable values.
//!
//! Keys follow `<resource>` for lists and `<resource>:<id>` for single items, so a
//! write can drop everything of one resource with [`Cache::invalidate_prefix`].

use crate::error::{BazaarError, BazaarResult};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[async_trait]
pub trait Cache: Send + Sync {
  async fn get_raw(&self, key: &str) -> Option<String>;

  async fn set_raw(&self, key: &str, value: String);

  /// Removes every key equal to `prefix` or starting with `prefix:`.
  async fn invalidate_prefix(&self, prefix: &str);
}

pub fn item_key(resource: &str, id: impl std::fmt::Display) -> String {
  format!("{}:{}", resource, id)
}

struct CacheEntry {
  value: String,
  expires_at: Instant,
}

/// Process-local cache with a fixed time to live.
pub struct MemoryCache {
  entries: DashMap<String, CacheEntry>,
  ttl: Duration,
}

impl MemoryCache {
  pub fn new(ttl: Duration) -> Self {
    Self {
      entries: DashMap::new(),
      ttl,
    }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[async_trait]
impl Cache for MemoryCache {
  async fn get_raw(&self, key: &str) -> Option<String> {
    let now = Instant::now();
    let hit = self
      .entries
      .get(key)
      .map(|entry| (entry.expires_at > now, entry.value.clone()));
    match hit {
      Some((true, value)) => Some(value),
      Some((false, _)) => {
        self.entries.remove(key);
        None
      }
      None => None,
    }
  }

  async fn set_raw(&self, key: &str, value: String) {
    self.entries.insert(
      key.to_string(),
      CacheEntry {
        value,
        expires_at: Instant::now() + self.ttl,
      },
    );
  }

  async fn invalidate_prefix(&self, prefix: &str) {
    let scoped = format!("{}:", prefix);
    self.entries.retain(|key, _| key != prefix && !key.starts_with(&scoped));
    debug!(prefix, "Cache prefix invalidated.");
  }
}

/// Returns the cached value under `key`, or runs `load`, stores and returns its result.
///
/// An entry that no longer deserializes is treated as a miss.
pub async fn cached<T, F, Fut>(cache: &dyn Cache, key: &str, load: F) -> BazaarResult<T>
where
  T: Serialize + DeserializeOwned,
  F: FnOnce() -> Fut,
  Fut: Future<Output = BazaarResult<T>>,
{
  if let Some(raw) = cache.get_raw(key).await {
    match serde_json::from_str::<T>(&raw) {
      Ok(value) => {
        debug!(key, "Cache hit.");
        return Ok(value);
      }
      Err(e) => warn!(key, error = %e, "Dropping undecodable cache entry."),
    }
  }
  let value = load().await?;
  let raw = serde_json::to_string(&value)
    .map_err(|e| BazaarError::Infrastructure(format!("cache serialization failed: {}", e)))?;
  cache.set_raw(key, raw).await;
  Ok(value)
}
