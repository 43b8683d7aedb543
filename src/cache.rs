//! Read-through cache with a fixed expiry and a shared invalidation generation

use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::clock::Clock;
use crate::models::PlanRecord;

pub type PlanCache = TtlCache<NaiveDate, Option<PlanRecord>>;

#[derive(Debug, Clone)]
struct Entry<V> {
  value: V,
  stored_at: DateTime<Utc>,
  generation: u64,
}

pub struct TtlCache<K, V> {
  entries: DashMap<K, Entry<V>>,
  generation: AtomicU64,
  ttl: Duration,
  clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
  K: Eq + Hash + Clone,
  V: Clone,
{
  /// A zero `ttl` disables caching: every read goes to the loader
  pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
    Self {
      entries: DashMap::new(),
      generation: AtomicU64::new(0),
      ttl,
      clock,
    }
  }

  pub fn is_enabled(&self) -> bool {
    self.ttl > Duration::zero()
  }

  /// Fresh cached value, if any
  pub fn get(&self, key: &K) -> Option<V> {
    if !self.is_enabled() {
      return None;
    }
    let entry = self.entries.get(key)?;
    let fresh = entry.generation == self.generation.load(Ordering::Acquire)
      && self.clock.now() - entry.stored_at < self.ttl;
    fresh.then(|| entry.value.clone())
  }

  pub fn insert(&self, key: K, value: V) {
    if self.is_enabled() {
      self.store(key, value, self.generation.load(Ordering::Acquire));
    }
  }

  fn store(&self, key: K, value: V, generation: u64) {
    self.entries.insert(
      key,
      Entry {
        value,
        stored_at: self.clock.now(),
        generation,
      },
    );
  }

  /// Cached value for `key`, or the loader's result stored for next time.
  /// Loader errors are returned and nothing is cached.
  pub async fn get_or_refresh<F, Fut, E>(&self, key: K, loader: F) -> Result<V, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>>,
  {
    if let Some(value) = self.get(&key) {
      return Ok(value);
    }

    // An invalidation racing the load leaves this entry already stale
    let generation = self.generation.load(Ordering::Acquire);
    let value = loader().await?;
    if self.is_enabled() {
      self.store(key, value.clone(), generation);
    }
    Ok(value)
  }

  /// Drop every entry, including ones being loaded right now
  pub fn invalidate_all(&self) {
    self.generation.fetch_add(1, Ordering::AcqRel);
    self.entries.clear();
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
