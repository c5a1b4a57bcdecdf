use crate::entry::{EntryId, TenantId};
use crate::error::{InvariantViolation, Result};
use crate::metrics::Metrics;
use crate::policy::Allocator;
use crate::store::BackingStore;

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// Everything the client lock protects: allocator state and the store.
struct ClientState<S> {
  allocator: Box<dyn Allocator>,
  store: S,
}

/// Applies allocator decisions and backing-store mutations as one atomic
/// unit.
///
/// A single mutex covers both the allocator and the store, so every
/// [`handle`](CacheClient::handle) call observes and leaves behind a
/// consistent pair. Callers block on the lock and nothing else.
pub struct CacheClient<S> {
  state: Mutex<ClientState<S>>,
  metrics: Arc<Metrics>,
}

impl<S> fmt::Debug for CacheClient<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheClient")
      .field("metrics", &self.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

impl<S: BackingStore> CacheClient<S> {
  pub fn new(allocator: Box<dyn Allocator>, store: S) -> Self {
    Self::with_metrics(allocator, store, Arc::new(Metrics::new()))
  }

  pub(crate) fn with_metrics(allocator: Box<dyn Allocator>, store: S, metrics: Arc<Metrics>) -> Self {
    Self {
      state: Mutex::new(ClientState { allocator, store }),
      metrics,
    }
  }

  /// Serves one request and reports whether it was a hit.
  ///
  /// On a hit the allocator records the use and the store is read, or
  /// overwritten with `value` when `is_write` is set. On a miss a victim is
  /// evicted first if the cache is full, then `value` is written and the key
  /// admitted.
  ///
  /// Any error aborts the request where it occurred; nothing is retried
  /// under the lock. A failed write leaves the key unadmitted, so the next
  /// request for it is a miss.
  pub fn handle(
    &self,
    tenant: TenantId,
    key: &str,
    value: Vec<u8>,
    is_write: bool,
    ttl: Option<Duration>,
  ) -> Result<bool> {
    let id = EntryId::new(tenant, key);
    let store_key = id.store_key();

    let mut state = self.state.lock();
    let ClientState { allocator, store } = &mut *state;

    let outcome = Self::apply(&self.metrics, allocator.as_mut(), store, &id, &store_key, value, is_write, ttl);
    if let Err(err) = &outcome {
      Metrics::bump(&self.metrics.failures);
      tracing::error!(policy = allocator.name(), entry = %id, error = %err, "request aborted");
    }
    outcome
  }

  #[allow(clippy::too_many_arguments)]
  fn apply(
    metrics: &Metrics,
    allocator: &mut dyn Allocator,
    store: &mut S,
    id: &EntryId,
    store_key: &str,
    value: Vec<u8>,
    is_write: bool,
    ttl: Option<Duration>,
  ) -> Result<bool> {
    if allocator.key_in_cache(id) {
      allocator.inform_use(id)?;
      Metrics::bump(&metrics.hits);
      if is_write {
        store.set(store_key, value)?;
        Metrics::bump(&metrics.store_writes);
      } else {
        store
          .get(store_key)?
          .ok_or_else(|| InvariantViolation::MissingValue(id.clone()))?;
        Metrics::bump(&metrics.store_reads);
      }
      return Ok(true);
    }

    Metrics::bump(&metrics.misses);
    if allocator.cache_is_full() {
      let victim = allocator.arbit_evict(id)?;
      tracing::debug!(policy = allocator.name(), requester = %id, victim = %victim, "evicted");
      Metrics::bump(&metrics.evictions);
      store.delete(&victim.store_key())?;
      Metrics::bump(&metrics.store_deletes);
    }
    store.set(store_key, value)?;
    Metrics::bump(&metrics.store_writes);
    allocator.inform_set(id, ttl)?;
    Metrics::bump(&metrics.admissions);
    Ok(false)
  }

  /// Side-effect-free residency check.
  pub fn key_in_cache(&self, tenant: TenantId, key: &str) -> bool {
    self.state.lock().allocator.key_in_cache(&EntryId::new(tenant, key))
  }

  /// Runs `f` over the allocator and store under the client lock.
  pub fn inspect<R>(&self, f: impl FnOnce(&dyn Allocator, &S) -> R) -> R {
    let state = self.state.lock();
    f(state.allocator.as_ref(), &state.store)
  }

  pub fn metrics(&self) -> &Arc<Metrics> {
    &self.metrics
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::{Error, StoreError};
  use crate::scheme::{CacheScheme, PolicyKind};
  use crate::store::MemoryStore;

  fn client(policy: PolicyKind, cache_size: u64) -> CacheClient<MemoryStore> {
    let scheme = CacheScheme::builder()
      .policy(policy)
      .cache_size(cache_size)
      .num_tenants(2)
      .build()
      .unwrap();
    CacheClient::new(policy.build(&scheme), MemoryStore::new())
  }

  #[test]
  fn miss_then_hit_writes_store_once() {
    let client = client(PolicyKind::GlobalLru, 2);
    assert!(!client.handle(TenantId(1), "a", vec![1], false, None).unwrap());
    assert!(client.handle(TenantId(1), "a", vec![2], false, None).unwrap());

    client.inspect(|alloc, store| {
      assert_eq!(alloc.resident_count(), 1);
      assert!(store.contains("1:a"));
      assert_eq!(store.bytes(), 1);
    });
    let m = client.metrics().snapshot();
    assert_eq!((m.hits, m.misses, m.store_writes, m.store_reads), (1, 1, 1, 1));
  }

  #[test]
  fn write_hit_overwrites_value() {
    let client = client(PolicyKind::MaxMin, 2);
    client.handle(TenantId(1), "a", vec![1], true, None).unwrap();
    client.handle(TenantId(1), "a", vec![7, 7], true, None).unwrap();
    client.inspect(|_, store| assert_eq!(store.bytes(), 2));
  }

  #[test]
  fn eviction_removes_victim_from_store() {
    let client = client(PolicyKind::GlobalLru, 2);
    client.handle(TenantId(1), "a", vec![0], false, None).unwrap();
    client.handle(TenantId(1), "b", vec![0], false, None).unwrap();
    client.handle(TenantId(2), "c", vec![0], false, None).unwrap();

    client.inspect(|alloc, store| {
      assert_eq!(alloc.resident_count(), 2);
      let mut keys: Vec<_> = store.keys().collect();
      keys.sort();
      assert_eq!(keys, vec!["1:b", "2:c"]);
    });
    assert!(!client.key_in_cache(TenantId(1), "a"));
    assert_eq!(client.metrics().snapshot().evictions, 1);
  }

  struct FailingStore;

  impl BackingStore for FailingStore {
    fn get(&mut self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
      Ok(None)
    }
    fn set(&mut self, _key: &str, _value: Vec<u8>) -> Result<(), StoreError> {
      Err(StoreError::Unavailable("down".into()))
    }
    fn delete(&mut self, _key: &str) -> Result<(), StoreError> {
      Ok(())
    }
  }

  #[test]
  fn store_failure_propagates_without_retry() {
    let scheme = CacheScheme::builder().cache_size(1).build().unwrap();
    let client = CacheClient::new(PolicyKind::GlobalLru.build(&scheme), FailingStore);

    let err = client.handle(TenantId(1), "a", vec![0], false, None).unwrap_err();
    assert_eq!(err, Error::Store(StoreError::Unavailable("down".into())));
    assert!(!err.is_fatal());
    assert_eq!(client.metrics().snapshot().failures, 1);
  }

  /// Fails the first `set`, then behaves like a [`MemoryStore`].
  #[derive(Default)]
  struct FlakyStore {
    failed_once: bool,
    inner: MemoryStore,
  }

  impl BackingStore for FlakyStore {
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
      self.inner.get(key)
    }
    fn set(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
      if !self.failed_once {
        self.failed_once = true;
        return Err(StoreError::Unavailable("blip".into()));
      }
      self.inner.set(key, value)
    }
    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
      self.inner.delete(key)
    }
  }

  #[test]
  fn failed_write_leaves_key_unadmitted() {
    let scheme = CacheScheme::builder().cache_size(2).build().unwrap();
    let client = CacheClient::new(PolicyKind::GlobalLru.build(&scheme), FlakyStore::default());

    let err = client.handle(TenantId(1), "a", vec![1], false, None).unwrap_err();
    assert_eq!(err, Error::Store(StoreError::Unavailable("blip".into())));
    assert!(!client.key_in_cache(TenantId(1), "a"));

    assert!(!client.handle(TenantId(1), "a", vec![1], false, None).unwrap());
    assert!(client.handle(TenantId(1), "a", vec![1], false, None).unwrap());
    client.inspect(|alloc, store| {
      assert_eq!(alloc.resident_count(), 1);
      assert_eq!(store.inner.len(), 1);
    });
    let m = client.metrics().snapshot();
    assert_eq!((m.hits, m.misses, m.admissions, m.failures), (1, 2, 1, 1));
  }

  #[test]
  fn resident_entry_without_value_is_an_invariant_violation() {
    let client = client(PolicyKind::MaxMin, 2);
    client.handle(TenantId(1), "a", vec![1], false, None).unwrap();
    client.state.lock().store.delete("1:a").unwrap();

    let err = client.handle(TenantId(1), "a", vec![], false, None).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(
      err,
      Error::Invariant(InvariantViolation::MissingValue(EntryId::new(TenantId(1), "a")))
    );
  }

  #[derive(Debug)]
  struct LyingAllocator;

  impl Allocator for LyingAllocator {
    fn name(&self) -> &'static str {
      "Lying"
    }
    fn capacity(&self) -> u64 {
      1
    }
    fn resident_count(&self) -> u64 {
      0
    }
    fn key_in_cache(&self, _id: &EntryId) -> bool {
      true
    }
    fn inform_use(&mut self, id: &EntryId) -> Result<(), InvariantViolation> {
      Err(InvariantViolation::NotResident(id.clone()))
    }
    fn inform_set(&mut self, _id: &EntryId, _ttl: Option<Duration>) -> Result<(), InvariantViolation> {
      Ok(())
    }
    fn arbit_evict(&mut self, id: &EntryId) -> Result<EntryId, InvariantViolation> {
      Ok(id.clone())
    }
    fn tenant_usage(&self) -> Vec<(TenantId, u64)> {
      Vec::new()
    }
    fn residents(&self) -> Vec<crate::entry::Resident> {
      Vec::new()
    }
  }

  #[test]
  fn invariant_violation_aborts_the_request() {
    let client = CacheClient::new(Box::new(LyingAllocator), MemoryStore::new());
    let err = client.handle(TenantId(1), "a", vec![0], true, None).unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, Error::Invariant(InvariantViolation::NotResident(_))));
    client.inspect(|_, store| assert!(store.is_empty()));
  }
}
