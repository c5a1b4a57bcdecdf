mod common;

use resalloc_cache::{
  BackingStore, BackingStoreScheme, CacheScheme, CacheServer, Error, MemoryStore, PolicyKind, StoreError,
  TenantId,
};

/// Wraps a `MemoryStore` and refuses writes for one tenant's keys.
#[derive(Default)]
struct PickyStore {
  inner: MemoryStore,
  refused_prefix: String,
}

impl BackingStore for PickyStore {
  fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
    self.inner.get(key)
  }

  fn set(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
    if key.starts_with(&self.refused_prefix) {
      return Err(StoreError::Rejected {
        key: key.to_string(),
        reason: "read-only tenant".to_string(),
      });
    }
    self.inner.set(key, value)
  }

  fn delete(&mut self, key: &str) -> Result<(), StoreError> {
    self.inner.delete(key)
  }
}

fn scheme(policy: PolicyKind, cache_size: u64) -> CacheScheme {
  CacheScheme::builder()
    .policy(policy)
    .cache_size(cache_size)
    .num_tenants(2)
    .build()
    .unwrap()
}

#[test]
fn store_mirrors_resident_set_for_every_policy() {
  for policy in PolicyKind::ALL {
    let server = CacheServer::new(scheme(policy, 6), BackingStoreScheme::default().with_value_size(4)).unwrap();
    for i in 0..40 {
      let tenant = TenantId(1 + (i % 2));
      server.request(tenant, &format!("k{}", i % 11), i % 3 == 0).unwrap();
    }

    server.client().inspect(|alloc, store| {
      common::assert_consistent(alloc);
      assert_eq!(store.len() as u64, alloc.resident_count(), "{policy}");
      assert_eq!(store.bytes(), store.len() * 4, "{policy}");
      for resident in alloc.residents() {
        assert!(store.contains(&resident.id.store_key()), "{policy}: {} missing", resident.id);
      }
    });
  }
}

#[test]
fn tenants_do_not_share_keys() {
  let server = CacheServer::new(scheme(PolicyKind::GlobalLru, 4), BackingStoreScheme::default()).unwrap();
  assert!(!server.request(TenantId(1), "same", false).unwrap().hit);
  assert!(!server.request(TenantId(2), "same", false).unwrap().hit);
  assert!(server.request(TenantId(1), "same", false).unwrap().hit);
  assert!(server.client().key_in_cache(TenantId(2), "same"));
}

#[test]
fn rejected_write_fails_only_that_request() {
  let store = PickyStore {
    refused_prefix: "2:".to_string(),
    ..PickyStore::default()
  };
  let server = CacheServer::with_store(scheme(PolicyKind::MaxMin, 4), BackingStoreScheme::default(), store).unwrap();

  server.request(TenantId(1), "a", false).unwrap();
  let err = server.request(TenantId(2), "b", false).unwrap_err();
  assert!(matches!(err, Error::Store(StoreError::Rejected { ref key, .. }) if key == "2:b"));
  assert!(!err.is_fatal());
  assert_eq!(err.to_string(), "backing store rejected key '2:b': read-only tenant");

  // The server keeps serving other tenants.
  assert!(server.request(TenantId(1), "a", false).unwrap().hit);
  // The rejected key was never admitted.
  assert!(!server.client().key_in_cache(TenantId(2), "b"));
  assert!(!server.request(TenantId(2), "b", false).unwrap_err().is_fatal());
  server.client().inspect(|alloc, _| assert_eq!(alloc.resident_count(), 1));

  let metrics = server.metrics();
  assert_eq!(metrics.failures, 2);
  assert_eq!(metrics.hits, 1);
  assert_eq!(metrics.misses, 3);
}
