#![allow(dead_code)]

use resalloc_cache::{Allocator, CacheScheme, EntryId, PolicyKind, TenantId};

pub fn id(tenant: u32, key: &str) -> EntryId {
  EntryId::new(TenantId(tenant), key)
}

pub fn build(policy: PolicyKind, cache_size: u64, num_tenants: u32) -> Box<dyn Allocator> {
  let scheme = CacheScheme::builder()
    .policy(policy)
    .cache_size(cache_size)
    .num_tenants(num_tenants)
    .build()
    .unwrap();
  policy.build(&scheme)
}

/// Serves one request against a bare allocator the way the client does:
/// hit, or evict-if-full then admit. Returns the victim, if any.
pub fn request(alloc: &mut dyn Allocator, id: &EntryId) -> Option<EntryId> {
  if alloc.key_in_cache(id) {
    alloc.inform_use(id).unwrap();
    return None;
  }
  let victim = if alloc.cache_is_full() {
    Some(alloc.arbit_evict(id).unwrap())
  } else {
    None
  };
  alloc.inform_set(id, None).unwrap();
  victim
}

/// Asserts the allocator's bookkeeping agrees with its resident set.
pub fn assert_consistent(alloc: &dyn Allocator) {
  let residents = alloc.residents();
  assert!(alloc.resident_count() <= alloc.capacity(), "{} overshot capacity", alloc.name());
  assert_eq!(residents.len() as u64, alloc.resident_count(), "{}", alloc.name());

  let mut ids: Vec<_> = residents.iter().map(|r| r.id.clone()).collect();
  ids.sort();
  ids.dedup();
  assert_eq!(ids.len(), residents.len(), "{} holds a duplicate entry", alloc.name());

  let usage_total: u64 = alloc.tenant_usage().iter().map(|(_, n)| n).sum();
  assert_eq!(usage_total, alloc.resident_count(), "{}", alloc.name());
}
