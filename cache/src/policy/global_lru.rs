use super::lru_list::LruList;
use super::{check_admit, check_evict, no_candidate, Allocator};
use crate::entry::{CacheEntry, EntryId, Resident, TenantId};
use crate::error::InvariantViolation;
use crate::scheme::CacheScheme;
use crate::time::Clock;

use std::time::Duration;

/// One LRU list pooled across every tenant.
///
/// The victim is always the globally least recently used entry, whoever owns
/// it. This is the fairness-agnostic baseline: a busy tenant can push a quiet
/// one out of the cache entirely.
#[derive(Debug)]
pub struct GlobalLru {
  capacity: u64,
  list: LruList,
  clock: Clock,
}

impl GlobalLru {
  pub fn new(scheme: &CacheScheme) -> Self {
    Self {
      capacity: scheme.cache_size,
      list: LruList::new(),
      clock: Clock::new(),
    }
  }
}

impl Allocator for GlobalLru {
  fn name(&self) -> &'static str {
    "GlobalLRU"
  }

  fn capacity(&self) -> u64 {
    self.capacity
  }

  fn resident_count(&self) -> u64 {
    self.list.len() as u64
  }

  fn key_in_cache(&self, id: &EntryId) -> bool {
    self.list.contains(id)
  }

  fn inform_use(&mut self, id: &EntryId) -> Result<(), InvariantViolation> {
    let now = self.clock.now();
    if self.list.touch(id, now) {
      Ok(())
    } else {
      Err(InvariantViolation::NotResident(id.clone()))
    }
  }

  fn inform_set(&mut self, id: &EntryId, _ttl: Option<Duration>) -> Result<(), InvariantViolation> {
    check_admit(&*self, id)?;
    let now = self.clock.now();
    self
      .list
      .push_front(CacheEntry::new(id.clone(), now, ()))
      .map_err(|entry| InvariantViolation::AlreadyResident(entry.id))
  }

  fn arbit_evict(&mut self, _id: &EntryId) -> Result<EntryId, InvariantViolation> {
    check_evict(&*self)?;
    match self.list.pop_back() {
      Some(victim) => Ok(victim.id),
      None => Err(no_candidate(&*self)),
    }
  }

  fn tenant_usage(&self) -> Vec<(TenantId, u64)> {
    let mut usage: Vec<(TenantId, u64)> = Vec::new();
    // Walk oldest first so tenants appear roughly in arrival order.
    let mut entries: Vec<_> = self.list.iter().collect();
    entries.reverse();
    for entry in entries {
      let tenant = entry.id.tenant();
      match usage.iter_mut().find(|(t, _)| *t == tenant) {
        Some((_, count)) => *count += 1,
        None => usage.push((tenant, 1)),
      }
    }
    usage
  }

  fn residents(&self) -> Vec<Resident> {
    self.list.iter().map(Resident::from).collect()
  }
}
