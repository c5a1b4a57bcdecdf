use super::lru_list::LruList;
use super::tenants::TenantTable;
use super::{check_admit, check_evict, no_candidate, Allocator};
use crate::entry::{CacheEntry, EntryId, Resident, TenantId};
use crate::error::InvariantViolation;
use crate::scheme::CacheScheme;
use crate::time::Clock;

use std::time::Duration;

/// Max-min fair occupancy: one LRU list per tenant, and every miss is paid
/// for by whichever tenant currently holds the most entries.
///
/// The requester plays no part in the victim choice. Ties go to the tenant
/// seen first.
#[derive(Debug)]
pub struct MaxMin {
  capacity: u64,
  resident: u64,
  tenants: TenantTable<LruList>,
  clock: Clock,
}

impl MaxMin {
  pub fn new(scheme: &CacheScheme) -> Self {
    Self {
      capacity: scheme.cache_size,
      resident: 0,
      tenants: TenantTable::new(),
      clock: Clock::new(),
    }
  }

  fn largest_tenant(&self) -> Option<TenantId> {
    let mut best: Option<(TenantId, usize)> = None;
    for (tenant, list) in self.tenants.iter() {
      if list.is_empty() {
        continue;
      }
      if best.map_or(true, |(_, most)| list.len() > most) {
        best = Some((tenant, list.len()));
      }
    }
    best.map(|(tenant, _)| tenant)
  }
}

impl Allocator for MaxMin {
  fn name(&self) -> &'static str {
    "Max-Min"
  }

  fn capacity(&self) -> u64 {
    self.capacity
  }

  fn resident_count(&self) -> u64 {
    self.resident
  }

  fn key_in_cache(&self, id: &EntryId) -> bool {
    self
      .tenants
      .get(id.tenant())
      .map_or(false, |list| list.contains(id))
  }

  fn inform_use(&mut self, id: &EntryId) -> Result<(), InvariantViolation> {
    let now = self.clock.now();
    match self.tenants.get_mut(id.tenant()).map(|list| list.touch(id, now)) {
      Some(true) => Ok(()),
      _ => Err(InvariantViolation::NotResident(id.clone())),
    }
  }

  fn inform_set(&mut self, id: &EntryId, _ttl: Option<Duration>) -> Result<(), InvariantViolation> {
    check_admit(&*self, id)?;
    let now = self.clock.now();
    self
      .tenants
      .get_or_insert_with(id.tenant(), LruList::new)
      .push_front(CacheEntry::new(id.clone(), now, ()))
      .map_err(|entry| InvariantViolation::AlreadyResident(entry.id))?;
    self.resident += 1;
    Ok(())
  }

  fn arbit_evict(&mut self, _id: &EntryId) -> Result<EntryId, InvariantViolation> {
    check_evict(&*self)?;
    let victim = self
      .largest_tenant()
      .and_then(|tenant| self.tenants.get_mut(tenant))
      .and_then(|list| list.pop_back());
    match victim {
      Some(victim) => {
        self.resident -= 1;
        Ok(victim.id)
      }
      None => Err(no_candidate(&*self)),
    }
  }

  fn tenant_usage(&self) -> Vec<(TenantId, u64)> {
    self
      .tenants
      .iter()
      .map(|(tenant, list)| (tenant, list.len() as u64))
      .collect()
  }

  fn residents(&self) -> Vec<Resident> {
    self
      .tenants
      .iter()
      .flat_map(|(_, list)| list.iter().map(Resident::from))
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::policy::test_util::{admit, id, scheme};
  use crate::scheme::PolicyKind;

  fn max_min(cache_size: u64) -> MaxMin {
    MaxMin::new(&scheme(PolicyKind::MaxMin, cache_size, 3))
  }

  #[test]
  fn evicts_from_the_largest_holder_not_the_requester() {
    let mut alloc = max_min(3);
    admit(&mut alloc, &id(1, "a1"));
    admit(&mut alloc, &id(2, "b1"));
    admit(&mut alloc, &id(1, "a2"));

    // Tenant 2's entry is older than a2, but tenant 1 holds more.
    assert_eq!(admit(&mut alloc, &id(3, "c1")), Some(id(1, "a1")));
    assert!(alloc.key_in_cache(&id(2, "b1")));
    assert_eq!(
      alloc.tenant_usage(),
      vec![(TenantId(1), 1), (TenantId(2), 1), (TenantId(3), 1)]
    );
  }

  #[test]
  fn evicts_least_recent_entry_of_the_victim_tenant() {
    let mut alloc = max_min(3);
    admit(&mut alloc, &id(1, "a1"));
    admit(&mut alloc, &id(1, "a2"));
    admit(&mut alloc, &id(2, "b1"));
    alloc.inform_use(&id(1, "a1")).unwrap();

    assert_eq!(admit(&mut alloc, &id(2, "b2")), Some(id(1, "a2")));
  }

  #[test]
  fn ties_go_to_first_seen_tenant() {
    let mut alloc = max_min(2);
    admit(&mut alloc, &id(5, "x"));
    admit(&mut alloc, &id(4, "y"));

    assert_eq!(admit(&mut alloc, &id(4, "z")), Some(id(5, "x")));
  }

  #[test]
  fn requester_may_evict_itself_when_largest() {
    let mut alloc = max_min(2);
    admit(&mut alloc, &id(1, "a"));
    admit(&mut alloc, &id(1, "b"));

    assert_eq!(admit(&mut alloc, &id(1, "c")), Some(id(1, "a")));
    assert_eq!(alloc.resident_count(), 2);
  }

  #[test]
  fn use_of_missing_entry_fails() {
    let mut alloc = max_min(2);
    admit(&mut alloc, &id(1, "a"));
    assert!(alloc.inform_use(&id(2, "a")).is_err());
  }
}
