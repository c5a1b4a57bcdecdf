use super::lru_list::LruList;
use super::tenants::TenantTable;
use super::victims::VictimQueue;
use super::{check_admit, check_evict, no_candidate, Allocator};
use crate::entry::{CacheEntry, EntryId, Resident, TenantId};
use crate::error::InvariantViolation;
use crate::scheme::CacheScheme;
use crate::time::{Clock, Timestamp};

use std::time::Duration;

#[derive(Debug)]
struct TenantState {
  lru: LruList,
  victims: VictimQueue,
}

/// Guarantee quotas over per-tenant LRU lists.
///
/// A tenant at or under its guarantee cannot lose entries to other tenants.
/// On a miss the requester evicts from the coldest other tenant that is over
/// its guarantee, unless the requester is over its own guarantee and the
/// missed key is not one of its recent victims, in which case it evicts from
/// itself.
#[derive(Debug)]
pub struct Memshare {
  capacity: u64,
  resident: u64,
  guarantee: u64,
  tenants: TenantTable<TenantState>,
  clock: Clock,
}

impl Memshare {
  pub fn new(scheme: &CacheScheme) -> Self {
    Self {
      capacity: scheme.cache_size,
      resident: 0,
      guarantee: scheme.guarantee_size(),
      tenants: TenantTable::new(),
      clock: Clock::new(),
    }
  }

  fn tenant_state(&mut self, tenant: TenantId) -> &mut TenantState {
    let capacity = self.guarantee as usize;
    self.tenants.get_or_insert_with(tenant, || TenantState {
      lru: LruList::new(),
      victims: VictimQueue::new(capacity),
    })
  }

  /// The tenant other than `requester` whose least recently used entry is
  /// the oldest. With `over_guarantee`, only tenants holding more than their
  /// guarantee are considered.
  fn coldest_other(&self, requester: TenantId, over_guarantee: bool) -> Option<TenantId> {
    let mut coldest: Option<(Timestamp, TenantId)> = None;
    for (tenant, state) in self.tenants.iter() {
      if tenant == requester || (over_guarantee && state.lru.len() as u64 <= self.guarantee) {
        continue;
      }
      let Some(oldest) = state.lru.oldest_time() else {
        continue;
      };
      if coldest.map_or(true, |(best, _)| oldest < best) {
        coldest = Some((oldest, tenant));
      }
    }
    coldest.map(|(_, tenant)| tenant)
  }

  fn victim_tenant(&self, id: &EntryId) -> Option<TenantId> {
    let requester = id.tenant();
    let own = self.tenants.get(requester);
    let own_len = own.map_or(0, |own| own.lru.len() as u64);
    let self_evict = own_len > self.guarantee && own.map_or(false, |own| !own.victims.contains(id.key()));

    match self.coldest_other(requester, true) {
      Some(other) if !self_evict => Some(other),
      _ if own_len > 0 => Some(requester),
      // Guarantees can oversubscribe a tiny cache; someone still has to pay.
      _ => self.coldest_other(requester, false),
    }
  }
}

impl Allocator for Memshare {
  fn name(&self) -> &'static str {
    "Memshare"
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
      .map_or(false, |state| state.lru.contains(id))
  }

  fn inform_use(&mut self, id: &EntryId) -> Result<(), InvariantViolation> {
    let now = self.clock.now();
    match self.tenants.get_mut(id.tenant()).map(|state| state.lru.touch(id, now)) {
      Some(true) => Ok(()),
      _ => Err(InvariantViolation::NotResident(id.clone())),
    }
  }

  fn inform_set(&mut self, id: &EntryId, _ttl: Option<Duration>) -> Result<(), InvariantViolation> {
    check_admit(&*self, id)?;
    let now = self.clock.now();
    self
      .tenant_state(id.tenant())
      .lru
      .push_front(CacheEntry::new(id.clone(), now, ()))
      .map_err(|entry| InvariantViolation::AlreadyResident(entry.id))?;
    self.resident += 1;
    Ok(())
  }

  fn arbit_evict(&mut self, id: &EntryId) -> Result<EntryId, InvariantViolation> {
    check_evict(&*self)?;
    let victim = self
      .victim_tenant(id)
      .and_then(|tenant| self.tenants.get_mut(tenant))
      .and_then(|state| {
        let victim = state.lru.pop_back()?;
        state.victims.record(victim.id.shared_key().clone());
        Some(victim.id)
      });

    match victim {
      Some(victim) => {
        if victim.tenant() != id.tenant() {
          tracing::debug!(requester = %id.tenant(), victim = %victim, "evicting from over-guarantee tenant");
        }
        self.resident -= 1;
        Ok(victim)
      }
      None => Err(no_candidate(&*self)),
    }
  }

  fn tenant_usage(&self) -> Vec<(TenantId, u64)> {
    self
      .tenants
      .iter()
      .map(|(tenant, state)| (tenant, state.lru.len() as u64))
      .collect()
  }

  fn residents(&self) -> Vec<Resident> {
    self
      .tenants
      .iter()
      .flat_map(|(_, state)| state.lru.iter().map(Resident::from))
      .collect()
  }
}
