//! AMShare: per-tenant admission queues in front of a shared main cache.
//!
//! New keys are staged in their tenant's small FIFO admission queue. When a
//! queue overflows its oldest entry moves into the main cache, protected
//! (`InMainFull`) if it was reused while staged, demotable otherwise. A
//! demotable entry that is hit again is promoted. Keys that come back soon
//! after being evicted (found in the tenant's victim queue) skip the
//! admission queue and enter the main cache protected.
//!
//! Eviction only ever targets tenants holding more than their guarantee:
//!
//! 1. the oldest demotable main-cache entry of such a tenant,
//! 2. else the requester's own admission-queue head, if the requester is over
//!    its guarantee and that head was never reused,
//! 3. else the oldest protected main-cache entry of such a tenant.

use super::lru_list::LruList;
use super::tenants::TenantTable;
use super::victims::VictimQueue;
use super::{check_admit, check_evict, no_candidate, Allocator};
use crate::entry::{AdmissionState, CacheEntry, EntryId, EntryStatus, Resident, TenantId};
use crate::error::InvariantViolation;
use crate::scheme::CacheScheme;
use crate::time::{Clock, Timestamp};

use ahash::{HashMap, HashSet};
use std::collections::BTreeMap;
use std::time::Duration;

type AmEntry = CacheEntry<AdmissionState>;

#[derive(Debug)]
struct TenantState {
  // FIFO: entries are pushed at the front and leave from the back. Hits
  // update the entry in place without reordering.
  small: LruList<AdmissionState>,
  victims: VictimQueue,
  resident: u64,
}

/// The shared main cache, indexed by recency for each status so the oldest
/// entry of a given status is found without a full scan.
#[derive(Debug, Default)]
struct MainCache {
  entries: HashMap<EntryId, AmEntry>,
  demotable: BTreeMap<Timestamp, EntryId>,
  full: BTreeMap<Timestamp, EntryId>,
}

impl MainCache {
  fn index_for(&mut self, status: EntryStatus) -> &mut BTreeMap<Timestamp, EntryId> {
    match status {
      EntryStatus::InMainDemotable => &mut self.demotable,
      _ => &mut self.full,
    }
  }

  fn contains(&self, id: &EntryId) -> bool {
    self.entries.contains_key(id)
  }

  fn insert(&mut self, entry: AmEntry) {
    self
      .index_for(entry.meta.status)
      .insert(entry.last_used, entry.id.clone());
    self.entries.insert(entry.id.clone(), entry);
  }

  /// Applies a hit. Returns `false` if the entry is not in the main cache.
  fn touch(&mut self, id: &EntryId, now: Timestamp) -> bool {
    let Some(entry) = self.entries.get_mut(id) else {
      return false;
    };
    let (old_status, old_used) = (entry.meta.status, entry.last_used);
    entry.last_used = now;
    if entry.meta.status == EntryStatus::InMainDemotable {
      entry.meta.status = EntryStatus::InMainFull;
    }
    let new_status = entry.meta.status;

    self.index_for(old_status).remove(&old_used);
    self.index_for(new_status).insert(now, id.clone());
    true
  }

  /// Removes the least recently used entry of `status` whose owner is in
  /// `candidates`.
  fn evict_oldest(&mut self, status: EntryStatus, candidates: &HashSet<TenantId>) -> Option<AmEntry> {
    let (&stamp, id) = self
      .index_for(status)
      .iter()
      .find(|(_, id)| candidates.contains(&id.tenant()))?;
    let id = id.clone();
    self.index_for(status).remove(&stamp);
    self.entries.remove(&id)
  }
}

/// The AMShare allocator. See the module docs for the algorithm.
#[derive(Debug)]
pub struct AmShare {
  capacity: u64,
  resident: u64,
  guarantee: u64,
  small_capacity: usize,
  victim_capacity: usize,
  tenants: TenantTable<TenantState>,
  main: MainCache,
  clock: Clock,
}

impl AmShare {
  pub fn new(scheme: &CacheScheme) -> Self {
    Self {
      capacity: scheme.cache_size,
      resident: 0,
      guarantee: scheme.amshare_guarantee(),
      small_capacity: scheme.small_queue_size(),
      victim_capacity: scheme.guarantee_size() as usize,
      tenants: TenantTable::new(),
      main: MainCache::default(),
      clock: Clock::new(),
    }
  }

  fn tenant_state(&mut self, tenant: TenantId) -> &mut TenantState {
    let victim_capacity = self.victim_capacity;
    self.tenants.get_or_insert_with(tenant, || TenantState {
      small: LruList::new(),
      victims: VictimQueue::new(victim_capacity),
      resident: 0,
    })
  }

  fn in_small(&self, id: &EntryId) -> bool {
    self
      .tenants
      .get(id.tenant())
      .map_or(false, |state| state.small.contains(id))
  }

  /// Tenants holding more entries than their guarantee.
  fn candidates(&self) -> HashSet<TenantId> {
    self
      .tenants
      .iter()
      .filter(|(_, state)| state.resident > self.guarantee)
      .map(|(tenant, _)| tenant)
      .collect()
  }

  /// Stages a new entry, migrating the queue's oldest into the main cache if
  /// the queue overflows.
  fn stage(&mut self, entry: AmEntry) -> Result<(), InvariantViolation> {
    let small_capacity = self.small_capacity;
    let state = self.tenant_state(entry.id.tenant());
    state
      .small
      .push_front(entry)
      .map_err(|entry| InvariantViolation::AlreadyResident(entry.id))?;
    if state.small.len() <= small_capacity {
      return Ok(());
    }
    if let Some(mut oldest) = state.small.pop_back() {
      oldest.meta.status = if oldest.meta.use_count > 1 {
        EntryStatus::InMainFull
      } else {
        EntryStatus::InMainDemotable
      };
      tracing::trace!(entry = %oldest.id, status = ?oldest.meta.status, "admission queue overflow");
      self.main.insert(oldest);
    }
    Ok(())
  }

  fn take_victim(&mut self, requester: TenantId) -> Option<AmEntry> {
    let candidates = self.candidates();
    if candidates.is_empty() {
      return None;
    }

    if let Some(victim) = self.main.evict_oldest(EntryStatus::InMainDemotable, &candidates) {
      return Some(victim);
    }

    if candidates.contains(&requester) {
      if let Some(state) = self.tenants.get_mut(requester) {
        let head_unused = state
          .small
          .peek_back()
          .map_or(false, |head| head.meta.use_count == 1);
        if head_unused {
          return state.small.pop_back();
        }
      }
    }

    self.main.evict_oldest(EntryStatus::InMainFull, &candidates)
  }
}

impl Allocator for AmShare {
  fn name(&self) -> &'static str {
    "AMShare"
  }

  fn capacity(&self) -> u64 {
    self.capacity
  }

  fn resident_count(&self) -> u64 {
    self.resident
  }

  fn key_in_cache(&self, id: &EntryId) -> bool {
    self.in_small(id) || self.main.contains(id)
  }

  fn inform_use(&mut self, id: &EntryId) -> Result<(), InvariantViolation> {
    let now = self.clock.now();
    if let Some(entry) = self
      .tenants
      .get_mut(id.tenant())
      .and_then(|state| state.small.get_mut(id))
    {
      entry.meta.use_count += 1;
      entry.last_used = now;
      return Ok(());
    }
    if self.main.touch(id, now) {
      Ok(())
    } else {
      Err(InvariantViolation::NotResident(id.clone()))
    }
  }

  fn inform_set(&mut self, id: &EntryId, _ttl: Option<Duration>) -> Result<(), InvariantViolation> {
    check_admit(&*self, id)?;
    let now = self.clock.now();
    let recently_evicted = self.tenant_state(id.tenant()).victims.contains(id.key());

    if recently_evicted {
      tracing::debug!(entry = %id, "re-admitting recent victim into main cache");
      self.main.insert(CacheEntry::new(
        id.clone(),
        now,
        AdmissionState::new(EntryStatus::InMainFull),
      ));
    } else {
      self.stage(CacheEntry::new(
        id.clone(),
        now,
        AdmissionState::new(EntryStatus::InSmall),
      ))?;
    }

    self.tenant_state(id.tenant()).resident += 1;
    self.resident += 1;
    Ok(())
  }

  fn arbit_evict(&mut self, id: &EntryId) -> Result<EntryId, InvariantViolation> {
    check_evict(&*self)?;
    let Some(victim) = self.take_victim(id.tenant()) else {
      return Err(no_candidate(&*self));
    };

    let state = self.tenant_state(victim.id.tenant());
    state.resident -= 1;
    state.victims.record(victim.id.shared_key().clone());
    self.resident -= 1;
    Ok(victim.id)
  }

  fn tenant_usage(&self) -> Vec<(TenantId, u64)> {
    self
      .tenants
      .iter()
      .map(|(tenant, state)| (tenant, state.resident))
      .collect()
  }

  fn residents(&self) -> Vec<Resident> {
    let staged = self
      .tenants
      .iter()
      .flat_map(|(_, state)| state.small.iter().map(Resident::from));
    staged
      .chain(self.main.entries.values().map(Resident::from))
      .collect()
  }
}
