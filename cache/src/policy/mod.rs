pub mod amshare;
pub mod global_lru;
pub mod max_min;
pub mod memshare;

mod lru_list;
mod tenants;
mod victims;

use crate::entry::{EntryId, Resident, TenantId};
use crate::error::InvariantViolation;
use crate::scheme::{CacheScheme, PolicyKind};

use std::fmt;
use std::time::Duration;

/// The admission and eviction contract shared by every allocation policy.
///
/// An allocator only tracks residency; it never touches values. The
/// [`CacheClient`](crate::CacheClient) pairs each decision with the matching
/// backing-store call while holding its lock, so implementations need no
/// internal synchronization.
pub trait Allocator: Send + fmt::Debug {
  /// A short, stable name for logs and result files.
  fn name(&self) -> &'static str;

  /// The number of entries the cache can hold.
  fn capacity(&self) -> u64;

  /// The number of entries currently resident, across all tenants.
  fn resident_count(&self) -> u64;

  /// Whether `id` is resident. Has no side effects.
  fn key_in_cache(&self, id: &EntryId) -> bool;

  /// True once the resident count has reached the capacity.
  fn cache_is_full(&self) -> bool {
    self.resident_count() >= self.capacity()
  }

  /// Records a hit on a resident entry.
  ///
  /// Fails with [`InvariantViolation::NotResident`] if `id` is not resident.
  fn inform_use(&mut self, id: &EntryId) -> Result<(), InvariantViolation>;

  /// Makes `id` resident. Only valid when the cache has a free slot.
  fn inform_set(&mut self, id: &EntryId, ttl: Option<Duration>) -> Result<(), InvariantViolation>;

  /// Frees exactly one slot on behalf of `id`, which is about to be admitted,
  /// and returns the entry that lost it.
  fn arbit_evict(&mut self, id: &EntryId) -> Result<EntryId, InvariantViolation>;

  /// Resident counts per tenant, in the order tenants were first seen.
  fn tenant_usage(&self) -> Vec<(TenantId, u64)>;

  /// Every resident entry. Order is policy specific.
  fn residents(&self) -> Vec<Resident>;
}

impl PolicyKind {
  /// Creates an empty allocator for this policy.
  pub fn build(self, scheme: &CacheScheme) -> Box<dyn Allocator> {
    match self {
      PolicyKind::GlobalLru => Box::new(global_lru::GlobalLru::new(scheme)),
      PolicyKind::MaxMin => Box::new(max_min::MaxMin::new(scheme)),
      PolicyKind::AmShare => Box::new(amshare::AmShare::new(scheme)),
      PolicyKind::Memshare => Box::new(memshare::Memshare::new(scheme)),
    }
  }
}

/// Shared precondition checks for `inform_set`.
pub(crate) fn check_admit<A: Allocator + ?Sized>(
  allocator: &A,
  id: &EntryId,
) -> Result<(), InvariantViolation> {
  if allocator.key_in_cache(id) {
    return Err(InvariantViolation::AlreadyResident(id.clone()));
  }
  if allocator.cache_is_full() {
    return Err(InvariantViolation::AdmitWhileFull {
      id: id.clone(),
      resident: allocator.resident_count(),
      capacity: allocator.capacity(),
    });
  }
  Ok(())
}

/// Shared precondition check for `arbit_evict`.
pub(crate) fn check_evict<A: Allocator + ?Sized>(allocator: &A) -> Result<(), InvariantViolation> {
  if !allocator.cache_is_full() {
    return Err(InvariantViolation::EvictWhileNotFull {
      resident: allocator.resident_count(),
      capacity: allocator.capacity(),
    });
  }
  Ok(())
}

pub(crate) fn no_candidate<A: Allocator + ?Sized>(allocator: &A) -> InvariantViolation {
  InvariantViolation::NoEvictionCandidate {
    policy: allocator.name(),
    resident: allocator.resident_count(),
    capacity: allocator.capacity(),
  }
}
