use crate::time::Timestamp;

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifies a tenant sharing the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct TenantId(pub u32);

impl fmt::Display for TenantId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<u32> for TenantId {
  fn from(id: u32) -> Self {
    TenantId(id)
  }
}

/// The identity of a cached object: a key is only unique within its tenant.
///
/// The key is reference counted so the id can sit in an allocator's index,
/// its recency node and a victim queue without copying the string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId {
  tenant: TenantId,
  key: Arc<str>,
}

impl EntryId {
  pub fn new(tenant: TenantId, key: impl Into<Arc<str>>) -> Self {
    Self {
      tenant,
      key: key.into(),
    }
  }

  #[inline]
  pub fn tenant(&self) -> TenantId {
    self.tenant
  }

  #[inline]
  pub fn key(&self) -> &str {
    &self.key
  }

  #[inline]
  pub(crate) fn shared_key(&self) -> &Arc<str> {
    &self.key
  }

  /// The flat key used for the backing store, `"{tenant}:{key}"`.
  pub fn store_key(&self) -> String {
    format!("{}:{}", self.tenant, self.key)
  }
}

impl fmt::Display for EntryId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.tenant, self.key)
  }
}

/// Where an AMShare entry currently lives.
///
/// Resident entries only ever move forward through these states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EntryStatus {
  /// Staged in the owning tenant's small admission queue.
  InSmall,
  /// In the shared main cache, first in line for eviction.
  InMainDemotable,
  /// In the shared main cache and reused at least once.
  InMainFull,
}

/// AMShare bookkeeping carried by every entry it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AdmissionState {
  pub(crate) status: EntryStatus,
  pub(crate) use_count: u32,
}

impl AdmissionState {
  pub(crate) fn new(status: EntryStatus) -> Self {
    Self {
      status,
      use_count: 1,
    }
  }
}

/// The record an allocator keeps for each resident object.
///
/// `M` is the policy-specific metadata; the plain LRU policies use `()`.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry<M = ()> {
  pub(crate) id: EntryId,
  pub(crate) last_used: Timestamp,
  pub(crate) meta: M,
}

impl<M> CacheEntry<M> {
  pub(crate) fn new(id: EntryId, last_used: Timestamp, meta: M) -> Self {
    Self {
      id,
      last_used,
      meta,
    }
  }
}

/// A point-in-time view of one resident entry, for inspection and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resident {
  pub id: EntryId,
  pub last_used: Timestamp,
  /// Only AMShare tracks a status.
  pub status: Option<EntryStatus>,
}

impl From<&CacheEntry> for Resident {
  fn from(entry: &CacheEntry) -> Self {
    Resident {
      id: entry.id.clone(),
      last_used: entry.last_used,
      status: None,
    }
  }
}

impl From<&CacheEntry<AdmissionState>> for Resident {
  fn from(entry: &CacheEntry<AdmissionState>) -> Self {
    Resident {
      id: entry.id.clone(),
      last_used: entry.last_used,
      status: Some(entry.meta.status),
    }
  }
}
