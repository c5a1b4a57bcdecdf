use crate::entry::EntryId;

use thiserror::Error;

/// A broken allocator contract. The allocator state can no longer be trusted
/// once one of these is observed, so the request that hit it is aborted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
  /// `inform_use` was called for an entry that is not resident.
  #[error("entry {0} is not resident")]
  NotResident(EntryId),
  /// `inform_set` was called for an entry that is already resident.
  #[error("entry {0} is already resident")]
  AlreadyResident(EntryId),
  /// `inform_set` was called while every slot is occupied.
  #[error("cannot admit {id}: cache is full ({resident}/{capacity})")]
  AdmitWhileFull {
    id: EntryId,
    resident: u64,
    capacity: u64,
  },
  /// `arbit_evict` was called while the cache still had free slots.
  #[error("eviction requested with free slots available ({resident}/{capacity})")]
  EvictWhileNotFull { resident: u64, capacity: u64 },
  /// A resident entry has no value in the backing store.
  #[error("resident entry {0} has no stored value")]
  MissingValue(EntryId),
  /// The cache reports full but no tenant holds an evictable entry.
  #[error("{policy}: no eviction candidate while cache is full ({resident}/{capacity})")]
  NoEvictionCandidate {
    policy: &'static str,
    resident: u64,
    capacity: u64,
  },
}

/// Rejected cache or backing-store configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
  /// The cache was configured with a capacity of zero.
  #[error("cache capacity must be positive")]
  ZeroCapacity,
  /// The cache was configured for zero tenants.
  #[error("tenant count must be positive")]
  ZeroTenants,
  /// A ratio fell outside `(0, 1]`.
  #[error("{name} must be in (0, 1], got {value}")]
  RatioOutOfRange { name: &'static str, value: f64 },
  /// The latency distribution parameters cannot be sampled from.
  #[error("invalid latency distribution (mu = {mu}, sigma = {sigma})")]
  InvalidLatency { mu: f64, sigma: f64 },
}

/// A failed backing-store call. Never retried inside the client lock.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
  #[error("backing store unavailable: {0}")]
  Unavailable(String),
  #[error("backing store rejected key '{key}': {reason}")]
  Rejected { key: String, reason: String },
}

/// The error type returned by the cache client and server.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
  #[error("invariant violated: {0}")]
  Invariant(#[from] InvariantViolation),
  #[error("invalid configuration: {0}")]
  Config(#[from] ConfigError),
  #[error(transparent)]
  Store(#[from] StoreError),
}

impl Error {
  /// Whether the error means the cache state itself is unusable.
  ///
  /// Store failures only fail the request that observed them.
  pub fn is_fatal(&self) -> bool {
    !matches!(self, Error::Store(_))
  }
}

/// A specialized `Result` type for cache operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entry::TenantId;

  #[test]
  fn store_errors_are_not_fatal() {
    let err = Error::from(StoreError::Unavailable("connection reset".into()));
    assert!(!err.is_fatal());
    assert_eq!(err.to_string(), "backing store unavailable: connection reset");
  }

  #[test]
  fn invariant_and_config_errors_are_fatal() {
    let id = EntryId::new(TenantId(3), "k");
    let err = Error::from(InvariantViolation::NotResident(id));
    assert!(err.is_fatal());
    assert_eq!(err.to_string(), "invariant violated: entry 3:k is not resident");

    assert!(Error::from(ConfigError::ZeroTenants).is_fatal());
  }
}
