use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// Thread-safe request counters for one cache server.
/// All fields are atomic so they can be read without taking the client lock.
#[derive(Debug)]
pub struct Metrics {
  // --- Hit/Miss Ratios ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,

  // --- Allocator decisions ---
  pub(crate) admissions: CachePadded<AtomicU64>,
  pub(crate) evictions: CachePadded<AtomicU64>,

  // --- Backing store traffic ---
  pub(crate) store_reads: CachePadded<AtomicU64>,
  pub(crate) store_writes: CachePadded<AtomicU64>,
  pub(crate) store_deletes: CachePadded<AtomicU64>,

  pub(crate) failures: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      admissions: CachePadded::new(AtomicU64::new(0)),
      evictions: CachePadded::new(AtomicU64::new(0)),
      store_reads: CachePadded::new(AtomicU64::new(0)),
      store_writes: CachePadded::new(AtomicU64::new(0)),
      store_deletes: CachePadded::new(AtomicU64::new(0)),
      failures: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  /// Creates a point-in-time snapshot of the current counters.
  pub fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      admissions: self.admissions.load(Ordering::Relaxed),
      evictions: self.evictions.load(Ordering::Relaxed),
      store_reads: self.store_reads.load(Ordering::Relaxed),
      store_writes: self.store_writes.load(Ordering::Relaxed),
      store_deletes: self.store_deletes.load(Ordering::Relaxed),
      failures: self.failures.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the server's counters.
#[derive(Clone, PartialEq)]
pub struct MetricsSnapshot {
  /// Requests whose key was resident.
  pub hits: u64,
  /// Requests whose key had to be fetched and admitted.
  pub misses: u64,
  /// hits / (hits + misses).
  pub hit_ratio: f64,
  /// Entries made resident.
  pub admissions: u64,
  /// Entries evicted to make room.
  pub evictions: u64,
  pub store_reads: u64,
  pub store_writes: u64,
  pub store_deletes: u64,
  /// Requests aborted by an error.
  pub failures: u64,
  /// Seconds since the server was created.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("admissions", &self.admissions)
      .field("evictions", &self.evictions)
      .field("store_reads", &self.store_reads)
      .field("store_writes", &self.store_writes)
      .field("store_deletes", &self.store_deletes)
      .field("failures", &self.failures)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
