use once_cell::sync::Lazy;
use std::fmt;
use std::time::{Duration, Instant};

// The single, static reference point for all recency timestamps.
// It is initialized lazily on its first use.
static CACHE_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// A recency timestamp: nanoseconds since the process-wide cache epoch.
///
/// Timestamps handed out by one [`Clock`] are strictly increasing, so two
/// entries never compare equal and "oldest" is always well defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
  #[inline]
  pub fn as_nanos(self) -> u64 {
    self.0
  }

  /// The time elapsed between the cache epoch and this timestamp.
  #[inline]
  pub fn since_epoch(self) -> Duration {
    Duration::from_nanos(self.0)
  }
}

impl fmt::Display for Timestamp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}ns", self.0)
  }
}

/// Wall-clock based, strictly monotonic timestamp source.
///
/// Each allocator owns one and only reads it while the client lock is held.
#[derive(Debug, Default)]
pub(crate) struct Clock {
  last: u64,
}

impl Clock {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Returns the current time, bumped past the previous reading if the
  /// wall clock has not advanced since.
  #[inline]
  pub(crate) fn now(&mut self) -> Timestamp {
    let wall = CACHE_EPOCH.elapsed().as_nanos() as u64;
    let next = wall.max(self.last + 1);
    self.last = next;
    Timestamp(next)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn clock_is_strictly_monotonic() {
    let mut clock = Clock::new();
    let mut prev = clock.now();
    for _ in 0..10_000 {
      let next = clock.now();
      assert!(next > prev, "{} should be after {}", next, prev);
      prev = next;
    }
  }
}
