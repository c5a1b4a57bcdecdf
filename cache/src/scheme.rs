use crate::error::ConfigError;

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const DEFAULT_GUARANTEE_RATIO: f64 = 0.5;
pub const DEFAULT_SMALLQ_SIZE_RATIO: f64 = 0.2;
pub const DEFAULT_VALUE_SIZE: usize = 1024;

/// The allocation policy an experiment runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "snake_case"))]
pub enum PolicyKind {
  /// One LRU list shared by every tenant.
  GlobalLru,
  /// Per-tenant LRU lists; the largest tenant pays for every miss.
  MaxMin,
  /// Small per-tenant admission queues in front of a shared main cache.
  #[cfg_attr(feature = "serde", serde(rename = "amshare"))]
  AmShare,
  /// Per-tenant LRU lists with a protected guarantee per tenant.
  Memshare,
}

impl PolicyKind {
  pub const ALL: [PolicyKind; 4] = [
    PolicyKind::GlobalLru,
    PolicyKind::MaxMin,
    PolicyKind::AmShare,
    PolicyKind::Memshare,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      PolicyKind::GlobalLru => "global_lru",
      PolicyKind::MaxMin => "max_min",
      PolicyKind::AmShare => "amshare",
      PolicyKind::Memshare => "memshare",
    }
  }
}

impl fmt::Display for PolicyKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Returned when a policy name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown allocation policy '{0}'")]
pub struct UnknownPolicy(pub String);

impl FromStr for PolicyKind {
  type Err = UnknownPolicy;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().replace('-', "_").as_str() {
      "global_lru" | "globallru" => Ok(PolicyKind::GlobalLru),
      "max_min" | "maxmin" => Ok(PolicyKind::MaxMin),
      "amshare" | "am_share" => Ok(PolicyKind::AmShare),
      "memshare" => Ok(PolicyKind::Memshare),
      _ => Err(UnknownPolicy(s.to_string())),
    }
  }
}

/// Cache-side parameters of one experiment. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CacheScheme {
  pub cache_size: u64,
  pub num_tenants: u32,
  pub policy: PolicyKind,
  #[cfg_attr(feature = "serde", serde(default = "default_guarantee_ratio"))]
  pub guarantee_ratio: f64,
  #[cfg_attr(feature = "serde", serde(default = "default_smallq_size_ratio"))]
  pub smallq_size_ratio: f64,
}

#[cfg(feature = "serde")]
fn default_guarantee_ratio() -> f64 {
  DEFAULT_GUARANTEE_RATIO
}

#[cfg(feature = "serde")]
fn default_smallq_size_ratio() -> f64 {
  DEFAULT_SMALLQ_SIZE_RATIO
}

impl CacheScheme {
  pub fn builder() -> CacheSchemeBuilder {
    CacheSchemeBuilder::default()
  }

  /// Checks the invariants the allocators assume.
  ///
  /// Schemes built through [`CacheSchemeBuilder`] are already validated; this
  /// is for schemes deserialized or assembled by hand.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.cache_size == 0 {
      return Err(ConfigError::ZeroCapacity);
    }
    if self.num_tenants == 0 {
      return Err(ConfigError::ZeroTenants);
    }
    check_ratio("guarantee_ratio", self.guarantee_ratio)?;
    check_ratio("smallq_size_ratio", self.smallq_size_ratio)?;
    Ok(())
  }

  /// A tenant's fair share of the cache.
  fn fair_share(&self) -> f64 {
    self.cache_size as f64 / self.num_tenants as f64
  }

  /// Protected entries per tenant, at least one. Also the victim-queue length.
  pub fn guarantee_size(&self) -> u64 {
    self.amshare_guarantee().max(1)
  }

  /// The unclamped guarantee AMShare compares tenant occupancy against.
  pub fn amshare_guarantee(&self) -> u64 {
    (self.fair_share() * self.guarantee_ratio).floor() as u64
  }

  /// Capacity of each AMShare admission queue.
  pub fn small_queue_size(&self) -> usize {
    (self.fair_share() * self.guarantee_ratio * self.smallq_size_ratio).floor() as usize
  }
}

fn check_ratio(name: &'static str, value: f64) -> Result<(), ConfigError> {
  if value > 0.0 && value <= 1.0 {
    Ok(())
  } else {
    Err(ConfigError::RatioOutOfRange { name, value })
  }
}

/// A builder for [`CacheScheme`].
#[derive(Debug, Clone)]
pub struct CacheSchemeBuilder {
  cache_size: u64,
  num_tenants: u32,
  policy: PolicyKind,
  guarantee_ratio: f64,
  smallq_size_ratio: f64,
}

impl Default for CacheSchemeBuilder {
  fn default() -> Self {
    Self {
      cache_size: 0,
      num_tenants: 1,
      policy: PolicyKind::GlobalLru,
      guarantee_ratio: DEFAULT_GUARANTEE_RATIO,
      smallq_size_ratio: DEFAULT_SMALLQ_SIZE_RATIO,
    }
  }
}

impl CacheSchemeBuilder {
  /// Sets the number of entries the cache can hold.
  pub fn cache_size(mut self, cache_size: u64) -> Self {
    self.cache_size = cache_size;
    self
  }

  /// Sets the number of tenants the fair share is computed over.
  pub fn num_tenants(mut self, num_tenants: u32) -> Self {
    self.num_tenants = num_tenants;
    self
  }

  pub fn policy(mut self, policy: PolicyKind) -> Self {
    self.policy = policy;
    self
  }

  /// Sets the fraction of the fair share protected from other tenants.
  pub fn guarantee_ratio(mut self, ratio: f64) -> Self {
    self.guarantee_ratio = ratio;
    self
  }

  /// Sets the admission-queue size as a fraction of the guarantee.
  pub fn smallq_size_ratio(mut self, ratio: f64) -> Self {
    self.smallq_size_ratio = ratio;
    self
  }

  pub fn build(self) -> Result<CacheScheme, ConfigError> {
    let scheme = CacheScheme {
      cache_size: self.cache_size,
      num_tenants: self.num_tenants,
      policy: self.policy,
      guarantee_ratio: self.guarantee_ratio,
      smallq_size_ratio: self.smallq_size_ratio,
    };
    scheme.validate()?;
    Ok(scheme)
  }
}

/// Parameters of the simulated backing store.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct BackingStoreScheme {
  /// Mean fetch latency on a miss, in seconds.
  pub latency_mu: f64,
  /// Standard deviation of the fetch latency, in seconds.
  pub latency_sigma: f64,
  /// Size of the payload written for every admitted or updated key.
  pub value_size: usize,
  /// Seed for latency sampling and payload generation.
  pub seed: Option<u64>,
}

impl Default for BackingStoreScheme {
  fn default() -> Self {
    Self {
      latency_mu: 0.0,
      latency_sigma: 0.0,
      value_size: DEFAULT_VALUE_SIZE,
      seed: None,
    }
  }
}

impl BackingStoreScheme {
  pub fn new(latency_mu: f64, latency_sigma: f64) -> Self {
    Self {
      latency_mu,
      latency_sigma,
      ..Self::default()
    }
  }

  pub fn with_seed(mut self, seed: u64) -> Self {
    self.seed = Some(seed);
    self
  }

  pub fn with_value_size(mut self, value_size: usize) -> Self {
    self.value_size = value_size;
    self
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if !self.latency_mu.is_finite() || !self.latency_sigma.is_finite() || self.latency_sigma < 0.0 {
      return Err(ConfigError::InvalidLatency {
        mu: self.latency_mu,
        sigma: self.latency_sigma,
      });
    }
    Ok(())
  }
}
