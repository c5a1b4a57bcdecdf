use crate::client::CacheClient;
use crate::entry::TenantId;
use crate::error::{ConfigError, Result};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::scheme::{BackingStoreScheme, CacheScheme};
use crate::store::{BackingStore, MemoryStore};

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rand_distr::{Distribution, Normal};

/// The smallest fetch latency a miss can be charged.
pub const MIN_FETCH_LATENCY: Duration = Duration::from_micros(1);

/// The outcome of one [`CacheServer::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
  pub hit: bool,
  /// Simulated backing-store fetch cost. Zero on a hit.
  pub extra_latency: Duration,
}

/// Per-request knobs beyond the tenant and key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
  pub write: bool,
  /// Payload size; the server's configured value size when `None`.
  pub value_size: Option<usize>,
  /// Accepted for trace fidelity. No allocator expires entries.
  pub ttl: Option<Duration>,
}

impl RequestOptions {
  pub fn read() -> Self {
    Self::default()
  }

  pub fn write() -> Self {
    Self {
      write: true,
      ..Self::default()
    }
  }
}

/// Samples miss latency and synthesizes payloads.
struct Fetcher {
  latency: Normal<f64>,
  rng: StdRng,
}

impl Fetcher {
  fn new(scheme: &BackingStoreScheme) -> Result<Self> {
    scheme.validate()?;
    let latency = Normal::new(scheme.latency_mu, scheme.latency_sigma).map_err(|_| ConfigError::InvalidLatency {
      mu: scheme.latency_mu,
      sigma: scheme.latency_sigma,
    })?;
    let rng = match scheme.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_os_rng(),
    };
    Ok(Self { latency, rng })
  }

  fn sample_latency(&mut self) -> Duration {
    let secs = self.latency.sample(&mut self.rng);
    if secs.is_nan() || secs <= 0.0 {
      return MIN_FETCH_LATENCY;
    }
    // Too large for a Duration: saturate.
    Duration::try_from_secs_f64(secs)
      .unwrap_or(Duration::MAX)
      .max(MIN_FETCH_LATENCY)
  }

  fn payload(&mut self, size: usize) -> Vec<u8> {
    let mut value = vec![0u8; size];
    self.rng.fill_bytes(&mut value);
    value
  }
}

/// The experiment-facing cache: a [`CacheClient`] plus simulated
/// backing-store latency.
///
/// Safe to share across tenant threads; every request funnels through the
/// client lock.
pub struct CacheServer<S = MemoryStore> {
  client: CacheClient<S>,
  fetcher: Mutex<Fetcher>,
  scheme: CacheScheme,
  value_size: usize,
  metrics: Arc<Metrics>,
}

impl<S> fmt::Debug for CacheServer<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheServer")
      .field("scheme", &self.scheme)
      .field("value_size", &self.value_size)
      .field("metrics", &self.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

impl CacheServer<MemoryStore> {
  /// Creates a server over an empty in-memory store.
  pub fn new(scheme: CacheScheme, store_scheme: BackingStoreScheme) -> Result<Self> {
    Self::with_store(scheme, store_scheme, MemoryStore::new())
  }
}

impl<S: BackingStore> CacheServer<S> {
  /// Creates a server over a caller-supplied backing store.
  pub fn with_store(scheme: CacheScheme, store_scheme: BackingStoreScheme, store: S) -> Result<Self> {
    scheme.validate()?;
    let fetcher = Fetcher::new(&store_scheme)?;
    let allocator = scheme.policy.build(&scheme);
    let metrics = Arc::new(Metrics::new());

    tracing::info!(
      policy = allocator.name(),
      cache_size = scheme.cache_size,
      num_tenants = scheme.num_tenants,
      guarantee_ratio = scheme.guarantee_ratio,
      smallq_size_ratio = scheme.smallq_size_ratio,
      latency_mu = store_scheme.latency_mu,
      latency_sigma = store_scheme.latency_sigma,
      "cache server ready"
    );

    Ok(Self {
      client: CacheClient::with_metrics(allocator, store, metrics.clone()),
      fetcher: Mutex::new(fetcher),
      scheme,
      value_size: store_scheme.value_size,
      metrics,
    })
  }

  /// Serves a request with the configured payload size and no TTL.
  pub fn request(&self, tenant: TenantId, key: &str, write: bool) -> Result<Response> {
    self.request_with(
      tenant,
      key,
      RequestOptions {
        write,
        ..RequestOptions::default()
      },
    )
  }

  pub fn request_with(&self, tenant: TenantId, key: &str, options: RequestOptions) -> Result<Response> {
    let value = self
      .fetcher
      .lock()
      .payload(options.value_size.unwrap_or(self.value_size));

    let hit = self.client.handle(tenant, key, value, options.write, options.ttl)?;
    let extra_latency = if hit {
      Duration::ZERO
    } else {
      self.fetcher.lock().sample_latency()
    };
    Ok(Response { hit, extra_latency })
  }

  pub fn scheme(&self) -> &CacheScheme {
    &self.scheme
  }

  pub fn client(&self) -> &CacheClient<S> {
    &self.client
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }
}
