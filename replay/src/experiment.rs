use crate::config::ExperimentConfig;
use crate::error::{Error, Result};
use crate::report::{self, Summary};
use crate::tenant::{replay_tenant, QueryRecord, TenantRun};
use crate::trace::Trace;

use resalloc_cache::{CacheScheme, CacheServer, MetricsSnapshot, PolicyKind};
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

/// The result of replaying the trace under one policy.
#[derive(Debug, Clone)]
pub struct PolicyRun {
  pub policy: PolicyKind,
  pub scheme: CacheScheme,
  /// All query records, grouped by tenant in trace order.
  pub records: Vec<QueryRecord>,
  /// Queries dropped by store failures.
  pub failed: u64,
  pub metrics: MetricsSnapshot,
}

impl PolicyRun {
  pub fn summary(&self) -> Summary {
    Summary::new(self.policy.as_str(), &self.records)
  }
}

/// One trace replayed under each configured policy.
#[derive(Debug)]
pub struct Experiment {
  config: ExperimentConfig,
  trace: Trace,
}

impl Experiment {
  /// Loads the trace named by `config`.
  pub fn load(config: ExperimentConfig) -> Result<Self> {
    let trace = Trace::from_path(&config.trace)?;
    tracing::info!(
      trace = trace.name(),
      tenants = trace.tenant_count(),
      queries = trace.len(),
      distinct_keys = trace.distinct_keys(),
      "trace loaded"
    );
    Ok(Self::new(config, trace))
  }

  pub fn new(config: ExperimentConfig, trace: Trace) -> Self {
    Self { config, trace }
  }

  pub fn config(&self) -> &ExperimentConfig {
    &self.config
  }

  pub fn trace(&self) -> &Trace {
    &self.trace
  }

  /// Replays the whole trace against a fresh server running `policy`, one
  /// thread per tenant.
  pub fn run_policy(&self, policy: PolicyKind) -> Result<PolicyRun> {
    let scheme = self.config.cache_scheme(&self.trace, policy)?;
    let server = CacheServer::new(scheme.clone(), self.config.backing_store.clone())?;

    let start = Instant::now();
    let runs: Vec<Result<TenantRun>> = thread::scope(|s| {
      let handles: Vec<_> = self
        .trace
        .tenants()
        .iter()
        .map(|tenant| {
          let server = &server;
          (tenant.tenant, s.spawn(move || replay_tenant(server, tenant, start)))
        })
        .collect();
      handles
        .into_iter()
        .map(|(tenant, handle)| handle.join().unwrap_or(Err(Error::TenantPanicked(tenant))))
        .collect()
    });
    let elapsed = start.elapsed();

    let mut records = Vec::with_capacity(self.trace.len());
    let mut failed = 0;
    for run in runs {
      let run = run?;
      records.extend(run.records);
      failed += run.failed;
    }

    let metrics = server.metrics();
    tracing::info!(
      %policy,
      cache_size = scheme.cache_size,
      hit_ratio = metrics.hit_ratio,
      evictions = metrics.evictions,
      failed,
      elapsed_secs = elapsed.as_secs_f64(),
      "policy run complete"
    );
    Ok(PolicyRun {
      policy,
      scheme,
      records,
      failed,
      metrics,
    })
  }

  /// Where the results of `policy` are written.
  pub fn output_path(&self, policy: PolicyKind) -> PathBuf {
    self.config.output_path(self.trace.name(), policy)
  }

  /// Runs every configured policy in turn, writing each run's records to
  /// its output file.
  pub fn run_all(&self) -> Result<Vec<PolicyRun>> {
    let mut runs = Vec::with_capacity(self.config.policies.len());
    for &policy in &self.config.policies {
      let run = self.run_policy(policy)?;
      let path = self.output_path(policy);
      report::write_csv(&path, &run.records)?;
      tracing::info!(%policy, path = %path.display(), "results written");
      runs.push(run);
    }
    Ok(runs)
  }
}
