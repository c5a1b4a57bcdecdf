use crate::error::{Error, Result};
use crate::trace::TenantTrace;

use resalloc_cache::{BackingStore, CacheServer, RequestOptions, TenantId};
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};

/// The outcome of one replayed query. Times are seconds since the replay
/// started.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueryRecord {
  #[serde(rename = "tntid")]
  pub tenant: TenantId,
  /// When the trace says the query was issued.
  pub original_ts: f64,
  /// When the query was actually issued.
  pub issue_ts: f64,
  /// Completion time plus the simulated fetch latency.
  pub finish_ts: f64,
  pub hit: bool,
}

impl QueryRecord {
  pub fn latency(&self) -> f64 {
    self.finish_ts - self.issue_ts
  }
}

/// Everything one tenant thread produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TenantRun {
  pub records: Vec<QueryRecord>,
  /// Queries dropped because the backing store failed them.
  pub failed: u64,
}

/// Replays `trace` against `server`, pacing each query to its trace
/// timestamp relative to `start`. Queries that are already late are issued
/// immediately.
///
/// Store failures drop the query and the replay continues. Any other error
/// stops this tenant.
pub fn replay_tenant<S: BackingStore>(server: &CacheServer<S>, trace: &TenantTrace, start: Instant) -> Result<TenantRun> {
  let mut run = TenantRun {
    records: Vec::with_capacity(trace.queries.len()),
    failed: 0,
  };
  let total = trace.queries.len();

  for (i, query) in trace.queries.iter().enumerate() {
    let due = Duration::try_from_secs_f64(query.ts)
      .ok()
      .and_then(|offset| start.checked_add(offset))
      .ok_or(Error::TimestampOutOfRange {
        tenant: query.tenant,
        ts: query.ts,
      })?;
    let now = Instant::now();
    if now < due {
      thread::sleep(due - now);
    }

    let issue_ts = start.elapsed().as_secs_f64();
    let options = RequestOptions {
      write: query.write,
      value_size: Some(query.value_size),
      ttl: query.ttl,
    };
    let response = match server.request_with(query.tenant, &query.key, options) {
      Ok(response) => response,
      Err(err) if !err.is_fatal() => {
        tracing::warn!(tenant = %query.tenant, key = %query.key, error = %err, "query dropped");
        run.failed += 1;
        continue;
      }
      Err(err) => return Err(err.into()),
    };
    let finish_ts = start.elapsed().as_secs_f64() + response.extra_latency.as_secs_f64();

    tracing::trace!(tenant = %query.tenant, progress = i + 1, total, hit = response.hit, "query replayed");
    run.records.push(QueryRecord {
      tenant: query.tenant,
      original_ts: query.ts,
      issue_ts,
      finish_ts,
      hit: response.hit,
    });
  }
  Ok(run)
}
