use crate::error::Result;
use crate::tenant::QueryRecord;

use csv::WriterBuilder;
use resalloc_cache::TenantId;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

pub const CSV_HEADER: [&str; 5] = ["tntid", "original_ts", "issue_ts", "finish_ts", "hit"];

/// Writes `records` as CSV, creating parent directories as needed.
pub fn write_csv(path: &Path, records: &[QueryRecord]) -> Result<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  let mut out = BufWriter::new(File::create(path)?);
  write_records(&mut out, records)?;
  out.flush()?;
  Ok(())
}

/// Writes the header row and one row per record. The header is written even
/// when there are no records.
pub fn write_records<W: Write>(out: W, records: &[QueryRecord]) -> Result<()> {
  let mut writer = WriterBuilder::new().has_headers(false).from_writer(out);
  writer.write_record(CSV_HEADER)?;
  for record in records {
    writer.serialize(record)?;
  }
  writer.flush()?;
  Ok(())
}

/// Aggregate statistics over a set of query records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
  pub queries: u64,
  pub hits: u64,
  pub hit_ratio: f64,
  /// Mean of `finish_ts - issue_ts`, in seconds.
  pub mean_latency: f64,
  /// Queries per second, over the span until the last query finished.
  pub throughput: f64,
}

impl Stats {
  fn from_records<'a>(records: impl Iterator<Item = &'a QueryRecord>) -> Self {
    let mut queries = 0u64;
    let mut hits = 0u64;
    let mut latency_sum = 0.0;
    let mut last_finish = 0.0f64;
    for r in records {
      queries += 1;
      hits += r.hit as u64;
      latency_sum += r.latency();
      last_finish = last_finish.max(r.finish_ts);
    }

    let ratio = |num: f64, den: f64| if den > 0.0 { num / den } else { 0.0 };
    Self {
      queries,
      hits,
      hit_ratio: ratio(hits as f64, queries as f64),
      mean_latency: ratio(latency_sum, queries as f64),
      throughput: ratio(queries as f64, last_finish),
    }
  }
}

/// Per-tenant and overall statistics of one policy run.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
  pub policy: String,
  /// Per tenant, in the order tenants first appear in the records.
  pub tenants: Vec<(TenantId, Stats)>,
  pub overall: Stats,
}

impl Summary {
  pub fn new(policy: impl Into<String>, records: &[QueryRecord]) -> Self {
    let mut order: Vec<TenantId> = Vec::new();
    for r in records {
      if !order.contains(&r.tenant) {
        order.push(r.tenant);
      }
    }
    let tenants = order
      .into_iter()
      .map(|tenant| {
        let stats = Stats::from_records(records.iter().filter(|r| r.tenant == tenant));
        (tenant, stats)
      })
      .collect();

    Self {
      policy: policy.into(),
      tenants,
      overall: Stats::from_records(records.iter()),
    }
  }
}

impl fmt::Display for Summary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "== {} ==", self.policy)?;
    writeln!(
      f,
      "{:>8} {:>10} {:>10} {:>14} {:>12}",
      "tenant", "queries", "hit ratio", "mean lat (s)", "qps"
    )?;
    let row = |f: &mut fmt::Formatter<'_>, label: &str, s: &Stats| {
      writeln!(
        f,
        "{:>8} {:>10} {:>9.2}% {:>14.6} {:>12.2}",
        label,
        s.queries,
        s.hit_ratio * 100.0,
        s.mean_latency,
        s.throughput
      )
    };
    for (tenant, stats) in &self.tenants {
      row(f, &tenant.to_string(), stats)?;
    }
    row(f, "all", &self.overall)
  }
}
