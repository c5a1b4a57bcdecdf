//! Loading request traces.
//!
//! A trace is a CSV file with a header row naming at least the columns
//! `ts`, `tntid`, `key`, `val_size`, `op` and `ttl`, in any order. Other
//! columns are ignored.

use crate::error::{Error, Result};

use csv::{ReaderBuilder, StringRecord, Trim};
use resalloc_cache::TenantId;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;

const REQUIRED_COLUMNS: [&str; 6] = ["ts", "tntid", "key", "val_size", "op", "ttl"];

/// One request from the trace.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
  /// Issue time in seconds, relative to the start of the replay.
  pub ts: f64,
  pub tenant: TenantId,
  pub key: String,
  pub value_size: usize,
  pub write: bool,
  pub ttl: Option<Duration>,
}

/// The queries of one tenant, sorted by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantTrace {
  pub tenant: TenantId,
  pub queries: Vec<Query>,
}

/// A parsed trace, grouped by tenant in first-seen order.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
  name: String,
  tenants: Vec<TenantTrace>,
}

/// A trace row as written, matched to columns by header name.
#[derive(Debug, Deserialize)]
struct Row {
  ts: f64,
  tntid: TenantId,
  key: String,
  val_size: usize,
  op: String,
  ttl: u64,
}

impl Row {
  fn into_query(self, line: usize) -> Result<Query> {
    // Every offset must be representable as a `Duration` for pacing.
    if !self.ts.is_finite() || self.ts < 0.0 || Duration::try_from_secs_f64(self.ts).is_err() {
      return Err(Error::TraceParse {
        line,
        message: format!("invalid ts '{}'", self.ts),
      });
    }
    Ok(Query {
      ts: self.ts,
      tenant: self.tntid,
      key: self.key,
      value_size: self.val_size,
      write: !is_read(&self.op),
      ttl: (self.ttl > 0).then(|| Duration::from_secs(self.ttl)),
    })
  }
}

impl Trace {
  /// Reads a trace file. The trace is named after the file stem.
  pub fn from_path(path: &Path) -> Result<Self> {
    let name = path
      .file_stem()
      .map(|stem| stem.to_string_lossy().into_owned())
      .unwrap_or_else(|| "trace".to_string());
    let file = File::open(path)?;
    Self::parse(name, BufReader::new(file))
  }

  pub fn parse<R: Read>(name: impl Into<String>, reader: R) -> Result<Self> {
    let mut reader = ReaderBuilder::new()
      .has_headers(true)
      .trim(Trim::All)
      .flexible(true)
      .from_reader(reader);
    let headers = reader.headers().map_err(|e| csv_error(&e, None, 1))?.clone();
    if let Some(missing) = REQUIRED_COLUMNS.iter().find(|c| !headers.iter().any(|h| h == **c)) {
      return Err(Error::TraceParse {
        line: 1,
        message: format!("missing column '{}' (required: {})", missing, REQUIRED_COLUMNS.join(",")),
      });
    }

    let mut slots: HashMap<TenantId, usize> = HashMap::new();
    let mut tenants: Vec<TenantTrace> = Vec::new();
    for record in reader.records() {
      let record = record.map_err(|e| csv_error(&e, Some(&headers), 0))?;
      let line = record.position().map_or(0, |pos| pos.line() as usize);
      let query = record
        .deserialize::<Row>(Some(&headers))
        .map_err(|e| csv_error(&e, Some(&headers), line))?
        .into_query(line)?;
      let slot = *slots.entry(query.tenant).or_insert_with(|| {
        tenants.push(TenantTrace {
          tenant: query.tenant,
          queries: Vec::new(),
        });
        tenants.len() - 1
      });
      tenants[slot].queries.push(query);
    }

    for tenant in &mut tenants {
      tenant.queries.sort_by(|a, b| a.ts.total_cmp(&b.ts));
    }
    Ok(Self {
      name: name.into(),
      tenants,
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn tenants(&self) -> &[TenantTrace] {
    &self.tenants
  }

  pub fn tenant_count(&self) -> usize {
    self.tenants.len()
  }

  /// Total number of queries across all tenants.
  pub fn len(&self) -> usize {
    self.tenants.iter().map(|t| t.queries.len()).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Number of distinct `(tenant, key)` pairs.
  pub fn distinct_keys(&self) -> usize {
    self
      .tenants
      .iter()
      .flat_map(|t| t.queries.iter().map(|q| (q.tenant, q.key.as_str())))
      .collect::<HashSet<_>>()
      .len()
  }
}

fn is_read(op: &str) -> bool {
  matches!(op, "get" | "gets")
}

/// Maps a reader error to the trace line it occurred on, naming the column
/// when a field failed to decode.
fn csv_error(err: &csv::Error, headers: Option<&StringRecord>, line: usize) -> Error {
  let line = err.position().map_or(line, |pos| pos.line() as usize);
  let message = match err.kind() {
    csv::ErrorKind::Deserialize { err: de, .. } => {
      let column = de
        .field()
        .and_then(|idx| headers.and_then(|h| h.get(idx as usize)));
      match column {
        Some(column) => format!("invalid {column}: {}", de.kind()),
        None => de.kind().to_string(),
      }
    }
    _ => err.to_string(),
  };
  Error::TraceParse { line, message }
}
