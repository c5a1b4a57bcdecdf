//! Experiment configuration.
//!
//! The YAML file is deserialized into [`ConfigRaw`] exactly as written and
//! then checked and resolved into an [`ExperimentConfig`].

use crate::error::{Error, Result};
use crate::trace::Trace;

use resalloc_cache::scheme::{DEFAULT_GUARANTEE_RATIO, DEFAULT_SMALLQ_SIZE_RATIO};
use resalloc_cache::{BackingStoreScheme, CacheScheme, PolicyKind};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use tracing::Level;

// --- Raw, as written in the file ---

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigRaw {
  pub trace: PathBuf,
  #[serde(default = "default_output_dir")]
  pub output_dir: PathBuf,
  #[serde(default)]
  pub cache_ratio: Option<f64>,
  #[serde(default)]
  pub cache_size: Option<u64>,
  #[serde(default = "default_policies")]
  pub policies: Vec<PolicyKind>,
  #[serde(default = "default_guarantee_ratio")]
  pub guarantee_ratio: f64,
  #[serde(default = "default_smallq_size_ratio")]
  pub smallq_size_ratio: f64,
  #[serde(default)]
  pub backing_store: BackingStoreScheme,
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

fn default_output_dir() -> PathBuf {
  PathBuf::from("results")
}

fn default_policies() -> Vec<PolicyKind> {
  PolicyKind::ALL.to_vec()
}

fn default_guarantee_ratio() -> f64 {
  DEFAULT_GUARANTEE_RATIO
}

fn default_smallq_size_ratio() -> f64 {
  DEFAULT_SMALLQ_SIZE_RATIO
}

fn default_log_level() -> String {
  "info".to_string()
}

// --- Processed ---

/// How the cache capacity is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Capacity {
  /// A fraction of the distinct `(tenant, key)` pairs in the trace.
  Ratio(f64),
  /// A fixed number of entries.
  Fixed(u64),
}

impl Capacity {
  /// The number of cache entries for `trace`.
  pub fn resolve(self, trace: &Trace) -> u64 {
    match self {
      Capacity::Ratio(ratio) => (trace.distinct_keys() as f64 * ratio).floor() as u64,
      Capacity::Fixed(size) => size,
    }
  }

  /// The directory label used for result files.
  pub fn label(self) -> String {
    match self {
      Capacity::Ratio(ratio) => format!("cr{ratio}"),
      Capacity::Fixed(size) => format!("cs{size}"),
    }
  }
}

/// A validated experiment description.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
  pub trace: PathBuf,
  pub output_dir: PathBuf,
  pub capacity: Capacity,
  pub policies: Vec<PolicyKind>,
  pub guarantee_ratio: f64,
  pub smallq_size_ratio: f64,
  pub backing_store: BackingStoreScheme,
  pub log_level: LevelFilter,
}

impl ExperimentConfig {
  pub fn from_file(path: &Path) -> Result<Self> {
    let file = File::open(path)?;
    let raw: ConfigRaw =
      serde_yaml::from_reader(BufReader::new(file)).map_err(|e| Error::ConfigParse(e.to_string()))?;
    Self::from_raw(raw)
  }

  pub fn from_yaml_str(yaml: &str) -> Result<Self> {
    let raw: ConfigRaw = serde_yaml::from_str(yaml).map_err(|e| Error::ConfigParse(e.to_string()))?;
    Self::from_raw(raw)
  }

  pub fn from_raw(raw: ConfigRaw) -> Result<Self> {
    let capacity = match (raw.cache_ratio, raw.cache_size) {
      (Some(ratio), None) => {
        if !(ratio > 0.0 && ratio <= 1.0) {
          return Err(invalid("cache_ratio", format!("must be in (0, 1], got {ratio}")));
        }
        Capacity::Ratio(ratio)
      }
      (None, Some(size)) => Capacity::Fixed(size),
      (Some(_), Some(_)) => {
        return Err(invalid("cache_ratio", "set either cache_ratio or cache_size, not both"));
      }
      (None, None) => return Err(invalid("cache_ratio", "one of cache_ratio or cache_size is required")),
    };

    if raw.policies.is_empty() {
      return Err(invalid("policies", "at least one policy is required"));
    }
    raw.backing_store.validate()?;

    let config = Self {
      trace: raw.trace,
      output_dir: raw.output_dir,
      capacity,
      policies: raw.policies,
      guarantee_ratio: raw.guarantee_ratio,
      smallq_size_ratio: raw.smallq_size_ratio,
      backing_store: raw.backing_store,
      log_level: parse_level_filter(&raw.log_level)?,
    };
    // Surface ratio errors now rather than on the first policy run.
    CacheScheme::builder()
      .cache_size(1)
      .guarantee_ratio(config.guarantee_ratio)
      .smallq_size_ratio(config.smallq_size_ratio)
      .build()?;
    Ok(config)
  }

  /// The cache scheme for one policy run over `trace`.
  pub fn cache_scheme(&self, trace: &Trace, policy: PolicyKind) -> Result<CacheScheme> {
    let scheme = CacheScheme::builder()
      .policy(policy)
      .cache_size(self.capacity.resolve(trace))
      .num_tenants(trace.tenant_count() as u32)
      .guarantee_ratio(self.guarantee_ratio)
      .smallq_size_ratio(self.smallq_size_ratio)
      .build()?;
    Ok(scheme)
  }

  /// Where the results of one policy run are written:
  /// `<output_dir>/lat<mu>_<capacity label>/<trace>_<policy>.csv`.
  pub fn output_path(&self, trace_name: &str, policy: PolicyKind) -> PathBuf {
    self
      .output_dir
      .join(format!("lat{}_{}", self.backing_store.latency_mu, self.capacity.label()))
      .join(format!("{trace_name}_{policy}.csv"))
  }
}

fn invalid(field: &str, message: impl Into<String>) -> Error {
  Error::InvalidConfigValue {
    field: field.to_string(),
    message: message.into(),
  }
}

fn parse_level_filter(level_str: &str) -> Result<LevelFilter> {
  if level_str.eq_ignore_ascii_case("off") {
    return Ok(LevelFilter::OFF);
  }
  level_str
    .to_uppercase()
    .parse::<Level>()
    .map(LevelFilter::from_level)
    .map_err(|_| {
      invalid(
        "log_level",
        format!("invalid log level '{level_str}', expected TRACE, DEBUG, INFO, WARN, ERROR or OFF"),
      )
    })
}
