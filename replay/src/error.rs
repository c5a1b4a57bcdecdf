use resalloc_cache::TenantId;
use thiserror::Error;

/// The error type for experiment loading and replay.
#[derive(Debug, Error)]
pub enum Error {
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Failed to parse configuration: {0}")]
  ConfigParse(String),

  #[error("Invalid configuration value for '{field}': {message}")]
  InvalidConfigValue { field: String, message: String },

  #[error("Trace line {line}: {message}")]
  TraceParse { line: usize, message: String },

  #[error("Failed to write results: {0}")]
  Csv(#[from] csv::Error),

  #[error("Tenant {tenant}: timestamp {ts} is out of range")]
  TimestampOutOfRange { tenant: TenantId, ts: f64 },

  #[error("Failed to set global tracing subscriber: {0}")]
  GlobalSubscriberSet(String),

  #[error("Cache error: {0}")]
  Cache(#[from] resalloc_cache::Error),

  #[error("Replay thread for tenant {0} panicked")]
  TenantPanicked(TenantId),
}

impl From<resalloc_cache::ConfigError> for Error {
  fn from(err: resalloc_cache::ConfigError) -> Self {
    Error::Cache(err.into())
  }
}

/// A specialized `Result` type for replay operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
