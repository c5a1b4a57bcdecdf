use crate::error::{Error, Result};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` takes precedence; without it, events at `level` and above are
/// shown.
pub fn init(level: LevelFilter) -> Result<()> {
  let filter = EnvFilter::builder()
    .with_default_directive(level.into())
    .from_env_lossy();

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_thread_names(true)
    .try_init()
    .map_err(|e| Error::GlobalSubscriberSet(e.to_string()))
}
