//! Trace-driven replay of multi-tenant cache workloads.
//!
//! An [`Experiment`] loads a request trace, then for each configured
//! allocation policy builds a fresh [`CacheServer`](resalloc_cache::CacheServer)
//! and replays every tenant's queries on its own thread, paced to the trace
//! timestamps. Each run yields per-query records, written as CSV, and a
//! [`Summary`] of hit ratio, latency and throughput per tenant.

pub mod config;
pub mod error;
pub mod experiment;
pub mod logging;
pub mod report;
pub mod tenant;
pub mod trace;

pub use config::{Capacity, ExperimentConfig};
pub use error::{Error, Result};
pub use experiment::{Experiment, PolicyRun};
pub use report::{Stats, Summary};
pub use tenant::{QueryRecord, TenantRun};
pub use trace::{Query, TenantTrace, Trace};
