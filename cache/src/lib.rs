//! A multi-tenant cache testbed for comparing memory allocation policies.
//!
//! Several tenants share one fixed-capacity cache in front of a slower
//! backing store. An [`Allocator`] decides which entry loses its slot when a
//! miss arrives at a full cache; the [`CacheClient`] pairs every decision with
//! the matching backing-store write or delete under a single lock; the
//! [`CacheServer`] adds a simulated fetch latency to every miss.
//!
//! # Policies
//! - **GlobalLRU**: one recency list shared by all tenants.
//! - **Max-Min**: per-tenant lists; the tenant holding the most entries pays.
//! - **AMShare**: small per-tenant admission queues in front of a shared main
//!   cache, with demotable and fully-owned entries.
//! - **Memshare**: per-tenant lists with a protected guarantee per tenant.
//!
//! ```
//! use resalloc_cache::{BackingStoreScheme, CacheScheme, CacheServer, PolicyKind, TenantId};
//!
//! let scheme = CacheScheme::builder()
//!   .cache_size(100)
//!   .num_tenants(2)
//!   .policy(PolicyKind::AmShare)
//!   .build()?;
//! let server = CacheServer::new(scheme, BackingStoreScheme::new(0.003, 0.0))?;
//!
//! let first = server.request(TenantId(1), "user:42", false)?;
//! assert!(!first.hit);
//! assert!(server.request(TenantId(1), "user:42", false)?.hit);
//! # Ok::<(), resalloc_cache::Error>(())
//! ```

// Public modules that form the API
pub mod client;
pub mod error;
pub mod metrics;
pub mod policy;
pub mod scheme;
pub mod server;
pub mod store;

// Internal, crate-only modules
mod entry;
mod time;

pub use client::CacheClient;
pub use entry::{EntryId, EntryStatus, Resident, TenantId};
pub use error::{ConfigError, Error, InvariantViolation, Result, StoreError};
pub use metrics::MetricsSnapshot;
pub use policy::Allocator;
pub use scheme::{BackingStoreScheme, CacheScheme, CacheSchemeBuilder, PolicyKind, UnknownPolicy};
pub use server::{CacheServer, RequestOptions, Response, MIN_FETCH_LATENCY};
pub use store::{BackingStore, MemoryStore};
pub use time::Timestamp;
