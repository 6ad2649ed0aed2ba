//! Client-side cache for server reads.
//!
//! This module holds the process-wide store that queries and mutations share:
//! - One entry per [`QueryIdentity`], with data, status and freshness
//! - Exact, prefix and predicate filters for invalidation and removal
//! - Fetch tickets so late responses never overwrite newer results
//! - Snapshots so failed optimistic writes roll back in one step
//! - Eviction of entries nobody has observed for a while
//!
//! Nothing is persisted; every process starts with a cold cache.

mod entry;
mod identity;
mod store;

pub use entry::{CacheEntry, QueryStatus};
pub use identity::{QueryFilter, QueryIdentity};
pub use store::{CacheEvent, CacheEventKind, CacheStore, FetchTicket, Snapshot, DEFAULT_GC_TIME};
