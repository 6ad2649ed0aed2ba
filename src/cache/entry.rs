//! Cache entries and their freshness metadata.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::SyncError;

/// Lifecycle status of one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
  /// Nothing requested yet
  #[default]
  Idle,
  /// A fetch is in flight; previous data (if any) stays visible
  Loading,
  /// Last fetch or manual write succeeded
  Success,
  /// Last fetch failed; previous data (if any) is retained
  Error,
}

/// Typed view of a cache slot.
#[derive(Debug)]
pub struct CacheEntry<T> {
  pub data: Option<Arc<T>>,
  pub status: QueryStatus,
  pub error: Option<SyncError>,
  /// When data was last written successfully
  pub fetched_at: Option<Instant>,
  pub stale_time: Duration,
  /// Set by `invalidate`, cleared by the next successful write
  pub invalidated: bool,
}

impl<T> CacheEntry<T> {
  /// Stale when invalidated, never fetched, or older than `stale_time`.
  pub fn is_stale_at(&self, now: Instant) -> bool {
    if self.invalidated {
      return true;
    }
    match self.fetched_at {
      Some(at) => now.saturating_duration_since(at) > self.stale_time,
      None => true,
    }
  }

  pub fn is_stale(&self) -> bool {
    self.is_stale_at(Instant::now())
  }

  pub fn has_data(&self) -> bool {
    self.data.is_some()
  }
}

impl<T> Clone for CacheEntry<T> {
  fn clone(&self) -> Self {
    Self {
      data: self.data.clone(),
      status: self.status,
      error: self.error.clone(),
      fetched_at: self.fetched_at,
      stale_time: self.stale_time,
      invalidated: self.invalidated,
    }
  }
}
