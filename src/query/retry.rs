//! Retry decisions and backoff schedules.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SyncError;

type Decide = Arc<dyn Fn(u32, &SyncError) -> bool + Send + Sync>;

/// Whether a failed attempt should be retried.
///
/// `failure_count` is the number of retries already performed, so it is `0`
/// when the first attempt fails. A policy never retries past `max_retries`.
#[derive(Clone)]
pub struct RetryPolicy {
  max_retries: u32,
  decide: Decide,
}

impl RetryPolicy {
  pub fn custom<F>(max_retries: u32, decide: F) -> Self
  where
    F: Fn(u32, &SyncError) -> bool + Send + Sync + 'static,
  {
    Self {
      max_retries,
      decide: Arc::new(decide),
    }
  }

  /// Retry transient and unauthorized failures up to `max_retries` times.
  pub fn standard(max_retries: u32) -> Self {
    Self::custom(max_retries, |_, err| err.is_retryable())
  }

  pub fn never() -> Self {
    Self::custom(0, |_, _| false)
  }

  /// For reads that race a token refresh: unauthorized is retried twice to
  /// give the refresh time to land, not-found is final.
  pub fn auth_aware() -> Self {
    Self::custom(2, |failure_count, err| match err {
      SyncError::Unauthorized => failure_count < 2,
      SyncError::NotFound { .. } => false,
      other => other.is_retryable() && failure_count < 2,
    })
  }

  pub fn max_retries(&self) -> u32 {
    self.max_retries
  }

  pub fn should_retry(&self, failure_count: u32, err: &SyncError) -> bool {
    failure_count < self.max_retries && (self.decide)(failure_count, err)
  }
}

impl fmt::Debug for RetryPolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RetryPolicy")
      .field("max_retries", &self.max_retries)
      .finish_non_exhaustive()
  }
}

/// Wait before retry number `attempt` (0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDelay {
  /// `min(base * 2^attempt, cap)`
  Exponential { base: Duration, cap: Duration },
  /// `min(step * (attempt + 1), cap)`
  Linear { step: Duration, cap: Duration },
  Fixed(Duration),
}

impl RetryDelay {
  /// 1s, 2s, 4s ... capped at 30s.
  pub const fn exponential() -> Self {
    Self::Exponential {
      base: Duration::from_secs(1),
      cap: Duration::from_secs(30),
    }
  }

  /// 1s, 2s, 3s, then 3s.
  pub const fn linear() -> Self {
    Self::Linear {
      step: Duration::from_secs(1),
      cap: Duration::from_secs(3),
    }
  }

  pub fn delay(&self, attempt: u32) -> Duration {
    match *self {
      Self::Exponential { base, cap } => {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        base.saturating_mul(factor).min(cap)
      }
      Self::Linear { step, cap } => step.saturating_mul(attempt.saturating_add(1)).min(cap),
      Self::Fixed(d) => d,
    }
  }
}

impl Default for RetryDelay {
  fn default() -> Self {
    Self::exponential()
  }
}
