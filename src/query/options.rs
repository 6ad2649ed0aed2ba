//! Per-query configuration.

use std::time::Duration;

use super::retry::{RetryDelay, RetryPolicy};

/// Lifecycle events that may force a refresh of a bound query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefetchTrigger {
  Mount,
  /// The app regained foreground focus
  Focus,
  /// Network connectivity came back
  Reconnect,
}

/// Which triggers force a refetch. Each is independently toggleable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefetchTriggers {
  pub on_mount: bool,
  pub on_focus: bool,
  pub on_reconnect: bool,
}

impl RefetchTriggers {
  pub fn allows(&self, trigger: RefetchTrigger) -> bool {
    match trigger {
      RefetchTrigger::Mount => self.on_mount,
      RefetchTrigger::Focus => self.on_focus,
      RefetchTrigger::Reconnect => self.on_reconnect,
    }
  }
}

#[derive(Debug, Clone)]
pub struct QueryOptions {
  /// When false the query stays idle and never touches the network
  pub enabled: bool,
  pub stale_time: Duration,
  pub retry: RetryPolicy,
  pub retry_delay: RetryDelay,
  pub refetch: RefetchTriggers,
}

impl QueryOptions {
  pub fn enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    self
  }

  pub fn stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  pub fn retry_delay(mut self, retry_delay: RetryDelay) -> Self {
    self.retry_delay = retry_delay;
    self
  }

  pub fn refetch(mut self, refetch: RefetchTriggers) -> Self {
    self.refetch = refetch;
    self
  }
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self {
      enabled: true,
      stale_time: Duration::from_secs(120),
      retry: RetryPolicy::standard(2),
      retry_delay: RetryDelay::exponential(),
      refetch: RefetchTriggers::default(),
    }
  }
}
