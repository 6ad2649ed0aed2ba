//! The shared query coordinator.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, debug_span, trace, warn, Instrument};

use super::options::QueryOptions;
use super::retry::{RetryDelay, RetryPolicy};
use super::QueryState;
use crate::cache::{CacheStore, FetchTicket, QueryFilter, QueryIdentity, DEFAULT_GC_TIME};
use crate::error::SyncError;
use crate::mutation::MutationLocks;
use crate::notify::{LogNotifier, Notifier};

/// App-wide defaults for queries and mutations.
#[derive(Debug, Clone)]
pub struct ClientDefaults {
  pub query: QueryOptions,
  /// Unobserved entries are evicted after this long
  pub gc_time: Duration,
  pub mutation_retry: RetryPolicy,
  pub mutation_retry_delay: RetryDelay,
}

impl Default for ClientDefaults {
  fn default() -> Self {
    Self {
      query: QueryOptions::default(),
      gc_time: DEFAULT_GC_TIME,
      mutation_retry: RetryPolicy::standard(1),
      mutation_retry_delay: RetryDelay::exponential(),
    }
  }
}

/// Coordinates reads and writes over one [`CacheStore`].
///
/// Cheap to clone; every clone shares the same store.
#[derive(Clone)]
pub struct QueryClient {
  store: Arc<CacheStore>,
  defaults: Arc<ClientDefaults>,
  pub(crate) locks: Arc<MutationLocks>,
  notifier: Arc<dyn Notifier>,
}

impl QueryClient {
  pub fn new(defaults: ClientDefaults) -> Self {
    let store = CacheStore::new(defaults.query.stale_time).with_gc_time(defaults.gc_time);
    Self {
      store: Arc::new(store),
      defaults: Arc::new(defaults),
      locks: Arc::new(MutationLocks::default()),
      notifier: Arc::new(LogNotifier),
    }
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn store(&self) -> &CacheStore {
    &self.store
  }

  pub fn defaults(&self) -> &ClientDefaults {
    &self.defaults
  }

  /// Options seeded from the app defaults.
  pub fn query_options(&self) -> QueryOptions {
    self.defaults.query.clone()
  }

  pub fn notifier(&self) -> &dyn Notifier {
    self.notifier.as_ref()
  }

  /// Current `{data, status, error}` for an identity without fetching.
  pub fn state<T: Send + Sync + 'static>(&self, identity: &QueryIdentity) -> QueryState<T> {
    QueryState::from_entry(self.store.get::<T>(identity))
  }

  /// Serve fresh cached data, or fetch it.
  ///
  /// - Disabled queries return their current state without any request.
  /// - Fresh data is returned as is.
  /// - If a fetch for the same identity is already in flight no second
  ///   request is issued.
  /// - Otherwise the entry goes to `Loading` (keeping old data visible) and
  ///   the fetcher runs under the retry policy.
  pub async fn fetch_query<T, F, Fut>(
    &self,
    identity: &QueryIdentity,
    options: &QueryOptions,
    fetcher: F,
  ) -> QueryState<T>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
  {
    if !options.enabled {
      trace!(query = %identity, "query disabled, not fetching");
      return self.state(identity);
    }
    self.store.configure(identity, options.stale_time);

    if let Some(entry) = self.store.get::<T>(identity) {
      if entry.has_data() && !entry.is_stale() {
        debug!(query = %identity, "cache hit");
        return QueryState::from_entry(Some(entry));
      }
    }
    let Some(ticket) = self.store.begin_fetch_if_stale(identity) else {
      debug!(query = %identity, "fetch already in flight or data is fresh");
      return self.state(identity);
    };

    self.run_fetch(ticket, options, fetcher).await
  }

  /// Fetch regardless of freshness. A fetch already in flight for the
  /// identity is superseded.
  pub async fn refetch_query<T, F, Fut>(
    &self,
    identity: &QueryIdentity,
    options: &QueryOptions,
    fetcher: F,
  ) -> QueryState<T>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
  {
    if !options.enabled {
      return self.state(identity);
    }
    self.store.configure(identity, options.stale_time);
    let ticket = self.store.begin_fetch(identity);
    self.run_fetch(ticket, options, fetcher).await
  }

  async fn run_fetch<T, F, Fut>(&self, ticket: FetchTicket, options: &QueryOptions, fetcher: F) -> QueryState<T>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
  {
    let identity = ticket.identity().clone();
    let span = debug_span!("fetch", query = %identity, key = %identity.fingerprint());

    let result = retry_async(
      &options.retry,
      options.retry_delay,
      &fetcher,
      || self.store.is_current(&ticket),
    )
    .instrument(span)
    .await;

    match result {
      Ok(data) => {
        self.store.complete_fetch(&ticket, data);
      }
      Err(SyncError::Cancelled) => {
        debug!(query = %identity, "fetch cancelled");
      }
      Err(err) => {
        warn!(query = %identity, error = %err, "query failed");
        self.store.fail_fetch(&ticket, err);
      }
    }
    self.state(&identity)
  }

  pub fn set_query_data<T: Send + Sync + 'static>(&self, identity: &QueryIdentity, data: T) {
    self.store.set(identity, data);
  }

  pub fn invalidate(&self, filter: impl Into<QueryFilter>) -> usize {
    self.store.invalidate(&filter.into())
  }

  pub fn remove(&self, identity: &QueryIdentity) -> bool {
    self.store.remove(identity)
  }
}

impl Default for QueryClient {
  fn default() -> Self {
    Self::new(ClientDefaults::default())
  }
}

/// Run `attempt` until it succeeds, the policy gives up, or `still_wanted`
/// turns false while waiting between attempts.
pub(crate) async fn retry_async<T, F, Fut, W>(
  policy: &RetryPolicy,
  delay: RetryDelay,
  attempt: F,
  still_wanted: W,
) -> Result<T, SyncError>
where
  F: Fn() -> Fut,
  Fut: Future<Output = Result<T, SyncError>>,
  W: Fn() -> bool,
{
  let mut failures: u32 = 0;
  loop {
    match attempt().await {
      Ok(value) => return Ok(value),
      Err(err) => {
        if !policy.should_retry(failures, &err) {
          return Err(err);
        }
        let wait: Duration = delay.delay(failures);
        debug!(retry = failures + 1, ?wait, error = %err, "scheduling retry");
        tokio::time::sleep(wait).await;
        if !still_wanted() {
          return Err(SyncError::Cancelled);
        }
        failures += 1;
      }
    }
  }
}
