//! Async query abstraction for data fetching with caching support.
//!
//! Inspired by TanStack Query. [`QueryClient`] owns the shared cache and
//! decides when to fetch; [`Query<T>`] binds one consumer to one identity
//! and exposes `{data, status, error}`.
//!
//! # Example
//!
//! ```ignore
//! let api = api.clone();
//! let mut query = Query::new(client.clone(), keys::cart(), client.query_options(), move || {
//!     let api = api.clone();
//!     async move { cart::get_cart(&api).await }
//! });
//!
//! // Start fetching
//! query.mount();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! let state = query.state();
//! match state.status {
//!     QueryStatus::Loading => render_spinner(state.data()),
//!     QueryStatus::Success => render_data(state.data()),
//!     QueryStatus::Error => render_error_with_retry(state.error()),
//!     QueryStatus::Idle => {}
//! }
//! ```

mod client;
mod options;
mod retry;

pub use client::{ClientDefaults, QueryClient};
pub(crate) use client::retry_async;
pub use options::{QueryOptions, RefetchTrigger, RefetchTriggers};
pub use retry::{RetryDelay, RetryPolicy};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::debug;

use crate::cache::{CacheEntry, CacheEvent, CacheEventKind, QueryIdentity, QueryStatus};
use crate::error::SyncError;

/// Snapshot of a query as seen by its consumer.
///
/// Loading is "soft": `data` keeps the last known value while a refetch runs,
/// and errors leave it in place as well.
#[derive(Debug)]
pub struct QueryState<T> {
  pub data: Option<Arc<T>>,
  pub status: QueryStatus,
  pub error: Option<SyncError>,
  pub is_stale: bool,
}

impl<T> QueryState<T> {
  pub(crate) fn from_entry(entry: Option<CacheEntry<T>>) -> Self {
    match entry {
      Some(entry) => Self {
        is_stale: entry.is_stale(),
        data: entry.data,
        status: entry.status,
        error: entry.error,
      },
      None => Self::idle(),
    }
  }

  pub fn idle() -> Self {
    Self {
      data: None,
      status: QueryStatus::Idle,
      error: None,
      is_stale: true,
    }
  }

  pub fn is_loading(&self) -> bool {
    self.status == QueryStatus::Loading
  }

  pub fn is_success(&self) -> bool {
    self.status == QueryStatus::Success
  }

  pub fn is_error(&self) -> bool {
    self.status == QueryStatus::Error
  }

  pub fn data(&self) -> Option<&T> {
    self.data.as_deref()
  }

  pub fn error(&self) -> Option<&SyncError> {
    self.error.as_ref()
  }
}

impl<T> Clone for QueryState<T> {
  fn clone(&self) -> Self {
    Self {
      data: self.data.clone(),
      status: self.status,
      error: self.error.clone(),
      is_stale: self.is_stale,
    }
  }
}

/// A boxed future that returns a `Result<T, SyncError>`
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, SyncError>> + Send>>;

/// A factory function that creates futures for fetching data
pub type FetcherFn<T> = Arc<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Box a fetch closure into a [`FetcherFn`].
pub fn fetcher<T, F, Fut>(f: F) -> FetcherFn<T>
where
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T, SyncError>> + Send + 'static,
{
  Arc::new(move || -> BoxFuture<T> { Box::pin(f()) })
}

/// Turn a "not found" failure into an absent value, for features where a
/// missing resource is a normal state (no shop yet, no profile yet).
pub async fn absent_if_not_found<T, Fut>(fut: Fut) -> Result<Option<T>, SyncError>
where
  Fut: Future<Output = Result<T, SyncError>>,
{
  match fut.await {
    Ok(value) => Ok(Some(value)),
    Err(err) if err.is_not_found() => {
      debug!(error = %err, "treating missing resource as absent");
      Ok(None)
    }
    Err(err) => Err(err),
  }
}

/// One consumer bound to one query identity.
///
/// `Query<T>` encapsulates:
/// - The fetching logic (via a closure)
/// - Fetch timing: mount, explicit refetch, focus/reconnect triggers, and
///   invalidation of its identity while mounted
/// - Change detection via the store's event stream (`poll`)
///
/// Fetches run on spawned tasks. Dropping the binding does not cancel them;
/// they still land in the shared cache. While a binding exists its entry is
/// never evicted.
pub struct Query<T> {
  client: QueryClient,
  identity: QueryIdentity,
  options: QueryOptions,
  fetcher: FetcherFn<T>,
  events: broadcast::Receiver<CacheEvent>,
  mounted: bool,
}

impl<T: Send + Sync + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is a closure that returns a future. It is called each
  /// time the query decides a network read is needed.
  pub fn new<F, Fut>(client: QueryClient, identity: QueryIdentity, options: QueryOptions, fetch: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, SyncError>> + Send + 'static,
  {
    Self::from_fetcher(client, identity, options, fetcher(fetch))
  }

  pub fn from_fetcher(
    client: QueryClient,
    identity: QueryIdentity,
    options: QueryOptions,
    fetcher: FetcherFn<T>,
  ) -> Self {
    let events = client.store().subscribe();
    client.store().observe(&identity);
    Self {
      client,
      identity,
      options,
      fetcher,
      events,
      mounted: false,
    }
  }

  pub fn identity(&self) -> &QueryIdentity {
    &self.identity
  }

  pub fn options(&self) -> &QueryOptions {
    &self.options
  }

  /// Get the current state of the query.
  pub fn state(&self) -> QueryState<T> {
    self.client.state(&self.identity)
  }

  pub fn data(&self) -> Option<Arc<T>> {
    self.state().data
  }

  pub fn is_loading(&self) -> bool {
    self.state().is_loading()
  }

  pub fn is_error(&self) -> bool {
    self.state().is_error()
  }

  /// Start observing. Fetches when the entry is missing or stale, or always
  /// when the query refetches on mount.
  pub fn mount(&mut self) {
    self.mounted = true;
    if self.options.refetch.on_mount && self.client.store().get::<T>(&self.identity).is_some_and(|e| e.has_data()) {
      self.refetch();
    } else {
      self.fetch();
    }
  }

  /// Stop observing. In-flight fetches continue.
  pub fn unmount(&mut self) {
    self.mounted = false;
  }

  /// Fetch in the background if needed (stale or missing, nothing in flight).
  pub fn fetch(&self) {
    let client = self.client.clone();
    let identity = self.identity.clone();
    let options = self.options.clone();
    let fetcher = Arc::clone(&self.fetcher);
    tokio::spawn(async move {
      client.fetch_query(&identity, &options, || fetcher()).await;
    });
  }

  /// Force a background refetch. This is also the retry affordance after an error.
  pub fn refetch(&self) {
    let client = self.client.clone();
    let identity = self.identity.clone();
    let options = self.options.clone();
    let fetcher = Arc::clone(&self.fetcher);
    tokio::spawn(async move {
      client.refetch_query(&identity, &options, || fetcher()).await;
    });
  }

  /// Fetch if needed and wait for the outcome.
  pub async fn load(&self) -> QueryState<T> {
    let fetcher = Arc::clone(&self.fetcher);
    self
      .client
      .fetch_query(&self.identity, &self.options, || fetcher())
      .await
  }

  /// Refetch and wait for the outcome.
  pub async fn reload(&self) -> QueryState<T> {
    let fetcher = Arc::clone(&self.fetcher);
    self
      .client
      .refetch_query(&self.identity, &self.options, || fetcher())
      .await
  }

  /// React to an app lifecycle event.
  pub fn handle(&self, trigger: RefetchTrigger) -> bool {
    if !self.mounted || !self.options.enabled || !self.options.refetch.allows(trigger) {
      return false;
    }
    debug!(query = %self.identity, ?trigger, "refetch triggered");
    self.refetch();
    true
  }

  /// Enable or disable the query, e.g. when the session changes.
  pub fn set_enabled(&mut self, enabled: bool) {
    let was = self.options.enabled;
    self.options.enabled = enabled;
    if enabled && !was && self.mounted {
      self.fetch();
    }
  }

  /// Point the binding at a different identity (a parameter changed). The
  /// new identity is an independent query; the old one's fetch is left alone.
  pub fn rebind(&mut self, identity: QueryIdentity, fetcher: FetcherFn<T>) {
    let store = self.client.store();
    store.observe(&identity);
    store.unobserve(&self.identity);
    self.identity = identity;
    self.fetcher = fetcher;
    if self.mounted {
      self.fetch();
    }
  }

  /// Drain cache events for this identity.
  ///
  /// Returns `true` if the state changed. Call this in your event loop tick
  /// handler. An invalidation while mounted starts a background refetch.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;
    let mut invalidated = false;
    loop {
      match self.events.try_recv() {
        Ok(event) if event.identity == self.identity => {
          changed = true;
          if event.kind == CacheEventKind::Invalidated {
            invalidated = true;
          }
        }
        Ok(_) => {}
        Err(TryRecvError::Lagged(skipped)) => {
          // The dropped events may have included an invalidation
          debug!(query = %self.identity, skipped, "cache events lagged");
          changed = true;
          invalidated |= self.client.store().is_invalidated(&self.identity);
        }
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
      }
    }
    if invalidated && self.mounted && self.options.enabled {
      self.fetch();
    }
    changed
  }
}

impl<T> Drop for Query<T> {
  fn drop(&mut self) {
    self.client.store().unobserve(&self.identity);
  }
}

impl<T: std::fmt::Debug + Send + Sync + 'static> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("identity", &self.identity)
      .field("state", &self.state())
      .field("mounted", &self.mounted)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  fn counting(calls: Arc<AtomicU32>) -> impl Fn() -> BoxFuture<u32> + Send + Sync + 'static {
    move || -> BoxFuture<u32> {
      let calls = calls.clone();
      Box::pin(async move { Ok(calls.fetch_add(1, Ordering::SeqCst)) })
    }
  }

  async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
  }

  #[tokio::test(start_paused = true)]
  async fn test_query_success() {
    let client = QueryClient::default();
    let mut query = Query::new(client, QueryIdentity::new("cart"), QueryOptions::default(), || async {
      Ok::<_, SyncError>(vec![1, 2, 3])
    });

    assert_eq!(query.state().status, QueryStatus::Idle);

    query.mount();
    settle().await;

    assert!(query.poll());
    assert!(query.state().is_success());
    assert_eq!(query.data().as_deref(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test(start_paused = true)]
  async fn test_query_error_then_retry_affordance() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicU32::new(0));
    let c = calls.clone();
    let mut query = Query::new(
      client,
      QueryIdentity::new("cart"),
      QueryOptions::default().retry(RetryPolicy::never()),
      move || {
        let c = c.clone();
        async move {
          if c.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(SyncError::transient("Something went wrong"))
          } else {
            Ok(42u32)
          }
        }
      },
    );

    query.mount();
    settle().await;
    query.poll();
    assert!(query.is_error());
    assert_eq!(query.state().error().map(ToString::to_string).as_deref(), Some("Something went wrong"));

    query.refetch();
    settle().await;
    assert!(query.poll());
    assert_eq!(query.data().as_deref(), Some(&42));
  }

  #[tokio::test(start_paused = true)]
  async fn test_mount_uses_fresh_cache() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicU32::new(0));
    let id = QueryIdentity::new("cart");

    let mut a = Query::from_fetcher(client.clone(), id.clone(), QueryOptions::default(), Arc::new(counting(calls.clone())));
    a.mount();
    settle().await;

    let mut b = Query::from_fetcher(client, id, QueryOptions::default(), Arc::new(counting(calls.clone())));
    b.mount();
    settle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(b.data().as_deref(), Some(&0));
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidation_refetches_mounted_query() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicU32::new(0));
    let id = QueryIdentity::new("cart");
    let mut query = Query::from_fetcher(client.clone(), id.clone(), QueryOptions::default(), Arc::new(counting(calls.clone())));

    query.mount();
    settle().await;
    query.poll();

    client.invalidate(id);
    assert!(query.poll());
    settle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(query.data().as_deref(), Some(&1));
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidation_does_not_fetch_when_unmounted() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicU32::new(0));
    let id = QueryIdentity::new("cart");
    let mut query = Query::from_fetcher(client.clone(), id.clone(), QueryOptions::default(), Arc::new(counting(calls.clone())));

    query.mount();
    settle().await;
    query.unmount();

    client.invalidate(id);
    query.poll();
    settle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(query.state().is_stale);
  }

  #[tokio::test(start_paused = true)]
  async fn test_triggers_follow_options() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicU32::new(0));
    let options = QueryOptions::default().refetch(RefetchTriggers {
      on_focus: true,
      ..Default::default()
    });
    let mut query = Query::from_fetcher(client, QueryIdentity::new("cart"), options, Arc::new(counting(calls.clone())));

    query.mount();
    settle().await;

    assert!(!query.handle(RefetchTrigger::Reconnect));
    assert!(query.handle(RefetchTrigger::Focus));
    settle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_enabling_starts_fetch() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicU32::new(0));
    let options = QueryOptions::default().enabled(false);
    let mut query = Query::from_fetcher(client, QueryIdentity::new("my-profile"), options, Arc::new(counting(calls.clone())));

    query.mount();
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(query.state().status, QueryStatus::Idle);

    query.set_enabled(true);
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_rebind_is_independent() {
    let client = QueryClient::default();
    let mut query = Query::new(client.clone(), QueryIdentity::new("products").with(1), QueryOptions::default(), || async {
      Ok::<_, SyncError>("page one")
    });
    query.mount();
    settle().await;

    query.rebind(QueryIdentity::new("products").with(2), fetcher(|| async { Ok::<_, SyncError>("page two") }));
    settle().await;

    assert_eq!(query.data().as_deref(), Some(&"page two"));
    assert_eq!(
      client.state::<&str>(&QueryIdentity::new("products").with(1)).data(),
      Some(&"page one")
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidation_seen_after_lagged_events() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicU32::new(0));
    let id = QueryIdentity::new("cart");
    let mut query = Query::from_fetcher(client.clone(), id.clone(), QueryOptions::default(), Arc::new(counting(calls.clone())));

    query.mount();
    settle().await;
    query.poll();

    client.invalidate(id);
    for n in 0..300u32 {
      client.set_query_data(&QueryIdentity::new("product-detail").with(n), n);
    }
    assert!(query.poll());
    settle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!query.state().is_stale);
  }

  #[tokio::test(start_paused = true)]
  async fn test_bound_entry_survives_gc() {
    let client = QueryClient::default();
    let bound = QueryIdentity::new("cart");
    let other = QueryIdentity::new("product-detail").with("p1");
    let mut query = Query::new(client.clone(), bound.clone(), QueryOptions::default(), || async {
      Ok::<_, SyncError>(1u32)
    });
    query.mount();
    settle().await;
    client.set_query_data(&other, 2u32);

    tokio::time::advance(Duration::from_secs(5 * 60 + 1)).await;
    client.store().gc();
    assert!(client.store().contains(&bound));
    assert!(!client.store().contains(&other));

    drop(query);
    tokio::time::advance(Duration::from_secs(5 * 60 + 1)).await;
    client.store().gc();
    assert!(!client.store().contains(&bound));
  }

  #[tokio::test(start_paused = true)]
  async fn test_rebind_moves_observer() {
    let client = QueryClient::default();
    let one = QueryIdentity::new("products").with(1);
    let two = QueryIdentity::new("products").with(2);
    let mut query = Query::new(client.clone(), one.clone(), QueryOptions::default(), || async {
      Ok::<_, SyncError>(1u32)
    });
    assert_eq!(client.store().observer_count(&one), 1);

    query.rebind(two.clone(), fetcher(|| async { Ok::<_, SyncError>(2u32) }));
    assert_eq!(client.store().observer_count(&one), 0);
    assert_eq!(client.store().observer_count(&two), 1);
  }

  #[tokio::test]
  async fn test_absent_if_not_found() {
    let absent = absent_if_not_found(async { Err::<u32, _>(SyncError::not_found("my-shop")) }).await;
    assert_eq!(absent, Ok(None));
    let failed = absent_if_not_found(async { Err::<u32, _>(SyncError::Unauthorized) }).await;
    assert_eq!(failed, Err(SyncError::Unauthorized));
  }
}
