//! Paged list queries that grow one page at a time.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, debug_span, warn, Instrument};

use crate::cache::{CacheEvent, CacheEventKind, QueryIdentity};
use crate::error::SyncError;
use crate::query::{retry_async, BoxFuture, QueryClient, QueryOptions, QueryState, RefetchTrigger};

/// Opaque position of a page within a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
  Number(u32),
  Token(String),
}

impl PageCursor {
  pub fn number(&self) -> Option<u32> {
    match self {
      Self::Number(n) => Some(*n),
      Self::Token(_) => None,
    }
  }
}

impl From<u32> for PageCursor {
  fn from(n: u32) -> Self {
    Self::Number(n)
  }
}

/// One fetched page. `cursor` is where the next page starts; `None` means
/// this is the last one.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub cursor: Option<PageCursor>,
  pub total_count: Option<u64>,
}

impl<T> Page<T> {
  pub fn new(items: Vec<T>, cursor: Option<PageCursor>) -> Self {
    Self {
      items,
      cursor,
      total_count: None,
    }
  }

  /// Page `page` (1-based) of a list with `total` items. There is a next
  /// page while `page * limit < total`.
  pub fn from_total(items: Vec<T>, page: u32, limit: u32, total: u64) -> Self {
    let seen = u64::from(page) * u64::from(limit);
    Self {
      items,
      cursor: (seen < total).then(|| PageCursor::Number(page + 1)),
      total_count: Some(total),
    }
  }
}

/// Every page loaded so far, in fetch order.
#[derive(Debug, Clone, PartialEq)]
pub struct InfiniteData<T> {
  pub pages: Vec<Page<T>>,
}

impl<T> InfiniteData<T> {
  pub fn new(first: Page<T>) -> Self {
    Self { pages: vec![first] }
  }

  pub fn items(&self) -> impl Iterator<Item = &T> {
    self.pages.iter().flat_map(|p| p.items.iter())
  }

  pub fn len(&self) -> usize {
    self.pages.iter().map(|p| p.items.len()).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn next_cursor(&self) -> Option<&PageCursor> {
    self.pages.last().and_then(|p| p.cursor.as_ref())
  }

  pub fn has_next(&self) -> bool {
    self.next_cursor().is_some()
  }

  /// Server-reported total, taken from the first page.
  pub fn total_count(&self) -> Option<u64> {
    self.pages.first().and_then(|p| p.total_count)
  }
}

impl<T: Clone> InfiniteData<T> {
  /// Copy with `item` at the head of the first page, bumping every page's total.
  pub fn with_prepended(&self, item: T) -> Self {
    let mut next = self.clone();
    match next.pages.first_mut() {
      Some(first) => first.items.insert(0, item),
      None => next.pages.push(Page::new(vec![item], None)),
    }
    for page in &mut next.pages {
      page.total_count = page.total_count.map(|t| t + 1);
    }
    next
  }

  /// Copy without the items matching `remove`; totals drop by the number removed.
  pub fn without<F>(&self, mut remove: F) -> Self
  where
    F: FnMut(&T) -> bool,
  {
    let mut next = self.clone();
    let mut removed = 0u64;
    for page in &mut next.pages {
      let before = page.items.len();
      page.items.retain(|item| !remove(item));
      removed += (before - page.items.len()) as u64;
    }
    for page in &mut next.pages {
      page.total_count = page.total_count.map(|t| t.saturating_sub(removed));
    }
    next
  }
}

type PageFetcher<T> = Arc<dyn Fn(PageCursor) -> BoxFuture<Page<T>> + Send + Sync>;

/// Fetcher for a fresh sequence holding only the first page.
fn first_page<'a, T: Send + 'static>(
  fetch_page: &'a PageFetcher<T>,
  cursor: &'a PageCursor,
) -> impl Fn() -> BoxFuture<InfiniteData<T>> + 'a {
  move || -> BoxFuture<InfiniteData<T>> {
    let page = fetch_page(cursor.clone());
    Box::pin(async move { page.await.map(InfiniteData::new) })
  }
}

/// A list query whose cache entry is an [`InfiniteData`].
///
/// The first page is loaded with ordinary query semantics; further pages are
/// appended one at a time and never reorder what is already there. Like
/// [`Query`](crate::query::Query), a live binding keeps its entry from being
/// evicted and [`poll`](Self::poll) refreshes it after an invalidation.
pub struct InfiniteQuery<T> {
  client: QueryClient,
  identity: QueryIdentity,
  options: QueryOptions,
  initial_cursor: PageCursor,
  fetch_page: PageFetcher<T>,
  events: broadcast::Receiver<CacheEvent>,
}

impl<T: Clone + Send + Sync + 'static> InfiniteQuery<T> {
  pub fn new<F, Fut>(
    client: QueryClient,
    identity: QueryIdentity,
    options: QueryOptions,
    initial_cursor: PageCursor,
    fetch_page: F,
  ) -> Self
  where
    F: Fn(PageCursor) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Page<T>, SyncError>> + Send + 'static,
  {
    let events = client.store().subscribe();
    client.store().observe(&identity);
    Self {
      client,
      identity,
      options,
      initial_cursor,
      fetch_page: Arc::new(move |cursor| -> BoxFuture<Page<T>> { Box::pin(fetch_page(cursor)) }),
      events,
    }
  }

  pub fn identity(&self) -> &QueryIdentity {
    &self.identity
  }

  pub fn options(&self) -> &QueryOptions {
    &self.options
  }

  pub fn state(&self) -> QueryState<InfiniteData<T>> {
    self.client.state(&self.identity)
  }

  pub fn data(&self) -> Option<Arc<InfiniteData<T>>> {
    self.client.store().get_data(&self.identity)
  }

  /// Load the first page if nothing fresh is cached.
  pub async fn fetch(&self) -> QueryState<InfiniteData<T>> {
    self
      .client
      .fetch_query(&self.identity, &self.options, first_page(&self.fetch_page, &self.initial_cursor))
      .await
  }

  /// Re-fetch only the first page and replace every loaded page with it.
  pub async fn refresh(&self) -> QueryState<InfiniteData<T>> {
    debug!(query = %self.identity, "refreshing from first page");
    self
      .client
      .refetch_query(&self.identity, &self.options, first_page(&self.fetch_page, &self.initial_cursor))
      .await
  }

  /// Refresh on a lifecycle event when the options ask for it.
  pub async fn handle(&self, trigger: RefetchTrigger) -> bool {
    if !self.options.enabled || !self.options.refetch.allows(trigger) {
      return false;
    }
    self.refresh().await;
    true
  }

  /// Refresh on a spawned task.
  fn refresh_in_background(&self) {
    let client = self.client.clone();
    let identity = self.identity.clone();
    let options = self.options.clone();
    let cursor = self.initial_cursor.clone();
    let fetch_page = Arc::clone(&self.fetch_page);
    tokio::spawn(async move {
      client
        .refetch_query(&identity, &options, first_page(&fetch_page, &cursor))
        .await;
    });
  }

  /// Drain cache events for this sequence.
  ///
  /// Returns `true` if the state changed. An invalidation starts a background
  /// refresh from the first page.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;
    let mut invalidated = false;
    loop {
      match self.events.try_recv() {
        Ok(event) if event.identity == self.identity => {
          changed = true;
          invalidated |= event.kind == CacheEventKind::Invalidated;
        }
        Ok(_) => {}
        Err(TryRecvError::Lagged(skipped)) => {
          debug!(query = %self.identity, skipped, "cache events lagged");
          changed = true;
          invalidated |= self.client.store().is_invalidated(&self.identity);
        }
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
      }
    }
    if invalidated && self.options.enabled {
      debug!(query = %self.identity, "sequence invalidated, refreshing");
      self.refresh_in_background();
    }
    changed
  }

  pub fn has_next(&self) -> bool {
    self.data().is_some_and(|d| d.has_next())
  }

  /// Append the next page.
  ///
  /// Returns `Ok(false)` without fetching when there is no next cursor or a
  /// fetch for this sequence is already running. On failure the loaded pages
  /// stay as they were.
  pub async fn fetch_next(&self) -> Result<bool, SyncError> {
    if !self.options.enabled {
      return Ok(false);
    }
    let store = self.client.store();
    let Some(cursor) = self.data().and_then(|d| d.next_cursor().cloned()) else {
      return Ok(false);
    };
    let Some(ticket) = store.begin_fetch_if_idle(&self.identity) else {
      debug!(query = %self.identity, "page fetch already in flight");
      return Ok(false);
    };
    let span = debug_span!("fetch_next", query = %self.identity, ?cursor);
    let result = retry_async(
      &self.options.retry,
      self.options.retry_delay,
      || (self.fetch_page)(cursor.clone()),
      || store.is_current(&ticket),
    )
    .instrument(span)
    .await;

    match result {
      Ok(page) => Ok(store.complete_fetch_with::<InfiniteData<T>, _>(&ticket, |current| {
        match current {
          Some(data) => {
            let mut next = data.clone();
            next.pages.push(page);
            next
          }
          None => InfiniteData::new(page),
        }
      })),
      Err(SyncError::Cancelled) => Ok(false),
      Err(err) => {
        warn!(query = %self.identity, error = %err, "next page failed");
        store.fail_fetch(&ticket, err.clone());
        Err(err)
      }
    }
  }

  /// Items already loaded that satisfy `keep`. Never fetches.
  pub fn filtered<F>(&self, keep: F) -> Vec<T>
  where
    F: Fn(&T) -> bool,
  {
    self
      .data()
      .map(|d| d.items().filter(|item| keep(item)).cloned().collect())
      .unwrap_or_default()
  }
}

impl<T> Drop for InfiniteQuery<T> {
  fn drop(&mut self) {
    self.client.store().unobserve(&self.identity);
  }
}
