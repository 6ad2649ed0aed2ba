//! Server writes with optimistic cache edits.
//!
//! A [`Mutation`] is a reusable definition: how to validate the input, how to
//! perform the write, which cached queries to edit before the server answers,
//! and what to reconcile once it has. [`QueryClient::mutate`] runs one
//! invocation end to end and either commits all of its cache effects or
//! rolls all of them back.

mod locks;
mod txn;

pub use locks::{MutationGuard, MutationLocks};
pub use txn::CacheTxn;

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::cache::{QueryFilter, QueryIdentity};
use crate::error::SyncError;
use crate::notify::Notification;
use crate::query::{retry_async, BoxFuture, QueryClient, RetryDelay, RetryPolicy};
use crate::validate::Validation;

type ValidateFn<I> = Arc<dyn Fn(&I) -> Validation + Send + Sync>;
type ExecuteFn<I, O> = Arc<dyn Fn(I) -> BoxFuture<O> + Send + Sync>;
type TargetsFn<I> = Arc<dyn Fn(&I) -> Vec<QueryFilter> + Send + Sync>;
type ApplyFn<I> = Arc<dyn Fn(&I, &mut CacheTxn<'_>) + Send + Sync>;
type SuccessFn<I, O> = Arc<dyn Fn(&O, &I, &mut CacheTxn<'_>) + Send + Sync>;
type InvalidatesFn<I, O> = Arc<dyn Fn(&O, &I) -> Vec<QueryFilter> + Send + Sync>;

/// What happens to optimistic writes once the server confirms the mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimisticPolicy {
  /// Invalidate the optimistic targets so the server's version replaces them
  #[default]
  Reconcile,
  /// Keep the optimistic value. For backends that accept writes without
  /// persisting them.
  KeepOptimistic,
}

pub struct Mutation<I, O> {
  name: &'static str,
  validate: Option<ValidateFn<I>>,
  execute: ExecuteFn<I, O>,
  targets: Option<TargetsFn<I>>,
  apply: Option<ApplyFn<I>>,
  on_success: Option<SuccessFn<I, O>>,
  invalidates: Option<InvalidatesFn<I, O>>,
  policy: OptimisticPolicy,
  retry: Option<RetryPolicy>,
  retry_delay: Option<RetryDelay>,
  success_message: Option<(String, String)>,
  failure_title: String,
}

impl<I, O> Clone for Mutation<I, O> {
  fn clone(&self) -> Self {
    Self {
      name: self.name,
      validate: self.validate.clone(),
      execute: Arc::clone(&self.execute),
      targets: self.targets.clone(),
      apply: self.apply.clone(),
      on_success: self.on_success.clone(),
      invalidates: self.invalidates.clone(),
      policy: self.policy,
      retry: self.retry.clone(),
      retry_delay: self.retry_delay,
      success_message: self.success_message.clone(),
      failure_title: self.failure_title.clone(),
    }
  }
}

impl<I, O> std::fmt::Debug for Mutation<I, O> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Mutation")
      .field("name", &self.name)
      .field("policy", &self.policy)
      .field("optimistic", &self.apply.is_some())
      .finish_non_exhaustive()
  }
}

impl<I, O> Mutation<I, O>
where
  I: Clone + Send + Sync + 'static,
  O: Send + Sync + 'static,
{
  pub fn new<F, Fut>(name: &'static str, execute: F) -> Self
  where
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, SyncError>> + Send + 'static,
  {
    Self {
      name,
      validate: None,
      execute: Arc::new(move |input| -> BoxFuture<O> { Box::pin(execute(input)) }),
      targets: None,
      apply: None,
      on_success: None,
      invalidates: None,
      policy: OptimisticPolicy::default(),
      retry: None,
      retry_delay: None,
      success_message: None,
      failure_title: "Error".to_string(),
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  /// Check the input before anything else happens. A failure never reaches
  /// the network.
  pub fn validate<F>(mut self, f: F) -> Self
  where
    F: Fn(&I) -> Validation + Send + Sync + 'static,
  {
    self.validate = Some(Arc::new(f));
    self
  }

  /// Edit the cache before the write is sent.
  ///
  /// `targets` names every query `apply` is going to touch. In-flight reads
  /// for them are cancelled and their state is captured for rollback.
  pub fn optimistic<T, A>(mut self, targets: T, apply: A) -> Self
  where
    T: Fn(&I) -> Vec<QueryFilter> + Send + Sync + 'static,
    A: Fn(&I, &mut CacheTxn<'_>) + Send + Sync + 'static,
  {
    self.targets = Some(Arc::new(targets));
    self.apply = Some(Arc::new(apply));
    self
  }

  /// Exact cache writes from the server's answer.
  pub fn on_success<F>(mut self, f: F) -> Self
  where
    F: Fn(&O, &I, &mut CacheTxn<'_>) + Send + Sync + 'static,
  {
    self.on_success = Some(Arc::new(f));
    self
  }

  /// Queries that are stale once the write has succeeded.
  pub fn invalidates<F>(mut self, f: F) -> Self
  where
    F: Fn(&O, &I) -> Vec<QueryFilter> + Send + Sync + 'static,
  {
    self.invalidates = Some(Arc::new(f));
    self
  }

  pub fn policy(mut self, policy: OptimisticPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = Some(retry);
    self
  }

  pub fn retry_delay(mut self, delay: RetryDelay) -> Self {
    self.retry_delay = Some(delay);
    self
  }

  pub fn success_message(mut self, title: impl Into<String>, message: impl Into<String>) -> Self {
    self.success_message = Some((title.into(), message.into()));
    self
  }

  pub fn failure_title(mut self, title: impl Into<String>) -> Self {
    self.failure_title = title.into();
    self
  }
}

impl QueryClient {
  /// Run one mutation.
  ///
  /// The input is validated, the optimistic targets are locked and
  /// snapshotted, and the optimistic edits are written before the request
  /// goes out. On success the server's answer is reconciled into the cache
  /// and dependent queries are invalidated. On failure every touched entry
  /// is restored before the error is reported.
  pub async fn mutate<I, O>(&self, mutation: &Mutation<I, O>, input: I) -> Result<O, SyncError>
  where
    I: Clone + Send + Sync + 'static,
    O: Send + Sync + 'static,
  {
    let span = info_span!("mutation", name = mutation.name);
    self.run_mutation(mutation, input).instrument(span).await
  }

  async fn run_mutation<I, O>(&self, mutation: &Mutation<I, O>, input: I) -> Result<O, SyncError>
  where
    I: Clone + Send + Sync + 'static,
    O: Send + Sync + 'static,
  {
    if let Some(validate) = &mutation.validate {
      if let Err(err) = validate(&input) {
        debug!(error = %err, "validation failed");
        let err = SyncError::from(err);
        self.notify_failure(mutation, &err);
        return Err(err);
      }
    }

    let store = self.store();
    let targets = mutation
      .targets
      .as_ref()
      .map(|targets| targets(&input))
      .unwrap_or_default();
    let identities = self.target_identities(&targets);
    let _guard = self.locks.acquire(&identities).await;

    let snapshot = if let Some(apply) = &mutation.apply {
      for filter in &targets {
        store.cancel_fetches(filter);
      }
      let mut txn = CacheTxn::new(store, store.snapshot(&identities));
      apply(&input, &mut txn);
      debug!(targets = identities.len(), "applied optimistic update");
      txn.into_snapshot()
    } else {
      Default::default()
    };

    let retry = mutation
      .retry
      .clone()
      .unwrap_or_else(|| self.defaults().mutation_retry.clone());
    let delay = mutation
      .retry_delay
      .unwrap_or(self.defaults().mutation_retry_delay);
    let result = retry_async(&retry, delay, || (mutation.execute)(input.clone()), || true).await;

    match result {
      Ok(output) => {
        if mutation.policy == OptimisticPolicy::Reconcile {
          for filter in &targets {
            store.invalidate(filter);
          }
        }
        if let Some(on_success) = &mutation.on_success {
          let mut txn = CacheTxn::new(store, Default::default());
          on_success(&output, &input, &mut txn);
        }
        if let Some(invalidates) = &mutation.invalidates {
          for filter in invalidates(&output, &input) {
            store.invalidate(&filter);
          }
        }
        info!("mutation succeeded");
        if let Some((title, message)) = &mutation.success_message {
          self.notifier().notify(Notification::success(title, message));
        }
        Ok(output)
      }
      Err(err) => {
        if !snapshot.is_empty() {
          warn!(error = %err, entries = snapshot.len(), "rolling back optimistic update");
          store.restore(snapshot);
        } else {
          warn!(error = %err, "mutation failed");
        }
        self.notify_failure(mutation, &err);
        Err(err)
      }
    }
  }

  /// Concrete identities behind the optimistic targets. Exact targets count
  /// even when nothing is cached under them yet.
  fn target_identities(&self, targets: &[QueryFilter]) -> Vec<QueryIdentity> {
    let mut out: Vec<QueryIdentity> = Vec::new();
    for filter in targets {
      let found = match filter.exact() {
        Some(id) => vec![id.clone()],
        None => self.store().matching(filter),
      };
      for id in found {
        if !out.contains(&id) {
          out.push(id);
        }
      }
    }
    out
  }

  fn notify_failure<I, O>(&self, mutation: &Mutation<I, O>, err: &SyncError) {
    self
      .notifier()
      .notify(Notification::error(&mutation.failure_title, err.to_string()));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::QueryStatus;
  use crate::notify::{Level, RecordingNotifier};
  use crate::validate;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  fn recording_client() -> (QueryClient, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let client = QueryClient::default().with_notifier(notifier.clone());
    (client, notifier)
  }

  fn list() -> QueryIdentity {
    QueryIdentity::new("items").with("list")
  }

  fn detail(id: i64) -> QueryIdentity {
    QueryIdentity::new("items").with("detail").with(id)
  }

  fn prepend(input: &i64, txn: &mut CacheTxn<'_>) {
    let input = *input;
    txn.update_matching::<Vec<i64>, _>(&QueryFilter::Exact(list()), |items| {
      let mut next = vec![input];
      next.extend(items);
      next
    });
    txn.set(&detail(input), input);
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_mutation_rolls_back_every_target() {
    let (client, notifier) = recording_client();
    client.set_query_data(&list(), vec![1i64, 2]);

    let mutation: Mutation<i64, ()> = Mutation::new("add item", |_| async {
      Err(SyncError::rejected("Title is required"))
    })
    .optimistic(|_| vec![QueryFilter::Exact(list())], prepend);

    let store = client.store();
    let before = store.get::<Vec<i64>>(&list()).unwrap();
    let result = client.mutate(&mutation, -1000).await;

    assert_eq!(result, Err(SyncError::rejected("Title is required")));
    let after = store.get::<Vec<i64>>(&list()).unwrap();
    assert!(Arc::ptr_eq(before.data.as_ref().unwrap(), after.data.as_ref().unwrap()));
    assert_eq!(after.status, QueryStatus::Success);
    assert!(!store.contains(&detail(-1000)));

    let seen = notifier.take();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].level, Level::Error);
    assert_eq!(seen[0].message, "Title is required");
  }

  #[tokio::test(start_paused = true)]
  async fn test_optimistic_write_visible_before_response() {
    let client = QueryClient::default();
    client.set_query_data(&list(), vec![1i64]);

    let observed = Arc::new(std::sync::Mutex::new(None));
    let mutation: Mutation<i64, i64> = {
      let client = client.clone();
      let observed = observed.clone();
      Mutation::new("add item", move |id| {
        let seen = client.store().get_data::<Vec<i64>>(&list());
        *observed.lock().unwrap() = seen.map(|v| (*v).clone());
        async move { Ok(id) }
      })
      .optimistic(|_| vec![QueryFilter::Exact(list())], prepend)
      .policy(OptimisticPolicy::KeepOptimistic)
    };

    client.mutate(&mutation, -5).await.unwrap();

    assert_eq!(*observed.lock().unwrap(), Some(vec![-5, 1]));
    let entry = client.store().get::<Vec<i64>>(&list()).unwrap();
    assert_eq!(entry.data.as_deref(), Some(&vec![-5, 1]));
    assert!(!entry.invalidated);
  }

  #[tokio::test(start_paused = true)]
  async fn test_reconcile_invalidates_targets() {
    let client = QueryClient::default();
    client.set_query_data(&list(), vec![1i64]);

    let mutation: Mutation<i64, i64> = Mutation::new("add item", |id| async move { Ok(id) })
      .optimistic(|_| vec![QueryFilter::Exact(list())], prepend);
    client.mutate(&mutation, 3).await.unwrap();

    let entry = client.store().get::<Vec<i64>>(&list()).unwrap();
    assert_eq!(entry.data.as_deref(), Some(&vec![3, 1]));
    assert!(entry.is_stale());
  }

  #[tokio::test(start_paused = true)]
  async fn test_validation_blocks_network_call() {
    let (client, notifier) = recording_client();
    let calls = Arc::new(AtomicU32::new(0));
    let mutation: Mutation<String, ()> = {
      let calls = calls.clone();
      Mutation::new("rename", move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Ok(()) }
      })
      .validate(|name: &String| validate::required("name", name))
    };

    let result = client.mutate(&mutation, "  ".to_string()).await;

    assert!(matches!(result, Err(SyncError::Validation(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(notifier.take()[0].message, "name is required");
  }

  #[tokio::test(start_paused = true)]
  async fn test_success_writes_and_invalidations() {
    let (client, notifier) = recording_client();
    client.set_query_data(&list(), vec![1i64, 2]);
    client.set_query_data(&detail(2), 2i64);
    client.set_query_data(&QueryIdentity::new("other"), 0u8);

    let mutation: Mutation<i64, ()> = Mutation::new("delete item", |_| async { Ok(()) })
      .on_success(|_, id, txn| {
        txn.remove(&detail(*id));
        txn.update_matching::<Vec<i64>, _>(&QueryFilter::Exact(list()), |items| {
          items.iter().copied().filter(|i| i != id).collect()
        });
      })
      .invalidates(|_, _| vec![QueryFilter::token("other")])
      .success_message("Deleted", "Item removed");

    client.mutate(&mutation, 2).await.unwrap();

    let store = client.store();
    assert!(!store.contains(&detail(2)));
    assert_eq!(store.get_data::<Vec<i64>>(&list()).as_deref(), Some(&vec![1]));
    assert!(store.get::<u8>(&QueryIdentity::new("other")).unwrap().is_stale());
    assert_eq!(notifier.take(), vec![Notification::success("Deleted", "Item removed")]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_transient_failure_retried_once() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicU32::new(0));
    let mutation: Mutation<(), u32> = {
      let calls = calls.clone();
      Mutation::new("flaky", move |_| {
        let attempt = calls.fetch_add(1, Ordering::SeqCst);
        async move {
          if attempt == 0 {
            Err(SyncError::transient("timeout"))
          } else {
            Ok(attempt)
          }
        }
      })
    };

    assert_eq!(client.mutate(&mutation, ()).await, Ok(1));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_mutation_cancels_inflight_read() {
    let client = QueryClient::default();
    client.set_query_data(&list(), vec![1i64]);
    client.invalidate(list());

    let slow_read = {
      let client = client.clone();
      tokio::spawn(async move {
        let options = client.query_options();
        client
          .fetch_query(&list(), &options, || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, SyncError>(vec![100i64])
          })
          .await
      })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let mutation: Mutation<i64, i64> = Mutation::new("add item", |id| async move { Ok(id) })
      .optimistic(|_| vec![QueryFilter::Exact(list())], prepend)
      .policy(OptimisticPolicy::KeepOptimistic);
    client.mutate(&mutation, -7).await.unwrap();
    slow_read.await.unwrap();

    assert_eq!(
      client.store().get_data::<Vec<i64>>(&list()).as_deref(),
      Some(&vec![-7, 1])
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_disjoint_mutations_run_concurrently() {
    let client = QueryClient::default();
    let slow: Mutation<(), ()> = Mutation::new("slow", |_| async {
      tokio::time::sleep(Duration::from_secs(10)).await;
      Ok(())
    })
    .optimistic(|_| vec![QueryFilter::Exact(QueryIdentity::new("a"))], |_, _| {});
    let fast: Mutation<(), ()> = Mutation::new("fast", |_| async { Ok(()) })
      .optimistic(|_| vec![QueryFilter::Exact(QueryIdentity::new("b"))], |_, _| {});

    let pending = {
      let client = client.clone();
      tokio::spawn(async move { client.mutate(&slow, ()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let done = tokio::time::timeout(Duration::from_secs(1), client.mutate(&fast, ())).await;
    assert_eq!(done, Ok(Ok(())));
    assert!(!pending.is_finished());
    pending.await.unwrap().unwrap();
  }
}
