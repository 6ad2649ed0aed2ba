//! Process-wide in-memory cache addressed by [`QueryIdentity`].

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::entry::{CacheEntry, QueryStatus};
use super::identity::{QueryFilter, QueryIdentity};
use crate::error::SyncError;

type AnyData = Arc<dyn Any + Send + Sync>;

const EVENT_CAPACITY: usize = 256;

/// How long an unobserved entry is kept before it may be evicted.
pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(5 * 60);

/// What happened to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
  Loading,
  Updated,
  Failed,
  Invalidated,
  Removed,
  /// Entry restored from a mutation snapshot
  Restored,
}

/// Change notification published on every store mutation.
#[derive(Debug, Clone)]
pub struct CacheEvent {
  pub identity: QueryIdentity,
  pub kind: CacheEventKind,
}

/// Handle for one fetch attempt. Completing with a ticket that is no longer
/// current is a no-op, which is how superseded and cancelled fetches are dropped.
#[derive(Debug, Clone)]
pub struct FetchTicket {
  identity: QueryIdentity,
  generation: u64,
}

impl FetchTicket {
  pub fn identity(&self) -> &QueryIdentity {
    &self.identity
  }
}

struct Slot {
  data: Option<AnyData>,
  status: QueryStatus,
  error: Option<SyncError>,
  fetched_at: Option<Instant>,
  stale_time: Duration,
  invalidated: bool,
  /// Last generation handed out for this identity
  generation: u64,
  /// Generation of the fetch currently tracked, if any
  in_flight: Option<u64>,
  status_before_fetch: QueryStatus,
  /// Last write, or when the last observer went away
  last_active: Instant,
}

impl Slot {
  fn new(stale_time: Duration) -> Self {
    Self {
      data: None,
      status: QueryStatus::Idle,
      error: None,
      fetched_at: None,
      stale_time,
      invalidated: false,
      generation: 0,
      in_flight: None,
      status_before_fetch: QueryStatus::Idle,
      last_active: Instant::now(),
    }
  }

  fn write(&mut self, data: AnyData, now: Instant) {
    self.data = Some(data);
    self.status = QueryStatus::Success;
    self.error = None;
    self.fetched_at = Some(now);
    self.invalidated = false;
    self.last_active = now;
  }

  fn is_fresh(&self, now: Instant) -> bool {
    self.data.is_some()
      && !self.invalidated
      && self
        .fetched_at
        .is_some_and(|at| now.saturating_duration_since(at) <= self.stale_time)
  }

  /// Track a new fetch and return its generation.
  fn begin(&mut self) -> u64 {
    if self.in_flight.is_none() {
      self.status_before_fetch = self.status;
    }
    self.generation += 1;
    self.in_flight = Some(self.generation);
    self.status = QueryStatus::Loading;
    self.generation
  }

  /// Drop tracking of any in-flight fetch and revert to the pre-fetch status.
  fn cancel(&mut self) -> bool {
    self.generation += 1;
    if self.in_flight.take().is_some() {
      if self.status == QueryStatus::Loading {
        self.status = self.status_before_fetch;
      }
      return true;
    }
    false
  }

  fn typed<T: Send + Sync + 'static>(&self, identity: &QueryIdentity) -> CacheEntry<T> {
    let data = self.data.as_ref().and_then(|d| match Arc::clone(d).downcast::<T>() {
      Ok(typed) => Some(typed),
      Err(_) => {
        warn!(query = %identity, "cached value has a different type than requested");
        None
      }
    });
    CacheEntry {
      data,
      status: self.status,
      error: self.error.clone(),
      fetched_at: self.fetched_at,
      stale_time: self.stale_time,
      invalidated: self.invalidated,
    }
  }
}

/// Exact copy of the observable state of a slot, or its absence.
#[derive(Clone)]
struct SlotSnapshot {
  data: Option<AnyData>,
  status: QueryStatus,
  error: Option<SyncError>,
  fetched_at: Option<Instant>,
  stale_time: Duration,
  invalidated: bool,
}

/// Captured state of a set of identities, restorable in one step.
#[derive(Clone, Default)]
pub struct Snapshot {
  entries: Vec<(QueryIdentity, Option<SlotSnapshot>)>,
}

impl Snapshot {
  pub fn identities(&self) -> impl Iterator<Item = &QueryIdentity> {
    self.entries.iter().map(|(id, _)| id)
  }

  pub fn contains(&self, identity: &QueryIdentity) -> bool {
    self.entries.iter().any(|(id, _)| id == identity)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Add entries from `other` whose identities are not captured yet.
  pub fn merge(&mut self, other: Snapshot) {
    for (id, snap) in other.entries {
      if !self.contains(&id) {
        self.entries.push((id, snap));
      }
    }
  }
}

/// In-memory cache shared by every query and mutation.
///
/// Only the coordinators write to it; any number of consumers may read. The
/// lock is never held across an await point.
///
/// Entries nobody observes are evicted once they have been inactive for
/// longer than `gc_time`. Eviction runs as a sweep on writes and fetch starts.
pub struct CacheStore {
  slots: Mutex<HashMap<QueryIdentity, Slot>>,
  /// Live bindings per identity. Locked after `slots` when both are needed.
  observers: Mutex<HashMap<QueryIdentity, usize>>,
  events: broadcast::Sender<CacheEvent>,
  default_stale_time: Duration,
  gc_time: Duration,
}

impl CacheStore {
  pub fn new(default_stale_time: Duration) -> Self {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Self {
      slots: Mutex::new(HashMap::new()),
      observers: Mutex::new(HashMap::new()),
      events,
      default_stale_time,
      gc_time: DEFAULT_GC_TIME,
    }
  }

  pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
    self.gc_time = gc_time;
    self
  }

  pub fn default_stale_time(&self) -> Duration {
    self.default_stale_time
  }

  pub fn gc_time(&self) -> Duration {
    self.gc_time
  }

  fn slots(&self) -> MutexGuard<'_, HashMap<QueryIdentity, Slot>> {
    self.slots.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn observers(&self) -> MutexGuard<'_, HashMap<QueryIdentity, usize>> {
    self.observers.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn publish(&self, identity: QueryIdentity, kind: CacheEventKind) {
    trace!(query = %identity, ?kind, "cache event");
    // No receivers is fine
    let _ = self.events.send(CacheEvent { identity, kind });
  }

  fn publish_all(&self, identities: Vec<QueryIdentity>, kind: CacheEventKind) {
    for identity in identities {
      self.publish(identity, kind);
    }
  }

  /// Subscribe to change notifications.
  pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
    self.events.subscribe()
  }

  pub fn get<T: Send + Sync + 'static>(&self, identity: &QueryIdentity) -> Option<CacheEntry<T>> {
    self.slots().get(identity).map(|slot| slot.typed(identity))
  }

  pub fn get_data<T: Send + Sync + 'static>(&self, identity: &QueryIdentity) -> Option<Arc<T>> {
    self.get::<T>(identity).and_then(|e| e.data)
  }

  pub fn status(&self, identity: &QueryIdentity) -> QueryStatus {
    self
      .slots()
      .get(identity)
      .map(|s| s.status)
      .unwrap_or_default()
  }

  pub fn contains(&self, identity: &QueryIdentity) -> bool {
    self.slots().contains_key(identity)
  }

  /// True once `invalidate` marked the entry and no write has cleared it.
  pub fn is_invalidated(&self, identity: &QueryIdentity) -> bool {
    self.slots().get(identity).is_some_and(|s| s.invalidated)
  }

  // ---------------------------------------------------------------------------
  // Observers and eviction
  // ---------------------------------------------------------------------------

  /// Register a live binding. Observed entries are never evicted.
  pub fn observe(&self, identity: &QueryIdentity) {
    *self.observers().entry(identity.clone()).or_insert(0) += 1;
  }

  /// Drop a binding registered with [`observe`](Self::observe). When the last
  /// one goes the entry's eviction clock starts.
  pub fn unobserve(&self, identity: &QueryIdentity) {
    let mut slots = self.slots();
    let mut observers = self.observers();
    let Some(count) = observers.get_mut(identity) else {
      return;
    };
    *count -= 1;
    if *count == 0 {
      observers.remove(identity);
      if let Some(slot) = slots.get_mut(identity) {
        slot.last_active = Instant::now();
      }
    }
  }

  pub fn observer_count(&self, identity: &QueryIdentity) -> usize {
    self.observers().get(identity).copied().unwrap_or(0)
  }

  /// Evict unobserved, idle entries inactive for longer than `gc_time`.
  fn collect_garbage(&self, slots: &mut HashMap<QueryIdentity, Slot>) -> Vec<QueryIdentity> {
    let observers = self.observers();
    let now = Instant::now();
    let expired: Vec<QueryIdentity> = slots
      .iter()
      .filter(|(id, slot)| {
        slot.in_flight.is_none()
          && !observers.contains_key(*id)
          && now.saturating_duration_since(slot.last_active) > self.gc_time
      })
      .map(|(id, _)| id.clone())
      .collect();
    for id in &expired {
      slots.remove(id);
    }
    expired
  }

  fn publish_evicted(&self, evicted: Vec<QueryIdentity>) {
    if !evicted.is_empty() {
      debug!(count = evicted.len(), "evicted unobserved cache entries");
    }
    self.publish_all(evicted, CacheEventKind::Removed);
  }

  /// Run an eviction sweep now.
  pub fn gc(&self) -> usize {
    let evicted = {
      let mut slots = self.slots();
      self.collect_garbage(&mut slots)
    };
    let count = evicted.len();
    self.publish_evicted(evicted);
    count
  }

  /// Set the freshness window for an identity, creating an idle slot if needed.
  pub fn configure(&self, identity: &QueryIdentity, stale_time: Duration) {
    let mut slots = self.slots();
    slots
      .entry(identity.clone())
      .or_insert_with(|| Slot::new(stale_time))
      .stale_time = stale_time;
  }

  /// Overwrite data and mark the entry fresh and successful.
  pub fn set<T: Send + Sync + 'static>(&self, identity: &QueryIdentity, data: T) {
    self.set_arc(identity, Arc::new(data));
  }

  pub fn set_arc<T: Send + Sync + 'static>(&self, identity: &QueryIdentity, data: Arc<T>) {
    let evicted = {
      let mut slots = self.slots();
      slots
        .entry(identity.clone())
        .or_insert_with(|| Slot::new(self.default_stale_time))
        .write(data, Instant::now());
      self.collect_garbage(&mut slots)
    };
    debug!(query = %identity, "cache set");
    self.publish(identity.clone(), CacheEventKind::Updated);
    self.publish_evicted(evicted);
  }

  /// Apply `f` to the current data. Returning `None` leaves the entry untouched.
  ///
  /// Read and write happen under one lock acquisition, so `f` must not call
  /// back into the store.
  pub fn update<T, F>(&self, identity: &QueryIdentity, f: F) -> bool
  where
    T: Send + Sync + 'static,
    F: FnOnce(Option<&T>) -> Option<T>,
  {
    let applied = {
      let mut slots = self.slots();
      let current = slots
        .get(identity)
        .and_then(|slot| slot.data.as_ref())
        .and_then(|d| Arc::clone(d).downcast::<T>().ok());
      match f(current.as_deref()) {
        Some(next) => {
          slots
            .entry(identity.clone())
            .or_insert_with(|| Slot::new(self.default_stale_time))
            .write(Arc::new(next), Instant::now());
          true
        }
        None => false,
      }
    };
    if applied {
      debug!(query = %identity, "cache update");
      self.publish(identity.clone(), CacheEventKind::Updated);
    }
    applied
  }

  /// Apply `f` to every matching entry that holds data of type `T`.
  pub fn update_matching<T, F>(&self, filter: &QueryFilter, mut f: F) -> Vec<QueryIdentity>
  where
    T: Send + Sync + 'static,
    F: FnMut(&T) -> T,
  {
    let mut touched = Vec::new();
    {
      let mut slots = self.slots();
      let now = Instant::now();
      for (id, slot) in slots.iter_mut().filter(|(id, _)| filter.matches(id)) {
        let Some(current) = slot.data.as_ref().and_then(|d| Arc::clone(d).downcast::<T>().ok()) else {
          continue;
        };
        slot.write(Arc::new(f(current.as_ref())), now);
        touched.push(id.clone());
      }
    }
    debug!(?filter, count = touched.len(), "cache update matching");
    self.publish_all(touched.clone(), CacheEventKind::Updated);
    touched
  }

  /// Identities currently present that match `filter`.
  pub fn matching(&self, filter: &QueryFilter) -> Vec<QueryIdentity> {
    self
      .slots()
      .keys()
      .filter(|id| filter.matches(id))
      .cloned()
      .collect()
  }

  /// Mark matching entries stale. Data is kept and no fetch is started here;
  /// bound queries react to the published event.
  pub fn invalidate(&self, filter: &QueryFilter) -> usize {
    let touched: Vec<QueryIdentity> = {
      let mut slots = self.slots();
      slots
        .iter_mut()
        .filter(|(id, _)| filter.matches(id))
        .map(|(id, slot)| {
          slot.invalidated = true;
          id.clone()
        })
        .collect()
    };
    debug!(?filter, count = touched.len(), "cache invalidate");
    let count = touched.len();
    self.publish_all(touched, CacheEventKind::Invalidated);
    count
  }

  /// Delete an entry entirely.
  pub fn remove(&self, identity: &QueryIdentity) -> bool {
    let removed = self.slots().remove(identity).is_some();
    if removed {
      debug!(query = %identity, "cache remove");
      self.publish(identity.clone(), CacheEventKind::Removed);
    }
    removed
  }

  pub fn remove_matching(&self, filter: &QueryFilter) -> usize {
    let removed: Vec<QueryIdentity> = {
      let mut slots = self.slots();
      let ids: Vec<QueryIdentity> = slots.keys().filter(|id| filter.matches(id)).cloned().collect();
      for id in &ids {
        slots.remove(id);
      }
      ids
    };
    let count = removed.len();
    self.publish_all(removed, CacheEventKind::Removed);
    count
  }

  // ---------------------------------------------------------------------------
  // Fetch bookkeeping
  // ---------------------------------------------------------------------------

  /// Start tracking a fetch: status becomes `Loading` with data left visible.
  /// Any earlier ticket for the same identity stops being current.
  pub fn begin_fetch(&self, identity: &QueryIdentity) -> FetchTicket {
    let (generation, evicted) = {
      let mut slots = self.slots();
      let generation = slots
        .entry(identity.clone())
        .or_insert_with(|| Slot::new(self.default_stale_time))
        .begin();
      (generation, self.collect_garbage(&mut slots))
    };
    self.fetch_started(identity, generation, evicted)
  }

  /// Like [`begin_fetch`](Self::begin_fetch), but only when no fetch for the
  /// identity is in flight. Check and start happen under one lock.
  pub fn begin_fetch_if_idle(&self, identity: &QueryIdentity) -> Option<FetchTicket> {
    self.start_fetch(identity, |slot, _| slot.in_flight.is_none())
  }

  /// Start a fetch unless one is in flight or the entry holds fresh data.
  pub fn begin_fetch_if_stale(&self, identity: &QueryIdentity) -> Option<FetchTicket> {
    self.start_fetch(identity, |slot, now| slot.in_flight.is_none() && !slot.is_fresh(now))
  }

  fn start_fetch<P>(&self, identity: &QueryIdentity, should_start: P) -> Option<FetchTicket>
  where
    P: FnOnce(&Slot, Instant) -> bool,
  {
    let (generation, evicted) = {
      let mut slots = self.slots();
      let slot = slots
        .entry(identity.clone())
        .or_insert_with(|| Slot::new(self.default_stale_time));
      if !should_start(slot, Instant::now()) {
        return None;
      }
      let generation = slot.begin();
      (generation, self.collect_garbage(&mut slots))
    };
    Some(self.fetch_started(identity, generation, evicted))
  }

  fn fetch_started(&self, identity: &QueryIdentity, generation: u64, evicted: Vec<QueryIdentity>) -> FetchTicket {
    self.publish(identity.clone(), CacheEventKind::Loading);
    self.publish_evicted(evicted);
    FetchTicket {
      identity: identity.clone(),
      generation,
    }
  }

  pub fn is_fetching(&self, identity: &QueryIdentity) -> bool {
    self
      .slots()
      .get(identity)
      .is_some_and(|s| s.in_flight.is_some())
  }

  pub fn is_current(&self, ticket: &FetchTicket) -> bool {
    self
      .slots()
      .get(&ticket.identity)
      .is_some_and(|s| s.in_flight == Some(ticket.generation))
  }

  /// Store a fetch result if the ticket is still current.
  pub fn complete_fetch<T: Send + Sync + 'static>(&self, ticket: &FetchTicket, data: T) -> bool {
    self.complete_fetch_arc(ticket, Arc::new(data))
  }

  pub fn complete_fetch_arc<T: Send + Sync + 'static>(&self, ticket: &FetchTicket, data: Arc<T>) -> bool {
    let applied = {
      let mut slots = self.slots();
      match slots.get_mut(&ticket.identity) {
        Some(slot) if slot.in_flight == Some(ticket.generation) => {
          slot.in_flight = None;
          slot.write(data, Instant::now());
          true
        }
        _ => false,
      }
    };
    if applied {
      self.publish(ticket.identity.clone(), CacheEventKind::Updated);
    } else {
      debug!(query = %ticket.identity, "dropping result of superseded fetch");
    }
    applied
  }

  /// Like [`complete_fetch`](Self::complete_fetch), but the stored value is
  /// built from the data present at completion time, under the same lock.
  pub fn complete_fetch_with<T, F>(&self, ticket: &FetchTicket, f: F) -> bool
  where
    T: Send + Sync + 'static,
    F: FnOnce(Option<&T>) -> T,
  {
    let applied = {
      let mut slots = self.slots();
      match slots.get_mut(&ticket.identity) {
        Some(slot) if slot.in_flight == Some(ticket.generation) => {
          let current = slot.data.as_ref().and_then(|d| Arc::clone(d).downcast::<T>().ok());
          let next = f(current.as_deref());
          slot.in_flight = None;
          slot.write(Arc::new(next), Instant::now());
          true
        }
        _ => false,
      }
    };
    if applied {
      self.publish(ticket.identity.clone(), CacheEventKind::Updated);
    } else {
      debug!(query = %ticket.identity, "dropping result of superseded fetch");
    }
    applied
  }

  /// Record a terminal fetch failure if the ticket is still current.
  pub fn fail_fetch(&self, ticket: &FetchTicket, error: SyncError) -> bool {
    let applied = {
      let mut slots = self.slots();
      match slots.get_mut(&ticket.identity) {
        Some(slot) if slot.in_flight == Some(ticket.generation) => {
          slot.in_flight = None;
          slot.status = QueryStatus::Error;
          slot.error = Some(error);
          true
        }
        _ => false,
      }
    };
    if applied {
      self.publish(ticket.identity.clone(), CacheEventKind::Failed);
    }
    applied
  }

  /// Stop tracking in-flight fetches for matching identities; their results
  /// will be ignored when they arrive.
  pub fn cancel_fetches(&self, filter: &QueryFilter) -> usize {
    let cancelled: Vec<QueryIdentity> = {
      let mut slots = self.slots();
      slots
        .iter_mut()
        .filter(|(id, _)| filter.matches(id))
        .filter_map(|(id, slot)| slot.cancel().then(|| id.clone()))
        .collect()
    };
    if !cancelled.is_empty() {
      debug!(?filter, count = cancelled.len(), "cancelled in-flight fetches");
    }
    let count = cancelled.len();
    self.publish_all(cancelled, CacheEventKind::Updated);
    count
  }

  // ---------------------------------------------------------------------------
  // Snapshots
  // ---------------------------------------------------------------------------

  pub fn snapshot(&self, identities: &[QueryIdentity]) -> Snapshot {
    let slots = self.slots();
    let entries = identities
      .iter()
      .map(|id| {
        let snap = slots.get(id).map(|slot| SlotSnapshot {
          data: slot.data.clone(),
          status: slot.status,
          error: slot.error.clone(),
          fetched_at: slot.fetched_at,
          stale_time: slot.stale_time,
          invalidated: slot.invalidated,
        });
        (id.clone(), snap)
      })
      .collect();
    Snapshot { entries }
  }

  /// Put every captured identity back exactly as it was. All entries are
  /// restored under a single lock acquisition.
  pub fn restore(&self, snapshot: Snapshot) {
    let restored: Vec<QueryIdentity> = {
      let mut slots = self.slots();
      snapshot
        .entries
        .into_iter()
        .map(|(id, snap)| {
          match snap {
            Some(snap) => {
              let slot = slots
                .entry(id.clone())
                .or_insert_with(|| Slot::new(snap.stale_time));
              slot.cancel();
              slot.data = snap.data;
              slot.status = snap.status;
              slot.error = snap.error;
              slot.fetched_at = snap.fetched_at;
              slot.stale_time = snap.stale_time;
              slot.invalidated = snap.invalidated;
              slot.last_active = Instant::now();
            }
            None => {
              slots.remove(&id);
            }
          }
          id
        })
        .collect()
    };
    debug!(count = restored.len(), "restored cache snapshot");
    self.publish_all(restored, CacheEventKind::Restored);
  }
}

impl Default for CacheStore {
  fn default() -> Self {
    Self::new(Duration::from_secs(120))
  }
}
