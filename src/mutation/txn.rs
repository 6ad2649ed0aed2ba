use std::sync::Arc;

use crate::cache::{CacheStore, QueryFilter, QueryIdentity, Snapshot};

/// Cache writes made on behalf of one mutation.
///
/// Every identity is captured into the mutation's snapshot before its first
/// write, so a rollback restores everything the mutation touched, including
/// entries that did not exist before.
pub struct CacheTxn<'a> {
  store: &'a CacheStore,
  snapshot: Snapshot,
}

impl<'a> CacheTxn<'a> {
  pub(crate) fn new(store: &'a CacheStore, snapshot: Snapshot) -> Self {
    Self { store, snapshot }
  }

  pub(crate) fn into_snapshot(self) -> Snapshot {
    self.snapshot
  }

  fn capture(&mut self, identities: &[QueryIdentity]) {
    let missing: Vec<QueryIdentity> = identities
      .iter()
      .filter(|id| !self.snapshot.contains(id))
      .cloned()
      .collect();
    if !missing.is_empty() {
      let extra = self.store.snapshot(&missing);
      self.snapshot.merge(extra);
    }
  }

  pub fn get<T: Send + Sync + 'static>(&self, identity: &QueryIdentity) -> Option<Arc<T>> {
    self.store.get_data(identity)
  }

  pub fn set<T: Send + Sync + 'static>(&mut self, identity: &QueryIdentity, data: T) {
    self.capture(std::slice::from_ref(identity));
    self.store.set(identity, data);
  }

  pub fn update<T, F>(&mut self, identity: &QueryIdentity, f: F) -> bool
  where
    T: Send + Sync + 'static,
    F: FnOnce(Option<&T>) -> Option<T>,
  {
    self.capture(std::slice::from_ref(identity));
    self.store.update(identity, f)
  }

  pub fn update_matching<T, F>(&mut self, filter: &QueryFilter, f: F) -> Vec<QueryIdentity>
  where
    T: Send + Sync + 'static,
    F: FnMut(&T) -> T,
  {
    let ids = self.store.matching(filter);
    self.capture(&ids);
    self.store.update_matching(filter, f)
  }

  pub fn remove(&mut self, identity: &QueryIdentity) -> bool {
    self.capture(std::slice::from_ref(identity));
    self.store.remove(identity)
  }

  pub fn invalidate(&mut self, filter: &QueryFilter) -> usize {
    let ids = self.store.matching(filter);
    self.capture(&ids);
    self.store.invalidate(filter)
  }

  /// Identities captured so far.
  pub fn touched(&self) -> impl Iterator<Item = &QueryIdentity> {
    self.snapshot.identities()
  }
}
