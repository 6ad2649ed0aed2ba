use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::cache::QueryIdentity;

/// One async lock per identity a mutation writes optimistically.
///
/// Mutations touching the same identity run one after another; mutations on
/// disjoint identities never wait on each other.
#[derive(Default)]
pub struct MutationLocks {
  locks: Mutex<HashMap<QueryIdentity, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one mutation. Dropping it releases every lock.
pub struct MutationGuard {
  held: Vec<OwnedMutexGuard<()>>,
}

impl MutationGuard {
  pub fn len(&self) -> usize {
    self.held.len()
  }

  pub fn is_empty(&self) -> bool {
    self.held.is_empty()
  }
}

impl MutationLocks {
  /// Acquire the locks for `identities`, always in the same global order so
  /// two mutations with overlapping targets cannot deadlock.
  pub async fn acquire(&self, identities: &[QueryIdentity]) -> MutationGuard {
    let mut keys: Vec<QueryIdentity> = identities.to_vec();
    keys.sort_by_cached_key(QueryIdentity::fingerprint);
    keys.dedup();

    let locks: Vec<Arc<AsyncMutex<()>>> = {
      let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
      // Drop locks nobody holds or waits on
      map.retain(|_, lock| Arc::strong_count(lock) > 1);
      keys
        .iter()
        .map(|id| Arc::clone(map.entry(id.clone()).or_default()))
        .collect()
    };

    let mut held = Vec::with_capacity(locks.len());
    for lock in locks {
      held.push(lock.lock_owned().await);
    }
    MutationGuard { held }
  }
}
