//! Key-addressed invalidation registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use super::query::GatedQuery;

/// Cache keys for the reads the gate depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// Usage snapshot for a user.
    Usage(Uuid),
    /// Character profile for a user.
    Profile(Uuid),
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usage(user) => write!(f, "usage:{user}"),
            Self::Profile(user) => write!(f, "profile:{user}"),
        }
    }
}

/// Anything that can be invalidated by key.
pub trait Invalidate: Send + Sync {
    fn invalidate(&self);
}

impl<T: Clone + Send + Sync + 'static> Invalidate for GatedQuery<T> {
    fn invalidate(&self) {
        GatedQuery::invalidate(self);
    }
}

/// Registry mapping keys to live query slots.
///
/// Invalidation by key is the only mutation contract exposed to the rest of
/// the app: after a profile-mutating action elsewhere, invalidating
/// `QueryKey::Profile(user)` forces a fresh read on the next render.
#[derive(Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<QueryKey, Arc<dyn Invalidate>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, key: QueryKey, query: Arc<dyn Invalidate>) {
        self.entries.lock().unwrap().insert(key, query);
    }

    pub fn deregister(&self, key: &QueryKey) {
        self.entries.lock().unwrap().remove(key);
    }

    /// Invalidate the slot registered under `key`. Unknown keys are a no-op.
    pub fn invalidate(&self, key: &QueryKey) {
        let entry = self.entries.lock().unwrap().get(key).cloned();
        match entry {
            Some(query) => query.invalidate(),
            None => tracing::debug!(key = %key, "invalidate for unregistered key"),
        }
    }
}
