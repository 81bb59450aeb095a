use std::{collections::HashMap, time::Duration};

use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::trace;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// In-memory cache where every entry lives for the same fixed TTL
///
/// Expired entries are not swept; they are ignored on lookup and replaced
/// on the next insert under the same key. Concurrent writers race with
/// last-write-wins semantics.
///
/// Uses [`tokio::time::Instant`] so paused-time tests can move the clock.
pub struct TtlCache<V> {
    name: &'static str,
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    #[must_use]
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns a clone of the cached value if it has not expired yet
    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if Instant::now() >= entry.expires_at {
            trace!(cache = self.name, key, "Cache entry expired");
            return None;
        }

        Some(entry.value.clone())
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().insert(key.into(), entry);
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}
