use crate::PendingIndex;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// `PendingIndex` held in process memory
///
/// Entries never expire on their own; the owner calls `purge_older_than`
/// when it wants stale work dropped.
pub struct InMemoryPendingIndex<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V> Default for InMemoryPendingIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> InMemoryPendingIndex<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Drop entries inserted more than `age` ago; returns how many were removed
    pub async fn purge_older_than(&self, age: Duration) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.inserted_at) <= age);
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, remaining = entries.len(), "Purged stale pending entries");
        }
        purged
    }
}

#[async_trait]
impl<V> PendingIndex<V> for InMemoryPendingIndex<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        self.entries.read().await.get(key).map(|entry| entry.value.clone())
    }

    async fn set(&self, key: &str, value: V) -> Option<V> {
        let entry = Entry {
            value,
            inserted_at: Instant::now(),
        };
        self.entries
            .write()
            .await
            .insert(key.to_string(), entry)
            .map(|previous| previous.value)
    }

    async fn delete(&self, key: &str) -> Option<V> {
        self.entries.write().await.remove(key).map(|entry| entry.value)
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
