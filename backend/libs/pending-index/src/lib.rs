//! Keyed store shared between concurrent calls
//!
//! Used by subsystems next to the RPC pipeline to track in-flight work, e.g.
//! webhook deliveries awaiting a callback or call status by correlation id.
//!
//! Discipline:
//! - reads run concurrently with each other
//! - a write excludes every other reader and writer while it runs
//! - `get`, `set` and `delete` are individually atomic; nothing else is ordered
//!
//! There is no global instance. The owner builds one and hands out
//! `Arc<dyn PendingIndex<V>>` clones.

mod memory;

pub use memory::InMemoryPendingIndex;

use async_trait::async_trait;

#[async_trait]
pub trait PendingIndex<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Current value for `key`, if any
    async fn get(&self, key: &str) -> Option<V>;

    /// Insert or replace; returns the previous value
    async fn set(&self, key: &str, value: V) -> Option<V>;

    /// Remove; returns the removed value
    async fn delete(&self, key: &str) -> Option<V>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
