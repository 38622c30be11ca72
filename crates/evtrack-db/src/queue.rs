//! # Durable Queue
//!
//! FIFO of undelivered events stored under `<name>::Queue`.
//!
//! ## Modes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Persistent ──── storage read/write fails ────► Degraded               │
//! │   (every op reads and                            (in-memory Vec,        │
//! │    rewrites the stored                            seeded from the last  │
//! │    JSON array)                                    readable contents +   │
//! │                                                   the pending write)    │
//! │                                                                         │
//! │   There is no way back: a degraded instance stays in memory until it   │
//! │   is dropped. Events queued while degraded are lost on reload.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Storage is re-read on every operation, so two instances over the same
//! store and name observe each other's writes. Within one instance the
//! read-modify-write cycles are serialized by an async mutex.

use std::fmt;
use std::sync::Arc;

use evtrack_core::{Event, StorageKeys};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::store::{read_json, write_json, KeyValueStore};

#[derive(Debug, Default)]
struct QueueState {
    /// Set once storage has failed; holds the queue from then on.
    fallback: Option<Vec<Event>>,

    /// Last contents successfully read from or written to storage.
    last_known: Vec<Event>,
}

/// Ordered, persisted queue of tracked events.
pub struct DurableQueue {
    key: String,
    store: Arc<dyn KeyValueStore>,
    state: Mutex<QueueState>,
}

impl fmt::Debug for DurableQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurableQueue")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl DurableQueue {
    /// Creates the queue for tracker `name` over `store`.
    pub fn new(name: &str, store: Arc<dyn KeyValueStore>) -> Self {
        DurableQueue {
            key: StorageKeys::for_tracker(name).queue,
            store,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Storage key holding the queue.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Appends `event` and persists the queue.
    ///
    /// Never fails visibly. A storage failure switches this instance to its
    /// in-memory fallback with the event included.
    pub async fn enqueue(&self, event: Event) {
        let mut state = self.state.lock().await;

        if let Some(events) = state.fallback.as_mut() {
            events.push(event);
            debug!(key = %self.key, pending = events.len(), "Event queued in memory");
            return;
        }

        let mut events = match self.load().await {
            Ok(events) => events,
            Err(e) => {
                let mut seed = state.last_known.clone();
                seed.push(event);
                self.degrade(&mut state, seed, &e);
                return;
            }
        };

        events.push(event);

        match write_json(&*self.store, &self.key, &events).await {
            Ok(()) => {
                debug!(key = %self.key, pending = events.len(), "Event queued");
                state.last_known = events;
            }
            Err(e) => self.degrade(&mut state, events, &e),
        }
    }

    /// Current contents in queue order. Does not modify the queue.
    pub async fn snapshot(&self) -> Vec<Event> {
        let mut state = self.state.lock().await;

        if let Some(events) = &state.fallback {
            return events.clone();
        }

        match self.load().await {
            Ok(events) => {
                state.last_known = events.clone();
                events
            }
            Err(e) => {
                let seed = state.last_known.clone();
                self.degrade(&mut state, seed.clone(), &e);
                seed
            }
        }
    }

    /// Removes the first `n` entries, after their delivery was confirmed.
    ///
    /// Entries queued after the delivered snapshot stay in place.
    pub async fn remove_prefix(&self, n: usize) {
        if n == 0 {
            return;
        }

        let mut state = self.state.lock().await;

        if let Some(events) = state.fallback.as_mut() {
            let n = n.min(events.len());
            events.drain(..n);
            return;
        }

        let mut events = match self.load().await {
            Ok(events) => events,
            Err(e) => {
                let mut seed = state.last_known.clone();
                let n = n.min(seed.len());
                seed.drain(..n);
                self.degrade(&mut state, seed, &e);
                return;
            }
        };

        let n = n.min(events.len());
        events.drain(..n);

        match write_json(&*self.store, &self.key, &events).await {
            Ok(()) => {
                debug!(key = %self.key, removed = n, pending = events.len(), "Delivered events removed");
                state.last_known = events;
            }
            Err(e) => self.degrade(&mut state, events, &e),
        }
    }

    /// Number of queued events.
    pub async fn len(&self) -> usize {
        self.snapshot().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether this instance has fallen back to memory.
    pub async fn is_degraded(&self) -> bool {
        self.state.lock().await.fallback.is_some()
    }

    async fn load(&self) -> DbResult<Vec<Event>> {
        Ok(read_json(&*self.store, &self.key).await?.unwrap_or_default())
    }

    fn degrade(&self, state: &mut QueueState, seed: Vec<Event>, error: &DbError) {
        warn!(
            key = %self.key,
            pending = seed.len(),
            error = %error,
            "Queue storage unavailable, continuing in memory"
        );
        state.fallback = Some(seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use evtrack_core::Properties;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// MemoryStore whose writes can be switched off.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> DbResult<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> DbResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(DbError::QueryFailed("disk full".into()));
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> DbResult<()> {
            self.inner.remove(key).await
        }
    }

    fn event(event_type: &str) -> Event {
        Event::new(event_type, Properties::new())
    }

    fn types(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.event_type.as_str()).collect()
    }

    #[tokio::test]
    async fn test_enqueue_preserves_order() {
        let queue = DurableQueue::new("t", Arc::new(MemoryStore::new()));
        assert!(queue.is_empty().await);

        queue.enqueue(event("a")).await;
        queue.enqueue(event("b")).await;
        queue.enqueue(event("c")).await;

        assert_eq!(types(&queue.snapshot().await), vec!["a", "b", "c"]);
        assert_eq!(queue.len().await, 3);
        assert_eq!(queue.key(), "t::Queue");
    }

    #[tokio::test]
    async fn test_remove_prefix_keeps_later_entries() {
        let queue = DurableQueue::new("t", Arc::new(MemoryStore::new()));
        queue.enqueue(event("a")).await;
        queue.enqueue(event("b")).await;

        let snapshot = queue.snapshot().await;
        queue.enqueue(event("c")).await;
        queue.remove_prefix(snapshot.len()).await;

        assert_eq!(types(&queue.snapshot().await), vec!["c"]);

        queue.remove_prefix(10).await;
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_instances_with_same_name_share_queue() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let first = DurableQueue::new("shared", store.clone());
        let second = DurableQueue::new("shared", store.clone());
        let other = DurableQueue::new("other", store);

        first.enqueue(event("a")).await;
        second.enqueue(event("b")).await;

        assert_eq!(types(&first.snapshot().await), vec!["a", "b"]);
        assert!(other.is_empty().await);
    }

    #[tokio::test]
    async fn test_write_failure_degrades_without_loss() {
        let store = Arc::new(FlakyStore::default());
        let queue = DurableQueue::new("t", store.clone());

        queue.enqueue(event("a")).await;
        store.fail_writes.store(true, Ordering::SeqCst);
        queue.enqueue(event("b")).await;

        assert!(queue.is_degraded().await);
        assert_eq!(types(&queue.snapshot().await), vec!["a", "b"]);

        // Stays in memory after storage recovers.
        store.fail_writes.store(false, Ordering::SeqCst);
        queue.enqueue(event("c")).await;
        assert!(queue.is_degraded().await);
        assert_eq!(types(&queue.snapshot().await), vec!["a", "b", "c"]);

        let stored: Vec<Event> = read_json(&*store, "t::Queue").await.unwrap().unwrap();
        assert_eq!(types(&stored), vec!["a"]);
    }

    #[tokio::test]
    async fn test_corrupt_value_degrades() {
        let store = Arc::new(MemoryStore::new());
        store.set("t::Queue", "{\"not\":\"an array\"}").await.unwrap();

        let queue = DurableQueue::new("t", store);
        queue.enqueue(event("a")).await;

        assert!(queue.is_degraded().await);
        assert_eq!(types(&queue.snapshot().await), vec!["a"]);
    }

    #[tokio::test]
    async fn test_closed_database_degrades() {
        let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
        let queue = DurableQueue::new("t", db.clone());

        queue.enqueue(event("a")).await;
        assert!(!queue.is_degraded().await);

        db.close().await;
        queue.enqueue(event("b")).await;

        assert!(queue.is_degraded().await);
        assert_eq!(types(&queue.snapshot().await), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");

        {
            let db = Arc::new(Database::new(DbConfig::new(&path)).await.unwrap());
            let queue = DurableQueue::new("t", db.clone());
            queue
                .enqueue(Event::new("submission", Properties::new().with("a", "b")))
                .await;
            db.close().await;
        }

        let db = Arc::new(Database::new(DbConfig::new(&path)).await.unwrap());
        let queue = DurableQueue::new("t", db);
        let events = queue.snapshot().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].properties.get("a"), Some(&serde_json::json!("b")));
    }
}
