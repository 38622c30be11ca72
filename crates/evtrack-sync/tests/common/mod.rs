//! Shared fixtures for tracker integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use evtrack_core::BatchPayload;
use evtrack_db::{DbError, DbResult, KeyValueStore, MemoryStore};
use evtrack_sync::{
    Tracker, TrackerConfig, TrackerError, TrackerEventEmitter, TrackerResult, TrackerStatus,
    Transport,
};
use tokio::sync::{Mutex, Notify};

pub const URL: &str = "https://collector.example.com";
pub const ENDPOINT: &str = "https://collector.example.com/events/batch_track";

// =============================================================================
// Transport double
// =============================================================================

/// Records every send. Can be switched to fail, or to hold sends until
/// released.
#[derive(Default)]
pub struct RecordingTransport {
    attempts: Mutex<Vec<(String, BatchPayload)>>,
    delivered: Mutex<Vec<BatchPayload>>,
    failing: AtomicBool,
    holding: AtomicBool,
    release: Notify,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Subsequent sends wait for [`RecordingTransport::release`].
    pub fn set_holding(&self, holding: bool) {
        self.holding.store(holding, Ordering::SeqCst);
    }

    /// Lets one held send complete.
    pub fn release(&self) {
        self.release.notify_one();
    }

    pub async fn attempts(&self) -> Vec<(String, BatchPayload)> {
        self.attempts.lock().await.clone()
    }

    pub async fn attempt_count(&self) -> usize {
        self.attempts.lock().await.len()
    }

    pub async fn delivered(&self) -> Vec<BatchPayload> {
        self.delivered.lock().await.clone()
    }

    pub async fn delivered_count(&self) -> usize {
        self.delivered.lock().await.len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, endpoint: &str, payload: &BatchPayload) -> TrackerResult<()> {
        self.attempts
            .lock()
            .await
            .push((endpoint.to_string(), payload.clone()));

        if self.holding.load(Ordering::SeqCst) {
            self.release.notified().await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(TrackerError::ConnectionFailed("collector unreachable".into()));
        }

        self.delivered.lock().await.push(payload.clone());
        Ok(())
    }
}

// =============================================================================
// Storage double
// =============================================================================

/// Reads succeed (always empty), writes always fail.
#[derive(Default)]
pub struct ReadOnlyStore;

#[async_trait]
impl KeyValueStore for ReadOnlyStore {
    async fn get(&self, _key: &str) -> DbResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> DbResult<()> {
        Err(DbError::QueryFailed("attempt to write a readonly database".into()))
    }

    async fn remove(&self, _key: &str) -> DbResult<()> {
        Err(DbError::QueryFailed("attempt to write a readonly database".into()))
    }
}

// =============================================================================
// Emitter double
// =============================================================================

#[derive(Default)]
pub struct RecordingEmitter {
    pub statuses: std::sync::Mutex<Vec<TrackerStatus>>,
    pub flushes: std::sync::Mutex<Vec<(usize, usize)>>,
    pub errors: std::sync::Mutex<Vec<(String, bool)>>,
}

impl TrackerEventEmitter for RecordingEmitter {
    fn emit_status(&self, status: &TrackerStatus) {
        self.statuses.lock().unwrap().push(status.clone());
    }

    fn emit_flush(&self, sent: usize, pending: usize) {
        self.flushes.lock().unwrap().push((sent, pending));
    }

    fn emit_error(&self, message: &str, retryable: bool) {
        self.errors.lock().unwrap().push((message.to_string(), retryable));
    }
}

// =============================================================================
// Tracker fixtures
// =============================================================================

/// Persistent storage plus the transport, so tests can "reload" the page by
/// building a second tracker over the same persistent store.
pub struct Harness {
    pub storage: Arc<MemoryStore>,
    pub transport: Arc<RecordingTransport>,
}

impl Harness {
    pub fn new() -> Self {
        Harness {
            storage: Arc::new(MemoryStore::new()),
            transport: RecordingTransport::new(),
        }
    }

    /// A tracker in a fresh session over the shared persistent store.
    pub fn tracker(&self) -> Tracker {
        self.tracker_with(TrackerConfig::new(URL))
    }

    pub fn tracker_with(&self, config: TrackerConfig) -> Tracker {
        Tracker::builder(config)
            .with_storage(self.storage.clone())
            .with_session_storage(Arc::new(MemoryStore::new()))
            .with_transport(self.transport.clone())
            .build()
            .unwrap()
    }
}
