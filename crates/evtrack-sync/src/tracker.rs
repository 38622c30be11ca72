//! # Tracker
//!
//! Main orchestrator: accepts events, owns the identity lifecycle and drives
//! batch delivery.
//!
//! ## Tracker Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tracker Architecture                           │
//! │                                                                         │
//! │  track(type, props) ──► validate ──► DurableQueue.enqueue              │
//! │                                                                         │
//! │  identify / register ─► IdentityStore                                  │
//! │                                                                         │
//! │  Scheduler tick ──┐                                                     │
//! │  flush() ─────────┼──► single-flight slot (try_lock)                    │
//! │                   │        busy? ──► InFlight, queue untouched          │
//! │                   ▼                                                     │
//! │            snapshot (≤ max_batch_size) ──► enrich with current identity │
//! │                   │                                                     │
//! │                   ▼                                                     │
//! │            Transport.send within send_timeout                           │
//! │              ok ──► remove_prefix(snapshot_len)                         │
//! │              err ─► keep entries, log + emit error                      │
//! │                                                                         │
//! │  initialize() ──► enrich backlog with the outgoing identity            │
//! │                   ──► resolve_session ──► deliver backlog               │
//! │                                                                         │
//! │  STATUS EVENTS (TrackerEventEmitter):                                  │
//! │  emit_status - running / flushing / pending / degraded                  │
//! │  emit_flush  - { sent: 3, pending: 0 }                                  │
//! │  emit_error  - { message: "Connection failed", retryable: true }        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use evtrack_core::validation::validate_event_type;
use evtrack_core::{enrich_batch, ActiveIdentity, BatchPayload, Event, Properties};
use evtrack_db::{DurableQueue, IdentityStore, KeyValueStore, MemoryStore};

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::scheduler::Scheduler;
use crate::transport::{HttpTransport, Transport};

// =============================================================================
// Tracker Status
// =============================================================================

/// Current tracker status for external queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackerStatus {
    /// Whether the scheduler is running.
    pub running: bool,

    /// Whether a batch send is outstanding.
    pub flushing: bool,

    /// Number of queued events.
    pub pending_count: usize,

    /// Whether the queue has fallen back to memory.
    pub degraded: bool,

    /// Last successful delivery.
    pub last_flush_at: Option<DateTime<Utc>>,

    /// Last delivery error message, cleared by the next success.
    pub last_error: Option<String>,

    pub batches_sent: u64,
    pub events_sent: u64,
}

#[derive(Debug, Clone, Default)]
struct DeliveryStats {
    last_flush_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    batches_sent: u64,
    events_sent: u64,
}

// =============================================================================
// Flush Outcome
// =============================================================================

/// Result of one `flush` or `initialize` call.
#[derive(Debug)]
pub enum FlushOutcome {
    /// Nothing was queued; no request was made.
    Empty,

    /// Another delivery was outstanding; the queue was not touched.
    InFlight,

    /// `count` events were delivered and removed from the queue.
    Sent { count: usize },

    /// Delivery of `count` events failed; they remain queued.
    Failed { count: usize, error: TrackerError },
}

impl FlushOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, FlushOutcome::Sent { .. })
    }

    /// Number of events delivered by this call.
    pub fn sent_count(&self) -> usize {
        match self {
            FlushOutcome::Sent { count } => *count,
            _ => 0,
        }
    }

    /// Number of events this call tried to deliver.
    pub fn attempted_count(&self) -> usize {
        match self {
            FlushOutcome::Sent { count } | FlushOutcome::Failed { count, .. } => *count,
            FlushOutcome::Empty | FlushOutcome::InFlight => 0,
        }
    }

    pub fn error(&self) -> Option<&TrackerError> {
        match self {
            FlushOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives tracker lifecycle notifications (UI bridges, metrics adapters).
pub trait TrackerEventEmitter: Send + Sync {
    /// Emits a status change event.
    fn emit_status(&self, status: &TrackerStatus);

    /// Emits a delivery progress event.
    fn emit_flush(&self, sent: usize, pending: usize);

    /// Emits a delivery or lifecycle error.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter.
pub struct NoOpEmitter;

impl TrackerEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &TrackerStatus) {}
    fn emit_flush(&self, _sent: usize, _pending: usize) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Tracker
// =============================================================================

struct TrackerInner {
    name: String,
    endpoint: String,
    flush_interval: Duration,
    send_timeout: Duration,
    max_batch_size: usize,

    queue: DurableQueue,
    identity: IdentityStore,
    transport: Arc<dyn Transport>,
    scheduler: Scheduler,

    /// Single-flight slot; held for the duration of a send.
    flight: Mutex<()>,

    stats: RwLock<DeliveryStats>,
    emitter: Arc<dyn TrackerEventEmitter>,
}

/// Cloneable tracker handle. All clones share one instance.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("name", &self.inner.name)
            .field("endpoint", &self.inner.endpoint)
            .finish_non_exhaustive()
    }
}

impl Tracker {
    /// Starts building a tracker from `config`.
    pub fn builder(config: TrackerConfig) -> TrackerBuilder {
        TrackerBuilder::new(config)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Full batch endpoint, `{url}/events/batch_track`.
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    // =========================================================================
    // Event Intake
    // =========================================================================

    /// Queues an event. Never fails; invalid input is logged and dropped.
    ///
    /// Valid before `initialize` and before `start`.
    pub async fn track(&self, event_type: &str, properties: Properties) {
        if let Err(e) = validate_event_type(event_type) {
            warn!(name = %self.inner.name, error = %e, "Dropping invalid event");
            self.inner.emitter.emit_error(&e.to_string(), false);
            return;
        }

        self.inner
            .queue
            .enqueue(Event::new(event_type, properties))
            .await;
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Sets the identified user until the next `initialize`.
    ///
    /// Applies to events already queued as well as future ones.
    pub async fn identify(&self, user_id: &str, traits: Properties) -> TrackerResult<()> {
        self.inner.identity.identify(user_id, traits).await?;
        Ok(())
    }

    /// Merges traits into the generated identity.
    ///
    /// ## Errors
    /// [`TrackerError::NotInitialized`] before the first `initialize`.
    pub async fn register(&self, traits: Properties) -> TrackerResult<()> {
        self.inner.identity.register(&traits).await?;
        Ok(())
    }

    pub async fn current_identity(&self) -> TrackerResult<Option<ActiveIdentity>> {
        Ok(self.inner.identity.current_identity().await?)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Resolves the session and delivers any backlog.
    ///
    /// The backlog is enriched with the identity that was active before the
    /// session is resolved, so events queued under an identified user keep
    /// that user even though resolution clears it. The identified identity is
    /// cleared on every call.
    pub async fn initialize(&self) -> FlushOutcome {
        let guard = self.inner.flight.try_lock().ok();

        let backlog = if guard.is_some() {
            self.prepare_backlog().await
        } else {
            Ok(None)
        };

        if let Err(e) = self.inner.identity.resolve_session().await {
            let error = TrackerError::from(e);
            self.record_failure(&error).await;
            let count = match &backlog {
                Ok(payload) => payload.as_ref().map_or(0, BatchPayload::len),
                Err(outcome) => outcome.attempted_count(),
            };
            return FlushOutcome::Failed { count, error };
        }

        match (guard, backlog) {
            (None, _) => {
                debug!(name = %self.inner.name, "Delivery in flight, backlog left for next flush");
                FlushOutcome::InFlight
            }
            (Some(_), Err(outcome)) => outcome,
            (Some(_), Ok(None)) => FlushOutcome::Empty,
            (Some(_guard), Ok(Some(payload))) => {
                info!(name = %self.inner.name, count = payload.len(), "Delivering backlog");
                self.deliver(payload).await
            }
        }
    }

    /// Starts periodic flushing at the configured interval.
    ///
    /// Returns `false` if already running.
    pub async fn start(&self) -> bool {
        self.start_with_interval(self.inner.flush_interval).await
    }

    /// Starts periodic flushing every `period`.
    pub async fn start_with_interval(&self, period: Duration) -> bool {
        let weak = Arc::downgrade(&self.inner);

        let started = self
            .inner
            .scheduler
            .start(period, move || {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade() {
                        Tracker { inner }.flush().await;
                    }
                }
            })
            .await;

        if started {
            info!(
                name = %self.inner.name,
                period_ms = period.as_millis() as u64,
                "Tracker started"
            );
            self.emit_status().await;
        }
        started
    }

    /// Stops periodic flushing. Queued events stay queued.
    pub async fn stop(&self) -> bool {
        let stopped = self.inner.scheduler.stop().await;
        if stopped {
            info!(name = %self.inner.name, "Tracker stopped");
            self.emit_status().await;
        }
        stopped
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    /// Delivers the current queue contents as one batch.
    pub async fn flush(&self) -> FlushOutcome {
        let Ok(_guard) = self.inner.flight.try_lock() else {
            debug!(name = %self.inner.name, "Flush skipped, delivery in flight");
            return FlushOutcome::InFlight;
        };

        let events = self.batch_snapshot().await;
        if events.is_empty() {
            return FlushOutcome::Empty;
        }

        let identity = match self.inner.identity.current_identity().await {
            Ok(identity) => identity,
            Err(e) => {
                let error = TrackerError::from(e);
                self.record_failure(&error).await;
                return FlushOutcome::Failed {
                    count: events.len(),
                    error,
                };
            }
        };

        self.deliver(enrich_batch(&events, identity.as_ref())).await
    }

    /// Snapshot capped at `max_batch_size` (0 = unlimited).
    async fn batch_snapshot(&self) -> Vec<Event> {
        let mut events = self.inner.queue.snapshot().await;
        if self.inner.max_batch_size > 0 {
            events.truncate(self.inner.max_batch_size);
        }
        events
    }

    /// Enriches the backlog with the pre-resolution identity. An unreadable
    /// identity is reported and yields the `Failed` outcome to return.
    async fn prepare_backlog(&self) -> Result<Option<BatchPayload>, FlushOutcome> {
        let events = self.batch_snapshot().await;
        if events.is_empty() {
            return Ok(None);
        }

        match self.inner.identity.current_identity().await {
            Ok(identity) => Ok(Some(enrich_batch(&events, identity.as_ref()))),
            Err(e) => {
                let error = TrackerError::from(e);
                self.record_failure(&error).await;
                Err(FlushOutcome::Failed {
                    count: events.len(),
                    error,
                })
            }
        }
    }

    /// Sends `payload` and reconciles the queue. Caller holds the slot.
    async fn deliver(&self, payload: BatchPayload) -> FlushOutcome {
        let count = payload.len();

        let sent = tokio::time::timeout(
            self.inner.send_timeout,
            self.inner.transport.send(&self.inner.endpoint, &payload),
        )
        .await
        .unwrap_or_else(|_| {
            Err(TrackerError::Timeout(
                self.inner.send_timeout.as_millis() as u64,
            ))
        });

        match sent {
            Ok(()) => {
                self.inner.queue.remove_prefix(count).await;
                let pending = self.inner.queue.len().await;

                {
                    let mut stats = self.inner.stats.write().await;
                    stats.last_flush_at = Some(Utc::now());
                    stats.last_error = None;
                    stats.batches_sent += 1;
                    stats.events_sent += count as u64;
                }

                info!(name = %self.inner.name, count, pending, "Batch delivered");
                self.inner.emitter.emit_flush(count, pending);
                self.emit_status().await;

                FlushOutcome::Sent { count }
            }
            Err(error) => {
                self.record_failure(&error).await;
                FlushOutcome::Failed { count, error }
            }
        }
    }

    async fn record_failure(&self, error: &TrackerError) {
        error!(
            name = %self.inner.name,
            error = ?error,
            retryable = error.is_retryable(),
            "Batch delivery failed"
        );

        self.inner.stats.write().await.last_error = Some(error.to_string());
        self.inner
            .emitter
            .emit_error(&error.to_string(), error.is_retryable());
        self.emit_status().await;
    }

    // =========================================================================
    // Observability
    // =========================================================================

    pub async fn pending_count(&self) -> usize {
        self.inner.queue.len().await
    }

    pub async fn status(&self) -> TrackerStatus {
        let stats = self.inner.stats.read().await.clone();

        TrackerStatus {
            running: self.inner.scheduler.is_running().await,
            flushing: self.inner.flight.try_lock().is_err(),
            pending_count: self.inner.queue.len().await,
            degraded: self.inner.queue.is_degraded().await,
            last_flush_at: stats.last_flush_at,
            last_error: stats.last_error,
            batches_sent: stats.batches_sent,
            events_sent: stats.events_sent,
        }
    }

    async fn emit_status(&self) {
        let status = self.status().await;
        self.inner.emitter.emit_status(&status);
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating a Tracker with injected capabilities.
pub struct TrackerBuilder {
    config: TrackerConfig,
    storage: Option<Arc<dyn KeyValueStore>>,
    session_storage: Option<Arc<dyn KeyValueStore>>,
    transport: Option<Arc<dyn Transport>>,
    emitter: Option<Arc<dyn TrackerEventEmitter>>,
}

impl TrackerBuilder {
    pub fn new(config: TrackerConfig) -> Self {
        TrackerBuilder {
            config,
            storage: None,
            session_storage: None,
            transport: None,
            emitter: None,
        }
    }

    /// Sets the persistent store (queue and identities). Required.
    pub fn with_storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the session store. Defaults to the process-wide
    /// [`MemoryStore::session`].
    pub fn with_session_storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.session_storage = Some(storage);
        self
    }

    /// Sets the transport. Defaults to [`HttpTransport`].
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the event emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn TrackerEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Validates the configuration and builds the Tracker.
    pub fn build(self) -> TrackerResult<Tracker> {
        self.config.validate()?;

        let storage = self
            .storage
            .ok_or_else(|| TrackerError::InvalidConfig("Persistent storage required".into()))?;
        let session = self
            .session_storage
            .unwrap_or_else(|| MemoryStore::session());
        let endpoint = self.config.endpoint().ok_or(TrackerError::MissingUrl)?;

        let send_timeout = self.config.send_timeout();
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(send_timeout)?),
        };
        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));

        let name = self.config.name().to_string();

        info!(name = %name, endpoint = %endpoint, "Tracker created");

        Ok(Tracker {
            inner: Arc::new(TrackerInner {
                queue: DurableQueue::new(&name, storage.clone()),
                identity: IdentityStore::new(name.clone(), storage, session),
                name,
                endpoint,
                flush_interval: self.config.flush_interval(),
                send_timeout,
                max_batch_size: self.config.tracker.max_batch_size,
                transport,
                scheduler: Scheduler::new(),
                flight: Mutex::new(()),
                stats: RwLock::new(DeliveryStats::default()),
                emitter,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AcceptAll;

    #[async_trait::async_trait]
    impl Transport for AcceptAll {
        async fn send(&self, _endpoint: &str, _payload: &BatchPayload) -> TrackerResult<()> {
            Ok(())
        }
    }

    fn tracker() -> Tracker {
        Tracker::builder(TrackerConfig::new("https://collector.example.com"))
            .with_storage(Arc::new(MemoryStore::new()))
            .with_session_storage(Arc::new(MemoryStore::new()))
            .with_transport(Arc::new(AcceptAll))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_storage() {
        let err = Tracker::builder(TrackerConfig::new("https://collector.example.com"))
            .build()
            .unwrap_err();
        assert!(matches!(err, TrackerError::InvalidConfig(_)));
    }

    #[test]
    fn test_builder_defaults_to_http_transport() {
        let tracker = Tracker::builder(TrackerConfig::new("http://localhost:8080"))
            .with_storage(Arc::new(MemoryStore::new()))
            .build()
            .unwrap();
        assert_eq!(tracker.endpoint(), "http://localhost:8080/events/batch_track");
    }

    #[test]
    fn test_builder_validates_config() {
        let err = Tracker::builder(TrackerConfig::default())
            .with_storage(Arc::new(MemoryStore::new()))
            .build()
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[tokio::test]
    async fn test_endpoint_and_status_defaults() {
        let tracker = tracker();
        assert_eq!(
            tracker.endpoint(),
            "https://collector.example.com/events/batch_track"
        );
        assert_eq!(tracker.status().await, TrackerStatus::default());
    }

    #[tokio::test]
    async fn test_invalid_event_type_is_dropped() {
        let tracker = tracker();
        tracker.track("", Properties::new()).await;
        tracker.track("ok", Properties::new()).await;
        assert_eq!(tracker.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_flush_updates_stats() {
        let tracker = tracker();
        tracker.track("a", Properties::new()).await;
        tracker.track("b", Properties::new()).await;

        let outcome = tracker.flush().await;
        assert_eq!(outcome.sent_count(), 2);

        let status = tracker.status().await;
        assert_eq!(status.pending_count, 0);
        assert_eq!(status.batches_sent, 1);
        assert_eq!(status.events_sent, 2);
        assert!(status.last_flush_at.is_some());
        assert!(!status.flushing);
    }

    #[test]
    fn test_outcome_helpers() {
        assert!(FlushOutcome::Sent { count: 2 }.is_sent());
        assert_eq!(FlushOutcome::InFlight.sent_count(), 0);
        assert_eq!(
            FlushOutcome::Failed {
                count: 3,
                error: TrackerError::Timeout(10)
            }
            .attempted_count(),
            3
        );
        assert!(FlushOutcome::Failed {
            count: 1,
            error: TrackerError::Timeout(10)
        }
        .error()
        .is_some_and(TrackerError::is_retryable));
    }
}
