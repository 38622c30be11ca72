//! # Flush Scheduler
//!
//! Runs a callback on a fixed period in a background tokio task.
//!
//! ## Timer Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  start(1000ms) ──► spawn ──► t=1000 tick ──► await callback            │
//! │                              t=2000 tick ──► await callback            │
//! │                              ...                                        │
//! │  stop() ─────────► shutdown signal ──► loop exits after the current    │
//! │                                        callback returns                 │
//! │                                                                         │
//! │  • The first tick fires one full period after start                    │
//! │  • Ticks never overlap: the next tick waits for the callback           │
//! │  • Missed ticks are delayed, not burst                                  │
//! │  • start() while running is a no-op returning false                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

struct Running {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
    period: Duration,
}

/// Owns at most one periodic timer.
#[derive(Default)]
pub struct Scheduler {
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts ticking every `period`, awaiting `callback` on each tick.
    ///
    /// Returns `false` without side effects if a timer is already running.
    pub async fn start<F, Fut>(&self, period: Duration, callback: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut running = self.running.lock().await;

        if let Some(current) = running.as_ref() {
            if !current.handle.is_finished() {
                debug!(period_ms = current.period.as_millis() as u64, "Scheduler already running");
                return false;
            }
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.recv() => {
                        break;
                    }

                    _ = ticker.tick() => {
                        callback().await;

                        // stop() may have landed while the callback ran
                        match shutdown_rx.try_recv() {
                            Err(TryRecvError::Empty) => {}
                            Ok(()) | Err(TryRecvError::Disconnected) => break,
                        }
                    }
                }
            }

            debug!("Scheduler loop exited");
        });

        info!(period_ms = period.as_millis() as u64, "Scheduler started");

        *running = Some(Running {
            shutdown_tx,
            handle,
            period,
        });

        true
    }

    /// Signals the timer to stop. Returns whether a running timer was stopped.
    ///
    /// A callback already in progress runs to completion.
    pub async fn stop(&self) -> bool {
        let Some(current) = self.running.lock().await.take() else {
            return false;
        };

        let was_running = !current.handle.is_finished();
        let _ = current.shutdown_tx.try_send(());

        if was_running {
            info!("Scheduler stopped");
        }
        was_running
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|current| !current.handle.is_finished())
    }
}
