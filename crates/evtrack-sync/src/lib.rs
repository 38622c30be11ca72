//! # evtrack-sync: Delivery Engine for evtrack
//!
//! This crate turns tracked events into batches delivered to a collector,
//! on a timer or on demand, without losing anything across failures or
//! restarts.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tracker Architecture                             │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                    Tracker (Main Orchestrator)                   │  │
//! │  │                                                                  │  │
//! │  │  Cloneable handle; every clone drives the same instance          │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  Scheduler     │  │  Transport     │  │  evtrack-db            │    │
//! │  │                │  │                │  │                        │    │
//! │  │ tokio task,    │  │ POST JSON to   │  │ DurableQueue           │    │
//! │  │ one timer,     │  │ /events/       │  │ IdentityStore          │    │
//! │  │ awaits flush   │  │ batch_track    │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`tracker`] - `Tracker` orchestrator, builder, status and emitter
//! - [`scheduler`] - Periodic flush timer
//! - [`transport`] - `Transport` capability and the reqwest implementation
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Tracker error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use evtrack_core::Properties;
//! use evtrack_db::{Database, DbConfig};
//! use evtrack_sync::{Tracker, TrackerConfig};
//!
//! let config = TrackerConfig::load(None)?;
//! let db = Database::new(DbConfig::new("./evtrack.db")).await?;
//!
//! let tracker = Tracker::builder(config)
//!     .with_storage(Arc::new(db))
//!     .build()?;
//!
//! tracker.track("submission", Properties::new().with("a", "b")).await;
//! tracker.initialize().await;
//! tracker.start().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod scheduler;
pub mod tracker;
pub mod transport;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{StorageSettings, TrackerConfig, TrackerSettings};
pub use error::{TrackerError, TrackerResult};
pub use scheduler::Scheduler;
pub use tracker::{
    FlushOutcome, NoOpEmitter, Tracker, TrackerBuilder, TrackerEventEmitter, TrackerStatus,
};
pub use transport::{HttpTransport, Transport};
