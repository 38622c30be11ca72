//! # evtrack-core: Pure Tracking Types
//!
//! This crate is the data model of the event tracker. It contains every type
//! that flows through the tracker, plus the pure rules that combine them,
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        evtrack Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  evtrack-sync (Delivery Layer)                  │   │
//! │  │   Tracker ──► Scheduler ──► Transport ──► /events/batch_track   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  evtrack-db (Storage Layer)                     │   │
//! │  │      KeyValueStore, DurableQueue, IdentityStore                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ evtrack-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐  ┌────────────┐  ┌────────────┐  ┌──────────┐ │   │
//! │  │   │   types    │  │ enrichment │  │ validation │  │  error   │ │   │
//! │  │   │ Event      │  │ identity + │  │ event_type │  │ Core     │ │   │
//! │  │   │ Identity   │  │ properties │  │ user id    │  │ Valid.   │ │   │
//! │  │   │ Properties │  │ → record   │  │ name       │  │          │ │   │
//! │  │   └────────────┘  └────────────┘  └────────────┘  └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO STORAGE • NO NETWORK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Event, Identity, Properties, wire records)
//! - [`enrichment`] - Identity/property merge performed at delivery time
//! - [`validation`] - Input validation rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use evtrack_core::{enrich, ActiveIdentity, Event, Identity, Properties};
//!
//! let event = Event::new("submission", Properties::new().with("a", "b"));
//! let user = ActiveIdentity::Identified(Identity::new(
//!     "foo@example.com",
//!     Properties::new().with("plan", "pro"),
//! ));
//!
//! let record = enrich(&event, Some(&user));
//! assert_eq!(record.external_user_id.as_deref(), Some("foo@example.com"));
//! assert_eq!(record.properties.get("plan"), Some(&serde_json::json!("pro")));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod enrichment;
pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use enrichment::{enrich, enrich_batch, RESERVED_KEYS};
pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Tracker name used when none is configured.
///
/// All storage keys are namespaced by the tracker name, so two trackers with
/// the same name over the same storage share one queue and one identity.
pub const DEFAULT_TRACKER_NAME: &str = "EventTracker";

/// Path appended to the configured base URL for batch delivery.
pub const BATCH_TRACK_PATH: &str = "/events/batch_track";

/// Default scheduler period in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1000;

/// Builds the batch delivery endpoint for a base URL.
///
/// ```rust
/// use evtrack_core::batch_track_endpoint;
///
/// assert_eq!(
///     batch_track_endpoint("http://example.com/"),
///     "http://example.com/events/batch_track"
/// );
/// ```
pub fn batch_track_endpoint(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), BATCH_TRACK_PATH)
}
