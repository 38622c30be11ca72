//! # Enrichment
//!
//! Turns a queued [`Event`] into the [`EnrichedRecord`] that goes on the wire.
//!
//! ## Merge Order
//! ```text
//! identity.traits          { plan: "free", foo: "bar" }
//!        │ merged under
//!        ▼
//! event.properties         { plan: "pro", a: "b" }
//!        │
//!        ▼
//! record                   { event_type, external_user_id,
//!                            foo: "bar", plan: "pro", a: "b" }
//! ```
//! Explicit event properties beat identity traits. The reserved keys are
//! always the record's own fields and are stripped from the property bag.

use crate::types::{ActiveIdentity, BatchPayload, EnrichedRecord, Event, Properties};

/// Keys the wire record owns. Properties using them are dropped.
pub const RESERVED_KEYS: [&str; 2] = ["event_type", "external_user_id"];

/// Enriches a single event with the given identity.
pub fn enrich(event: &Event, identity: Option<&ActiveIdentity>) -> EnrichedRecord {
    let merged = match identity {
        Some(identity) => identity.traits().merged(&event.properties),
        None => event.properties.clone(),
    };

    let properties: Properties = merged
        .into_iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .collect();

    EnrichedRecord {
        event_type: event.event_type.clone(),
        external_user_id: identity.map(|identity| identity.id().to_string()),
        properties,
    }
}

/// Enriches a queue snapshot, preserving its order.
pub fn enrich_batch(events: &[Event], identity: Option<&ActiveIdentity>) -> BatchPayload {
    BatchPayload {
        events: events.iter().map(|event| enrich(event, identity)).collect(),
    }
}
