//! # Domain Types
//!
//! Core domain types used throughout evtrack.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Event       │   │    Identity     │   │  EnrichedRecord │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  event_type     │   │  id             │   │  event_type     │       │
//! │  │  properties     │   │  traits         │   │  external_user_id│      │
//! │  └─────────────────┘   └─────────────────┘   │  ...properties  │       │
//! │   (queued as-is)        (Generated or        └─────────────────┘       │
//! │                          Identified)           (built at send time)    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │   Properties    │   │  BatchPayload   │                             │
//! │  │  ordered map    │   │  { events: [] } │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Properties
// =============================================================================

/// Insertion-ordered, string-keyed property bag.
///
/// Used for both event properties and identity traits.
///
/// ## Merge Semantics
/// `a.merge(&b)` copies every key of `b` into `a`; on conflict the value from
/// `b` wins. Keys already present keep their position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(Map<String, Value>);

impl Properties {
    /// Creates an empty property bag.
    pub fn new() -> Self {
        Properties(Map::new())
    }

    /// Builder-style insert.
    ///
    /// ```rust
    /// use evtrack_core::Properties;
    ///
    /// let props = Properties::new().with("a", "b").with("n", 3);
    /// assert_eq!(props.len(), 2);
    /// ```
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a value, returning the previous one for that key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Merges `other` into `self`. Keys from `other` win on conflict.
    pub fn merge(&mut self, other: &Properties) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Returns a new bag with `other` merged over a copy of `self`.
    pub fn merged(&self, other: &Properties) -> Properties {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    /// Builds a property bag from an arbitrary JSON value.
    ///
    /// `null` becomes an empty bag; any non-object value is rejected.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        match value {
            Value::Object(map) => Ok(Properties(map)),
            Value::Null => Ok(Properties::new()),
            other => Err(CoreError::InvalidProperties(json_kind(&other).to_string())),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<Map<String, Value>> for Properties {
    fn from(map: Map<String, Value>) -> Self {
        Properties(map)
    }
}

impl<K, V> FromIterator<(K, V)> for Properties
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Properties(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Properties {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// =============================================================================
// Event
// =============================================================================

/// A tracked event as it sits in the durable queue.
///
/// The payload is immutable once queued. Identity fields are never stored
/// here; they are added by [`crate::enrich`] at delivery time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name, e.g. `"submission"`.
    pub event_type: String,

    /// Explicit properties supplied by the caller.
    #[serde(default)]
    pub properties: Properties,
}

impl Event {
    pub fn new(event_type: impl Into<String>, properties: Properties) -> Self {
        Event {
            event_type: event_type.into(),
            properties,
        }
    }
}

// =============================================================================
// Identity
// =============================================================================

/// A user identity: an id plus the traits merged onto its events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,

    #[serde(default)]
    pub traits: Properties,
}

impl Identity {
    pub fn new(id: impl Into<String>, traits: Properties) -> Self {
        Identity {
            id: id.into(),
            traits,
        }
    }
}

/// The identity that enrichment should use right now.
///
/// ## Precedence
/// ```text
/// Identified (set by identify, cleared by every initialize)
///     │ absent?
///     ▼
/// Generated  (anonymous, one per session)
///     │ absent?
///     ▼
/// none → records carry no external_user_id
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveIdentity {
    /// Explicit identity set by `identify`.
    Identified(Identity),

    /// Anonymous identity auto-assigned per session.
    Generated(Identity),
}

impl ActiveIdentity {
    pub fn identity(&self) -> &Identity {
        match self {
            ActiveIdentity::Identified(identity) | ActiveIdentity::Generated(identity) => identity,
        }
    }

    pub fn id(&self) -> &str {
        &self.identity().id
    }

    pub fn traits(&self) -> &Properties {
        &self.identity().traits
    }

    pub fn is_identified(&self) -> bool {
        matches!(self, ActiveIdentity::Identified(_))
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// One delivered event: identity traits and event properties flattened next
/// to `event_type` and `external_user_id`.
///
/// ## Wire Format
/// ```json
/// { "event_type": "submission", "external_user_id": "u-1", "a": "b", "plan": "pro" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub event_type: String,

    /// Absent when no identity has been resolved yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_user_id: Option<String>,

    #[serde(flatten)]
    pub properties: Properties,
}

/// Body of a single batch delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchPayload {
    /// Records in queue order.
    pub events: Vec<EnrichedRecord>,
}

impl BatchPayload {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

// =============================================================================
// Storage Keys
// =============================================================================

/// Separator between the tracker name and the key suffix.
pub const KEY_SEPARATOR: &str = "::";

/// The storage keys owned by one tracker name.
///
/// | Key                     | Storage    | Contents                      |
/// |-------------------------|------------|-------------------------------|
/// | `<name>::Queue`         | persistent | JSON array of [`Event`]       |
/// | `<name>::generatedId`   | persistent | generated identity id         |
/// | `<name>::generatedUser` | persistent | generated identity traits     |
/// | `<name>::identifiedUser`| persistent | JSON [`Identity`]             |
/// | `<name>::activeSession` | session    | presence flag                 |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub queue: String,
    pub generated_id: String,
    pub generated_user: String,
    pub identified_user: String,
    pub active_session: String,
}

impl StorageKeys {
    pub fn for_tracker(name: &str) -> Self {
        let key = |suffix: &str| format!("{name}{KEY_SEPARATOR}{suffix}");
        StorageKeys {
            queue: key("Queue"),
            generated_id: key("generatedId"),
            generated_user: key("generatedUser"),
            identified_user: key("identifiedUser"),
            active_session: key("activeSession"),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
