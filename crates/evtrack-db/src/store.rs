//! # Key/Value Storage Capability
//!
//! The minimal storage contract the queue and identity store are written
//! against, plus its two implementations.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     dyn KeyValueStore                                   │
//! │                                                                         │
//! │   get(key) ──► Option<String>                                           │
//! │   set(key, value)                                                       │
//! │   remove(key)                                                           │
//! │                                                                         │
//! │   MemoryStore ........ process lifetime (session storage, tests)        │
//! │   MemoryStore::session() shared by every tracker in the process         │
//! │   Database ........... SQLite kv_entries (persistent storage)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{DbError, DbResult};
use crate::pool::Database;

// =============================================================================
// Trait
// =============================================================================

/// String key/value storage.
///
/// Values are opaque strings; structured values are stored as JSON via
/// [`read_json`] and [`write_json`].
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value under `key`, `None` if absent.
    async fn get(&self, key: &str) -> DbResult<Option<String>>;

    /// Writes `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> DbResult<()>;

    /// Removes `key`. Removing a missing key succeeds.
    async fn remove(&self, key: &str) -> DbResult<()>;
}

/// Reads and decodes a JSON value.
///
/// A value that exists but does not decode as `T` is a
/// [`DbError::CorruptValue`].
pub async fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> DbResult<Option<T>> {
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| DbError::corrupt(key, e)),
        None => Ok(None),
    }
}

/// Encodes `value` as JSON and stores it under `key`.
pub async fn write_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> DbResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw).await
}

// =============================================================================
// MemoryStore
// =============================================================================

static SESSION_STORE: OnceLock<Arc<MemoryStore>> = OnceLock::new();

/// In-memory store that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide session store.
    ///
    /// Every caller gets the same instance, so trackers sharing a name within
    /// one process also share a session.
    pub fn session() -> Arc<MemoryStore> {
        SESSION_STORE
            .get_or_init(|| Arc::new(MemoryStore::new()))
            .clone()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> DbResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> DbResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// =============================================================================
// Database
// =============================================================================

#[async_trait]
impl KeyValueStore for Database {
    async fn get(&self, key: &str) -> DbResult<Option<String>> {
        self.kv().get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        self.kv().set(key, value).await
    }

    async fn remove(&self, key: &str) -> DbResult<()> {
        self.kv().remove(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await);

        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(store.len().await, 1);

        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_session_store_is_shared() {
        let first = MemoryStore::session();
        let second = MemoryStore::session();
        assert!(Arc::ptr_eq(&first, &second));

        first.set("store_test::activeSession", "true").await.unwrap();
        assert_eq!(
            second.get("store_test::activeSession").await.unwrap(),
            Some("true".to_string())
        );
        first.remove("store_test::activeSession").await.unwrap();
    }

    #[tokio::test]
    async fn test_json_helpers_over_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        write_json(&db, "t::generatedUser", &json!({"plan": "pro"}))
            .await
            .unwrap();
        let value: Option<serde_json::Value> = read_json(&db, "t::generatedUser").await.unwrap();
        assert_eq!(value, Some(json!({"plan": "pro"})));
    }

    #[tokio::test]
    async fn test_read_json_reports_corrupt_value() {
        let store = MemoryStore::new();
        store.set("t::Queue", "not json").await.unwrap();

        let err = read_json::<Vec<serde_json::Value>>(&store, "t::Queue")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CorruptValue { ref key, .. } if key == "t::Queue"));
    }
}
