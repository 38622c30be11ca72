//! # Identity Store
//!
//! Persists the generated (anonymous) and identified identities of one
//! tracker name, and decides when a new session begins.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  resolve_session()                                                      │
//! │                                                                         │
//! │   session marker?                                                       │
//! │     absent ──► new session ──► fresh generated id, empty traits         │
//! │     present ─► continuing ───► reuse generated identity                 │
//! │                                (create one if it is missing)            │
//! │                                                                         │
//! │   both branches: set marker, clear identified identity                  │
//! │                                                                         │
//! │  identify(id, traits) ──► replaces identified identity wholesale       │
//! │  register(traits) ──────► merges into generated identity traits        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Identities live in persistent storage; the session marker lives in
//! session-scoped storage, so a fresh process starts a new session.

use std::fmt;
use std::sync::Arc;

use evtrack_core::validation::validate_user_id;
use evtrack_core::{ActiveIdentity, Identity, Properties, StorageKeys};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::store::{read_json, write_json, KeyValueStore};

/// Value written under the session marker key.
const SESSION_MARKER: &str = "true";

/// Outcome of [`IdentityStore::resolve_session`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionResolution {
    /// The generated identity now in effect.
    pub identity: Identity,

    /// True when no session marker was present.
    pub new_session: bool,

    /// True when a generated identity was created by this call.
    pub created: bool,
}

/// Identity state for one tracker name.
pub struct IdentityStore {
    name: String,
    keys: StorageKeys,
    persistent: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
}

impl fmt::Debug for IdentityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityStore")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl IdentityStore {
    pub fn new(
        name: impl Into<String>,
        persistent: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
    ) -> Self {
        let name = name.into();
        IdentityStore {
            keys: StorageKeys::for_tracker(&name),
            name,
            persistent,
            session,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves the generated identity for the current session.
    ///
    /// Always clears the identified identity.
    pub async fn resolve_session(&self) -> DbResult<SessionResolution> {
        let continuing = self.session.get(&self.keys.active_session).await?.is_some();

        let existing = if continuing {
            self.generated_identity().await?
        } else {
            None
        };

        let (identity, created) = match existing {
            Some(identity) => (identity, false),
            None => (self.create_generated().await?, true),
        };

        self.session
            .set(&self.keys.active_session, SESSION_MARKER)
            .await?;
        self.persistent.remove(&self.keys.identified_user).await?;

        info!(
            name = %self.name,
            id = %identity.id,
            new_session = !continuing,
            created,
            "Session resolved"
        );

        Ok(SessionResolution {
            identity,
            new_session: !continuing,
            created,
        })
    }

    /// Sets the identified identity, replacing any previous one.
    pub async fn identify(&self, user_id: &str, traits: Properties) -> DbResult<Identity> {
        validate_user_id(user_id)?;

        let identity = Identity::new(user_id, traits);
        write_json(&*self.persistent, &self.keys.identified_user, &identity).await?;

        debug!(name = %self.name, id = %identity.id, "User identified");
        Ok(identity)
    }

    /// Merges `traits` into the generated identity. New values win.
    ///
    /// ## Errors
    /// [`DbError::NoGeneratedIdentity`] before the first `resolve_session`.
    pub async fn register(&self, traits: &Properties) -> DbResult<Identity> {
        let mut identity =
            self.generated_identity()
                .await?
                .ok_or_else(|| DbError::NoGeneratedIdentity {
                    name: self.name.clone(),
                })?;

        identity.traits.merge(traits);
        write_json(&*self.persistent, &self.keys.generated_user, &identity.traits).await?;

        debug!(name = %self.name, traits = identity.traits.len(), "Traits registered");
        Ok(identity)
    }

    /// Identified identity if present, else generated, else `None`.
    pub async fn current_identity(&self) -> DbResult<Option<ActiveIdentity>> {
        if let Some(identity) = self.identified_identity().await? {
            return Ok(Some(ActiveIdentity::Identified(identity)));
        }

        Ok(self
            .generated_identity()
            .await?
            .map(ActiveIdentity::Generated))
    }

    pub async fn generated_identity(&self) -> DbResult<Option<Identity>> {
        let Some(id) = self.persistent.get(&self.keys.generated_id).await? else {
            return Ok(None);
        };

        let traits: Properties = read_json(&*self.persistent, &self.keys.generated_user)
            .await?
            .unwrap_or_default();

        Ok(Some(Identity::new(id, traits)))
    }

    pub async fn identified_identity(&self) -> DbResult<Option<Identity>> {
        read_json(&*self.persistent, &self.keys.identified_user).await
    }

    async fn create_generated(&self) -> DbResult<Identity> {
        let previous = self.persistent.get(&self.keys.generated_id).await?;

        let mut id = Uuid::new_v4().to_string();
        while previous.as_deref() == Some(id.as_str()) {
            id = Uuid::new_v4().to_string();
        }

        let traits = Properties::new();
        self.persistent.set(&self.keys.generated_id, &id).await?;
        write_json(&*self.persistent, &self.keys.generated_user, &traits).await?;

        debug!(name = %self.name, id = %id, "Generated identity created");
        Ok(Identity::new(id, traits))
    }
}
