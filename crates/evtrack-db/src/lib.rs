//! # evtrack-db: Storage Layer for evtrack
//!
//! This crate provides everything the tracker persists: the storage
//! capability itself, a SQLite-backed implementation, and the two stateful
//! components built on top of it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        evtrack Data Flow                                │
//! │                                                                         │
//! │  Tracker::track / flush / initialize                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     evtrack-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐                       │   │
//! │  │   │ DurableQueue  │    │ IdentityStore │                       │   │
//! │  │   │  (queue.rs)   │    │ (identity.rs) │                       │   │
//! │  │   └───────┬───────┘    └──┬─────────┬──┘                       │   │
//! │  │           │ persistent    │         │ session                  │   │
//! │  │           ▼               ▼         ▼                          │   │
//! │  │   ┌─────────────────────────┐  ┌──────────────┐               │   │
//! │  │   │ dyn KeyValueStore       │  │ MemoryStore  │               │   │
//! │  │   │ Database (SQLite) or    │  │ (process     │               │   │
//! │  │   │ MemoryStore             │  │  lifetime)   │               │   │
//! │  │   └─────────────────────────┘  └──────────────┘               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//! ```rust,ignore
//! use std::sync::Arc;
//! use evtrack_db::{Database, DbConfig, DurableQueue, MemoryStore};
//!
//! let db = Arc::new(Database::new(DbConfig::new("./evtrack.db")).await?);
//! let queue = DurableQueue::new("EventTracker", db.clone());
//! queue.enqueue(event).await;
//! ```

pub mod error;
pub mod identity;
pub mod migrations;
pub mod pool;
pub mod queue;
pub mod repository;
pub mod store;

// Re-exports
pub use error::{DbError, DbResult};
pub use identity::{IdentityStore, SessionResolution};
pub use pool::{Database, DbConfig};
pub use queue::DurableQueue;
pub use repository::kv::KeyValueRepository;
pub use store::{KeyValueStore, MemoryStore};
