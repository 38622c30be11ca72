//! # Repository Module
//!
//! SQL access for the tracker's SQLite store.
//!
//! ## Available Repositories
//!
//! - [`kv::KeyValueRepository`] - Namespaced key/value rows backing the
//!   [`crate::KeyValueStore`] implementation of [`crate::Database`]

pub mod kv;
