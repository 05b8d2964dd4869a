//! SQLite backend for the modex version store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every [`replace`] is a single
//! `BEGIN IMMEDIATE` transaction, which both serializes writers of the same
//! key and keeps readers from ever seeing a half-written unit set.
//!
//! [`replace`]: modex_core::store::VersionStore::replace

mod digest;
mod encode;
mod schema;
mod store;
mod validate;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
pub use validate::InvalidReason;
