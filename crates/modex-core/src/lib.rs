//! Core types and trait definitions for modex.
//!
//! This crate is deliberately free of I/O and database dependencies. The
//! manifest parser, the SQLite store and the ingestion worker all depend on
//! it; it depends on nothing of theirs.

// Native `async fn` in traits; the trait signatures spell out `Send` bounds.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod fetch;
pub mod lifecycle;
pub mod module;
pub mod store;

pub use error::{Classify, Error, ErrorKind, Result};
