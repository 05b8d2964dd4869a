//! Ingestion worker for modex.
//!
//! Wires a [`Fetcher`](modex_core::fetch::Fetcher), the [`Extractor`] and a
//! [`VersionStore`](modex_core::store::VersionStore) into the [`Worker`]
//! pipeline: fetch a module version, build its candidate unit set, derive its
//! lifecycle status from the manifest, and atomically replace what is stored.

pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
mod ingest;

pub use config::WorkerConfig;
pub use error::{ExtractError, IngestError, Result, Stage};
pub use extract::Extractor;
pub use ingest::{IngestSummary, Worker};

#[cfg(test)]
mod tests;
