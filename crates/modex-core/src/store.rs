//! The `VersionStore` trait.
//!
//! Implemented by storage backends (e.g. `modex-store-sqlite`). The ingestion
//! worker depends on this abstraction, not on any concrete backend.

use std::future::Future;

use semver::Version;

use crate::{
  Classify,
  lifecycle::IngestState,
  module::{ModuleKey, ModuleVersion, StoredModule, Unit, UnitDetail, UnitMeta},
};

/// What a successful [`VersionStore::replace`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceOutcome {
  /// Number of units stored for the key before the call; `None` if the key
  /// was absent.
  pub previous_units: Option<usize>,
  /// Unit paths visible before the call and no longer visible after it.
  pub removed:        Vec<String>,
  /// Unit paths that were not visible before the call.
  pub added:          Vec<String>,
  /// The candidate matched the stored payload exactly; nothing was written.
  pub unchanged:      bool,
  pub digest:         String,
}

/// Abstraction over a module-version store.
///
/// Writes are whole-key: [`replace`](Self::replace) swaps the full payload of a
/// key or changes nothing. There are no partial-field updates.
pub trait VersionStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Atomically replace the module record and unit set stored for
  /// `module.key`.
  ///
  /// Fails with a [`crate::ErrorKind::ValidationRejected`] error, leaving the
  /// stored payload untouched, when the candidate is degenerate relative to
  /// what is stored. Concurrent replaces of the same key are serialized.
  fn replace(
    &self,
    module: ModuleVersion,
    units: Vec<Unit>,
  ) -> impl Future<Output = Result<ReplaceOutcome, Self::Error>> + Send + '_;

  /// Record the outcome of an ingestion attempt. Never touches unit data.
  fn record_state(
    &self,
    state: IngestState,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn get_module<'a>(
    &'a self,
    key: &'a ModuleKey,
  ) -> impl Future<Output = Result<Option<StoredModule>, Self::Error>> + Send + 'a;

  /// All units of a module version, ordered by path.
  fn list_units<'a>(
    &'a self,
    key: &'a ModuleKey,
  ) -> impl Future<Output = Result<Vec<UnitMeta>, Self::Error>> + Send + 'a;

  /// Metadata for the unit at `unit_path` in `version`.
  ///
  /// When `module_path` is `None`, the unit is resolved against the longest
  /// module path that contains it.
  fn get_unit_meta<'a>(
    &'a self,
    unit_path: &'a str,
    module_path: Option<&'a str>,
    version: &'a Version,
  ) -> impl Future<Output = Result<Option<UnitMeta>, Self::Error>> + Send + 'a;

  /// Like [`get_unit_meta`](Self::get_unit_meta), with readme and
  /// documentation loaded.
  fn get_unit<'a>(
    &'a self,
    unit_path: &'a str,
    module_path: Option<&'a str>,
    version: &'a Version,
  ) -> impl Future<Output = Result<Option<UnitDetail>, Self::Error>> + Send + 'a;

  fn get_state<'a>(
    &'a self,
    key: &'a ModuleKey,
  ) -> impl Future<Output = Result<Option<IngestState>, Self::Error>> + Send + 'a;
}
