//! The `Fetcher` trait and the raw module contents it returns.
//!
//! Fetchers are implemented outside this crate (a proxy-layout directory, an
//! in-memory map in tests). The orchestrator depends on this abstraction only.

use std::{collections::BTreeMap, future::Future};

use chrono::{DateTime, Utc};
use semver::Version;
use thiserror::Error;

use crate::{Classify, ErrorKind, module::ModuleKey};

// ─── Contents ────────────────────────────────────────────────────────────────

/// Version metadata served alongside the module files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
  pub version:     Version,
  pub commit_time: Option<DateTime<Utc>>,
}

/// Everything a fetcher knows about one module version.
#[derive(Debug, Clone)]
pub struct ModuleContents {
  pub info:     VersionInfo,
  /// The manifest byte stream, if the module has one.
  pub manifest: Option<Vec<u8>>,
  /// File tree keyed by slash-separated path relative to the module root.
  pub files:    BTreeMap<String, Vec<u8>>,
}

/// The manifest of a module's highest version, ignoring retractions.
#[derive(Debug, Clone)]
pub struct LatestManifest {
  pub version:  Version,
  pub manifest: Vec<u8>,
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("{0} not found")]
  NotFound(ModuleKey),

  #[error("malformed version info for {key}: {detail}")]
  BadInfo { key: ModuleKey, detail: String },

  #[error("module path {0:?} does not map to a safe location")]
  UnsafePath(String),

  #[error("transport error: {0}")]
  Transport(String),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

impl FetchError {
  pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound(_)) }
}

impl Classify for FetchError {
  fn kind(&self) -> ErrorKind { ErrorKind::FetchFailed }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Source of module contents.
pub trait Fetcher: Send + Sync {
  /// Fetch the contents of one module version.
  fn fetch<'a>(
    &'a self,
    key: &'a ModuleKey,
  ) -> impl Future<Output = Result<ModuleContents, FetchError>> + Send + 'a;

  /// The manifest of the highest known version of `module_path`.
  ///
  /// Its deprecation comment and retract directives are authoritative for
  /// every version of the module. Fetchers that cannot answer return `None`.
  fn latest_manifest<'a>(
    &'a self,
    module_path: &'a str,
  ) -> impl Future<Output = Result<Option<LatestManifest>, FetchError>> + Send + 'a
  {
    let _ = module_path;
    async { Ok(None) }
  }
}
