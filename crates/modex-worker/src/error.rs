//! Error types for `modex-worker`.

use std::fmt;

use modex_core::{Classify, ErrorKind, fetch::FetchError, module::ModuleKey};
use thiserror::Error;

// ─── Extraction ──────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ExtractError {
  #[error("unsafe file path {0:?}")]
  UnsafePath(String),

  #[error("malformed manifest: {0}")]
  Manifest(#[from] modex_manifest::Error),

  #[error("manifest declares module {found:?}, expected {expected:?}")]
  ModulePathMismatch { expected: String, found: String },

  #[error("source file {0} is not valid UTF-8")]
  NotUtf8(String),
}

impl Classify for ExtractError {
  fn kind(&self) -> ErrorKind { ErrorKind::ExtractionFailed }
}

// ─── Ingestion ───────────────────────────────────────────────────────────────

/// The boundary at which an expired deadline was noticed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Fetch,
  /// Looking up the manifest of the module's highest version.
  Analyze,
  Store,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Fetch => "fetch",
      Self::Analyze => "analyze",
      Self::Store => "store",
    })
  }
}

/// Why one ingestion failed. The collaborator's own error is kept as the
/// source.
#[derive(Debug, Error)]
pub enum IngestError {
  #[error("fetching {key}: {source}")]
  Fetch {
    key:    ModuleKey,
    #[source]
    source: FetchError,
  },

  #[error("extracting {key}: {source}")]
  Extract {
    key:    ModuleKey,
    #[source]
    source: ExtractError,
  },

  #[error("storing {key}: {source}")]
  Store {
    key:    ModuleKey,
    kind:   ErrorKind,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("{key}: deadline expired at {stage}")]
  Cancelled { key: ModuleKey, stage: Stage },

  /// The task running the ingestion ended without producing a result.
  #[error("{key}: ingest task was aborted")]
  Aborted { key: ModuleKey },
}

impl IngestError {
  pub fn key(&self) -> &ModuleKey {
    match self {
      Self::Fetch { key, .. }
      | Self::Extract { key, .. }
      | Self::Store { key, .. }
      | Self::Cancelled { key, .. }
      | Self::Aborted { key } => key,
    }
  }
}

impl Classify for IngestError {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Fetch { .. } => ErrorKind::FetchFailed,
      Self::Extract { .. } => ErrorKind::ExtractionFailed,
      Self::Store { kind, .. } => *kind,
      Self::Cancelled { .. } | Self::Aborted { .. } => ErrorKind::Cancelled,
    }
  }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
