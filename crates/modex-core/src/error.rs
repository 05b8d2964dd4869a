//! Error types for `modex-core`, plus the closed [`ErrorKind`] taxonomy every
//! pipeline error maps onto.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("module path must not be empty")]
  EmptyModulePath,

  #[error("invalid version {value:?}: {source}")]
  InvalidVersion {
    value:  String,
    #[source]
    source: semver::Error,
  },

  #[error("expected <module>@<version>, got {0:?}")]
  MalformedKey(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Kinds ───────────────────────────────────────────────────────────────────

/// What went wrong during an ingestion, independent of which crate raised it.
///
/// Callers branch on this instead of matching error messages.
/// [`ErrorKind::ValidationRejected`] is the "insert invalid" sentinel: the
/// store declined to overwrite good data with a degenerate candidate.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  /// The module could not be fetched (transport failure or not found).
  FetchFailed,
  /// The fetched contents or manifest were malformed.
  ExtractionFailed,
  /// The candidate record set was rejected; prior state is untouched.
  ValidationRejected,
  /// The store could not be reached or failed mid-transaction.
  StorageUnavailable,
  /// The caller's deadline expired at a fetch or store boundary.
  Cancelled,
}

impl ErrorKind {
  /// The identifier stored in the `version_states.status` column.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::FetchFailed => "fetch_failed",
      Self::ExtractionFailed => "extraction_failed",
      Self::ValidationRejected => "validation_rejected",
      Self::StorageUnavailable => "storage_unavailable",
      Self::Cancelled => "cancelled",
    }
  }

  pub fn from_str_opt(s: &str) -> Option<Self> {
    match s {
      "fetch_failed" => Some(Self::FetchFailed),
      "extraction_failed" => Some(Self::ExtractionFailed),
      "validation_rejected" => Some(Self::ValidationRejected),
      "storage_unavailable" => Some(Self::StorageUnavailable),
      "cancelled" => Some(Self::Cancelled),
      _ => None,
    }
  }

  /// Whether retrying the same request later may succeed without anyone
  /// changing the source data.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      Self::FetchFailed | Self::StorageUnavailable | Self::Cancelled
    )
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Implemented by every error that can surface from an ingestion, so the kind
/// survives crossing crate boundaries.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}
