//! Error type for `modex-store-sqlite`.

use modex_core::{Classify, ErrorKind, module::ModuleKey};
use thiserror::Error;

use crate::validate::InvalidReason;

#[derive(Debug, Error)]
pub enum Error {
  /// The candidate was degenerate relative to what is stored. Nothing was
  /// written.
  #[error("insert invalid for {key}: {reason}")]
  InsertInvalid {
    key:    ModuleKey,
    reason: InvalidReason,
  },

  #[error("core error: {0}")]
  Core(#[from] modex_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown ingest status: {0:?}")]
  UnknownStatus(String),
}

impl Error {
  pub fn is_insert_invalid(&self) -> bool { matches!(self, Self::InsertInvalid { .. }) }
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::InsertInvalid { .. } => ErrorKind::ValidationRejected,
      _ => ErrorKind::StorageUnavailable,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
