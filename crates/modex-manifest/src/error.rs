//! Error types for the manifest parser.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("manifest is not valid UTF-8")]
  NotUtf8,

  #[error("line {line}: unterminated quoted string")]
  UnterminatedQuote { line: usize },

  #[error("line {line}: block is never closed")]
  UnterminatedBlock { line: usize },

  #[error("line {line}: unexpected ')'")]
  UnexpectedClose { line: usize },

  #[error("line {line}: repeated module directive")]
  DuplicateModule { line: usize },

  #[error("line {line}: {verb}: {detail}")]
  BadDirective {
    line:   usize,
    verb:   String,
    detail: String,
  },

  #[error("line {line}: invalid version {value:?}")]
  InvalidVersion {
    line:   usize,
    value:  String,
    #[source]
    source: modex_core::Error,
  },
}

impl Error {
  /// The 1-based line the error was raised on, if it has one.
  pub fn line(&self) -> Option<usize> {
    match self {
      Self::NotUtf8 => None,
      Self::UnterminatedQuote { line }
      | Self::UnterminatedBlock { line }
      | Self::UnexpectedClose { line }
      | Self::DuplicateModule { line }
      | Self::BadDirective { line, .. }
      | Self::InvalidVersion { line, .. } => Some(*line),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
