//! Lifecycle status of a module version and the record of ingestion attempts.
//!
//! [`LifecycleStatus`] is never edited by hand: it is recomputed from the
//! module's manifest on every ingestion. [`IngestState`] records how the most
//! recent attempt for a key ended and lives apart from the unit data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ErrorKind, module::ModuleKey};

// ─── Deprecation / retraction ────────────────────────────────────────────────

/// Author-declared lifecycle markers for one resolved version.
///
/// The default is "neither deprecated nor retracted", with empty reasons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleStatus {
  pub deprecated:         bool,
  pub deprecation_reason: String,
  pub retracted:          bool,
  pub retraction_reason:  String,
}

impl LifecycleStatus {
  pub fn with_deprecation(mut self, reason: Option<String>) -> Self {
    self.deprecated = reason.is_some();
    self.deprecation_reason = reason.unwrap_or_default();
    self
  }

  pub fn with_retraction(mut self, rationale: Option<String>) -> Self {
    self.retracted = rationale.is_some();
    self.retraction_reason = rationale.unwrap_or_default();
    self
  }
}

// ─── Ingest state ────────────────────────────────────────────────────────────

/// How an ingestion attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "kind", rename_all = "snake_case")]
pub enum IngestOutcome {
  /// A new payload was committed.
  Stored,
  /// The payload was identical to what was already stored.
  Unchanged,
  Failed(ErrorKind),
}

impl IngestOutcome {
  pub fn is_success(&self) -> bool { !matches!(self, Self::Failed(_)) }
}

/// The outcome of the most recent ingestion attempt for a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestState {
  pub key:          ModuleKey,
  pub outcome:      IngestOutcome,
  /// Display form of the error for failed attempts.
  pub error:        Option<String>,
  /// Units visible for the key after the attempt.
  pub unit_count:   usize,
  pub attempted_at: DateTime<Utc>,
}
