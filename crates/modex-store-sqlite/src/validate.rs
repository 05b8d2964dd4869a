//! The "insert invalid" predicate.
//!
//! Runs inside the replace transaction, against the unit set visible at that
//! moment, so the check and the write see the same prior state.

use std::collections::BTreeSet;

use modex_core::module::{ModuleVersion, Unit};
use thiserror::Error;

/// Why a candidate was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReason {
  #[error("module path is empty")]
  EmptyModulePath,

  #[error("commit time is missing")]
  MissingCommitTime,

  #[error("unit #{index} has an empty path")]
  EmptyUnitPath { index: usize },

  #[error("unit {path} has an empty name")]
  EmptyUnitName { path: String },

  #[error("unit {path} is outside module {module_path}")]
  OutsideModule { path: String, module_path: String },

  #[error("unit {0} appears more than once")]
  DuplicateUnit(String),

  /// The key holds units and the candidate has none: most likely a bad fetch.
  #[error("candidate has no units but {previous} are stored")]
  WouldEraseUnits { previous: usize },
}

/// Whether `path` is `module_path` itself or lies beneath it.
fn within(module_path: &str, path: &str) -> bool {
  path == module_path
    || path
      .strip_prefix(module_path)
      .is_some_and(|rest| rest.starts_with('/'))
}

/// Check `module` + `units` against the paths currently stored for the key
/// (`None` when the key is absent).
pub(crate) fn validate(
  module: &ModuleVersion,
  units: &[Unit],
  stored: Option<&[String]>,
) -> Result<(), InvalidReason> {
  let module_path = module.key.module_path.as_str();
  if module_path.trim().is_empty() {
    return Err(InvalidReason::EmptyModulePath);
  }
  if module.commit_time.is_none() {
    return Err(InvalidReason::MissingCommitTime);
  }

  let mut seen = BTreeSet::new();
  for (index, unit) in units.iter().enumerate() {
    if unit.path.trim().is_empty() {
      return Err(InvalidReason::EmptyUnitPath { index });
    }
    if unit.name.trim().is_empty() {
      return Err(InvalidReason::EmptyUnitName { path: unit.path.clone() });
    }
    if !within(module_path, &unit.path) {
      return Err(InvalidReason::OutsideModule {
        path:        unit.path.clone(),
        module_path: module_path.to_owned(),
      });
    }
    if !seen.insert(unit.path.as_str()) {
      return Err(InvalidReason::DuplicateUnit(unit.path.clone()));
    }
  }

  if let Some(previous) = stored
    && units.is_empty()
    && !previous.is_empty()
  {
    return Err(InvalidReason::WouldEraseUnits { previous: previous.len() });
  }

  Ok(())
}
