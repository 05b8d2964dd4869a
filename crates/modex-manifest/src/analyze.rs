//! Deprecation and retraction analysis.
//!
//! Pure functions of a parsed manifest and a resolved version. Absence of data
//! always yields the "not deprecated, not retracted" default.

use std::cmp::Ordering;

use modex_core::lifecycle::LifecycleStatus;
use semver::Version;

use crate::{ManifestFile, Retract};

const DEPRECATED_PREFIX: &str = "Deprecated:";

/// Compute the lifecycle status of `resolved` under `file`.
pub fn analyze(file: &ManifestFile, resolved: &Version) -> LifecycleStatus {
  LifecycleStatus::default()
    .with_deprecation(deprecation(file))
    .with_retraction(retraction(file, resolved))
}

/// The text after `Deprecated:` in the first matching comment attached to the
/// module declaration (before it, then trailing on its line).
pub fn deprecation(file: &ManifestFile) -> Option<String> {
  let module = file.module.as_ref()?;
  module.comments.iter().find_map(|comment| {
    comment
      .text()
      .strip_prefix(DEPRECATED_PREFIX)
      .map(|rest| rest.trim().to_owned())
  })
}

/// The rationale of the first retract directive, in file order, whose
/// inclusive range contains `resolved`.
pub fn retraction(file: &ManifestFile, resolved: &Version) -> Option<String> {
  file
    .retracts
    .iter()
    .find(|r| r.contains(resolved))
    .map(|r| r.rationale.clone())
}

/// Semantic-version precedence; build metadata does not participate.
fn cmp_precedence(a: &Version, b: &Version) -> Ordering {
  (a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre))
}

impl Retract {
  /// Whether `version` lies within `[low, high]`.
  pub fn contains(&self, version: &Version) -> bool {
    cmp_precedence(&self.low, version).is_le()
      && cmp_precedence(version, &self.high).is_le()
  }
}
