//! Module versions and the documentable units they contain.
//!
//! A [`ModuleVersion`] plus its [`Unit`]s is the payload written to the store
//! as one piece. The read-side types ([`UnitMeta`], [`UnitDetail`],
//! [`StoredModule`]) are what the store hands back.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::{Error, Result, lifecycle::LifecycleStatus};

// ─── Versions ────────────────────────────────────────────────────────────────

/// Parse a semantic version, accepting an optional leading `v`.
pub fn parse_version(s: &str) -> Result<Version> {
  let trimmed = s.trim();
  let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
  Version::parse(bare).map_err(|source| Error::InvalidVersion {
    value: s.to_owned(),
    source,
  })
}

/// Render a version in the canonical `v1.2.3` form used in tags and keys.
pub fn tag(version: &Version) -> String { format!("v{version}") }

// ─── Key ─────────────────────────────────────────────────────────────────────

/// Identity of one module version: `(module path, version)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleKey {
  pub module_path: String,
  pub version:     Version,
}

impl ModuleKey {
  pub fn new(module_path: impl Into<String>, version: Version) -> Result<Self> {
    let module_path = module_path.into();
    if module_path.trim().is_empty() {
      return Err(Error::EmptyModulePath);
    }
    Ok(Self { module_path, version })
  }

  /// Build a key from a path and an unparsed version string.
  pub fn parse(module_path: impl Into<String>, version: &str) -> Result<Self> {
    Self::new(module_path, parse_version(version)?)
  }
}

impl fmt::Display for ModuleKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}@v{}", self.module_path, self.version)
  }
}

/// Parses `example.com/mod@v1.2.3`.
impl FromStr for ModuleKey {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let (path, version) = s
      .rsplit_once('@')
      .ok_or_else(|| Error::MalformedKey(s.to_owned()))?;
    Self::parse(path, version)
  }
}

// ─── Metadata sub-types ──────────────────────────────────────────────────────

/// Licenses detected in one license file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseMetadata {
  /// SPDX-style identifiers, e.g. `["MIT"]`. Empty when unrecognised.
  pub types:     Vec<String>,
  /// Path of the license file relative to the module root.
  pub file_path: String,
}

/// Where the source of a module lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
  pub repo_url:   String,
  /// Directory of the module inside the repository; empty at the root.
  pub module_dir: String,
  /// Tag or commit the version was cut from.
  pub commit:     String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readme {
  pub file_path: String,
  pub contents:  String,
}

/// Rendered documentation for a unit, for one target platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Documentation {
  pub synopsis: String,
  pub html:     String,
  pub os:       String,
  pub arch:     String,
}

// ─── Write-side records ──────────────────────────────────────────────────────

/// Module-level record for one version, as produced by extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleVersion {
  pub key:                ModuleKey,
  /// Required by the store; a candidate without one is rejected.
  pub commit_time:        Option<DateTime<Utc>>,
  pub source:             Option<SourceInfo>,
  pub is_redistributable: bool,
  pub has_manifest:       bool,
  /// Licenses at the module root.
  pub licenses:           Vec<LicenseMetadata>,
  pub lifecycle:          LifecycleStatus,
}

impl ModuleVersion {
  /// A bare record with every optional field empty.
  pub fn new(key: ModuleKey) -> Self {
    Self {
      key,
      commit_time: None,
      source: None,
      is_redistributable: false,
      has_manifest: false,
      licenses: Vec::new(),
      lifecycle: LifecycleStatus::default(),
    }
  }
}

/// One documentable unit (a package) inside a module version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
  /// Full import path, e.g. `example.com/mod/foo`.
  pub path:               String,
  pub name:               String,
  pub is_redistributable: bool,
  pub licenses:           Vec<LicenseMetadata>,
  pub readme:             Option<Readme>,
  pub documentation:      Option<Documentation>,
}

// ─── Read-side views ─────────────────────────────────────────────────────────

/// A unit's metadata joined with the module fields it inherits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitMeta {
  pub key:                ModuleKey,
  pub commit_time:        DateTime<Utc>,
  pub source:             Option<SourceInfo>,
  pub path:               String,
  pub name:               String,
  pub is_redistributable: bool,
  pub licenses:           Vec<LicenseMetadata>,
}

/// A unit with its readme and documentation loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDetail {
  pub meta:          UnitMeta,
  pub readme:        Option<Readme>,
  pub documentation: Option<Documentation>,
}

/// A module version as currently visible in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredModule {
  pub module:     ModuleVersion,
  pub unit_count: usize,
  /// Content digest of the last committed payload.
  pub digest:     String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_version_accepts_leading_v() {
    assert_eq!(parse_version("v1.2.0").unwrap(), Version::new(1, 2, 0));
    assert_eq!(parse_version("1.2.0").unwrap(), Version::new(1, 2, 0));
    assert!(parse_version("v1.2").is_err());
  }

  #[test]
  fn key_display_and_parse() {
    let key: ModuleKey = "github.com/valid/module_name@v1.0.0".parse().unwrap();
    assert_eq!(key.module_path, "github.com/valid/module_name");
    assert_eq!(key.version, Version::new(1, 0, 0));
    assert_eq!(key.to_string(), "github.com/valid/module_name@v1.0.0");
  }

  #[test]
  fn key_rejects_empty_path_and_missing_version() {
    assert!(matches!(
      ModuleKey::parse("  ", "v1.0.0"),
      Err(Error::EmptyModulePath)
    ));
    assert!(matches!(
      "example.com/mod".parse::<ModuleKey>(),
      Err(Error::MalformedKey(_))
    ));
  }

  #[test]
  fn prerelease_versions_order_before_release() {
    let pre = parse_version("v1.0.0-rc.1").unwrap();
    let rel = parse_version("v1.0.0").unwrap();
    assert!(pre < rel);
    assert_eq!(tag(&rel), "v1.0.0");
  }
}
