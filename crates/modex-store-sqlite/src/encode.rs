//! Encoding and decoding helpers between modex types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, versions are semver strings without the
//! leading `v`, structured fields (licenses, source info) are compact JSON,
//! booleans are 0/1 integers.

use chrono::{DateTime, Utc};
use modex_core::{
  ErrorKind,
  lifecycle::{IngestOutcome, IngestState, LifecycleStatus},
  module::{
    Documentation, LicenseMetadata, ModuleKey, ModuleVersion, Readme, SourceInfo,
    StoredModule, Unit, UnitDetail, UnitMeta, parse_version,
  },
};
use semver::Version;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_version(v: &Version) -> String { v.to_string() }

pub fn decode_key(module_path: String, version: &str) -> Result<ModuleKey> {
  Ok(ModuleKey::new(module_path, parse_version(version)?)?)
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_licenses(licenses: &[LicenseMetadata]) -> Result<String> {
  Ok(serde_json::to_string(licenses)?)
}

pub fn decode_licenses(s: &str) -> Result<Vec<LicenseMetadata>> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_source(source: Option<&SourceInfo>) -> Result<Option<String>> {
  source.map(serde_json::to_string).transpose().map_err(Error::from)
}

pub fn decode_source(s: Option<&str>) -> Result<Option<SourceInfo>> {
  s.map(serde_json::from_str).transpose().map_err(Error::from)
}

// ─── IngestOutcome ───────────────────────────────────────────────────────────

pub fn encode_outcome(outcome: IngestOutcome) -> &'static str {
  match outcome {
    IngestOutcome::Stored => "stored",
    IngestOutcome::Unchanged => "unchanged",
    IngestOutcome::Failed(kind) => kind.as_str(),
  }
}

pub fn decode_outcome(s: &str) -> Result<IngestOutcome> {
  match s {
    "stored" => Ok(IngestOutcome::Stored),
    "unchanged" => Ok(IngestOutcome::Unchanged),
    other => ErrorKind::from_str_opt(other)
      .map(IngestOutcome::Failed)
      .ok_or_else(|| Error::UnknownStatus(other.to_owned())),
  }
}

// ─── Write rows ──────────────────────────────────────────────────────────────

/// Column values for one `modules` row, encoded ahead of the transaction.
pub struct ModuleRow {
  pub module_path:        String,
  pub version:            String,
  pub commit_time:        Option<String>,
  pub source_json:        Option<String>,
  pub is_redistributable: bool,
  pub has_manifest:       bool,
  pub licenses_json:      String,
  pub deprecated:         bool,
  pub deprecation_reason: String,
  pub retracted:          bool,
  pub retraction_reason:  String,
}

impl ModuleRow {
  pub fn encode(m: &ModuleVersion) -> Result<Self> {
    Ok(Self {
      module_path:        m.key.module_path.clone(),
      version:            encode_version(&m.key.version),
      commit_time:        m.commit_time.map(encode_dt),
      source_json:        encode_source(m.source.as_ref())?,
      is_redistributable: m.is_redistributable,
      has_manifest:       m.has_manifest,
      licenses_json:      encode_licenses(&m.licenses)?,
      deprecated:         m.lifecycle.deprecated,
      deprecation_reason: m.lifecycle.deprecation_reason.clone(),
      retracted:          m.lifecycle.retracted,
      retraction_reason:  m.lifecycle.retraction_reason.clone(),
    })
  }
}

/// Column values for one `units` row.
pub struct UnitRow {
  pub path:               String,
  pub name:               String,
  pub is_redistributable: bool,
  pub licenses_json:      String,
  pub readme_path:        Option<String>,
  pub readme_contents:    Option<String>,
  pub synopsis:           Option<String>,
  pub doc_html:           Option<String>,
  pub doc_os:             Option<String>,
  pub doc_arch:           Option<String>,
}

impl UnitRow {
  pub fn encode(u: &Unit) -> Result<Self> {
    let doc = u.documentation.as_ref();
    Ok(Self {
      path:               u.path.clone(),
      name:               u.name.clone(),
      is_redistributable: u.is_redistributable,
      licenses_json:      encode_licenses(&u.licenses)?,
      readme_path:        u.readme.as_ref().map(|r| r.file_path.clone()),
      readme_contents:    u.readme.as_ref().map(|r| r.contents.clone()),
      synopsis:           doc.map(|d| d.synopsis.clone()),
      doc_html:           doc.map(|d| d.html.clone()),
      doc_os:             doc.map(|d| d.os.clone()),
      doc_arch:           doc.map(|d| d.arch.clone()),
    })
  }
}

// ─── Read rows ───────────────────────────────────────────────────────────────

/// Columns selected by every module query, in [`RawModule::from_row`] order.
pub const MODULE_COLUMNS: &str = "m.module_path, m.version, m.commit_time, m.source_json,
   m.is_redistributable, m.has_manifest, m.licenses_json,
   m.deprecated, m.deprecation_reason, m.retracted, m.retraction_reason,
   m.digest,
   (SELECT count(*) FROM units u
     WHERE u.module_path = m.module_path AND u.version = m.version)";

/// Raw values read from a `modules` row.
pub struct RawModule {
  pub module_path:        String,
  pub version:            String,
  pub commit_time:        String,
  pub source_json:        Option<String>,
  pub is_redistributable: bool,
  pub has_manifest:       bool,
  pub licenses_json:      String,
  pub deprecated:         bool,
  pub deprecation_reason: String,
  pub retracted:          bool,
  pub retraction_reason:  String,
  pub digest:             String,
  pub unit_count:         i64,
}

impl RawModule {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      module_path:        row.get(0)?,
      version:            row.get(1)?,
      commit_time:        row.get(2)?,
      source_json:        row.get(3)?,
      is_redistributable: row.get(4)?,
      has_manifest:       row.get(5)?,
      licenses_json:      row.get(6)?,
      deprecated:         row.get(7)?,
      deprecation_reason: row.get(8)?,
      retracted:          row.get(9)?,
      retraction_reason:  row.get(10)?,
      digest:             row.get(11)?,
      unit_count:         row.get(12)?,
    })
  }

  pub fn into_stored(self) -> Result<StoredModule> {
    let module = ModuleVersion {
      key:                decode_key(self.module_path, &self.version)?,
      commit_time:        Some(decode_dt(&self.commit_time)?),
      source:             decode_source(self.source_json.as_deref())?,
      is_redistributable: self.is_redistributable,
      has_manifest:       self.has_manifest,
      licenses:           decode_licenses(&self.licenses_json)?,
      lifecycle:          LifecycleStatus {
        deprecated:         self.deprecated,
        deprecation_reason: self.deprecation_reason,
        retracted:          self.retracted,
        retraction_reason:  self.retraction_reason,
      },
    };
    Ok(StoredModule {
      module,
      unit_count: usize::try_from(self.unit_count).unwrap_or_default(),
      digest: self.digest,
    })
  }
}

/// Columns selected by unit queries, in [`RawUnit::from_row`] order. Joined
/// against `modules` for the inherited fields.
pub const UNIT_COLUMNS: &str = "u.module_path, u.version, m.commit_time, m.source_json,
   u.path, u.name, u.is_redistributable, u.licenses_json,
   u.readme_path, u.readme_contents,
   u.synopsis, u.doc_html, u.doc_os, u.doc_arch";

/// Raw values read from a `units` row joined with its module.
pub struct RawUnit {
  pub module_path:        String,
  pub version:            String,
  pub commit_time:        String,
  pub source_json:        Option<String>,
  pub path:               String,
  pub name:               String,
  pub is_redistributable: bool,
  pub licenses_json:      String,
  pub readme_path:        Option<String>,
  pub readme_contents:    Option<String>,
  pub synopsis:           Option<String>,
  pub doc_html:           Option<String>,
  pub doc_os:             Option<String>,
  pub doc_arch:           Option<String>,
}

impl RawUnit {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      module_path:        row.get(0)?,
      version:            row.get(1)?,
      commit_time:        row.get(2)?,
      source_json:        row.get(3)?,
      path:               row.get(4)?,
      name:               row.get(5)?,
      is_redistributable: row.get(6)?,
      licenses_json:      row.get(7)?,
      readme_path:        row.get(8)?,
      readme_contents:    row.get(9)?,
      synopsis:           row.get(10)?,
      doc_html:           row.get(11)?,
      doc_os:             row.get(12)?,
      doc_arch:           row.get(13)?,
    })
  }

  pub fn into_detail(self) -> Result<UnitDetail> {
    let readme = match (self.readme_path, self.readme_contents) {
      (Some(file_path), Some(contents)) => Some(Readme { file_path, contents }),
      _ => None,
    };
    let documentation = match (self.synopsis, self.doc_html, self.doc_os, self.doc_arch) {
      (Some(synopsis), Some(html), Some(os), Some(arch)) => {
        Some(Documentation { synopsis, html, os, arch })
      }
      _ => None,
    };
    let meta = UnitMeta {
      key:                decode_key(self.module_path, &self.version)?,
      commit_time:        decode_dt(&self.commit_time)?,
      source:             decode_source(self.source_json.as_deref())?,
      path:               self.path,
      name:               self.name,
      is_redistributable: self.is_redistributable,
      licenses:           decode_licenses(&self.licenses_json)?,
    };
    Ok(UnitDetail { meta, readme, documentation })
  }

  pub fn into_meta(self) -> Result<UnitMeta> { Ok(self.into_detail()?.meta) }
}

/// Raw values read from a `version_states` row.
pub struct RawState {
  pub module_path:  String,
  pub version:      String,
  pub status:       String,
  pub error:        Option<String>,
  pub unit_count:   i64,
  pub attempted_at: String,
}

impl RawState {
  pub fn into_state(self) -> Result<IngestState> {
    Ok(IngestState {
      key:          decode_key(self.module_path, &self.version)?,
      outcome:      decode_outcome(&self.status)?,
      error:        self.error,
      unit_count:   usize::try_from(self.unit_count).unwrap_or_default(),
      attempted_at: decode_dt(&self.attempted_at)?,
    })
  }
}
