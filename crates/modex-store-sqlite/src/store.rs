//! [`SqliteStore`], the SQLite implementation of [`VersionStore`].

use std::{collections::BTreeSet, path::Path};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use semver::Version;
use tracing::{debug, info};

use modex_core::{
  lifecycle::IngestState,
  module::{ModuleKey, ModuleVersion, StoredModule, Unit, UnitDetail, UnitMeta},
  store::{ReplaceOutcome, VersionStore},
};

use crate::{
  Error, Result,
  digest::compute_digest,
  encode::{
    MODULE_COLUMNS, ModuleRow, RawModule, RawState, RawUnit, UNIT_COLUMNS, UnitRow,
    encode_dt, encode_outcome, encode_version,
  },
  schema::SCHEMA,
  validate::{InvalidReason, validate},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A modex version store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted and all calls
/// are funnelled through one background thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// What the replace transaction saw and did.
struct Applied {
  previous:  Option<Vec<String>>,
  unchanged: bool,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// The newest unit row matching `unit_path` at `version`, preferring the
  /// longest containing module path.
  async fn query_unit(
    &self,
    unit_path: &str,
    module_path: Option<&str>,
    version: &Version,
  ) -> Result<Option<RawUnit>> {
    let unit_path = unit_path.to_owned();
    let module_path = module_path.map(str::to_owned);
    let version = encode_version(version);

    let raw = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {UNIT_COLUMNS}
           FROM units u
           JOIN modules m ON m.module_path = u.module_path AND m.version = u.version
           WHERE u.path = ?1
             AND u.version = ?2
             AND (?3 IS NULL OR u.module_path = ?3)
           ORDER BY length(u.module_path) DESC
           LIMIT 1"
        );
        Ok(
          conn
            .query_row(
              &sql,
              rusqlite::params![unit_path, version, module_path],
              RawUnit::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(raw)
  }
}

// ─── VersionStore impl ───────────────────────────────────────────────────────

impl VersionStore for SqliteStore {
  type Error = Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn replace(&self, module: ModuleVersion, units: Vec<Unit>) -> Result<ReplaceOutcome> {
    let key = module.key.clone();
    let digest = compute_digest(&module, &units)?;
    let module_row = ModuleRow::encode(&module)?;
    let unit_rows = units.iter().map(UnitRow::encode).collect::<Result<Vec<_>>>()?;
    let candidate: Vec<String> = units.iter().map(|u| u.path.clone()).collect();
    let updated_at = encode_dt(Utc::now());
    let tx_digest = digest.clone();

    let applied = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let m = &module_row;

        let prior_digest: Option<String> = tx
          .query_row(
            "SELECT digest FROM modules WHERE module_path = ?1 AND version = ?2",
            rusqlite::params![m.module_path, m.version],
            |r| r.get(0),
          )
          .optional()?;

        let previous = match prior_digest {
          Some(_) => {
            let mut stmt = tx.prepare(
              "SELECT path FROM units WHERE module_path = ?1 AND version = ?2 ORDER BY path",
            )?;
            let paths = stmt
              .query_map(rusqlite::params![m.module_path, m.version], |r| r.get(0))?
              .collect::<rusqlite::Result<Vec<String>>>()?;
            Some(paths)
          }
          None => None,
        };

        if let Err(reason) = validate(&module, &units, previous.as_deref()) {
          return Ok(Err(reason));
        }

        // Identical payload: leave the row and its updated_at alone.
        if prior_digest.as_deref() == Some(tx_digest.as_str()) {
          return Ok(Ok(Applied { previous, unchanged: true }));
        }

        tx.execute(
          "DELETE FROM units WHERE module_path = ?1 AND version = ?2",
          rusqlite::params![m.module_path, m.version],
        )?;

        tx.execute(
          "INSERT INTO modules (
             module_path, version, commit_time, source_json, is_redistributable,
             has_manifest, licenses_json, deprecated, deprecation_reason,
             retracted, retraction_reason, digest, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
           ON CONFLICT (module_path, version) DO UPDATE SET
             commit_time        = excluded.commit_time,
             source_json        = excluded.source_json,
             is_redistributable = excluded.is_redistributable,
             has_manifest       = excluded.has_manifest,
             licenses_json      = excluded.licenses_json,
             deprecated         = excluded.deprecated,
             deprecation_reason = excluded.deprecation_reason,
             retracted          = excluded.retracted,
             retraction_reason  = excluded.retraction_reason,
             digest             = excluded.digest,
             updated_at         = excluded.updated_at",
          rusqlite::params![
            m.module_path,
            m.version,
            m.commit_time,
            m.source_json,
            m.is_redistributable,
            m.has_manifest,
            m.licenses_json,
            m.deprecated,
            m.deprecation_reason,
            m.retracted,
            m.retraction_reason,
            tx_digest,
            updated_at,
          ],
        )?;

        {
          let mut stmt = tx.prepare(
            "INSERT INTO units (
               module_path, version, path, name, is_redistributable, licenses_json,
               readme_path, readme_contents, synopsis, doc_html, doc_os, doc_arch
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          )?;
          for u in &unit_rows {
            stmt.execute(rusqlite::params![
              m.module_path,
              m.version,
              u.path,
              u.name,
              u.is_redistributable,
              u.licenses_json,
              u.readme_path,
              u.readme_contents,
              u.synopsis,
              u.doc_html,
              u.doc_os,
              u.doc_arch,
            ])?;
          }
        }

        tx.commit()?;
        Ok(Ok(Applied { previous, unchanged: false }))
      })
      .await?;

    let applied = applied.map_err(|reason: InvalidReason| {
      debug!(%key, %reason, "replace rejected");
      Error::InsertInvalid { key: key.clone(), reason }
    })?;

    let before: BTreeSet<&str> = applied
      .previous
      .iter()
      .flatten()
      .map(String::as_str)
      .collect();
    let after: BTreeSet<&str> = candidate.iter().map(String::as_str).collect();

    let outcome = ReplaceOutcome {
      previous_units: applied.previous.as_ref().map(Vec::len),
      removed:        before.difference(&after).map(|s| (*s).to_owned()).collect(),
      added:          after.difference(&before).map(|s| (*s).to_owned()).collect(),
      unchanged:      applied.unchanged,
      digest,
    };

    if outcome.unchanged {
      debug!(%key, "replace was a no-op");
    } else {
      info!(
        %key,
        units = after.len(),
        added = outcome.added.len(),
        removed = outcome.removed.len(),
        "replaced module version"
      );
    }
    Ok(outcome)
  }

  async fn record_state(&self, state: IngestState) -> Result<()> {
    let module_path = state.key.module_path.clone();
    let version = encode_version(&state.key.version);
    let status = encode_outcome(state.outcome);
    let unit_count = i64::try_from(state.unit_count).unwrap_or(i64::MAX);
    let attempted_at = encode_dt(state.attempted_at);
    let error = state.error;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO version_states (
             module_path, version, status, error, unit_count, attempted_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (module_path, version) DO UPDATE SET
             status       = excluded.status,
             error        = excluded.error,
             unit_count   = excluded.unit_count,
             attempted_at = excluded.attempted_at",
          rusqlite::params![module_path, version, status, error, unit_count, attempted_at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_module(&self, key: &ModuleKey) -> Result<Option<StoredModule>> {
    let module_path = key.module_path.clone();
    let version = encode_version(&key.version);

    let raw = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {MODULE_COLUMNS}
           FROM modules m
           WHERE m.module_path = ?1 AND m.version = ?2"
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![module_path, version], RawModule::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawModule::into_stored).transpose()
  }

  async fn list_units(&self, key: &ModuleKey) -> Result<Vec<UnitMeta>> {
    let module_path = key.module_path.clone();
    let version = encode_version(&key.version);

    let raws: Vec<RawUnit> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {UNIT_COLUMNS}
           FROM units u
           JOIN modules m ON m.module_path = u.module_path AND m.version = u.version
           WHERE u.module_path = ?1 AND u.version = ?2
           ORDER BY u.path"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![module_path, version], RawUnit::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUnit::into_meta).collect()
  }

  async fn get_unit_meta(
    &self,
    unit_path: &str,
    module_path: Option<&str>,
    version: &Version,
  ) -> Result<Option<UnitMeta>> {
    self
      .query_unit(unit_path, module_path, version)
      .await?
      .map(RawUnit::into_meta)
      .transpose()
  }

  async fn get_unit(
    &self,
    unit_path: &str,
    module_path: Option<&str>,
    version: &Version,
  ) -> Result<Option<UnitDetail>> {
    self
      .query_unit(unit_path, module_path, version)
      .await?
      .map(RawUnit::into_detail)
      .transpose()
  }

  async fn get_state(&self, key: &ModuleKey) -> Result<Option<IngestState>> {
    let module_path = key.module_path.clone();
    let version = encode_version(&key.version);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT module_path, version, status, error, unit_count, attempted_at
               FROM version_states
               WHERE module_path = ?1 AND version = ?2",
              rusqlite::params![module_path, version],
              |r| {
                Ok(RawState {
                  module_path:  r.get(0)?,
                  version:      r.get(1)?,
                  status:       r.get(2)?,
                  error:        r.get(3)?,
                  unit_count:   r.get(4)?,
                  attempted_at: r.get(5)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawState::into_state).transpose()
  }
}
