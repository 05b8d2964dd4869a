//! The ingestion orchestrator: fetch, extract, analyze, store.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use modex_core::{
  Classify,
  fetch::Fetcher,
  lifecycle::{IngestOutcome, IngestState, LifecycleStatus},
  module::ModuleKey,
  store::VersionStore,
};
use modex_manifest::ManifestInfo;
use serde::Serialize;
use tokio::{
  sync::Semaphore,
  task::JoinSet,
  time::{Instant, timeout_at},
};
use tracing::{debug, error, info, instrument, warn};

use crate::{
  error::{IngestError, Result, Stage},
  extract::Extractor,
};

/// What one successful ingestion stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
  pub key:       ModuleKey,
  /// Units visible for the key afterwards.
  pub units:     usize,
  pub added:     Vec<String>,
  pub removed:   Vec<String>,
  /// The stored payload already matched; nothing was written.
  pub unchanged: bool,
  pub lifecycle: LifecycleStatus,
  pub digest:    String,
}

/// Runs ingestions against one fetcher and one store.
pub struct Worker<F, S> {
  fetcher:     F,
  store:       S,
  extractor:   Extractor,
  timeout:     Option<Duration>,
  concurrency: usize,
}

impl<F: Fetcher, S: VersionStore> Worker<F, S> {
  pub fn new(fetcher: F, store: S, extractor: Extractor) -> Self {
    Self { fetcher, store, extractor, timeout: None, concurrency: 4 }
  }

  /// Deadline applied to each [`ingest`](Self::ingest), measured from its
  /// start.
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  /// Ingestions in flight at once in [`ingest_all`](Self::ingest_all).
  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = concurrency.max(1);
    self
  }

  pub fn fetcher(&self) -> &F { &self.fetcher }

  pub fn store(&self) -> &S { &self.store }

  /// Ingest one module version under the configured timeout.
  pub async fn ingest(&self, key: &ModuleKey) -> Result<IngestSummary> {
    let deadline = self.timeout.map(|t| Instant::now() + t);
    self.ingest_until(key, deadline).await
  }

  /// Ingest one module version, giving up at `deadline` if it passes before
  /// the store is reached. The outcome is recorded as the key's ingest state.
  #[instrument(skip_all, fields(key = %key))]
  pub async fn ingest_until(
    &self,
    key: &ModuleKey,
    deadline: Option<Instant>,
  ) -> Result<IngestSummary> {
    let result = self.run(key, deadline).await;

    let state = match &result {
      Ok(summary) => {
        info!(
          units = summary.units,
          added = summary.added.len(),
          removed = summary.removed.len(),
          unchanged = summary.unchanged,
          deprecated = summary.lifecycle.deprecated,
          retracted = summary.lifecycle.retracted,
          "ingested"
        );
        IngestState {
          key:          key.clone(),
          outcome:      if summary.unchanged {
            IngestOutcome::Unchanged
          } else {
            IngestOutcome::Stored
          },
          error:        None,
          unit_count:   summary.units,
          attempted_at: Utc::now(),
        }
      }
      Err(e) => {
        warn!(kind = %e.kind(), error = %e, "ingest failed");
        IngestState {
          key:          key.clone(),
          outcome:      IngestOutcome::Failed(e.kind()),
          error:        Some(e.to_string()),
          unit_count:   self.visible_units(key).await,
          attempted_at: Utc::now(),
        }
      }
    };

    if let Err(e) = self.store.record_state(state).await {
      warn!(error = %e, "failed to record ingest state");
    }
    result
  }

  async fn run(&self, key: &ModuleKey, deadline: Option<Instant>) -> Result<IngestSummary> {
    // 1. Fetch, raced against the deadline.
    let fetched = match deadline {
      Some(at) => timeout_at(at, self.fetcher.fetch(key))
        .await
        .map_err(|_| IngestError::Cancelled { key: key.clone(), stage: Stage::Fetch })?,
      None => self.fetcher.fetch(key).await,
    };
    let contents = fetched.map_err(|source| IngestError::Fetch { key: key.clone(), source })?;

    // 2. Extract.
    let extracted = self
      .extractor
      .extract(key, &contents)
      .map_err(|source| IngestError::Extract { key: key.clone(), source })?;
    debug!(units = extracted.units.len(), "extracted");

    // 3. Analyze.
    let units = extracted.units.len();
    let mut module = extracted.module;
    let manifest = self.authoritative_manifest(key, extracted.manifest, deadline).await?;
    manifest.populate(&mut module);
    let lifecycle = module.lifecycle.clone();

    // 4. Store. Once submitted, the replace runs to completion.
    if deadline.is_some_and(|at| Instant::now() >= at) {
      return Err(IngestError::Cancelled { key: key.clone(), stage: Stage::Store });
    }
    let outcome = self
      .store
      .replace(module, extracted.units)
      .await
      .map_err(|e| IngestError::Store { key: key.clone(), kind: e.kind(), source: Box::new(e) })?;

    Ok(IngestSummary {
      key: key.clone(),
      units,
      added: outcome.added,
      removed: outcome.removed,
      unchanged: outcome.unchanged,
      lifecycle,
      digest: outcome.digest,
    })
  }

  /// Lifecycle status comes from the manifest of the module's highest
  /// version when the fetcher knows one newer than `own`, else from `own`.
  /// Only an expired deadline fails the lookup; fetcher errors fall back to
  /// `own`.
  async fn authoritative_manifest(
    &self,
    key: &ModuleKey,
    own: ManifestInfo,
    deadline: Option<Instant>,
  ) -> Result<ManifestInfo> {
    let lookup = self.fetcher.latest_manifest(&own.module_path);
    let latest = match deadline {
      Some(at) => timeout_at(at, lookup)
        .await
        .map_err(|_| IngestError::Cancelled { key: key.clone(), stage: Stage::Analyze })?,
      None => lookup.await,
    };

    let latest = match latest {
      Ok(Some(latest)) if latest.version > own.version => latest,
      Ok(_) => return Ok(own),
      Err(e) => {
        warn!(error = %e, "latest manifest unavailable, using own manifest");
        return Ok(own);
      }
    };

    Ok(match modex_manifest::parse(&latest.manifest) {
      Ok(file) if file.module_path().is_none_or(|p| p == own.module_path) => {
        debug!(latest = %latest.version, "using latest manifest for lifecycle");
        ManifestInfo { module_path: own.module_path, version: latest.version, file }
      }
      Ok(_) => {
        warn!(latest = %latest.version, "latest manifest declares another module");
        own
      }
      Err(e) => {
        warn!(latest = %latest.version, error = %e, "latest manifest is malformed");
        own
      }
    })
  }

  async fn visible_units(&self, key: &ModuleKey) -> usize {
    match self.store.get_module(key).await {
      Ok(stored) => stored.map_or(0, |m| m.unit_count),
      Err(e) => {
        debug!(error = %e, "could not read stored unit count");
        0
      }
    }
  }
}

impl<F, S> Worker<F, S>
where
  F: Fetcher + 'static,
  S: VersionStore + 'static,
{
  /// Ingest every key with at most the configured number in flight. Results
  /// come back in input order.
  pub async fn ingest_all(
    self: &Arc<Self>,
    keys: Vec<ModuleKey>,
  ) -> Vec<(ModuleKey, Result<IngestSummary>)> {
    let semaphore = Arc::new(Semaphore::new(self.concurrency));
    let mut tasks = JoinSet::new();

    for (index, key) in keys.iter().cloned().enumerate() {
      let worker = Arc::clone(self);
      let semaphore = Arc::clone(&semaphore);
      tasks.spawn(async move {
        let _permit = semaphore.acquire_owned().await;
        let result = worker.ingest(&key).await;
        (index, result)
      });
    }

    let mut results: Vec<Option<Result<IngestSummary>>> = keys.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok((index, result)) => results[index] = Some(result),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => error!(error = %e, "ingest task was cancelled"),
      }
    }

    in_input_order(keys, results)
  }
}

/// Pair each key with its result. A key whose task never reported back gets
/// [`IngestError::Aborted`].
fn in_input_order(
  keys: Vec<ModuleKey>,
  results: Vec<Option<Result<IngestSummary>>>,
) -> Vec<(ModuleKey, Result<IngestSummary>)> {
  keys
    .into_iter()
    .zip(results)
    .map(|(key, result)| {
      let result = result.unwrap_or_else(|| Err(IngestError::Aborted { key: key.clone() }));
      (key, result)
    })
    .collect()
}
