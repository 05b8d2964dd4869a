//! End-to-end ingestion tests: in-memory fetcher, in-memory SQLite store.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeZone, Utc};
use modex_core::{
  Classify, ErrorKind,
  fetch::{FetchError, Fetcher, LatestManifest, ModuleContents},
  lifecycle::IngestOutcome,
  module::{Documentation, LicenseMetadata, ModuleKey, Readme, SourceInfo},
  store::VersionStore,
};
use modex_store_sqlite::SqliteStore;
use tokio::time::Instant;

use crate::{
  Extractor, IngestError, Stage, Worker, WorkerConfig, extract::license::MIT_LICENSE,
  fetch::MemoryFetcher,
};

const MODULE: &str = "github.com/valid/module_name";

fn key(version: &str) -> ModuleKey { ModuleKey::parse(MODULE, version).unwrap() }

fn commit_time() -> DateTime<Utc> { Utc.with_ymd_and_hms(2019, 1, 30, 0, 0, 0).unwrap() }

async fn worker<F: Fetcher>(fetcher: F) -> Worker<F, SqliteStore> {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  Worker::new(fetcher, store, Extractor::from_config(&WorkerConfig::default()))
}

const FOO: &[(&str, &str)] = &[
  ("foo/foo.go", "// Package foo\npackage foo\n\nconst Foo = 42"),
  ("README.md", "This is a readme"),
  ("LICENSE", MIT_LICENSE),
];

const FOOBAR: &[(&str, &str)] = &[
  ("foo/foo.go", "// Package foo\npackage foo\n\nconst Foo = 42"),
  ("README.md", "This is a readme"),
  ("LICENSE", MIT_LICENSE),
  ("bar/bar.go", "// Package bar\npackage bar\n\nconst Bar = 21"),
];

/// Only non-source files: extracts to zero units.
const EMPTY: &[(&str, &str)] = &[("README.md", "This is a readme"), ("LICENSE", MIT_LICENSE)];

async fn unit_paths<F: Fetcher>(w: &Worker<F, SqliteStore>, k: &ModuleKey) -> Vec<String> {
  w.store()
    .list_units(k)
    .await
    .unwrap()
    .into_iter()
    .map(|u| u.path)
    .collect()
}

// ─── Re-fetch ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn refetch_overwrites_then_rejects_degenerate_contents() {
  let w = worker(MemoryFetcher::new()).await;
  let k = key("v1.0.0");
  let foo = format!("{MODULE}/foo");
  let bar = format!("{MODULE}/bar");

  // First fetch: foo only.
  w.fetcher().publish(&k, Some(commit_time()), FOO.iter().copied());
  w.ingest(&k).await.unwrap();
  assert!(w.store().get_unit_meta(&foo, None, &k.version).await.unwrap().is_some());

  // Re-fetch with bar added: bar becomes visible with full metadata.
  w.fetcher().publish(&k, Some(commit_time()), FOOBAR.iter().copied());
  let summary = w.ingest(&k).await.unwrap();
  assert_eq!(summary.added, vec![bar.clone()]);
  assert_eq!(summary.units, 2);

  let got = w.store().get_unit(&bar, None, &k.version).await.unwrap().unwrap();
  assert_eq!(got.meta.key, k);
  assert_eq!(got.meta.name, "bar");
  assert_eq!(got.meta.commit_time, commit_time());
  assert!(got.meta.is_redistributable);
  assert_eq!(got.meta.source, Some(SourceInfo {
    repo_url:   format!("https://{MODULE}"),
    module_dir: String::new(),
    commit:     "v1.0.0".into(),
  }));
  assert_eq!(got.meta.licenses, vec![LicenseMetadata {
    types:     vec!["MIT".into()],
    file_path: "LICENSE".into(),
  }]);
  assert_eq!(got.readme, Some(Readme {
    file_path: "README.md".into(),
    contents:  "This is a readme".into(),
  }));
  let doc: &Documentation = got.documentation.as_ref().unwrap();
  assert_eq!(doc.synopsis, "Package bar");
  assert_eq!((doc.os.as_str(), doc.arch.as_str()), ("linux", "amd64"));

  // Re-fetch with no units at all: rejected, previous set still visible.
  w.fetcher().publish(&k, Some(commit_time()), EMPTY.iter().copied());
  let err = w.ingest(&k).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ValidationRejected);
  assert_eq!(unit_paths(&w, &k).await, vec![bar, foo]);

  let state = w.store().get_state(&k).await.unwrap().unwrap();
  assert_eq!(state.outcome, IngestOutcome::Failed(ErrorKind::ValidationRejected));
  assert_eq!(state.unit_count, 2);
  assert!(state.error.is_some());
}

#[tokio::test]
async fn refetch_with_fewer_units_removes_the_rest() {
  let w = worker(MemoryFetcher::new()).await;
  let k = key("v1.0.0");

  w.fetcher().publish(&k, Some(commit_time()), FOOBAR.iter().copied());
  w.ingest(&k).await.unwrap();
  w.fetcher().publish(&k, Some(commit_time()), FOO.iter().copied());
  let summary = w.ingest(&k).await.unwrap();

  assert_eq!(summary.removed, vec![format!("{MODULE}/bar")]);
  assert_eq!(unit_paths(&w, &k).await, vec![format!("{MODULE}/foo")]);
  assert!(
    w.store()
      .get_unit_meta(&format!("{MODULE}/bar"), None, &k.version)
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn same_contents_twice_is_unchanged() {
  let w = worker(MemoryFetcher::new()).await;
  let k = key("v1.0.0");
  w.fetcher().publish(&k, Some(commit_time()), FOOBAR.iter().copied());

  let first = w.ingest(&k).await.unwrap();
  let before = w.store().get_module(&k).await.unwrap();
  let second = w.ingest(&k).await.unwrap();
  let after = w.store().get_module(&k).await.unwrap();

  assert!(!first.unchanged);
  assert!(second.unchanged);
  assert_eq!(first.digest, second.digest);
  assert_eq!(before, after);
  assert_eq!(
    w.store().get_state(&k).await.unwrap().unwrap().outcome,
    IngestOutcome::Unchanged
  );
}

// ─── Failures write nothing ──────────────────────────────────────────────────

#[tokio::test]
async fn fetch_failure_writes_nothing() {
  let w = worker(MemoryFetcher::new()).await;
  let k = key("v1.0.0");

  let err = w.ingest(&k).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::FetchFailed);
  assert!(matches!(err, IngestError::Fetch { ref source, .. } if source.is_not_found()));
  assert!(w.store().get_module(&k).await.unwrap().is_none());

  let state = w.store().get_state(&k).await.unwrap().unwrap();
  assert_eq!(state.outcome, IngestOutcome::Failed(ErrorKind::FetchFailed));
  assert_eq!(state.unit_count, 0);
}

#[tokio::test]
async fn withdrawn_upstream_keeps_stored_units() {
  let w = worker(MemoryFetcher::new()).await;
  let k = key("v1.0.0");
  w.fetcher().publish(&k, Some(commit_time()), FOOBAR.iter().copied());
  let stored = w.ingest(&k).await.unwrap();

  assert!(w.fetcher().remove(&k).is_some());
  let err = w.ingest(&k).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::FetchFailed);
  assert_eq!(err.key(), &k);

  let module = w.store().get_module(&k).await.unwrap().unwrap();
  assert_eq!(module.digest, stored.digest);
  let state = w.store().get_state(&k).await.unwrap().unwrap();
  assert_eq!(state.outcome, IngestOutcome::Failed(ErrorKind::FetchFailed));
  assert_eq!(state.unit_count, 2);
}

#[tokio::test]
async fn extraction_failure_keeps_prior_state() {
  let w = worker(MemoryFetcher::new()).await;
  let k = key("v1.0.0");
  w.fetcher().publish(&k, Some(commit_time()), FOO.iter().copied());
  let stored = w.ingest(&k).await.unwrap();

  let mut broken = FOOBAR.to_vec();
  broken.push(("go.mod", "module \"unterminated\n"));
  w.fetcher().publish(&k, Some(commit_time()), broken);

  let err = w.ingest(&k).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ExtractionFailed);
  let module = w.store().get_module(&k).await.unwrap().unwrap();
  assert_eq!(module.digest, stored.digest);
  assert_eq!(unit_paths(&w, &k).await, vec![format!("{MODULE}/foo")]);
}

#[tokio::test]
async fn missing_commit_time_is_rejected() {
  let w = worker(MemoryFetcher::new()).await;
  let k = key("v1.0.0");
  w.fetcher().publish(&k, None, FOO.iter().copied());

  let err = w.ingest(&k).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ValidationRejected);
  assert!(w.store().get_module(&k).await.unwrap().is_none());
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn lifecycle_comes_from_own_manifest() {
  let w = worker(MemoryFetcher::new()).await;
  let k = key("v1.2.0");
  let manifest = format!(
    "// Deprecated: use baz instead\nmodule {MODULE}\n\nretract [v1.0.0, v1.2.0] // bug\n"
  );
  let mut files = FOO.to_vec();
  files.push(("go.mod", &manifest));
  w.fetcher().publish(&k, Some(commit_time()), files);

  let summary = w.ingest(&k).await.unwrap();
  assert!(summary.lifecycle.deprecated);
  assert_eq!(summary.lifecycle.deprecation_reason, "use baz instead");
  assert!(summary.lifecycle.retracted);
  assert_eq!(summary.lifecycle.retraction_reason, "bug");

  let module = w.store().get_module(&k).await.unwrap().unwrap().module;
  assert_eq!(module.lifecycle, summary.lifecycle);
  assert!(module.has_manifest);
}

#[tokio::test]
async fn latest_manifest_is_authoritative() {
  let w = worker(MemoryFetcher::new()).await;
  let old = key("v1.9.0");
  let new = key("v1.10.0");

  let plain = format!("module {MODULE}\n");
  let mut old_files = FOO.to_vec();
  old_files.push(("go.mod", &plain));
  w.fetcher().publish(&old, Some(commit_time()), old_files);

  let latest = format!(
    "// Deprecated: moved to example.com/next\nmodule {MODULE}\n\nretract v1.9.0 // broken build\n"
  );
  let mut new_files = FOO.to_vec();
  new_files.push(("go.mod", &latest));
  w.fetcher().publish(&new, Some(commit_time()), new_files);

  let summary = w.ingest(&old).await.unwrap();
  assert!(summary.lifecycle.deprecated);
  assert_eq!(summary.lifecycle.deprecation_reason, "moved to example.com/next");
  assert!(summary.lifecycle.retracted);
  assert_eq!(summary.lifecycle.retraction_reason, "broken build");

  let summary = w.ingest(&new).await.unwrap();
  assert!(summary.lifecycle.deprecated);
  assert!(!summary.lifecycle.retracted);
}

#[tokio::test]
async fn no_manifest_means_default_lifecycle() {
  let w = worker(MemoryFetcher::new()).await;
  let k = key("v1.0.0");
  w.fetcher().publish(&k, Some(commit_time()), FOO.iter().copied());

  let summary = w.ingest(&k).await.unwrap();
  assert!(!summary.lifecycle.deprecated && !summary.lifecycle.retracted);
  assert!(!w.store().get_module(&k).await.unwrap().unwrap().module.has_manifest);
}

// ─── Deadlines ───────────────────────────────────────────────────────────────

/// Delays every fetch.
struct SlowFetcher {
  inner: MemoryFetcher,
  delay: Duration,
}

impl Fetcher for SlowFetcher {
  async fn fetch(&self, key: &ModuleKey) -> Result<ModuleContents, FetchError> {
    tokio::time::sleep(self.delay).await;
    self.inner.fetch(key).await
  }
}

#[tokio::test]
async fn slow_fetch_is_cancelled() {
  let inner = MemoryFetcher::new();
  let k = key("v1.0.0");
  inner.publish(&k, Some(commit_time()), FOO.iter().copied());

  let w = worker(SlowFetcher { inner, delay: Duration::from_secs(5) })
    .await
    .with_timeout(Some(Duration::from_millis(20)));

  let err = w.ingest(&k).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Cancelled);
  assert!(matches!(err, IngestError::Cancelled { stage: Stage::Fetch, .. }));
  assert!(w.store().get_module(&k).await.unwrap().is_none());
  assert_eq!(
    w.store().get_state(&k).await.unwrap().unwrap().outcome,
    IngestOutcome::Failed(ErrorKind::Cancelled)
  );
}

/// Fetches promptly but stalls on the latest-manifest lookup.
struct SlowLatestFetcher {
  inner: MemoryFetcher,
  delay: Duration,
}

impl Fetcher for SlowLatestFetcher {
  async fn fetch(&self, key: &ModuleKey) -> Result<ModuleContents, FetchError> {
    self.inner.fetch(key).await
  }

  async fn latest_manifest(
    &self,
    module_path: &str,
  ) -> Result<Option<LatestManifest>, FetchError> {
    tokio::time::sleep(self.delay).await;
    self.inner.latest_manifest(module_path).await
  }
}

#[tokio::test]
async fn slow_latest_manifest_is_cancelled() {
  let inner = MemoryFetcher::new();
  let k = key("v1.0.0");
  inner.publish(&k, Some(commit_time()), FOO.iter().copied());

  let w = worker(SlowLatestFetcher { inner, delay: Duration::from_secs(5) })
    .await
    .with_timeout(Some(Duration::from_millis(50)));

  let err = w.ingest(&k).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Cancelled);
  assert!(matches!(err, IngestError::Cancelled { stage: Stage::Analyze, .. }));
  assert!(w.store().get_module(&k).await.unwrap().is_none());
}

#[tokio::test]
async fn expired_deadline_stops_before_the_store() {
  let w = worker(MemoryFetcher::new()).await;
  let k = key("v1.0.0");
  w.fetcher().publish(&k, Some(commit_time()), FOO.iter().copied());

  let err = w.ingest_until(&k, Some(Instant::now())).await.unwrap_err();
  assert!(matches!(err, IngestError::Cancelled { stage: Stage::Store, .. }));
  assert!(w.store().get_module(&k).await.unwrap().is_none());
}

// ─── Batches ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ingest_all_returns_results_in_input_order() {
  let fetcher = MemoryFetcher::new();
  let keys: Vec<ModuleKey> = ["v1.0.0", "v1.1.0", "v1.2.0", "v2.0.0-rc.1"]
    .into_iter()
    .map(key)
    .collect();
  for k in &keys[..3] {
    fetcher.publish(k, Some(commit_time()), FOOBAR.iter().copied());
  }

  let w = Arc::new(worker(fetcher).await.with_concurrency(2));
  let results = w.ingest_all(keys.clone()).await;

  let got: Vec<&ModuleKey> = results.iter().map(|(k, _)| k).collect();
  assert_eq!(got, keys.iter().collect::<Vec<_>>());
  assert!(results[..3].iter().all(|(_, r)| r.as_ref().is_ok_and(|s| s.units == 2)));
  assert_eq!(
    results[3].1.as_ref().map_err(Classify::kind).unwrap_err(),
    ErrorKind::FetchFailed
  );
}
