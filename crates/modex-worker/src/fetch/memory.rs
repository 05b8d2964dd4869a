//! An in-memory fetcher for embedding and tests.

use std::{
  collections::{BTreeMap, HashMap},
  sync::{PoisonError, RwLock},
};

use chrono::{DateTime, Utc};
use modex_core::{
  fetch::{FetchError, Fetcher, LatestManifest, ModuleContents, VersionInfo},
  module::ModuleKey,
};
use modex_manifest::MANIFEST_FILE;

/// Serves whatever contents were last published for each key. Publishing
/// again replaces the contents, which is how a changed upstream is simulated.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
  modules: RwLock<HashMap<ModuleKey, ModuleContents>>,
}

impl MemoryFetcher {
  pub fn new() -> Self { Self::default() }

  pub fn insert(&self, key: ModuleKey, contents: ModuleContents) {
    self
      .modules
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(key, contents);
  }

  /// Publish a file tree for `key`. The manifest is taken from the tree's
  /// root manifest file, if any.
  pub fn publish<'a>(
    &self,
    key: &ModuleKey,
    commit_time: Option<DateTime<Utc>>,
    files: impl IntoIterator<Item = (&'a str, &'a str)>,
  ) {
    let files: BTreeMap<String, Vec<u8>> = files
      .into_iter()
      .map(|(path, contents)| (path.to_owned(), contents.as_bytes().to_vec()))
      .collect();
    let contents = ModuleContents {
      info: VersionInfo { version: key.version.clone(), commit_time },
      manifest: files.get(MANIFEST_FILE).cloned(),
      files,
    };
    self.insert(key.clone(), contents);
  }

  pub fn remove(&self, key: &ModuleKey) -> Option<ModuleContents> {
    self
      .modules
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(key)
  }
}

impl Fetcher for MemoryFetcher {
  async fn fetch(&self, key: &ModuleKey) -> Result<ModuleContents, FetchError> {
    self
      .modules
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(key)
      .cloned()
      .ok_or_else(|| FetchError::NotFound(key.clone()))
  }

  async fn latest_manifest(
    &self,
    module_path: &str,
  ) -> Result<Option<LatestManifest>, FetchError> {
    let modules = self.modules.read().unwrap_or_else(PoisonError::into_inner);
    Ok(
      modules
        .iter()
        .filter(|(key, _)| key.module_path == module_path)
        .max_by(|(a, _), (b, _)| {
          (a.version.pre.is_empty(), &a.version).cmp(&(b.version.pre.is_empty(), &b.version))
        })
        .and_then(|(key, contents)| {
          Some(LatestManifest {
            version:  key.version.clone(),
            manifest: contents.manifest.clone()?,
          })
        }),
    )
  }
}
