//! A fetcher over a local directory laid out like a module proxy:
//!
//! ```text
//! <root>/<module path>/@v/<version>.info   {"Version": "v1.0.0", "Time": "..."}
//! <root>/<module path>/@v/<version>/...    extracted module files
//! ```

use std::{
  collections::BTreeMap,
  io,
  path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use modex_core::{
  fetch::{FetchError, Fetcher, LatestManifest, ModuleContents, VersionInfo},
  module::{ModuleKey, parse_version, tag},
};
use modex_manifest::MANIFEST_FILE;
use semver::Version;
use serde::Deserialize;
use tracing::debug;

/// The `.info` document served for each version.
#[derive(Debug, Deserialize)]
struct Info {
  #[serde(rename = "Version")]
  version: String,
  #[serde(rename = "Time")]
  time:    Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct DirFetcher {
  root: PathBuf,
}

impl DirFetcher {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  /// `<root>/<module path>/@v`. Paths that could step outside `root` are
  /// refused.
  fn version_dir(&self, module_path: &str) -> Result<PathBuf, FetchError> {
    let unsafe_path = module_path.starts_with('/')
      || module_path.contains('\\')
      || module_path
        .split('/')
        .any(|seg| seg.is_empty() || seg == "." || seg == ".." || seg == "@v");
    if unsafe_path {
      return Err(FetchError::UnsafePath(module_path.to_owned()));
    }
    Ok(self.root.join(module_path).join("@v"))
  }

  /// Read every regular file below `root`, keyed by slash-separated relative
  /// path.
  async fn read_tree(root: &Path) -> io::Result<BTreeMap<String, Vec<u8>>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![(root.to_path_buf(), String::new())];

    while let Some((dir, prefix)) = pending.pop() {
      let mut entries = tokio::fs::read_dir(&dir).await?;
      while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let rel = if prefix.is_empty() { name } else { format!("{prefix}/{name}") };
        let file_type = entry.file_type().await?;
        if file_type.is_dir() {
          pending.push((entry.path(), rel));
        } else if file_type.is_file() {
          files.insert(rel, tokio::fs::read(entry.path()).await?);
        }
      }
    }
    Ok(files)
  }
}

impl Fetcher for DirFetcher {
  async fn fetch(&self, key: &ModuleKey) -> Result<ModuleContents, FetchError> {
    let version_dir = self.version_dir(&key.module_path)?;
    let version_tag = tag(&key.version);

    let info_path = version_dir.join(format!("{version_tag}.info"));
    let raw = match tokio::fs::read(&info_path).await {
      Ok(raw) => raw,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        return Err(FetchError::NotFound(key.clone()));
      }
      Err(e) => return Err(e.into()),
    };

    let bad_info = |detail: String| FetchError::BadInfo { key: key.clone(), detail };
    let info: Info = serde_json::from_slice(&raw).map_err(|e| bad_info(e.to_string()))?;
    let version = parse_version(&info.version).map_err(|e| bad_info(e.to_string()))?;
    if version != key.version {
      return Err(bad_info(format!("serves version {}", info.version)));
    }

    let tree = version_dir.join(&version_tag);
    let files = match Self::read_tree(&tree).await {
      Ok(files) => files,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        return Err(FetchError::NotFound(key.clone()));
      }
      Err(e) => return Err(e.into()),
    };
    debug!(%key, files = files.len(), "read module tree");

    Ok(ModuleContents {
      info: VersionInfo { version, commit_time: info.time },
      manifest: files.get(MANIFEST_FILE).cloned(),
      files,
    })
  }

  async fn latest_manifest(
    &self,
    module_path: &str,
  ) -> Result<Option<LatestManifest>, FetchError> {
    let version_dir = self.version_dir(module_path)?;
    let mut entries = match tokio::fs::read_dir(&version_dir).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(e.into()),
    };

    let mut versions: Vec<Version> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
      let name = entry.file_name().to_string_lossy().into_owned();
      if let Some(v) = name.strip_suffix(".info").and_then(|s| parse_version(s).ok()) {
        versions.push(v);
      }
    }

    // Releases outrank pre-releases.
    let Some(latest) = versions
      .into_iter()
      .max_by(|a, b| (a.pre.is_empty(), a).cmp(&(b.pre.is_empty(), b)))
    else {
      return Ok(None);
    };

    let manifest_path = version_dir.join(tag(&latest)).join(MANIFEST_FILE);
    match tokio::fs::read(&manifest_path).await {
      Ok(manifest) => Ok(Some(LatestManifest { version: latest, manifest })),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// A unique scratch directory under the system temp dir.
  fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("modex-dir-fetcher-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
  }

  fn publish(root: &Path, module: &str, version: &str, files: &[(&str, &str)]) {
    let at = root.join(module).join("@v");
    std::fs::create_dir_all(at.join(version)).unwrap();
    std::fs::write(
      at.join(format!("{version}.info")),
      format!(r#"{{"Version":"{version}","Time":"2019-01-30T00:00:00Z"}}"#),
    )
    .unwrap();
    for (path, contents) in files {
      let dest = at.join(version).join(path);
      std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
      std::fs::write(dest, contents).unwrap();
    }
  }

  #[tokio::test]
  async fn reads_info_and_tree() {
    let root = scratch("tree");
    publish(&root, "example.com/m", "v1.0.0", &[
      ("go.mod", "module example.com/m\n"),
      ("foo/foo.go", "package foo"),
    ]);

    let fetcher = DirFetcher::new(&root);
    let key = ModuleKey::parse("example.com/m", "v1.0.0").unwrap();
    let got = fetcher.fetch(&key).await.unwrap();

    assert_eq!(got.info.version, key.version);
    assert!(got.info.commit_time.is_some());
    assert_eq!(got.manifest.as_deref(), Some(&b"module example.com/m\n"[..]));
    assert_eq!(got.files.keys().collect::<Vec<_>>(), vec!["foo/foo.go", "go.mod"]);

    let _ = std::fs::remove_dir_all(&root);
  }

  #[tokio::test]
  async fn missing_version_is_not_found() {
    let root = scratch("missing");
    let fetcher = DirFetcher::new(&root);
    let key = ModuleKey::parse("example.com/m", "v9.9.9").unwrap();
    let err = fetcher.fetch(&key).await.unwrap_err();
    assert!(err.is_not_found());
  }

  #[tokio::test]
  async fn paths_escaping_the_root_are_refused() {
    let root = scratch("escape");
    publish(&root, "example.com/m", "v1.0.0", &[("go.mod", "module example.com/m\n")]);
    let fetcher = DirFetcher::new(root.join("example.com"));

    for path in ["../example.com/m", "m/../../example.com/m", "./m", "m//x", "/m", "m\\x"] {
      let key = ModuleKey::parse(path, "v1.0.0").unwrap();
      let err = fetcher.fetch(&key).await.unwrap_err();
      assert!(matches!(err, FetchError::UnsafePath(_)), "{path}: {err}");
      assert!(matches!(
        fetcher.latest_manifest(path).await,
        Err(FetchError::UnsafePath(_))
      ));
    }

    // The same module is still reachable through a well-formed path.
    let key = ModuleKey::parse("m", "v1.0.0").unwrap();
    assert!(fetcher.fetch(&key).await.is_ok());

    let _ = std::fs::remove_dir_all(&root);
  }

  #[tokio::test]
  async fn latest_manifest_prefers_highest_release() {
    let root = scratch("latest");
    publish(&root, "example.com/m", "v1.9.0", &[("go.mod", "module example.com/m // 1.9\n")]);
    publish(&root, "example.com/m", "v1.10.0", &[("go.mod", "module example.com/m // 1.10\n")]);
    publish(&root, "example.com/m", "v2.0.0-rc.1", &[("go.mod", "module example.com/m\n")]);

    let latest = DirFetcher::new(&root)
      .latest_manifest("example.com/m")
      .await
      .unwrap()
      .unwrap();
    assert_eq!(latest.version, Version::new(1, 10, 0));
    assert_eq!(latest.manifest, b"module example.com/m // 1.10\n");

    let _ = std::fs::remove_dir_all(&root);
  }
}
