//! Worker configuration.
//!
//! Layered from an optional TOML file and `MODEX_`-prefixed environment
//! variables (`MODEX_CONCURRENCY=8`, `MODEX_RENDER__OS=darwin`). Every field
//! has a default, so an empty configuration is valid.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use serde::Deserialize;

/// Target platform documentation is rendered for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
  pub os:   String,
  pub arch: String,
}

impl Default for RenderConfig {
  fn default() -> Self { Self { os: "linux".into(), arch: "amd64".into() } }
}

/// Runtime worker configuration, deserialised from `modex.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
  pub store_path:         PathBuf,
  /// Root of the proxy-layout directory modules are fetched from.
  pub proxy_dir:          PathBuf,
  /// Deadline for one ingestion; `0` disables it.
  pub fetch_timeout_secs: u64,
  /// Ingestions in flight at once.
  pub concurrency:        usize,
  /// File extensions that make a directory a unit.
  pub source_extensions:  Vec<String>,
  pub render:             RenderConfig,
}

impl Default for WorkerConfig {
  fn default() -> Self {
    Self {
      store_path:         PathBuf::from("~/.local/share/modex/modex.db"),
      proxy_dir:          PathBuf::from("~/.cache/modex/proxy"),
      fetch_timeout_secs: 60,
      concurrency:        4,
      source_extensions:  vec!["go".into()],
      render:             RenderConfig::default(),
    }
  }
}

impl WorkerConfig {
  /// Load from `path` (if it exists) layered under the environment.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("MODEX")
          .separator("__")
          .list_separator(",")
          .with_list_parse_key("source_extensions")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()
  }

  pub fn timeout(&self) -> Option<Duration> {
    (self.fetch_timeout_secs > 0).then(|| Duration::from_secs(self.fetch_timeout_secs))
  }

  /// A copy with `~` expanded in every path.
  pub fn expanded(mut self) -> Self {
    self.store_path = expand_tilde(&self.store_path);
    self.proxy_dir = expand_tilde(&self.proxy_dir);
    self
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_gives_defaults() {
    let cfg = WorkerConfig::load(Path::new("/nonexistent/modex.toml")).unwrap();
    assert_eq!(cfg.concurrency, WorkerConfig::default().concurrency);
    assert_eq!(cfg.render, RenderConfig::default());
    assert_eq!(cfg.source_extensions, vec!["go".to_string()]);
  }

  #[test]
  fn file_values_override_defaults() {
    let path = std::env::temp_dir().join(format!("modex-config-{}.toml", std::process::id()));
    std::fs::write(
      &path,
      "concurrency = 16\nfetch_timeout_secs = 0\n\n[render]\nos = \"darwin\"\n",
    )
    .unwrap();

    let cfg = WorkerConfig::load(&path).unwrap();
    assert_eq!(cfg.concurrency, 16);
    assert_eq!(cfg.timeout(), None);
    assert_eq!(cfg.render.os, "darwin");
    assert_eq!(cfg.render.arch, "amd64");

    let _ = std::fs::remove_file(&path);
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/x/y")), PathBuf::from(home).join("x/y"));
    assert_eq!(expand_tilde(Path::new("/abs")), PathBuf::from("/abs"));
  }
}
