//! Source-location descriptors for modules hosted on well-known forges.

use modex_core::module::{ModuleKey, SourceInfo, tag};

const KNOWN_HOSTS: &[&str] = &["github.com", "gitlab.com", "bitbucket.org"];

/// `true` for a `vN` major-version suffix with `N >= 2`.
fn is_major_suffix(segment: &str) -> bool {
  segment
    .strip_prefix('v')
    .and_then(|n| n.parse::<u64>().ok())
    .is_some_and(|n| n >= 2)
}

/// Derive where `key` lives in its repository.
///
/// The repository is the first three path segments. A trailing major-version
/// suffix is not a directory. Modules below the repository root are tagged
/// `<dir>/v<version>`.
pub fn source_info(key: &ModuleKey) -> Option<SourceInfo> {
  let segments: Vec<&str> = key.module_path.split('/').collect();
  if segments.len() < 3 || !KNOWN_HOSTS.contains(&segments[0]) {
    return None;
  }

  let mut dir = &segments[3..];
  if let Some((last, rest)) = dir.split_last()
    && is_major_suffix(last)
  {
    dir = rest;
  }
  let module_dir = dir.join("/");

  let version_tag = tag(&key.version);
  let commit = if module_dir.is_empty() {
    version_tag
  } else {
    format!("{module_dir}/{version_tag}")
  };

  Some(SourceInfo {
    repo_url: format!("https://{}", segments[..3].join("/")),
    module_dir,
    commit,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(path: &str, version: &str) -> ModuleKey { ModuleKey::parse(path, version).unwrap() }

  #[test]
  fn repository_root_module() {
    let info = source_info(&key("github.com/valid/module_name", "v1.0.0")).unwrap();
    assert_eq!(info.repo_url, "https://github.com/valid/module_name");
    assert_eq!(info.module_dir, "");
    assert_eq!(info.commit, "v1.0.0");
  }

  #[test]
  fn nested_module_is_tagged_with_its_directory() {
    let info = source_info(&key("gitlab.com/acme/mono/tools/cli", "v0.3.1")).unwrap();
    assert_eq!(info.repo_url, "https://gitlab.com/acme/mono");
    assert_eq!(info.module_dir, "tools/cli");
    assert_eq!(info.commit, "tools/cli/v0.3.1");
  }

  #[test]
  fn major_version_suffix_is_not_a_directory() {
    let info = source_info(&key("github.com/acme/lib/v2", "v2.1.0")).unwrap();
    assert_eq!(info.module_dir, "");
    assert_eq!(info.commit, "v2.1.0");
  }

  #[test]
  fn unknown_hosts_have_no_source() {
    assert!(source_info(&key("example.com/m", "v1.0.0")).is_none());
    assert!(source_info(&key("github.com/acme", "v1.0.0")).is_none());
  }
}
