//! Turns fetched module contents into a candidate module record and unit set.
//!
//! Pure and synchronous. License classification and documentation rendering
//! are delegated to the injected [`LicenseClassifier`] and [`DocRenderer`].

pub mod docs;
pub mod license;
pub mod source;

use std::collections::{BTreeMap, BTreeSet};

use modex_core::{
  fetch::ModuleContents,
  module::{LicenseMetadata, ModuleKey, ModuleVersion, Readme, Unit},
};
use modex_manifest::{MANIFEST_FILE, ManifestFile, ManifestInfo};

pub use self::{
  docs::{CommentRenderer, DocRenderer, Package},
  license::{KeywordClassifier, LicenseClassifier},
};
use crate::{config::WorkerConfig, error::ExtractError};

const README_NAMES: &[&str] =
  &["README.md", "README", "README.markdown", "README.txt", "README.rst"];

/// Output of [`Extractor::extract`].
#[derive(Debug, Clone)]
pub struct Extracted {
  /// Module record; its lifecycle status is left at the default for the
  /// caller to fill from the authoritative manifest.
  pub module:   ModuleVersion,
  /// Sorted by path.
  pub units:    Vec<Unit>,
  pub manifest: ManifestInfo,
}

pub struct Extractor {
  classifier: Box<dyn LicenseClassifier>,
  renderer:   Box<dyn DocRenderer>,
  extensions: Vec<String>,
}

// ─── Path helpers ────────────────────────────────────────────────────────────

/// Directory part of a slash-separated relative path; `""` for the root.
fn parent(path: &str) -> &str { path.rsplit_once('/').map_or("", |(dir, _)| dir) }

fn file_name(path: &str) -> &str { path.rsplit_once('/').map_or(path, |(_, name)| name) }

fn join(dir: &str, name: &str) -> String {
  if dir.is_empty() { name.to_owned() } else { format!("{dir}/{name}") }
}

/// `dir` followed by each ancestor, ending at the module root (`""`).
fn ancestry(dir: &str) -> impl Iterator<Item = &str> {
  let mut next = Some(dir);
  std::iter::from_fn(move || {
    let current = next?;
    next = (!current.is_empty()).then(|| parent(current));
    Some(current)
  })
}

fn check_path(path: &str) -> Result<(), ExtractError> {
  let unsafe_path = path.is_empty()
    || path.starts_with('/')
    || path.contains('\\')
    || path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
  if unsafe_path {
    return Err(ExtractError::UnsafePath(path.to_owned()));
  }
  Ok(())
}

/// Whether `dir` is `root` or lies beneath it.
fn is_within(dir: &str, root: &str) -> bool {
  dir == root || dir.strip_prefix(root).is_some_and(|rest| rest.starts_with('/'))
}

// ─── Extractor ───────────────────────────────────────────────────────────────

impl Extractor {
  pub fn new(
    classifier: Box<dyn LicenseClassifier>,
    renderer: Box<dyn DocRenderer>,
    extensions: Vec<String>,
  ) -> Self {
    Self { classifier, renderer, extensions }
  }

  /// The default collaborators, configured for the target platform and
  /// source extensions in `config`.
  pub fn from_config(config: &WorkerConfig) -> Self {
    Self::new(
      Box::new(KeywordClassifier),
      Box::new(CommentRenderer::new(&config.render.os, &config.render.arch)),
      config.source_extensions.clone(),
    )
  }

  fn is_source(&self, path: &str) -> bool {
    file_name(path)
      .rsplit_once('.')
      .is_some_and(|(_, ext)| self.extensions.iter().any(|e| e == ext))
  }

  fn is_redistributable(&self, licenses: &[LicenseMetadata]) -> bool {
    !licenses.is_empty()
      && licenses
        .iter()
        .all(|l| l.types.iter().any(|t| self.classifier.is_redistributable(t)))
  }

  pub fn extract(
    &self,
    key: &ModuleKey,
    contents: &ModuleContents,
  ) -> Result<Extracted, ExtractError> {
    for path in contents.files.keys() {
      check_path(path)?;
    }

    // Manifest.
    let file = match &contents.manifest {
      Some(bytes) => modex_manifest::parse(bytes)?,
      None => ManifestFile::default(),
    };
    if let Some(found) = file.module_path()
      && found != key.module_path
    {
      return Err(ExtractError::ModulePathMismatch {
        expected: key.module_path.clone(),
        found:    found.to_owned(),
      });
    }

    // Directories holding their own manifest are other modules.
    let nested: Vec<&str> = contents
      .files
      .keys()
      .filter(|p| file_name(p) == MANIFEST_FILE)
      .map(|p| parent(p))
      .filter(|dir| !dir.is_empty())
      .collect();
    let in_module = |path: &str| !nested.iter().any(|root| is_within(parent(path), root));

    // Licenses by directory.
    let mut licenses: BTreeMap<&str, Vec<LicenseMetadata>> = BTreeMap::new();
    for (path, bytes) in &contents.files {
      if in_module(path) && license::is_license_file(file_name(path)) {
        licenses
          .entry(parent(path))
          .or_default()
          .extend(self.classifier.classify(path, bytes));
      }
    }

    // Source files grouped into units by directory.
    let mut sources: BTreeMap<&str, Vec<(&str, &str)>> = BTreeMap::new();
    for (path, bytes) in &contents.files {
      if !in_module(path) || !self.is_source(path) {
        continue;
      }
      let text =
        std::str::from_utf8(bytes).map_err(|_| ExtractError::NotUtf8(path.clone()))?;
      sources.entry(parent(path)).or_default().push((path.as_str(), text));
    }

    let dirs: BTreeSet<&str> = contents.files.keys().map(|p| parent(p)).collect();
    let find_readme = |dir: &str| -> Option<Readme> {
      ancestry(dir).filter(|d| dirs.contains(d)).find_map(|d| {
        README_NAMES.iter().find_map(|name| {
          let file_path = join(d, name);
          let bytes = contents.files.get(&file_path)?;
          Some(Readme { contents: String::from_utf8_lossy(bytes).into_owned(), file_path })
        })
      })
    };

    let mut units = Vec::with_capacity(sources.len());
    for (dir, files) in sources {
      let path = if dir.is_empty() {
        key.module_path.clone()
      } else {
        format!("{}/{dir}", key.module_path)
      };
      let name = files
        .iter()
        .find_map(|(_, src)| docs::package_clause(src))
        .unwrap_or_else(|| file_name(&path))
        .to_owned();

      let applicable: Vec<LicenseMetadata> = ancestry(dir)
        .filter_map(|d| licenses.get(d))
        .flatten()
        .cloned()
        .collect();
      let is_redistributable = self.is_redistributable(&applicable);

      let (readme, documentation) = if is_redistributable {
        let package = Package { path: &path, name: &name, files };
        (find_readme(dir), self.renderer.render(&package))
      } else {
        (None, None)
      };

      units.push(Unit {
        path,
        name,
        is_redistributable,
        licenses: applicable,
        readme,
        documentation,
      });
    }

    let root_licenses = licenses.get("").cloned().unwrap_or_default();
    let mut module = ModuleVersion::new(key.clone());
    module.commit_time = contents.info.commit_time;
    module.source = source::source_info(key);
    module.is_redistributable = self.is_redistributable(&root_licenses);
    module.has_manifest = contents.manifest.is_some();
    module.licenses = root_licenses;

    Ok(Extracted {
      module,
      units,
      manifest: ManifestInfo {
        module_path: key.module_path.clone(),
        version: key.version.clone(),
        file,
      },
    })
  }
}
