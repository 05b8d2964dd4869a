//! Manifest parser and lifecycle analyzer for modex.
//!
//! Parses the textual module manifest (module declaration, `go`, `require`
//! and `retract` directives, with comments attached to the directives they
//! annotate) and derives deprecation and retraction status from it. Pure
//! synchronous; no I/O.
//!
//! # Quick start
//!
//! ```
//! use modex_manifest::{analyze, parse};
//! use semver::Version;
//!
//! let src = "// Deprecated: use example.com/m/v2\nmodule example.com/m\n\nretract v1.0.0 // broken\n";
//! let file = parse(src.as_bytes()).unwrap();
//! let status = analyze(&file, &Version::new(1, 0, 0));
//! assert!(status.deprecated && status.retracted);
//! ```

mod analyze;
pub mod error;
mod parse;
pub mod syntax;

pub use analyze::{analyze, deprecation, retraction};
pub use error::{Error, Result};
use modex_core::module::ModuleVersion;
use semver::Version;
use syntax::{Comments, Document};

/// File name of the manifest at a module root. A directory holding one is
/// the root of its own module.
pub const MANIFEST_FILE: &str = "go.mod";

// ─── Public types ────────────────────────────────────────────────────────────

/// The `module` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDecl {
  pub path:     String,
  /// Comments directly above the directive and trailing on its line.
  pub comments: Comments,
  pub line:     usize,
}

/// A `require` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Require {
  pub path:     String,
  pub version:  Version,
  /// Marked with a trailing `// indirect` comment.
  pub indirect: bool,
  pub line:     usize,
}

/// A `retract` directive: the inclusive range `[low, high]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retract {
  pub low:       Version,
  pub high:      Version,
  /// Comment text explaining the retraction; may be empty.
  pub rationale: String,
  pub line:      usize,
}

/// A parsed manifest.
///
/// The [`Default`] value is the manifest of a module that ships none: no
/// module declaration, no directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestFile {
  pub module:   Option<ModuleDecl>,
  /// Language version from the `go` directive.
  pub go:       Option<String>,
  pub requires: Vec<Require>,
  /// In file order; the first range containing a version decides.
  pub retracts: Vec<Retract>,
  pub document: Document,
}

impl ManifestFile {
  pub fn module_path(&self) -> Option<&str> {
    self.module.as_ref().map(|m| m.path.as_str())
  }
}

/// A parsed manifest together with the module version it was read from.
#[derive(Debug, Clone)]
pub struct ManifestInfo {
  pub module_path: String,
  pub version:     Version,
  pub file:        ManifestFile,
}

impl ManifestInfo {
  /// Overwrite the lifecycle status of `module` from this manifest.
  ///
  /// Retraction is evaluated for `module`'s own version, which need not be
  /// the version this manifest came from.
  pub fn populate(&self, module: &mut ModuleVersion) {
    module.lifecycle = analyze(&self.file, &module.key.version);
  }
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Parse manifest bytes.
pub fn parse(bytes: &[u8]) -> Result<ManifestFile> { parse::parse_manifest(bytes) }
