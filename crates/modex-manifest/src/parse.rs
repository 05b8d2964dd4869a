//! Typed directives on top of the [`Document`](crate::syntax::Document) model.

use modex_core::module::parse_version;
use semver::Version;

use crate::{
  ManifestFile, ModuleDecl, Require, Retract,
  error::{Error, Result},
  syntax::{Block, Comments, Line, Stmt, parse_document},
};

/// Parse manifest bytes into a [`ManifestFile`].
pub(crate) fn parse_manifest(bytes: &[u8]) -> Result<ManifestFile> {
  let src = std::str::from_utf8(bytes).map_err(|_| Error::NotUtf8)?;
  let document = parse_document(src)?;

  let mut file = ManifestFile::default();
  for stmt in &document.stmts {
    match stmt {
      Stmt::Line(line) => {
        let Some((verb, args)) = line.tokens.split_first() else {
          continue;
        };
        directive(&mut file, verb, args, line, None)?;
      }
      Stmt::Block(block) => {
        for entry in &block.entries {
          directive(&mut file, &block.verb, &entry.tokens, entry, Some(block))?;
        }
      }
      Stmt::Comments(_) => {}
    }
  }

  file.document = document;
  Ok(file)
}

fn bad(line: &Line, verb: &str, detail: impl Into<String>) -> Error {
  Error::BadDirective {
    line:   line.line,
    verb:   verb.to_owned(),
    detail: detail.into(),
  }
}

fn version_at(line: &Line, value: &str) -> Result<Version> {
  parse_version(value).map_err(|source| Error::InvalidVersion {
    line: line.line,
    value: value.to_owned(),
    source,
  })
}

fn directive(
  file: &mut ManifestFile,
  verb: &str,
  args: &[String],
  line: &Line,
  block: Option<&Block>,
) -> Result<()> {
  match verb {
    "module" => {
      if file.module.is_some() {
        return Err(Error::DuplicateModule { line: line.line });
      }
      let [path] = args else {
        return Err(bad(line, verb, "expects exactly one module path"));
      };
      file.module = Some(ModuleDecl {
        path:     path.clone(),
        comments: line.comments.clone(),
        line:     line.line,
      });
    }
    "go" => {
      let [version] = args else {
        return Err(bad(line, verb, "expects exactly one language version"));
      };
      file.go = Some(version.clone());
    }
    "require" => {
      let [path, version] = args else {
        return Err(bad(line, verb, "expects a module path and a version"));
      };
      file.requires.push(Require {
        path:     path.clone(),
        version:  version_at(line, version)?,
        indirect: is_indirect(&line.comments),
        line:     line.line,
      });
    }
    "retract" => {
      let (low, high) = match args {
        [single] => {
          let v = version_at(line, single)?;
          (v.clone(), v)
        }
        [open, low, comma, high, close]
          if open == "[" && comma == "," && close == "]" =>
        {
          (version_at(line, low)?, version_at(line, high)?)
        }
        _ => {
          return Err(bad(
            line,
            verb,
            "expects a version or an interval like [v1.0.0, v1.2.0]",
          ));
        }
      };
      file.retracts.push(Retract {
        low,
        high,
        rationale: directive_comment(block, line),
        line: line.line,
      });
    }
    // Unknown verbs stay in the document model and are otherwise ignored.
    _ => {}
  }
  Ok(())
}

/// Rationale text for a directive: its own comments, or the enclosing block's
/// when the entry has none. Markers are stripped and lines joined with `\n`.
fn directive_comment(block: Option<&Block>, line: &Line) -> String {
  let comments = match block {
    Some(b) if line.comments.is_empty() => &b.comments,
    _ => &line.comments,
  };
  comments
    .iter()
    .map(|c| c.text())
    .collect::<Vec<_>>()
    .join("\n")
}

/// `// indirect` or `// indirect; other notes`.
fn is_indirect(comments: &Comments) -> bool {
  comments.suffix.iter().any(|c| {
    let text = c.text();
    text == "indirect" || text.starts_with("indirect;")
  })
}
