//! Documentation rendering.
//!
//! The default renderer only reads the package doc comment: the `//` comment
//! block directly above a `package` clause.

use modex_core::module::Documentation;

/// One unit's source, as handed to a [`DocRenderer`].
#[derive(Debug, Clone)]
pub struct Package<'a> {
  /// Full import path of the unit.
  pub path:  &'a str,
  pub name:  &'a str,
  /// `(path relative to the module root, contents)`, sorted by path.
  pub files: Vec<(&'a str, &'a str)>,
}

pub trait DocRenderer: Send + Sync {
  fn render(&self, package: &Package<'_>) -> Option<Documentation>;
}

// ─── Package clause ──────────────────────────────────────────────────────────

/// The name in the first `package` clause of `source`.
pub fn package_clause(source: &str) -> Option<&str> {
  source.lines().find_map(|line| {
    let rest = line.trim_start().strip_prefix("package")?;
    if !rest.starts_with(char::is_whitespace) {
      return None;
    }
    rest.split_whitespace().next().filter(|name| !name.starts_with("//"))
  })
}

/// Text of the `//` comment block that ends on the line directly above the
/// `package` clause.
fn package_doc(source: &str) -> Option<String> {
  let lines: Vec<&str> = source.lines().collect();
  let clause = lines.iter().position(|l| {
    l.trim_start()
      .strip_prefix("package")
      .is_some_and(|rest| rest.starts_with(char::is_whitespace))
  })?;

  let mut start = clause;
  while start > 0 && lines[start - 1].trim_start().starts_with("//") {
    start -= 1;
  }
  if start == clause {
    return None;
  }

  let text = lines[start..clause]
    .iter()
    .map(|l| {
      let body = l.trim_start().trim_start_matches("//");
      body.strip_prefix(' ').unwrap_or(body).trim_end()
    })
    .collect::<Vec<_>>()
    .join("\n");
  Some(text)
}

/// First sentence of `doc`: up to and including the first period followed by
/// whitespace or the end, else the first paragraph.
fn synopsis(doc: &str) -> String {
  let paragraph = doc.split("\n\n").next().unwrap_or_default();
  let flat = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");
  let bytes = flat.as_bytes();
  for (i, b) in bytes.iter().enumerate() {
    if *b == b'.' && bytes.get(i + 1).is_none_or(|next| *next == b' ') {
      return flat[..=i].to_owned();
    }
  }
  flat
}

fn escape_html(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&#34;"),
      '\'' => out.push_str("&#39;"),
      c => out.push(c),
    }
  }
  out
}

// ─── Comment renderer ────────────────────────────────────────────────────────

/// Renders the package doc comment as escaped `<p>` paragraphs for one
/// target platform.
#[derive(Debug, Clone)]
pub struct CommentRenderer {
  pub os:   String,
  pub arch: String,
}

impl CommentRenderer {
  pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
    Self { os: os.into(), arch: arch.into() }
  }
}

impl DocRenderer for CommentRenderer {
  fn render(&self, package: &Package<'_>) -> Option<Documentation> {
    let doc = package
      .files
      .iter()
      .find_map(|(_, source)| package_doc(source))
      .unwrap_or_default();

    let html = doc
      .split("\n\n")
      .map(str::trim)
      .filter(|p| !p.is_empty())
      .map(|p| format!("<p>{}</p>", escape_html(p)))
      .collect::<Vec<_>>()
      .join("\n");

    Some(Documentation {
      synopsis: synopsis(&doc),
      html,
      os: self.os.clone(),
      arch: self.arch.clone(),
    })
  }
}
