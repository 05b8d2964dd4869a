//! Line-level syntax of a manifest: tokens, blocks and comment attachment.
//!
//! Pipeline:
//!   raw &str
//!     └─ lex_line()        → (tokens, trailing comment)
//!          └─ parse_document() → Document { stmts }
//!
//! A run of comment-only lines directly above a directive (no blank line in
//! between) becomes that directive's `before` comments; a comment after the
//! tokens on the same line is its `suffix`. Any other comment run is kept as a
//! free-standing [`Stmt::Comments`] and attaches to nothing.

use crate::error::{Error, Result};

// ─── Document model ──────────────────────────────────────────────────────────

/// One `//` comment, marker included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
  pub token: String,
  pub line:  usize,
}

impl Comment {
  /// The comment text with the `//` marker and surrounding whitespace removed.
  pub fn text(&self) -> &str {
    self
      .token
      .strip_prefix("//")
      .unwrap_or(&self.token)
      .trim()
  }
}

/// Comments attached to a line or block header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comments {
  pub before: Vec<Comment>,
  pub suffix: Vec<Comment>,
}

impl Comments {
  pub fn is_empty(&self) -> bool { self.before.is_empty() && self.suffix.is_empty() }

  /// `before` then `suffix`, in file order.
  pub fn iter(&self) -> impl Iterator<Item = &Comment> {
    self.before.iter().chain(self.suffix.iter())
  }
}

/// A directive line, or an entry inside a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
  pub tokens:   Vec<String>,
  pub comments: Comments,
  pub line:     usize,
}

/// `verb ( ... )`. Entries carry only their arguments; the verb is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
  pub verb:     String,
  /// Comments attached to the `verb (` line.
  pub comments: Comments,
  pub entries:  Vec<Line>,
  pub line:     usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
  Line(Line),
  Block(Block),
  /// Comments not attached to any directive.
  Comments(Vec<Comment>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
  pub stmts: Vec<Stmt>,
}

// ─── Lexer ───────────────────────────────────────────────────────────────────

fn is_punct(c: char) -> bool { matches!(c, '[' | ']' | ',' | '(' | ')') }

/// Split one source line into tokens and an optional trailing comment.
///
/// Quoted tokens (`"..."` and `` `...` ``) are returned unquoted.
pub(crate) fn lex_line(
  src: &str,
  line: usize,
) -> Result<(Vec<String>, Option<Comment>)> {
  let mut tokens = Vec::new();
  let mut chars = src.char_indices().peekable();

  while let Some(&(i, c)) = chars.peek() {
    if c.is_whitespace() {
      chars.next();
      continue;
    }
    if src[i..].starts_with("//") {
      let token = src[i..].trim_end().to_owned();
      return Ok((tokens, Some(Comment { token, line })));
    }
    if is_punct(c) {
      tokens.push(c.to_string());
      chars.next();
      continue;
    }
    if c == '"' || c == '`' {
      chars.next();
      let mut value = String::new();
      let mut closed = false;
      while let Some((_, q)) = chars.next() {
        if q == c {
          closed = true;
          break;
        }
        if c == '"' && q == '\\' {
          match chars.next() {
            Some((_, 'n')) => value.push('\n'),
            Some((_, 't')) => value.push('\t'),
            Some((_, other)) => value.push(other),
            None => break,
          }
          continue;
        }
        value.push(q);
      }
      if !closed {
        return Err(Error::UnterminatedQuote { line });
      }
      tokens.push(value);
      continue;
    }

    // Bare word: runs until whitespace, punctuation, a quote or a comment.
    let start = i;
    let mut end = src.len();
    while let Some(&(j, d)) = chars.peek() {
      if d.is_whitespace()
        || is_punct(d)
        || d == '"'
        || d == '`'
        || src[j..].starts_with("//")
      {
        end = j;
        break;
      }
      chars.next();
    }
    tokens.push(src[start..end].to_owned());
  }

  Ok((tokens, None))
}

// ─── Parser ──────────────────────────────────────────────────────────────────

/// Build the document model for `src`.
pub(crate) fn parse_document(src: &str) -> Result<Document> {
  let mut stmts = Vec::new();
  let mut pending: Vec<Comment> = Vec::new();
  let mut open: Option<Block> = None;

  for (idx, raw) in src.lines().enumerate() {
    let line = idx + 1;
    let (tokens, comment) = lex_line(raw, line)?;

    if tokens.is_empty() {
      match comment {
        Some(c) => pending.push(c),
        // A blank line detaches whatever comments precede it.
        None if !pending.is_empty() => {
          let free = std::mem::take(&mut pending);
          if open.is_none() {
            stmts.push(Stmt::Comments(free));
          }
        }
        None => {}
      }
      continue;
    }

    let suffix: Vec<Comment> = comment.into_iter().collect();

    if open.is_some() {
      if tokens.len() == 1 && tokens[0] == ")" {
        pending.clear();
        if let Some(done) = open.take() {
          stmts.push(Stmt::Block(done));
        }
      } else if let Some(block) = open.as_mut() {
        block.entries.push(Line {
          tokens,
          comments: Comments { before: std::mem::take(&mut pending), suffix },
          line,
        });
      }
      continue;
    }

    if tokens.len() == 1 && tokens[0] == ")" {
      return Err(Error::UnexpectedClose { line });
    }

    // `verb (` opens a block; `verb ()` is an empty one.
    if tokens.len() >= 2 && tokens[1] == "(" {
      let block = Block {
        verb: tokens[0].clone(),
        comments: Comments { before: std::mem::take(&mut pending), suffix },
        entries: Vec::new(),
        line,
      };
      match &tokens[2..] {
        [] => open = Some(block),
        [close] if close == ")" => stmts.push(Stmt::Block(block)),
        _ => {
          return Err(Error::BadDirective {
            line,
            verb: tokens[0].clone(),
            detail: "block entries must start on the line after '('".to_owned(),
          });
        }
      }
      continue;
    }

    stmts.push(Stmt::Line(Line {
      tokens,
      comments: Comments { before: std::mem::take(&mut pending), suffix },
      line,
    }));
  }

  if let Some(block) = open {
    return Err(Error::UnterminatedBlock { line: block.line });
  }
  if !pending.is_empty() {
    stmts.push(Stmt::Comments(pending));
  }

  Ok(Document { stmts })
}
