use std::fmt::Write;
use std::io;

use crate::span::Span;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while turning template source into a
/// compiled program. Rendering itself does not fail.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
  // Lexer
  #[error("unexpected action close sequence")]
  StrayActionClose,
  #[error("actions cannot span multiple lines")]
  MultiLineAction,
  #[error("unexpected EOF while scanning action")]
  EofInAction,
  #[error("unexpected EOF while scanning comment end")]
  EofInComment,
  #[error("unexpected character: {0}")]
  UnexpectedChar(char),
  #[error("expecting `}}`, found `{0}`")]
  ExpectedCloseBrace(char),

  // Parser
  #[error("unexpected lexeme: {kind} [{text}]")]
  UnexpectedLexeme { kind: &'static str, text: String },
  #[error("identifier exceeds {0} bytes")]
  IdentifierTooLong(usize),
  #[error("Unknown variable: {0}")]
  UnknownVariable(String),
  #[error("Couldn't find descriptor for variable `{0}`")]
  NotIterable(String),
  #[error("unexpected {{{{/{0}}}}}")]
  UnmatchedClose(String),
  #[error("expecting `{expected}` but found `{found}`")]
  MismatchedClose { expected: String, found: String },
  #[error("Could not find {{{{#{0}}}}}")]
  NoIterOpen(String),
  #[error("Could not find {{{{{0}?}}}}")]
  NoCondOpen(String),
  #[error("Expecting closing brace")]
  ExpectedCloseCurly,
  #[error("EOF while looking for matching {{{{/{0}}}}}")]
  UnclosedBlock(String),
  #[error("Symbol table not empty when finishing parser")]
  DanglingScope,
  #[error("unmatched negation")]
  UnmatchedNegate,
  #[error("unmatched quote")]
  UnmatchedQuote,

  // Post-processing
  #[error("internal error: could not find the end of {0} block")]
  MissingEnd(&'static str),
  #[error("Variable must be string to be escaped")]
  EscapeNonString,
  #[error("Invalid variable descriptor")]
  NoAppend,

  // Partials
  #[error("partials nested too deeply")]
  PartialDepth,
  #[error("could not load template `{path}`: {reason}")]
  PartialLoad { path: String, reason: String },
  #[error("Could not compile template `{path}`")]
  Partial {
    path: String,
    #[source]
    source: Box<Error>,
  },

  #[error(transparent)]
  Io(#[from] io::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
  pub kind: ErrorKind,
  pub span: Span,
}

impl Error {
  pub fn new(kind: ErrorKind, span: impl Into<Span>) -> Self {
    Self {
      kind,
      span: span.into(),
    }
  }

  /// Render the error together with a snippet of the offending source.
  ///
  /// With `use_color` the spanned part of the snippet is underlined
  /// using ANSI escapes.
  pub fn report(&self, src: &str, use_color: bool) -> String {
    let span = self.span;
    if span.is_empty() || span.start > src.len() || span.end > src.len() {
      return self.kind.to_string();
    }

    let start = src[..span.start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = src[span.end..]
      .find('\n')
      .map(|i| i + span.end)
      .unwrap_or(src.len());

    let (r, c) = if use_color {
      ("\x1b[0m", "\x1b[4;31m")
    } else {
      ("", "")
    };

    let pre = &src[start..span.start];
    let content = &src[span.start..span.end];
    let post = &src[span.end..end];

    let mut out = String::new();
    writeln!(out, "{}", self.kind).unwrap();

    let mut lines = content.lines().peekable();
    let first = lines.next().unwrap_or("");
    if lines.peek().is_none() {
      write!(out, "| {pre}{c}{first}{r}{post}").unwrap();
    } else {
      writeln!(out, "| {pre}{c}{first}{r}").unwrap();
      while let Some(line) = lines.next() {
        if lines.peek().is_some() {
          writeln!(out, "| {c}{line}{r}").unwrap();
        } else {
          write!(out, "| {c}{line}{r}{post}").unwrap();
        }
      }
    }

    out
  }
}

impl From<io::Error> for Error {
  fn from(value: io::Error) -> Self {
    Error::new(ErrorKind::Io(value), Span::default())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_is_the_message() {
    let err = Error::new(ErrorKind::UnknownVariable("missing".into()), 0..0);
    assert_eq!(err.to_string(), "Unknown variable: missing");

    let err = Error::new(ErrorKind::UnmatchedClose("unknown".into()), 0..0);
    assert_eq!(err.to_string(), "unexpected {{/unknown}}");

    let err = Error::new(ErrorKind::NoCondOpen("title".into()), 0..0);
    assert_eq!(err.to_string(), "Could not find {{title?}}");
  }

  #[test]
  fn report_underlines_the_span() {
    let src = "hello {{world}}";
    let err = Error::new(ErrorKind::UnknownVariable("world".into()), 8..13);
    assert_eq!(
      err.report(src, false),
      "Unknown variable: world\n| hello {{world}}"
    );
  }

  #[test]
  fn report_without_a_span_is_the_message() {
    let err = Error::new(ErrorKind::UnmatchedQuote, 0..0);
    assert_eq!(err.report("{{", false), "unmatched quote");
  }
}
