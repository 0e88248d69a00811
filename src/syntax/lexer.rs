use crate::error::{Error, ErrorKind, Result};
use crate::span::Span;

const LEFT_META: &[u8] = b"{{";
const RIGHT_META: &[u8] = b"}}";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LexemeKind {
  Eof,
  Identifier,
  LeftMeta,
  Hash,
  RightMeta,
  Text,
  Slash,
  QuestionMark,
  Hat,
  GreaterThan,
  OpenCurly,
  CloseCurly,
}

impl LexemeKind {
  pub fn name(&self) -> &'static str {
    match self {
      LexemeKind::Eof => "<eof>",
      LexemeKind::Identifier => "identifier",
      LexemeKind::LeftMeta => "{{",
      LexemeKind::Hash => "#",
      LexemeKind::RightMeta => "}}",
      LexemeKind::Text => "text",
      LexemeKind::Slash => "/",
      LexemeKind::QuestionMark => "?",
      LexemeKind::Hat => "^",
      LexemeKind::GreaterThan => ">",
      LexemeKind::OpenCurly => "{",
      LexemeKind::CloseCurly => "}",
    }
  }
}

#[derive(Clone, Copy, Debug)]
pub struct Lexeme {
  pub kind: LexemeKind,
  pub span: Span,
}

impl Lexeme {
  pub fn is(&self, kind: LexemeKind) -> bool {
    self.kind == kind
  }
}

/// One lexing step: consume some bytes, maybe emit lexemes, hand over to
/// the next state. `None` halts the machine.
#[derive(Clone, Copy, Debug)]
enum State {
  Text,
  LeftMeta,
  Comment,
  InsideAction,
  Identifier,
  QuotedIdentifier,
  Partial,
  RightMeta,
}

pub struct Lexer<'src> {
  src: &'src str,
  start: usize,
  pos: usize,
  state: Option<State>,
  buf: RingBuffer,
}

impl<'src> Lexer<'src> {
  pub fn new(src: &'src str) -> Self {
    Self {
      src,
      start: 0,
      pos: 0,
      state: Some(State::Text),
      buf: RingBuffer::new(),
    }
  }

  #[inline]
  pub fn lexeme(&self, lexeme: &Lexeme) -> &'src str {
    &self.src[lexeme.span.range()]
  }

  /// Pulls the next lexeme, stepping the state machine until it produces
  /// one. After an error (or the end of input) the machine stays halted
  /// and every further pull reports `Eof`.
  pub fn next(&mut self) -> Result<Lexeme> {
    while self.buf.is_empty() && self.state.is_some() {
      self.step()?;
    }
    Ok(self.buf.pop().unwrap_or(Lexeme {
      kind: LexemeKind::Eof,
      span: (self.src.len()..self.src.len()).into(),
    }))
  }

  fn step(&mut self) -> Result<()> {
    let Some(state) = self.state else {
      return Ok(());
    };
    let next = match state {
      State::Text => self.text(),
      State::LeftMeta => self.left_meta(),
      State::Comment => self.comment(),
      State::InsideAction => self.inside_action(),
      State::Identifier => self.identifier(),
      State::QuotedIdentifier => self.quoted_identifier(),
      State::Partial => self.partial(),
      State::RightMeta => self.right_meta(),
    };
    match next {
      Ok(state) => {
        self.state = state;
        Ok(())
      }
      Err(err) => {
        self.state = None;
        Err(err)
      }
    }
  }

  #[inline]
  fn rest(&self) -> &[u8] {
    &self.src.as_bytes()[self.pos..]
  }

  #[inline]
  fn next_byte(&mut self) -> Option<u8> {
    let b = self.src.as_bytes().get(self.pos).copied()?;
    self.pos += 1;
    Some(b)
  }

  #[inline]
  fn backup(&mut self) {
    self.pos -= 1;
  }

  /// Drop the bytes accumulated since the last emit.
  #[inline]
  fn ignore(&mut self) {
    self.start = self.pos;
  }

  fn emit(&mut self, kind: LexemeKind) {
    self.buf.push(Lexeme {
      kind,
      span: (self.start..self.pos).into(),
    });
    self.start = self.pos;
  }

  fn error(&self, kind: ErrorKind) -> Error {
    Error::new(kind, self.start..self.pos)
  }

  /// Un-consumes the current byte and builds an error naming the full
  /// character it starts.
  fn unexpected_char(&mut self) -> Error {
    self.backup();
    let c = self.src[self.pos..]
      .chars()
      .next()
      .unwrap_or(char::REPLACEMENT_CHARACTER);
    Error::new(
      ErrorKind::UnexpectedChar(c),
      self.pos..self.pos + c.len_utf8(),
    )
  }

  fn text(&mut self) -> Result<Option<State>> {
    loop {
      if self.rest().starts_with(LEFT_META) {
        if self.pos > self.start {
          self.emit(LexemeKind::Text);
        }
        return Ok(Some(State::LeftMeta));
      }
      if self.rest().starts_with(RIGHT_META) {
        return Err(Error::new(
          ErrorKind::StrayActionClose,
          self.pos..self.pos + RIGHT_META.len(),
        ));
      }
      if self.next_byte().is_none() {
        break;
      }
    }
    if self.pos > self.start {
      self.emit(LexemeKind::Text);
    }
    self.emit(LexemeKind::Eof);
    Ok(None)
  }

  fn left_meta(&mut self) -> Result<Option<State>> {
    self.pos += LEFT_META.len();
    match self.next_byte() {
      Some(b'!') => return Ok(Some(State::Comment)),
      Some(_) => self.backup(),
      None => {}
    }
    self.emit(LexemeKind::LeftMeta);
    Ok(Some(State::InsideAction))
  }

  fn comment(&mut self) -> Result<Option<State>> {
    // the consumed `{{` counts towards the balance, so nested braces are fine
    let mut brackets = LEFT_META.len();
    loop {
      match self.next_byte() {
        Some(b'{') => brackets += 1,
        Some(b'}') => {
          brackets -= 1;
          if brackets == 0 {
            break;
          }
        }
        Some(_) => {}
        None => return Err(self.error(ErrorKind::EofInComment)),
      }
    }
    self.ignore();
    Ok(Some(State::Text))
  }

  fn inside_action(&mut self) -> Result<Option<State>> {
    loop {
      if self.rest().starts_with(RIGHT_META) {
        return Ok(Some(State::RightMeta));
      }
      let Some(b) = self.next_byte() else {
        return Err(self.error(ErrorKind::EofInAction));
      };
      match b {
        b'\n' => return Err(self.error(ErrorKind::MultiLineAction)),
        b'#' => {
          self.emit(LexemeKind::Hash);
          return Ok(Some(State::InsideAction));
        }
        b'?' => {
          self.emit(LexemeKind::QuestionMark);
          return Ok(Some(State::InsideAction));
        }
        b'^' => {
          self.emit(LexemeKind::Hat);
          return Ok(Some(State::InsideAction));
        }
        b'>' => {
          self.emit(LexemeKind::GreaterThan);
          return Ok(Some(State::Partial));
        }
        b'{' => return Ok(Some(State::QuotedIdentifier)),
        b'/' => {
          self.emit(LexemeKind::Slash);
          return Ok(Some(State::InsideAction));
        }
        _ if b.is_ascii_whitespace() => self.ignore(),
        _ if is_ident(b) => {
          self.backup();
          return Ok(Some(State::Identifier));
        }
        _ => return Err(self.unexpected_char()),
      }
    }
  }

  fn identifier(&mut self) -> Result<Option<State>> {
    self.scan_identifier();
    self.emit(LexemeKind::Identifier);
    Ok(Some(State::InsideAction))
  }

  fn scan_identifier(&mut self) {
    loop {
      match self.next_byte() {
        Some(b) if is_ident(b) => {}
        Some(_) => {
          self.backup();
          break;
        }
        None => break,
      }
    }
  }

  fn quoted_identifier(&mut self) -> Result<Option<State>> {
    self.emit(LexemeKind::OpenCurly);
    self.scan_identifier();
    self.emit(LexemeKind::Identifier);
    match self.next_byte() {
      Some(b'}') => {
        self.emit(LexemeKind::CloseCurly);
        Ok(Some(State::InsideAction))
      }
      Some(_) => {
        self.backup();
        let c = self.src[self.pos..]
          .chars()
          .next()
          .unwrap_or(char::REPLACEMENT_CHARACTER);
        Err(Error::new(
          ErrorKind::ExpectedCloseBrace(c),
          self.pos..self.pos + c.len_utf8(),
        ))
      }
      None => Err(self.error(ErrorKind::EofInAction)),
    }
  }

  /// After `{{>`: skip whitespace, then exactly one identifier.
  fn partial(&mut self) -> Result<Option<State>> {
    loop {
      let Some(b) = self.next_byte() else {
        return Err(self.error(ErrorKind::EofInAction));
      };
      if b == b'\n' {
        return Err(self.error(ErrorKind::MultiLineAction));
      }
      if b.is_ascii_whitespace() {
        self.ignore();
        continue;
      }
      if is_ident(b) {
        self.backup();
        return Ok(Some(State::Identifier));
      }
      return Err(self.unexpected_char());
    }
  }

  fn right_meta(&mut self) -> Result<Option<State>> {
    self.pos += RIGHT_META.len();
    self.emit(LexemeKind::RightMeta);
    Ok(Some(State::Text))
  }
}

fn is_ident(b: u8) -> bool {
  b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'/')
}

const LOOKAHEAD: usize = 4;

/// Bounded FIFO between the state machine and the parser. No state emits
/// more than three lexemes per step, so four slots never overflow.
struct RingBuffer {
  items: [Option<Lexeme>; LOOKAHEAD],
  head: usize,
  len: usize,
}

impl RingBuffer {
  fn new() -> Self {
    Self {
      items: [None; LOOKAHEAD],
      head: 0,
      len: 0,
    }
  }

  fn is_empty(&self) -> bool {
    self.len == 0
  }

  fn push(&mut self, lexeme: Lexeme) {
    debug_assert!(self.len < LOOKAHEAD);
    self.items[(self.head + self.len) % LOOKAHEAD] = Some(lexeme);
    self.len += 1;
  }

  fn pop(&mut self) -> Option<Lexeme> {
    if self.len == 0 {
      return None;
    }
    let lexeme = self.items[self.head].take();
    self.head = (self.head + 1) % LOOKAHEAD;
    self.len -= 1;
    lexeme
  }
}
