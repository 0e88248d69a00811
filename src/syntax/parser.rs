use std::ptr;

use beef::lean::Cow;
use indexmap::IndexMap;

use super::lexer::{Lexeme, LexemeKind, Lexer};
use super::link::link;
use crate::error::{Error, ErrorKind, Result};
use crate::loader::Loader;
use crate::schema::{Schema, Var};
use crate::span::Span;
use crate::template::{Op, Template};

const MAX_IDENT: usize = 64;
const MAX_PARTIAL_DEPTH: usize = 64;

/// Decides whether literal text is copied out of the source or borrowed
/// from it. Borrowing requires the source to outlive the template, which
/// the borrowed instantiation expresses by unifying the two lifetimes.
pub(crate) type TextFn<'s, 'src> = fn(&'src str) -> Cow<'s, str>;

pub(crate) fn owned_text<'s, 'src>(text: &'src str) -> Cow<'s, str> {
  Cow::owned(text.to_owned())
}

pub(crate) fn borrowed_text(text: &str) -> Cow<'_, str> {
  Cow::borrowed(text)
}

pub(crate) fn parse<'s, 'src, T>(
  source: &'src str,
  schema: Schema<'s, T>,
  literal: TextFn<'s, 'src>,
  loader: &mut dyn Loader,
  depth: usize,
) -> Result<Template<'s, T>> {
  let mut parser = Parser::new(source, schema, literal, loader, depth);
  parser.run()?;
  parser.finish()
}

/// One parsing step per lexeme. States that need lookahead pull further
/// lexemes themselves.
enum State {
  Text,
  Meta,
  Iter,
  Negate,
  Slash,
  Partial,
  RightMeta,
  Done,
}

struct OpenBlock<'src> {
  name: &'src str,
  span: Span,
}

struct Parser<'s, 'src, 'ld, T> {
  lexer: Lexer<'src>,
  schema: Schema<'s, T>,
  symtab: Vec<IndexMap<&'s str, &'s Var<'s, T>>>,
  ops: Vec<Op<'s, T>>,
  stack: Vec<OpenBlock<'src>>,
  negate: bool,
  quote: bool,
  minimum_size: usize,
  literal: TextFn<'s, 'src>,
  loader: &'ld mut dyn Loader,
  depth: usize,
}

impl<'s, 'src, 'ld, T> Parser<'s, 'src, 'ld, T> {
  fn new(
    source: &'src str,
    schema: Schema<'s, T>,
    literal: TextFn<'s, 'src>,
    loader: &'ld mut dyn Loader,
    depth: usize,
  ) -> Self {
    let mut parser = Self {
      lexer: Lexer::new(source),
      schema,
      symtab: Vec::new(),
      ops: Vec::new(),
      stack: Vec::new(),
      negate: false,
      quote: false,
      minimum_size: 0,
      literal,
      loader,
      depth,
    };
    parser.push_frame(schema);
    parser
  }

  fn run(&mut self) -> Result<()> {
    let mut state = State::Text;
    loop {
      let lexeme = self.lexer.next()?;
      state = match state {
        State::Text => self.text(lexeme)?,
        State::Meta => self.meta(lexeme)?,
        State::Iter => self.iter(lexeme)?,
        State::Negate => self.negate(lexeme)?,
        State::Slash => self.slash(lexeme)?,
        State::Partial => self.partial(lexeme)?,
        State::RightMeta => self.right_meta(lexeme)?,
        State::Done => return Ok(()),
      };
      if matches!(state, State::Done) {
        return Ok(());
      }
    }
  }

  fn finish(mut self) -> Result<Template<'s, T>> {
    if let Some(open) = self.stack.pop() {
      return Err(Error::new(
        ErrorKind::UnclosedBlock(open.name.into()),
        open.span,
      ));
    }
    self.pop_frame();
    if !self.symtab.is_empty() {
      return Err(Error::new(ErrorKind::DanglingScope, Span::default()));
    }
    if self.negate {
      return Err(Error::new(ErrorKind::UnmatchedNegate, Span::default()));
    }
    if self.quote {
      return Err(Error::new(ErrorKind::UnmatchedQuote, Span::default()));
    }
    link(&mut self.ops)?;
    Ok(Template::new(self.ops, self.minimum_size))
  }

  fn text(&mut self, lexeme: Lexeme) -> Result<State> {
    match lexeme.kind {
      LexemeKind::LeftMeta => Ok(State::Meta),
      LexemeKind::Text => {
        let text = self.lexer.lexeme(&lexeme);
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
          (Some(c), None) => self.ops.push(Op::AppendChar(c)),
          _ => self.ops.push(Op::Append((self.literal)(text))),
        }
        self.minimum_size += text.len();
        Ok(State::Text)
      }
      LexemeKind::Eof => {
        self.ops.push(Op::Last);
        Ok(State::Done)
      }
      _ => Err(self.unexpected(&lexeme)),
    }
  }

  fn meta(&mut self, lexeme: Lexeme) -> Result<State> {
    match lexeme.kind {
      LexemeKind::OpenCurly if !self.quote => {
        self.quote = true;
        Ok(State::Meta)
      }
      LexemeKind::Identifier => self.identifier(lexeme),
      LexemeKind::GreaterThan => Ok(State::Partial),
      LexemeKind::Hash => Ok(State::Iter),
      LexemeKind::Hat => Ok(State::Negate),
      LexemeKind::Slash => Ok(State::Slash),
      _ => Err(self.unexpected(&lexeme)),
    }
  }

  fn identifier(&mut self, lexeme: Lexeme) -> Result<State> {
    let mut next = self.lexer.next()?;
    if self.quote {
      if !next.is(LexemeKind::CloseCurly) {
        return Err(Error::new(ErrorKind::ExpectedCloseCurly, next.span));
      }
      next = self.lexer.next()?;
    }
    match next.kind {
      LexemeKind::RightMeta => {
        let var = self.lookup(&lexeme)?;
        self.ops.push(Op::Variable {
          var,
          quote: self.quote,
        });
        self.quote = false;
        self.minimum_size += self.lexer.lexeme(&lexeme).len() + 1;
        Ok(State::Text)
      }
      LexemeKind::QuestionMark => {
        let var = self.lookup(&lexeme)?;
        self.ops.push(Op::IfNotEmpty {
          var,
          negate: self.negate,
          end: 0,
        });
        self.push_block(&lexeme);
        self.negate = false;
        Ok(State::RightMeta)
      }
      _ => Err(self.unexpected(&next)),
    }
  }

  fn iter(&mut self, lexeme: Lexeme) -> Result<State> {
    if !lexeme.is(LexemeKind::Identifier) {
      return Err(self.unexpected(&lexeme));
    }
    let var = self.lookup(&lexeme)?;
    let (Some(nested), Some(_)) = (var.nested, var.generator) else {
      return Err(Error::new(
        ErrorKind::NotIterable(self.lexer.lexeme(&lexeme).into()),
        lexeme.span,
      ));
    };
    self.push_frame(nested);
    self.ops.push(Op::StartIter {
      var,
      negate: self.negate,
      end: 0,
    });
    self.push_block(&lexeme);
    self.negate = false;
    Ok(State::RightMeta)
  }

  fn negate(&mut self, lexeme: Lexeme) -> Result<State> {
    match lexeme.kind {
      LexemeKind::Hash => {
        self.negate = !self.negate;
        Ok(State::Iter)
      }
      LexemeKind::Identifier => {
        self.negate = !self.negate;
        self.identifier(lexeme)
      }
      _ => Err(self.unexpected(&lexeme)),
    }
  }

  fn slash(&mut self, lexeme: Lexeme) -> Result<State> {
    if !lexeme.is(LexemeKind::Identifier) {
      return Err(self.unexpected(&lexeme));
    }
    let next = self.lexer.next()?;
    match next.kind {
      LexemeKind::RightMeta => self.end_iter(lexeme),
      LexemeKind::QuestionMark => self.end_cond(lexeme),
      _ => Err(self.unexpected(&next)),
    }
  }

  fn end_iter(&mut self, lexeme: Lexeme) -> Result<State> {
    self.pop_block(&lexeme)?;
    let var = self.lookup(&lexeme)?;
    for i in (0..self.ops.len()).rev() {
      let opens = matches!(
        &self.ops[i],
        Op::StartIter { var: opener, .. } if ptr::eq(*opener, var)
      );
      if opens {
        self.ops.push(Op::EndIter {
          start: i as u32,
          negate: false,
        });
        self.pop_frame();
        return Ok(State::Text);
      }
    }
    Err(Error::new(
      ErrorKind::NoIterOpen(self.lexer.lexeme(&lexeme).into()),
      lexeme.span,
    ))
  }

  fn end_cond(&mut self, lexeme: Lexeme) -> Result<State> {
    self.pop_block(&lexeme)?;
    let var = self.lookup(&lexeme)?;
    for i in (0..self.ops.len()).rev() {
      let opens = matches!(
        &self.ops[i],
        Op::IfNotEmpty { var: opener, .. } if ptr::eq(*opener, var)
      );
      if opens {
        self.ops.push(Op::EndIfNotEmpty { var });
        return Ok(State::RightMeta);
      }
    }
    Err(Error::new(
      ErrorKind::NoCondOpen(self.lexer.lexeme(&lexeme).into()),
      lexeme.span,
    ))
  }

  fn partial(&mut self, lexeme: Lexeme) -> Result<State> {
    if !lexeme.is(LexemeKind::Identifier) {
      return Err(self.unexpected(&lexeme));
    }
    let path = self.lexer.lexeme(&lexeme);
    if self.depth >= MAX_PARTIAL_DEPTH {
      return Err(Error::new(ErrorKind::PartialDepth, lexeme.span));
    }
    let source = self.loader.load(path).map_err(|err| {
      Error::new(
        ErrorKind::PartialLoad {
          path: path.into(),
          reason: err.to_string(),
        },
        lexeme.span,
      )
    })?;
    // partials always own their literals: the loaded source dies here
    let template = parse(
      &source,
      self.schema,
      owned_text,
      &mut *self.loader,
      self.depth + 1,
    )
    .map_err(|err| {
      Error::new(
        ErrorKind::Partial {
          path: path.into(),
          source: Box::new(err),
        },
        lexeme.span,
      )
    })?;
    self.ops.push(Op::ApplyTpl(Box::new(template)));
    Ok(State::RightMeta)
  }

  fn right_meta(&mut self, lexeme: Lexeme) -> Result<State> {
    if lexeme.is(LexemeKind::RightMeta) {
      Ok(State::Text)
    } else {
      Err(self.unexpected(&lexeme))
    }
  }

  fn lookup(&self, lexeme: &Lexeme) -> Result<&'s Var<'s, T>> {
    let name = self.lexer.lexeme(lexeme);
    if name.len() > MAX_IDENT {
      return Err(Error::new(
        ErrorKind::IdentifierTooLong(MAX_IDENT),
        lexeme.span,
      ));
    }
    for frame in self.symtab.iter().rev() {
      if let Some(var) = frame.get(name) {
        return Ok(*var);
      }
    }
    Err(Error::new(
      ErrorKind::UnknownVariable(name.into()),
      lexeme.span,
    ))
  }

  fn push_frame(&mut self, schema: Schema<'s, T>) {
    let mut frame = IndexMap::with_capacity(schema.len());
    for var in schema {
      frame.insert(var.name, var);
    }
    self.symtab.push(frame);
  }

  fn pop_frame(&mut self) {
    self.symtab.pop();
  }

  fn push_block(&mut self, lexeme: &Lexeme) {
    self.stack.push(OpenBlock {
      name: self.lexer.lexeme(lexeme),
      span: lexeme.span,
    });
  }

  fn pop_block(&mut self, lexeme: &Lexeme) -> Result<()> {
    let name = self.lexer.lexeme(lexeme);
    let Some(top) = self.stack.last() else {
      return Err(Error::new(
        ErrorKind::UnmatchedClose(name.into()),
        lexeme.span,
      ));
    };
    if top.name != name {
      return Err(Error::new(
        ErrorKind::MismatchedClose {
          expected: top.name.into(),
          found: name.into(),
        },
        lexeme.span,
      ));
    }
    self.stack.pop();
    Ok(())
  }

  fn unexpected(&self, lexeme: &Lexeme) -> Error {
    Error::new(
      ErrorKind::UnexpectedLexeme {
        kind: lexeme.kind.name(),
        text: self.lexer.lexeme(lexeme).into(),
      },
      lexeme.span,
    )
  }
}

#[cfg(test)]
mod tests;
