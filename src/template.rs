use std::fmt;
use std::fs;
use std::path::Path;

use beef::lean::Cow;

use crate::error::Result;
use crate::loader::{FsLoader, Loader};
use crate::schema::{Schema, StrGetter, Var};
use crate::syntax::parser::{self, borrowed_text, owned_text};

/// One instruction of a compiled template.
///
/// `end`/`start` are back-links between block openers and closers,
/// stored as indices into the instruction array. They are zero until
/// post-processing fills them in.
pub(crate) enum Op<'s, T> {
  Append(Cow<'s, str>),
  AppendChar(char),
  Variable {
    var: &'s Var<'s, T>,
    quote: bool,
  },
  VariableStr {
    get: StrGetter<T>,
  },
  VariableStrEscape {
    get: StrGetter<T>,
  },
  StartIter {
    var: &'s Var<'s, T>,
    negate: bool,
    end: u32,
  },
  EndIter {
    start: u32,
    negate: bool,
  },
  IfNotEmpty {
    var: &'s Var<'s, T>,
    negate: bool,
    end: u32,
  },
  EndIfNotEmpty {
    var: &'s Var<'s, T>,
  },
  ApplyTpl(Box<Template<'s, T>>),
  Last,
}

/// A compiled template. Immutable once compiled; render it against any
/// number of records with [`Template::render`].
pub struct Template<'s, T> {
  pub(crate) ops: Vec<Op<'s, T>>,
  pub(crate) minimum_size: usize,
}

impl<'s, T> fmt::Debug for Template<'s, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Template")
      .field("ops_len", &self.ops.len())
      .field("minimum_size", &self.minimum_size)
      .finish()
  }
}

impl<'s, T> Template<'s, T> {
  pub(crate) fn new(ops: Vec<Op<'s, T>>, minimum_size: usize) -> Self {
    Self { ops, minimum_size }
  }

  /// Compiles a template, copying literal text out of `source`.
  /// Partials are loaded from the filesystem.
  pub fn compile(source: &str, schema: Schema<'s, T>) -> Result<Self> {
    parser::parse(source, schema, owned_text, &mut FsLoader, 0)
  }

  /// Compiles a template whose source outlives it; literal text borrows
  /// the source instead of copying.
  pub fn compile_const(source: &'s str, schema: Schema<'s, T>) -> Result<Self> {
    parser::parse(source, schema, borrowed_text, &mut FsLoader, 0)
  }

  /// Reads `path` and compiles its contents.
  pub fn compile_file(path: impl AsRef<Path>, schema: Schema<'s, T>) -> Result<Self> {
    let source = fs::read_to_string(path)?;
    parser::parse(&source, schema, owned_text, &mut FsLoader, 0)
  }

  /// A lower bound on the size of any render that elides no block,
  /// used to pre-grow output buffers.
  pub fn minimum_size(&self) -> usize {
    self.minimum_size
  }
}

/// Compiles templates with a custom partial loader or literal policy.
///
/// ```no_run
/// use kata::{Compiler, MemoryLoader, Schema, Var};
///
/// struct Page {
///   title: Option<String>,
/// }
///
/// const VARS: Schema<Page> = &[Var::str("title", |p: &Page| p.title.as_deref())];
///
/// let loader = MemoryLoader::new().with("head", "<h1>{{title}}</h1>");
/// let tpl = Compiler::new(VARS)
///   .with_loader(loader)
///   .compile("{{>head}}body")
///   .unwrap();
/// ```
pub struct Compiler<'s, T> {
  schema: Schema<'s, T>,
  loader: Box<dyn Loader>,
  const_source: bool,
}

impl<'s, T> Compiler<'s, T> {
  pub fn new(schema: Schema<'s, T>) -> Self {
    Self {
      schema,
      loader: Box::new(FsLoader),
      const_source: false,
    }
  }

  pub fn with_loader(mut self, loader: impl Loader + 'static) -> Self {
    self.loader = Box::new(loader);
    self
  }

  /// Treat compiled sources as immortal: literal text will borrow them.
  pub fn const_source(mut self) -> Self {
    self.const_source = true;
    self
  }

  pub fn compile(&mut self, source: &'s str) -> Result<Template<'s, T>> {
    let literal = if self.const_source {
      borrowed_text
    } else {
      owned_text
    };
    parser::parse(source, self.schema, literal, &mut *self.loader, 0)
  }

  pub fn compile_file(&mut self, path: impl AsRef<Path>) -> Result<Template<'s, T>> {
    let source = fs::read_to_string(path)?;
    parser::parse(&source, self.schema, owned_text, &mut *self.loader, 0)
  }
}

impl<'s, T> fmt::Display for Template<'s, T> {
  /// The instruction listing, with block bodies indented.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut indent = 0usize;
    for (i, op) in self.ops.iter().enumerate() {
      if i > 0 {
        writeln!(f)?;
      }
      if matches!(op, Op::EndIter { .. } | Op::EndIfNotEmpty { .. }) {
        indent = indent.saturating_sub(1);
      }
      write!(f, "{i} ")?;
      for _ in 0..indent {
        write!(f, "  ")?;
      }
      match op {
        Op::Append(text) => write!(f, "append {:?}", &**text)?,
        Op::AppendChar(c) => write!(f, "append_char {c:?}")?,
        Op::Variable { var, .. } => write!(f, "variable {}", var.name)?,
        Op::VariableStr { .. } => write!(f, "variable_str")?,
        Op::VariableStrEscape { .. } => write!(f, "variable_str_escape")?,
        Op::StartIter { var, negate, .. } => {
          write!(f, "start_iter {}", var.name)?;
          if *negate {
            write!(f, " negate")?;
          }
          indent += 1;
        }
        Op::EndIter { start, .. } => write!(f, "end_iter [{start}]")?,
        Op::IfNotEmpty { var, negate, .. } => {
          write!(f, "if_not_empty {}", var.name)?;
          if *negate {
            write!(f, " negate")?;
          }
          indent += 1;
        }
        Op::EndIfNotEmpty { .. } => write!(f, "end_if_not_empty")?,
        Op::ApplyTpl(_) => write!(f, "apply_tpl")?,
        Op::Last => write!(f, "last")?,
      }
    }
    Ok(())
  }
}
