use std::fmt;
use std::fmt::Write;
use std::num::FpCategory;

/// The set of variables a template may reference at one nesting level.
///
/// Schemas are plain slices so that they can live in `const`s:
///
/// ```
/// use kata::{Schema, Var};
///
/// struct Greeting {
///   name: Option<String>,
/// }
///
/// const VARS: Schema<Greeting> = &[Var::str("name", |g: &Greeting| g.name.as_deref())];
/// ```
pub type Schema<'s, T> = &'s [Var<'s, T>];

/// Getter for string variables. `None` renders as nothing.
pub type StrGetter<T> = for<'a> fn(&'a T) -> Option<&'a str>;

/// Starts an iteration over an iterable variable.
pub type GeneratorFn<T> = fn(&T) -> Box<dyn Generator<T>>;

/// Drives `{{#name}}` blocks, one element at a time.
///
/// `advance` writes the next element into the record's cursor fields and
/// returns `true`, or returns `false` once the sequence is exhausted.
/// A generator dropped before exhaustion must release its resources in
/// `Drop`.
pub trait Generator<T> {
  fn advance(&mut self, vars: &mut T) -> bool;
}

/// Describes a single named variable of a schema: how to turn the value
/// into output bytes, when it counts as empty, and (for iterables) how to
/// walk its elements.
pub struct Var<'s, T> {
  pub(crate) name: &'s str,
  pub(crate) access: Access<T>,
  pub(crate) nested: Option<Schema<'s, T>>,
  pub(crate) generator: Option<GeneratorFn<T>>,
}

/// How a variable's value is read out of the record.
pub(crate) enum Access<T> {
  Int(fn(&T) -> i64),
  Float(fn(&T) -> f64),
  Str(StrGetter<T>),
  Custom {
    append: fn(&T, &mut String),
    is_empty: fn(&T) -> bool,
  },
  /// Iteration-only variable. Substituting it is a compile error.
  None,
}

impl<T> Clone for Access<T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for Access<T> {}

impl<'s, T> Var<'s, T> {
  /// An integer variable, rendered in decimal. Empty when zero.
  pub const fn int(name: &'s str, get: fn(&T) -> i64) -> Self {
    Self {
      name,
      access: Access::Int(get),
      nested: None,
      generator: None,
    }
  }

  /// A floating point variable, rendered `printf`-`%f` style with six
  /// decimal places. Empty when the value classifies as zero.
  pub const fn float(name: &'s str, get: fn(&T) -> f64) -> Self {
    Self {
      name,
      access: Access::Float(get),
      nested: None,
      generator: None,
    }
  }

  /// A string variable. `None` renders as nothing; empty when `None` or
  /// `""`. String variables are the only ones that may be substituted
  /// with HTML escaping (`{{{name}}}`).
  pub const fn str(name: &'s str, get: StrGetter<T>) -> Self {
    Self {
      name,
      access: Access::Str(get),
      nested: None,
      generator: None,
    }
  }

  /// A variable with a caller-supplied append and emptiness predicate.
  pub const fn custom(
    name: &'s str,
    append: fn(&T, &mut String),
    is_empty: fn(&T) -> bool,
  ) -> Self {
    Self {
      name,
      access: Access::Custom { append, is_empty },
      nested: None,
      generator: None,
    }
  }

  /// An iteration-only variable: `{{#name}}` blocks see `nested` as their
  /// schema and `generator` yields the elements.
  pub const fn iterable(
    name: &'s str,
    nested: Schema<'s, T>,
    generator: GeneratorFn<T>,
  ) -> Self {
    Self {
      name,
      access: Access::None,
      nested: Some(nested),
      generator: Some(generator),
    }
  }

  /// Makes any variable iterable as well.
  pub const fn with_iter(self, nested: Schema<'s, T>, generator: GeneratorFn<T>) -> Self {
    Self {
      name: self.name,
      access: self.access,
      nested: Some(nested),
      generator: Some(generator),
    }
  }

  pub const fn name(&self) -> &'s str {
    self.name
  }

  pub(crate) fn append(&self, vars: &T, buf: &mut String) {
    match self.access {
      Access::Int(get) => write!(buf, "{}", get(vars)).unwrap(),
      Access::Float(get) => write!(buf, "{:.6}", get(vars)).unwrap(),
      Access::Str(get) => {
        if let Some(s) = get(vars) {
          buf.push_str(s);
        }
      }
      Access::Custom { append, .. } => append(vars, buf),
      Access::None => {}
    }
  }

  pub(crate) fn is_empty(&self, vars: &T) -> bool {
    match self.access {
      Access::Int(get) => get(vars) == 0,
      Access::Float(get) => matches!(get(vars).classify(), FpCategory::Zero),
      Access::Str(get) => get(vars).map_or(true, str::is_empty),
      Access::Custom { is_empty, .. } => is_empty(vars),
      Access::None => true,
    }
  }
}

impl<'s, T> fmt::Debug for Var<'s, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let kind = match self.access {
      Access::Int(_) => "int",
      Access::Float(_) => "float",
      Access::Str(_) => "str",
      Access::Custom { .. } => "custom",
      Access::None => "iter",
    };
    write!(f, "Var({} {})", kind, self.name)
  }
}

/// Appends `s` with the characters `<`, `>`, `&`, `"`, `'` and `/`
/// replaced by their HTML entities.
pub(crate) fn append_escaped(buf: &mut String, s: &str) {
  for c in s.chars() {
    match c {
      '<' => buf.push_str("&lt;"),
      '>' => buf.push_str("&gt;"),
      '&' => buf.push_str("&amp;"),
      '"' => buf.push_str("&quot;"),
      '\'' => buf.push_str("&#x27;"),
      '/' => buf.push_str("&#x2f;"),
      _ => buf.push(c),
    }
  }
}
