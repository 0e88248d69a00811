use std::error::Error as StdError;
use std::fmt;
use std::fs;

use indexmap::IndexMap;

pub type LoadError = Box<dyn StdError + Send + Sync + 'static>;

/// Resolves `{{>path}}` partials to template source.
pub trait Loader {
  fn load(&mut self, path: &str) -> Result<String, LoadError>;
}

/// The default loader: paths are files, read from disk.
pub struct FsLoader;

impl Loader for FsLoader {
  fn load(&mut self, path: &str) -> Result<String, LoadError> {
    Ok(fs::read_to_string(path)?)
  }
}

/// An in-memory loader for embedders and tests.
#[derive(Default)]
pub struct MemoryLoader {
  templates: IndexMap<String, String>,
}

impl MemoryLoader {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
    self.insert(name, source);
    self
  }

  pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
    self.templates.insert(name.into(), source.into());
  }
}

impl Loader for MemoryLoader {
  fn load(&mut self, path: &str) -> Result<String, LoadError> {
    match self.templates.get(path) {
      Some(source) => Ok(source.clone()),
      None => Err(Box::new(NotRegistered { path: path.into() })),
    }
  }
}

#[derive(Debug)]
struct NotRegistered {
  path: String,
}

impl fmt::Display for NotRegistered {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "no template registered for `{}`", self.path)
  }
}

impl StdError for NotRegistered {}
