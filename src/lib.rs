//! A logic-less template engine.
//!
//! Templates are compiled once against a schema of typed variable
//! descriptors, then rendered any number of times against records
//! conforming to that schema:
//!
//! ```
//! use kata::{Schema, Template, Var};
//!
//! struct Greeting {
//!   name: Option<String>,
//! }
//!
//! const VARS: Schema<Greeting> = &[Var::str("name", |g: &Greeting| g.name.as_deref())];
//!
//! let tpl = Template::compile("Hello, {{name}}!", VARS).unwrap();
//! let mut greeting = Greeting {
//!   name: Some("world".into()),
//! };
//! assert_eq!(tpl.render(&mut greeting), "Hello, world!");
//! ```
//!
//! Surface syntax: `{{name}}` substitutes a variable, `{{{name}}}`
//! substitutes with HTML escaping, `{{name?}}…{{/name?}}` renders a block
//! when the variable is non-empty, `{{#name}}…{{/name}}` iterates,
//! a `^` right after the `{{` negates either block form (`{{^name?}}`,
//! `{{^#name}}`), `{{>path}}` inlines a partial and `{{! … }}` is a
//! comment.

mod error;
mod loader;
mod schema;
mod span;
mod syntax;
mod template;
mod vm;

pub use error::{Error, ErrorKind, Result};
pub use loader::{FsLoader, LoadError, Loader, MemoryLoader};
pub use schema::{Generator, GeneratorFn, Schema, StrGetter, Var};
pub use span::Span;
pub use template::{Compiler, Template};
