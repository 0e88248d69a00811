use std::ptr;

use crate::error::{Error, ErrorKind, Result};
use crate::schema::{Access, Var};
use crate::span::Span;
use crate::template::Op;

enum Opener<'s, T> {
  If(&'s Var<'s, T>),
  Iter(bool),
  Variable(&'s Var<'s, T>, bool),
  Last,
  Other,
}

/// Post-processing: turns the parser's instruction stream into its
/// executable form. Pairs every block opener with its close (matching by
/// descriptor identity), stores the back-links as indices, and
/// specialises string variables into their fast paths.
pub(crate) fn link<'s, T>(ops: &mut [Op<'s, T>]) -> Result<()> {
  for i in 0..ops.len() {
    let opener = match &ops[i] {
      Op::IfNotEmpty { var, .. } => Opener::If(*var),
      Op::StartIter { negate, .. } => Opener::Iter(*negate),
      Op::Variable { var, quote } => Opener::Variable(*var, *quote),
      Op::Last => Opener::Last,
      _ => Opener::Other,
    };
    match opener {
      Opener::If(var) => {
        let mut close = None;
        for j in i + 1..ops.len() {
          match &ops[j] {
            Op::Last => break,
            Op::EndIfNotEmpty { var: v } if ptr::eq(*v, var) => {
              close = Some(j);
              break;
            }
            _ => {}
          }
        }
        let Some(j) = close else {
          return Err(Error::new(
            ErrorKind::MissingEnd("conditional"),
            Span::default(),
          ));
        };
        if let Op::IfNotEmpty { end, .. } = &mut ops[i] {
          *end = j as u32;
        }
      }
      Opener::Iter(negate) => {
        let mut close = None;
        for j in i + 1..ops.len() {
          match &ops[j] {
            Op::Last => break,
            Op::EndIter { start, .. } if *start as usize == i => {
              close = Some(j);
              break;
            }
            _ => {}
          }
        }
        let Some(j) = close else {
          return Err(Error::new(
            ErrorKind::MissingEnd("iteration"),
            Span::default(),
          ));
        };
        if let Op::StartIter { end, .. } = &mut ops[i] {
          *end = j as u32;
        }
        // the close needs the opener's negate to tell a deliberately
        // generator-less pass from an internal inconsistency
        if let Op::EndIter { negate: n, .. } = &mut ops[j] {
          *n = negate;
        }
      }
      Opener::Variable(var, quote) => match var.access {
        Access::Str(get) => {
          ops[i] = if quote {
            Op::VariableStrEscape { get }
          } else {
            Op::VariableStr { get }
          };
        }
        Access::None => return Err(Error::new(ErrorKind::NoAppend, Span::default())),
        _ if quote => return Err(Error::new(ErrorKind::EscapeNonString, Span::default())),
        _ => {}
      },
      Opener::Last => break,
      Opener::Other => {}
    }
  }
  Ok(())
}
