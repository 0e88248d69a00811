use crate::schema::{append_escaped, Generator};
use crate::template::{Op, Template};

impl<'s, T> Template<'s, T> {
  /// Renders the template against `vars` into a fresh buffer.
  ///
  /// `vars` is mutable because generators write the current element of an
  /// iteration into it. Rendering does not fail; internal
  /// inconsistencies are logged and skipped.
  pub fn render(&self, vars: &mut T) -> String {
    let mut buf = String::with_capacity(self.minimum_size);
    run(&self.ops, 0, &mut buf, vars, None);
    buf
  }

  /// Renders into `buf`, resetting it first. The buffer keeps its
  /// allocation across calls.
  pub fn render_to(&self, buf: &mut String, vars: &mut T) {
    buf.clear();
    buf.reserve(self.minimum_size);
    run(&self.ops, 0, buf, vars, None);
  }
}

/// Walks the instruction array from `pc`. Blocks recurse with `sentinel`
/// set to the index their close op must return at: the close index for
/// conditionals, the opener index for iterations.
///
/// Each frame owns at most one live generator. A nested iteration runs
/// in the recursive frame for the enclosing block body, so its generator
/// lives there.
fn run<'s, T>(
  ops: &[Op<'s, T>],
  mut pc: usize,
  buf: &mut String,
  vars: &mut T,
  sentinel: Option<usize>,
) -> usize {
  let mut generator: Option<Box<dyn Generator<T>>> = None;
  while let Some(op) = ops.get(pc) {
    match op {
      Op::Append(text) => {
        buf.push_str(text);
        pc += 1;
      }
      Op::AppendChar(c) => {
        buf.push(*c);
        pc += 1;
      }
      Op::Variable { var, .. } => {
        var.append(vars, buf);
        pc += 1;
      }
      Op::VariableStr { get } => {
        if let Some(s) = get(vars) {
          buf.push_str(s);
        }
        pc += 1;
      }
      Op::VariableStrEscape { get } => {
        if let Some(s) = get(vars) {
          append_escaped(buf, s);
        }
        pc += 1;
      }
      Op::IfNotEmpty { var, negate, end } => {
        let end = *end as usize;
        let mut empty = var.is_empty(vars);
        if *negate {
          empty = !empty;
        }
        if !empty {
          run(ops, pc + 1, buf, vars, Some(end));
        }
        pc = end + 1;
      }
      Op::EndIfNotEmpty { .. } => {
        if sentinel == Some(pc) {
          return pc;
        }
        pc += 1;
      }
      Op::ApplyTpl(template) => {
        buf.reserve(template.minimum_size);
        run(&template.ops, 0, buf, vars, None);
        pc += 1;
      }
      Op::StartIter { var, negate, end } => {
        let end = *end as usize;
        if generator.is_some() {
          log::warn!("generator already active when starting iteration");
          pc += 1;
          continue;
        }
        let Some(make) = var.generator else {
          log::warn!("variable `{}` has no generator", var.name());
          pc = end + 1;
          continue;
        };
        let mut gen = make(vars);
        let mut alive = gen.advance(vars);
        if *negate {
          alive = !alive;
        }
        if !alive {
          // exhausted up front (or negated and non-empty): skip the body;
          // the abandoned generator cleans up in Drop
          pc = end + 1;
          continue;
        }
        if *negate {
          // empty sequence: the negated body runs exactly once
          run(ops, pc + 1, buf, vars, Some(pc));
          pc = end + 1;
          continue;
        }
        generator = Some(gen);
        run(ops, pc + 1, buf, vars, Some(pc));
        pc = end;
      }
      Op::EndIter { start, negate } => {
        let start = *start as usize;
        if sentinel == Some(start) {
          return pc;
        }
        let advanced = generator.as_mut().map(|gen| gen.advance(vars));
        match advanced {
          Some(true) => {
            run(ops, start + 1, buf, vars, Some(start));
          }
          Some(false) => {
            generator = None;
            pc += 1;
          }
          None => {
            if !*negate {
              log::warn!("no active generator when finishing iteration");
            }
            pc += 1;
          }
        }
      }
      Op::Last => return pc,
    }
  }
  pc
}
