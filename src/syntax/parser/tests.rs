use crate::error::Result;
use crate::schema::{Generator, Schema, Var};
use crate::template::Template;

#[derive(Default)]
struct Doc {
  title: Option<String>,
  count: i64,
  items: Vec<String>,
  item: Option<String>,
}

struct Items {
  i: usize,
}

impl Generator<Doc> for Items {
  fn advance(&mut self, vars: &mut Doc) -> bool {
    let item = vars.items.get(self.i).cloned();
    match item {
      Some(item) => {
        vars.item = Some(item);
        self.i += 1;
        true
      }
      None => {
        vars.item = None;
        false
      }
    }
  }
}

fn items(_: &Doc) -> Box<dyn Generator<Doc>> {
  Box::new(Items { i: 0 })
}

const ITEM_VARS: Schema<Doc> = &[Var::str("item", |d: &Doc| d.item.as_deref())];

const VARS: Schema<Doc> = &[
  Var::str("title", |d: &Doc| d.title.as_deref()),
  Var::int("count", |d: &Doc| d.count),
  Var::iterable("items", ITEM_VARS, items),
];

fn compile(source: &str) -> Result<Template<'static, Doc>> {
  Template::compile(source, VARS)
}

fn compile_err(source: &str) -> String {
  compile(source).unwrap_err().to_string()
}

#[test]
fn compiles_every_action_form() {
  compile("no actions at all").unwrap();
  compile("{{title}}").unwrap();
  compile("{{{title}}}").unwrap();
  compile("{{count}}").unwrap();
  compile("{{! a comment {{with}} braces }}").unwrap();
  compile("{{title?}}[{{title}}]{{/title?}}").unwrap();
  compile("{{^title?}}untitled{{/title?}}").unwrap();
  compile("{{#items}}{{item}}{{/items}}").unwrap();
  compile("{{^#items}}empty{{/items}}").unwrap();
}

#[test]
fn inner_scope_shadows_and_outer_names_stay_visible() {
  // `title` resolves through the outer frame from inside the block
  compile("{{#items}}{{title}}: {{item}}{{/items}}").unwrap();
}

#[test]
fn close_without_open() {
  assert_eq!(compile_err("{{/unknown}}"), "unexpected {{/unknown}}");
}

#[test]
fn unknown_variable() {
  assert_eq!(
    compile_err("{{#missing}}x{{/missing}}"),
    "Unknown variable: missing"
  );
  assert_eq!(compile_err("{{missing}}"), "Unknown variable: missing");
}

#[test]
fn iterating_a_plain_variable() {
  assert_eq!(
    compile_err("{{#count}}x{{/count}}"),
    "Couldn't find descriptor for variable `count`"
  );
}

#[test]
fn unclosed_block() {
  assert_eq!(
    compile_err("{{title?}}x"),
    "EOF while looking for matching {{/title}}"
  );
  assert_eq!(
    compile_err("{{#items}}x"),
    "EOF while looking for matching {{/items}}"
  );
}

#[test]
fn mismatched_close() {
  assert_eq!(
    compile_err("{{#items}}{{/title}}"),
    "expecting `items` but found `title`"
  );
}

#[test]
fn close_kind_must_match_open_kind() {
  assert_eq!(
    compile_err("{{#items}}x{{/items?}}"),
    "Could not find {{items?}}"
  );
  assert_eq!(
    compile_err("{{title?}}x{{/title}}"),
    "Could not find {{#title}}"
  );
}

#[test]
fn negation_must_be_consumed() {
  // `^` on a plain substitution never gets cleared
  assert_eq!(compile_err("{{^title}}"), "unmatched negation");
  assert_eq!(compile_err("{{^count}}"), "unmatched negation");
}

#[test]
fn escaping_a_non_string() {
  assert_eq!(
    compile_err("{{{count}}}"),
    "Variable must be string to be escaped"
  );
}

#[test]
fn substituting_an_iteration_variable() {
  assert_eq!(compile_err("{{items}}"), "Invalid variable descriptor");
}

#[test]
fn overlong_identifier() {
  let name = "x".repeat(65);
  assert_eq!(
    compile_err(&format!("{{{{{name}}}}}")),
    "identifier exceeds 64 bytes"
  );
}

#[test]
fn unexpected_lexeme_reports_kind_and_text() {
  assert_eq!(compile_err("{{?}}"), "unexpected lexeme: ? [?]");
}

#[test]
fn lex_errors_surface_through_compile() {
  assert_eq!(
    compile_err("{{title"),
    "unexpected EOF while scanning action"
  );
  assert_eq!(compile_err("oops }}"), "unexpected action close sequence");
}

#[test]
fn program_listing() {
  let tpl = compile("Hello, {{title}}!{{#items}}<{{item}}>{{/items}}").unwrap();
  insta::assert_snapshot!(tpl.to_string(), @r###"
  0 append "Hello, "
  1 variable_str
  2 append_char '!'
  3 start_iter items
  4   append_char '<'
  5   variable_str
  6   append_char '>'
  7 end_iter [3]
  8 last
  "###);
}

#[test]
fn program_listing_with_negated_conditional() {
  let tpl = compile("{{^count?}}zero{{/count?}}{{count}}").unwrap();
  insta::assert_snapshot!(tpl.to_string(), @r###"
  0 if_not_empty count negate
  1   append "zero"
  2 end_if_not_empty
  3 variable count
  4 last
  "###);
}
