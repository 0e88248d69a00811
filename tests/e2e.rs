use indoc::indoc;
use kata::{Compiler, Generator, MemoryLoader, Schema, Template, Var};

#[derive(Default)]
struct TestData {
  some_int: i64,
  a_string: Option<String>,
}

const VARS: Schema<TestData> = &[
  Var::int("some_int", |d: &TestData| d.some_int),
  Var::str("a_string", |d: &TestData| d.a_string.as_deref()),
];

fn data(some_int: i64, a_string: Option<&str>) -> TestData {
  TestData {
    some_int,
    a_string: a_string.map(str::to_owned),
  }
}

fn render(source: &str, vars: &mut TestData) -> String {
  Template::compile(source, VARS).unwrap().render(vars)
}

#[test]
fn substitution() {
  assert_eq!(
    render("Hello, {{a_string}}!", &mut data(42, Some("some string"))),
    "Hello, some string!"
  );
}

#[test]
fn escaped_substitution() {
  assert_eq!(
    render("{{{a_string}}}", &mut data(42, Some("<b>&\"/"))),
    "&lt;b&gt;&amp;&quot;&#x2f;"
  );
}

#[test]
fn comments_do_not_render() {
  assert_eq!(render("{{! ignore {{me}} }}X", &mut data(42, None)), "X");
}

#[test]
fn conditional_block() {
  let source = "{{a_string?}}[{{a_string}}]{{/a_string?}}";
  assert_eq!(render(source, &mut data(42, None)), "");
  assert_eq!(render(source, &mut data(42, Some("x"))), "[x]");
}

#[test]
fn negated_conditional_block() {
  let source = "{{^some_int?}}zero{{/some_int?}}";
  assert_eq!(render(source, &mut data(0, None)), "zero");
  assert_eq!(render(source, &mut data(7, None)), "");
}

#[test]
fn close_without_open_fails() {
  let err = Template::compile("{{/unknown}}", VARS).unwrap_err();
  assert_eq!(err.to_string(), "unexpected {{/unknown}}");
}

#[test]
fn unknown_variable_fails() {
  let err = Template::compile("{{#missing}}x{{/missing}}", VARS).unwrap_err();
  assert_eq!(err.to_string(), "Unknown variable: missing");
}

#[test]
fn negation_duality() {
  let block = "{{some_int?}}B{{/some_int?}}";
  let negated = "{{^some_int?}}B{{/some_int?}}";
  for value in [0, 7] {
    let mut vars = data(value, None);
    let plain = render(block, &mut vars);
    let inverse = render(negated, &mut vars);
    if value == 0 {
      assert_eq!((plain.as_str(), inverse.as_str()), ("", "B"));
    } else {
      assert_eq!((plain.as_str(), inverse.as_str()), ("B", ""));
    }
  }
}

#[test]
fn literal_templates_round_trip() {
  for source in ["", "plain", "a < b & c", "multi\nline\ntext\n"] {
    assert_eq!(render(source, &mut data(0, None)), source);
  }
}

#[test]
fn error_reports_point_at_the_source() {
  let source = "Hello, {{nobody}}!";
  let err = Template::compile(source, VARS).unwrap_err();
  assert_eq!(
    err.report(source, false),
    "Unknown variable: nobody\n| Hello, {{nobody}}!"
  );
}

mod listing {
  use super::*;

  #[derive(Default)]
  struct Listing {
    rel_path: Option<String>,
    readme: Option<String>,
    files: Vec<(String, i64)>,
    file_name: Option<String>,
    size: i64,
  }

  struct Files {
    i: usize,
  }

  impl Generator<Listing> for Files {
    fn advance(&mut self, vars: &mut Listing) -> bool {
      let file = vars.files.get(self.i).cloned();
      match file {
        Some((name, size)) => {
          vars.file_name = Some(name);
          vars.size = size;
          self.i += 1;
          true
        }
        None => {
          vars.file_name = None;
          false
        }
      }
    }
  }

  fn files(_: &Listing) -> Box<dyn Generator<Listing>> {
    Box::new(Files { i: 0 })
  }

  const FILE_VARS: Schema<Listing> = &[
    Var::str("file_name", |l: &Listing| l.file_name.as_deref()),
    Var::int("size", |l: &Listing| l.size),
  ];

  const LISTING_VARS: Schema<Listing> = &[
    Var::str("rel_path", |l: &Listing| l.rel_path.as_deref()),
    Var::str("readme", |l: &Listing| l.readme.as_deref()),
    Var::iterable("files", FILE_VARS, files),
  ];

  static PAGE: &str = indoc! {r#"
    <h1>Index of {{rel_path}}</h1>
    {{readme?}}
    <pre>{{readme}}</pre>
    {{/readme?}}
    <table>
    {{#files}}
      <tr><td>{{file_name}}</td><td>{{size}}</td></tr>
    {{/files}}
    </table>
  "#};

  #[test]
  fn directory_listing() {
    let tpl = Template::compile(PAGE, LISTING_VARS).unwrap();
    let mut vars = Listing {
      rel_path: Some("/tmp".into()),
      readme: Some("hello".into()),
      files: vec![("a.txt".into(), 3), ("b.txt".into(), 14)],
      ..Listing::default()
    };
    assert_eq!(
      tpl.render(&mut vars),
      indoc! {r#"
        <h1>Index of /tmp</h1>

        <pre>hello</pre>

        <table>

          <tr><td>a.txt</td><td>3</td></tr>

          <tr><td>b.txt</td><td>14</td></tr>

        </table>
      "#}
    );
  }

  #[test]
  fn empty_directory_listing() {
    let tpl = Template::compile(PAGE, LISTING_VARS).unwrap();
    let mut vars = Listing {
      rel_path: Some("/tmp".into()),
      ..Listing::default()
    };
    assert_eq!(
      tpl.render(&mut vars),
      "<h1>Index of /tmp</h1>\n\n<table>\n\n</table>\n"
    );
  }

  #[test]
  fn listing_with_a_partial_header() {
    let loader = MemoryLoader::new().with("head", "<title>{{rel_path}}</title>\n");
    let tpl = Compiler::new(LISTING_VARS)
      .with_loader(loader)
      .compile("{{>head}}<h1>{{rel_path}}</h1>")
      .unwrap();
    let mut vars = Listing {
      rel_path: Some("/srv".into()),
      ..Listing::default()
    };
    assert_eq!(
      tpl.render(&mut vars),
      "<title>/srv</title>\n<h1>/srv</h1>"
    );
  }
}
