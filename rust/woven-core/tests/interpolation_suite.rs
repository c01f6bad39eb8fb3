use woven_core::{compile_string, Options, OutputStyle};

fn expanded(source: &str) -> String {
    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    compile_string(source, "input.scss", &options).unwrap_or_else(|e| panic!("compile failed: {e}")).css
}

#[test]
fn interpolation_hole_evaluates_as_an_expression() {
    assert_eq!(expanded("a {\n  b: #{1 + 1}px;\n}"), "a {\n  b: 2px;\n}\n");
}

#[test]
fn interpolation_concatenates_with_surrounding_literal_text() {
    let css = expanded("$side: left;\na {\n  margin-#{$side}: 1px;\n}");
    assert_eq!(css, "a {\n  margin-left: 1px;\n}\n");
}

#[test]
fn interpolation_in_a_quoted_string_unquotes_the_result() {
    let css = expanded("$name: World;\na {\n  content: \"Hello, #{$name}!\";\n}");
    assert_eq!(css, "a {\n  content: \"Hello, World!\";\n}\n");
}

#[test]
fn nested_interpolation_holes_resolve_independently() {
    let css = expanded("$a: 1;\n$b: 2;\na {\n  b: #{$a}-#{$b};\n}");
    assert_eq!(css, "a {\n  b: 1-2;\n}\n");
}

#[test]
fn at_rule_prelude_interpolates_its_condition() {
    let css = expanded("$min: 600px;\n@media (min-width: #{$min}) {\n  a { color: red; }\n}");
    assert!(css.contains("@media (min-width: 600px)"), "unexpected output: {css}");
}
