use woven_core::{compile_string, Options, OutputStyle};

fn expanded(source: &str) -> String {
    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    compile_string(source, "input.scss", &options).unwrap_or_else(|e| panic!("compile failed: {e}")).css
}

#[test]
fn adds_plain_numbers() {
    assert_eq!(expanded("a {\n  b: 1 + 2;\n}"), "a {\n  b: 3;\n}\n");
}

#[test]
fn multiplies_number_by_unit_value() {
    assert_eq!(expanded("$x: 3px;\na {\n  b: $x * 2;\n}"), "a {\n  b: 6px;\n}\n");
}

#[test]
fn converts_compatible_units_on_addition() {
    let css = expanded("a {\n  b: 1px + 1cm;\n}");
    assert!(css.starts_with("a {\n  b: 38.79528"), "unexpected output: {css}");
}

#[test]
fn rejects_addition_of_incompatible_units() {
    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    let err = compile_string("a { b: 1px + 1s; }", "input.scss", &options).unwrap_err();
    assert_eq!(err.kind, woven_core::ErrorKind::Unit);
    assert!(err.message.contains("incompatible units"));
}

#[test]
fn parenthesized_division_computes_a_value() {
    assert_eq!(expanded("a {\n  width: (10px / 4);\n}"), "a {\n  width: 2.5px;\n}\n");
}

#[test]
fn bare_slash_without_arithmetic_context_stays_literal() {
    assert_eq!(expanded("a {\n  font: 12px/1.5;\n}"), "a {\n  font: 12px/1.5;\n}\n");
}

#[test]
fn comparison_and_boolean_operators_evaluate() {
    assert_eq!(expanded("a {\n  b: 1 < 2 and not false;\n}"), "a {\n  b: true;\n}\n");
}
