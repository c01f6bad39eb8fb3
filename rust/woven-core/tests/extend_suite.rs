use woven_core::{compile_string, Options, OutputStyle};

fn expanded(source: &str) -> String {
    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    compile_string(source, "input.scss", &options).unwrap_or_else(|e| panic!("compile failed: {e}")).css
}

#[test]
fn extend_adds_target_selector_to_extender_group() {
    let css = expanded(".a { color: red; }\n.b { @extend .a; font: bold; }");
    assert_eq!(css, ".a, .b {\n  color: red;\n}\n\n.b {\n  font: bold;\n}\n");
}

#[test]
fn extend_with_not_selector_target_still_matches() {
    let css = expanded(".a:not(.hidden) { color: red; }\n.b { @extend .a:not(.hidden); }");
    assert!(css.contains(".a:not(.hidden), .b"), "unexpected output: {css}");
}

#[test]
fn optional_extend_with_no_target_does_not_error() {
    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    let out = compile_string(".b { @extend .nope !optional; color: red; }", "input.scss", &options).unwrap();
    assert_eq!(out.css, ".b {\n  color: red;\n}\n");
}

#[test]
fn required_extend_with_no_target_errors() {
    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    let err = compile_string(".b { @extend .nope; color: red; }", "input.scss", &options).unwrap_err();
    assert_eq!(err.kind, woven_core::ErrorKind::User);
}

#[test]
fn extend_is_transitive_through_chained_extends() {
    let css = expanded(".a { color: red; }\n.b { @extend .a; }\n.c { @extend .b; }");
    assert!(css.starts_with(".a, .b, .c"), "unexpected output: {css}");
}
