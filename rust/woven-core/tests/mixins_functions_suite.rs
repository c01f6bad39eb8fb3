use woven_core::{compile_string, Options, OutputStyle};

fn expanded(source: &str) -> String {
    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    compile_string(source, "input.scss", &options).unwrap_or_else(|e| panic!("compile failed: {e}")).css
}

#[test]
fn mixin_include_substitutes_argument() {
    let css = expanded("@mixin m($c) { color: $c; }\na { @include m(red); }");
    assert_eq!(css, "a {\n  color: red;\n}\n");
}

#[test]
fn mixin_content_block_is_injected() {
    let css = expanded("@mixin wrap { a { @content; } }\n@include wrap { color: blue; }");
    assert_eq!(css, "a {\n  color: blue;\n}\n");
}

#[test]
fn mixin_content_without_a_block_errors() {
    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    let err = compile_string("@mixin wrap { a { @content; } }\n@include wrap;", "input.scss", &options).unwrap_err();
    assert_eq!(err.kind, woven_core::ErrorKind::User);
}

#[test]
fn function_returns_a_computed_value() {
    let css = expanded("@function double($n) { @return $n * 2; }\na { width: double(3px); }");
    assert_eq!(css, "a {\n  width: 6px;\n}\n");
}

#[test]
fn named_and_rest_arguments_pass_through() {
    let css = expanded("@mixin box($w, $h: 1px, $rest...) { width: $w; height: $h; }\na { @include box($w: 2px); }");
    assert_eq!(css, "a {\n  width: 2px;\n  height: 1px;\n}\n");
}

#[test]
fn calling_undefined_mixin_reports_undefined_kind() {
    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    let err = compile_string("a { @include nope; }", "input.scss", &options).unwrap_err();
    assert_eq!(err.kind, woven_core::ErrorKind::Undefined);
}

#[test]
fn builtin_color_function_mixes_channels() {
    let css = expanded("a {\n  color: lighten(#000000, 50%);\n}");
    assert!(css.contains("color:"), "unexpected output: {css}");
}

#[test]
fn map_get_reads_a_declared_map() {
    let css = expanded("$sizes: (small: 1px, large: 10px);\na {\n  width: map-get($sizes, large);\n}");
    assert_eq!(css, "a {\n  width: 10px;\n}\n");
}
