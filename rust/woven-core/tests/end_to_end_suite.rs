use woven_core::{compile_string, Options, OutputStyle};

fn expanded(source: &str) -> String {
    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    compile_string(source, "input.scss", &options).unwrap_or_else(|e| panic!("compile failed: {e}")).css
}

#[test]
fn s1_plain_addition() {
    assert_eq!(expanded("a { b: 1 + 2 }"), "a {\n  b: 3;\n}\n");
}

#[test]
fn s2_variable_times_a_scalar() {
    assert_eq!(expanded("$x: 3px; a { b: $x * 2 }"), "a {\n  b: 6px;\n}\n");
}

#[test]
fn s3_mixin_include_with_an_argument() {
    let css = expanded("@mixin m($c) { color: $c; }\na { @include m(red); }");
    assert_eq!(css, "a {\n  color: red;\n}\n");
}

#[test]
fn s4_extend_groups_the_target_selector() {
    let css = expanded(".a { color: red; }\n.b { @extend .a; font: bold; }");
    assert_eq!(css, ".a, .b {\n  color: red;\n}\n\n.b {\n  font: bold;\n}\n");
}

#[test]
fn s5_interpolation_inside_a_declaration_value() {
    assert_eq!(expanded("a { b: #{1 + 1}px; }"), "a {\n  b: 2px;\n}\n");
}

#[test]
fn s6_cross_unit_addition_converts_to_a_common_unit() {
    let css = expanded("a { b: 1px + 1cm; }");
    assert!(css.starts_with("a {\n  b: 38.79528"), "unexpected output: {css}");
}

#[test]
fn a_stylesheet_combining_variables_mixins_and_extend_compiles_end_to_end() {
    let source = r#"
$brand: #336699;

@mixin rounded($radius: 4px) {
  border-radius: $radius;
}

.btn {
  @include rounded;
  color: $brand;
}

.btn-large {
  @extend .btn;
  font-size: 18px;
}
"#;
    let css = expanded(source);
    assert!(css.contains(".btn, .btn-large {"), "unexpected output: {css}");
    assert!(css.contains("border-radius: 4px;"), "unexpected output: {css}");
    assert!(css.contains("color: #336699;"), "unexpected output: {css}");
    assert!(css.contains(".btn-large {\n  font-size: 18px;\n}"), "unexpected output: {css}");
}

#[test]
fn compact_style_is_a_valid_alternative_serialization_of_the_same_source() {
    let options = Options { style: OutputStyle::Compact, ..Options::default() };
    let out = compile_string("a { b: 1 + 2; }", "input.scss", &options).unwrap();
    assert_eq!(out.css, "a { b: 3; }\n");
}

#[test]
fn compressed_style_drops_all_non_essential_whitespace() {
    let options = Options { style: OutputStyle::Compressed, ..Options::default() };
    let out = compile_string("a { b: 1; c: 2; }", "input.scss", &options).unwrap();
    assert_eq!(out.css, "a{b:1;c:2}");
}
