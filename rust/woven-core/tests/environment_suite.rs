use woven_core::{compile_string, Options, OutputStyle};

fn expanded(source: &str) -> String {
    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    compile_string(source, "input.scss", &options).unwrap_or_else(|e| panic!("compile failed: {e}")).css
}

#[test]
fn reassigning_a_preexisting_outer_variable_writes_through_without_global() {
    let css = expanded("$x: 1;\na {\n  $x: 2;\n  b: $x;\n}\nc {\n  d: $x;\n}");
    assert_eq!(css, "a {\n  b: 2;\n}\n\nc {\n  d: 2;\n}\n");
}

#[test]
fn a_fresh_local_does_not_leak_into_a_sibling_block() {
    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    let err = compile_string(
        "a {\n  $y: 5;\n  b: $y;\n}\nc {\n  d: $y;\n}",
        "input.scss",
        &options,
    )
    .unwrap_err();
    assert_eq!(err.kind, woven_core::ErrorKind::Undefined);
}

#[test]
fn global_flag_declares_at_the_root_even_if_never_seen_before() {
    let css = expanded("a {\n  $z: 9 !global;\n}\nc {\n  d: $z;\n}");
    assert_eq!(css, "c {\n  d: 9;\n}\n");
}

#[test]
fn default_flag_only_assigns_when_unset_or_null() {
    let css = expanded("$x: 1;\n$x: 2 !default;\na {\n  b: $x;\n}");
    assert_eq!(css, "a {\n  b: 1;\n}\n");
}

#[test]
fn default_flag_assigns_when_previously_unset() {
    let css = expanded("$x: 2 !default;\na {\n  b: $x;\n}");
    assert_eq!(css, "a {\n  b: 2;\n}\n");
}

#[test]
fn mixin_body_does_not_see_the_caller_local_scope() {
    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    let err = compile_string(
        "@mixin m { b: $leaked; }\na { $leaked: 1; @include m; }",
        "input.scss",
        &options,
    )
    .unwrap_err();
    assert_eq!(err.kind, woven_core::ErrorKind::Undefined);
}
