use woven_core::{compile_string, Options, OutputStyle};

fn expanded(source: &str) -> String {
    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    compile_string(source, "input.scss", &options).unwrap_or_else(|e| panic!("compile failed: {e}")).css
}

#[test]
fn if_else_chain_picks_the_matching_branch() {
    let css = expanded("$x: 2;\na { @if $x == 1 { color: red; } @else if $x == 2 { color: green; } @else { color: blue; } }");
    assert_eq!(css, "a {\n  color: green;\n}\n");
}

#[test]
fn for_loop_through_inclusive_range_emits_every_step() {
    let css = expanded("@for $i from 1 through 3 { .col-#{$i} { width: $i; } }");
    assert_eq!(
        css,
        ".col-1 {\n  width: 1;\n}\n\n.col-2 {\n  width: 2;\n}\n\n.col-3 {\n  width: 3;\n}\n"
    );
}

#[test]
fn for_loop_to_is_exclusive_of_the_upper_bound() {
    let css = expanded("@for $i from 1 to 3 { .col-#{$i} { width: $i; } }");
    assert_eq!(css, ".col-1 {\n  width: 1;\n}\n\n.col-2 {\n  width: 2;\n}\n");
}

#[test]
fn while_loop_runs_until_condition_is_false() {
    let css = expanded("$i: 0;\na { @while $i < 3 { $i: $i + 1; } width: $i; }");
    assert_eq!(css, "a {\n  width: 3;\n}\n");
}

#[test]
fn each_over_a_comma_list_binds_one_variable() {
    let css = expanded("@each $c in red, green { a { color: $c; } }");
    assert_eq!(css, "a {\n  color: red;\n}\n\na {\n  color: green;\n}\n");
}

#[test]
fn each_over_a_map_destructures_key_and_value() {
    let css = expanded("@each $k, $v in (a: 1, b: 2) { .#{$k} { width: $v; } }");
    assert_eq!(css, ".a {\n  width: 1;\n}\n\n.b {\n  width: 2;\n}\n");
}

#[test]
fn warn_is_collected_as_a_diagnostic_not_an_error() {
    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    let out = compile_string("@warn \"heads up\";\na { b: 1; }", "input.scss", &options).unwrap();
    assert_eq!(out.diagnostics.len(), 1);
    assert_eq!(out.diagnostics[0].message, "heads up");
}

#[test]
fn error_directive_fails_compilation() {
    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    let err = compile_string("@error \"nope\";", "input.scss", &options).unwrap_err();
    assert_eq!(err.kind, woven_core::ErrorKind::User);
    assert!(err.message.contains("nope"));
}
