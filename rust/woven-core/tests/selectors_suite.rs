use woven_core::{compile_string, Options, OutputStyle};

fn expanded(source: &str) -> String {
    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    compile_string(source, "input.scss", &options).unwrap_or_else(|e| panic!("compile failed: {e}")).css
}

#[test]
fn ampersand_resolves_to_the_parent_selector() {
    let css = expanded("a {\n  &:hover { color: red; }\n}");
    assert_eq!(css, "a:hover {\n  color: red;\n}\n");
}

#[test]
fn nested_rulesets_combine_with_a_descendant_combinator() {
    let css = expanded("a {\n  b { color: red; }\n}");
    assert_eq!(css, "a b {\n  color: red;\n}\n");
}

#[test]
fn interpolated_selector_fragment_resolves_before_matching() {
    let css = expanded("$name: star;\n.icon-#{$name} { color: gold; }");
    assert_eq!(css, ".icon-star {\n  color: gold;\n}\n");
}

#[test]
fn not_pseudo_accepts_a_selector_list_argument() {
    let css = expanded("a:not(.b, .c) { color: red; }");
    assert_eq!(css, "a:not(.b, .c) {\n  color: red;\n}\n");
}

#[test]
fn comma_separated_selectors_each_get_the_declaration() {
    let css = expanded(".a, .b { color: red; }");
    assert_eq!(css, ".a, .b {\n  color: red;\n}\n");
}

#[test]
fn child_combinator_is_preserved() {
    let css = expanded("a > b { color: red; }");
    assert_eq!(css, "a > b {\n  color: red;\n}\n");
}
