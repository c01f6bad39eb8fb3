//! Output formatter: serializes the evaluator's [`super::eval::OutputNode`]
//! forest to CSS text in one of four styles, and renders a [`SelectorId`]
//! to its CSS text (used both here and by `&` interpolation in `eval.rs`).

use super::ast::{Ast, Combinator, PseudoArg, SelectorId, SelectorKind};
use super::eval::OutputNode;
use super::source::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStyle {
    Nested,
    Expanded,
    Compact,
    Compressed,
}

impl Default for OutputStyle {
    fn default() -> Self {
        Self::Nested
    }
}

pub fn render(ast: &Ast, nodes: &[OutputNode], style: OutputStyle) -> String {
    if style == OutputStyle::Compressed {
        let mut out = String::new();
        for node in nodes {
            render_node_compressed(ast, node, &mut out);
        }
        return out;
    }
    let chunks: Vec<String> = nodes
        .iter()
        .map(|node| {
            let mut chunk = String::new();
            render_node(ast, node, style, 0, &mut chunk);
            chunk
        })
        .filter(|chunk| !chunk.is_empty())
        .collect();
    chunks.join(blank_line_between(style))
}

fn blank_line_between(style: OutputStyle) -> &'static str {
    match style {
        OutputStyle::Compact => "\n",
        _ => "\n\n",
    }
}

fn indent(style: OutputStyle, depth: usize) -> String {
    match style {
        OutputStyle::Nested => "  ".repeat(depth),
        _ => String::new(),
    }
}

fn render_node(ast: &Ast, node: &OutputNode, style: OutputStyle, depth: usize, out: &mut String) {
    let pad = indent(style, depth);
    match node {
        OutputNode::Ruleset { selector, declarations } => {
            if declarations.is_empty() {
                return;
            }
            if style == OutputStyle::Compact {
                out.push_str(&render_selector(ast, *selector));
                out.push_str(" { ");
                let decls: Vec<String> = declarations
                    .iter()
                    .filter_map(|d| match d {
                        OutputNode::Declaration { property, value, important, .. } => {
                            let bang = if *important { " !important" } else { "" };
                            Some(format!("{property}: {value}{bang};"))
                        }
                        OutputNode::Comment(text) => Some(text.clone()),
                        _ => None,
                    })
                    .collect();
                out.push_str(&decls.join(" "));
                out.push_str(" }\n");
                return;
            }
            out.push_str(&pad);
            out.push_str(&render_selector(ast, *selector));
            out.push_str(" {\n");
            for decl in declarations {
                render_node(ast, decl, style, depth + 1, out);
            }
            out.push_str(&pad);
            out.push_str("}\n");
        }
        OutputNode::MediaBlock { query, body } => {
            out.push_str(&pad);
            out.push_str("@media ");
            out.push_str(query);
            out.push_str(" {\n");
            for child in body {
                render_node(ast, child, style, depth + 1, out);
            }
            out.push_str(&pad);
            out.push_str("}\n");
        }
        OutputNode::AtRule { prelude, body } => {
            out.push_str(&pad);
            out.push_str(prelude);
            match body {
                Some(children) => {
                    out.push_str(" {\n");
                    for child in children {
                        render_node(ast, child, style, depth + 1, out);
                    }
                    out.push_str(&pad);
                    out.push_str("}\n");
                }
                None => out.push_str(";\n"),
            }
        }
        OutputNode::Declaration { property, value, important, .. } => {
            let inner_pad = indent(style, depth);
            out.push_str(&inner_pad);
            out.push_str(property);
            out.push_str(": ");
            out.push_str(value);
            if *important {
                out.push_str(" !important");
            }
            out.push_str(";\n");
        }
        OutputNode::Comment(text) => {
            out.push_str(&pad);
            out.push_str(text);
            out.push('\n');
        }
        OutputNode::Import(url) => {
            out.push_str(&pad);
            out.push_str("@import ");
            out.push_str(url);
            out.push_str(";\n");
        }
    }
}

/// `compressed` drops all insignificant whitespace: no newlines, no
/// indentation, declarations joined directly, the trailing semicolon of a
/// block's last declaration dropped.
fn render_node_compressed(ast: &Ast, node: &OutputNode, out: &mut String) {
    match node {
        OutputNode::Ruleset { selector, declarations } => {
            if declarations.is_empty() {
                return;
            }
            out.push_str(&render_selector(ast, *selector));
            out.push('{');
            for (i, decl) in declarations.iter().enumerate() {
                if i > 0 {
                    out.push(';');
                }
                render_declaration_compressed(decl, out);
            }
            out.push('}');
        }
        OutputNode::MediaBlock { query, body } => {
            out.push_str("@media ");
            out.push_str(query);
            out.push('{');
            for child in body {
                render_node_compressed(ast, child, out);
            }
            out.push('}');
        }
        OutputNode::AtRule { prelude, body } => {
            out.push_str(prelude);
            match body {
                Some(children) => {
                    out.push('{');
                    for child in children {
                        render_node_compressed(ast, child, out);
                    }
                    out.push('}');
                }
                None => out.push(';'),
            }
        }
        OutputNode::Declaration { .. } => render_declaration_compressed(node, out),
        OutputNode::Comment(_) => {}
        OutputNode::Import(url) => {
            out.push_str("@import ");
            out.push_str(url);
            out.push(';');
        }
    }
}

fn render_declaration_compressed(node: &OutputNode, out: &mut String) {
    if let OutputNode::Declaration { property, value, important, .. } = node {
        out.push_str(property);
        out.push(':');
        out.push_str(value);
        if *important {
            out.push_str("!important");
        }
    }
}

// ── selector rendering ───────────────────────────────────────────────────

pub fn render_selector(ast: &Ast, id: SelectorId) -> String {
    match &ast.selector(id).kind {
        SelectorKind::List { complexes, .. } => complexes.iter().map(|&c| render_selector(ast, c)).collect::<Vec<_>>().join(", "),
        SelectorKind::Complex { head, combinator, reference, tail } => {
            let mut s = String::new();
            if let Some(h) = head {
                s.push_str(&render_selector(ast, *h));
            }
            if let Some(r) = reference {
                s.push_str(" /");
                s.push_str(r);
                s.push_str("/ ");
            } else if let Some(c) = combinator {
                s.push_str(&render_combinator(*c));
            }
            if let Some(t) = tail {
                s.push_str(&render_selector(ast, *t));
            }
            s
        }
        SelectorKind::Compound { simples, .. } => simples.iter().map(|&s| render_selector(ast, s)).collect::<Vec<_>>().join(""),
        SelectorKind::Type { name, namespace } => match namespace {
            Some(ns) => format!("{ns}|{name}"),
            None => name.clone(),
        },
        SelectorKind::IdRef(n) => format!("#{n}"),
        SelectorKind::ClassRef(n) => format!(".{n}"),
        SelectorKind::Placeholder(n) => format!("%{n}"),
        SelectorKind::ParentRef => "&".to_string(),
        SelectorKind::PseudoSimple { name, is_element } => {
            if *is_element {
                format!("::{name}")
            } else {
                format!(":{name}")
            }
        }
        SelectorKind::PseudoFunctional { name, arg } => {
            let inner = match arg {
                PseudoArg::Text(t) => t.clone(),
                PseudoArg::List(id) => render_selector(ast, *id),
            };
            format!(":{name}({inner})")
        }
        SelectorKind::Wrapped { name, inner } => format!(":{name}({})", render_selector(ast, *inner)),
        SelectorKind::Attribute { name, matcher, value } => match (matcher, value) {
            (Some(m), Some(v)) => format!("[{name}{m}\"{v}\"]"),
            _ => format!("[{name}]"),
        },
        SelectorKind::Schema { parts } => parts
            .iter()
            .filter_map(|p| match p {
                super::ast::SchemaPart::Literal(s) => Some(s.clone()),
                super::ast::SchemaPart::Hole(_) => None,
            })
            .collect(),
    }
}

// ── position-tracking render for source maps ────────────────────────────

/// One output-byte-offset -> input-span correspondence, recorded at a
/// selector or declaration boundary. `sourcemap::build` turns these into
/// line/column pairs.
pub struct Mark {
    pub out_offset: usize,
    pub span: Span,
}

/// Renders like [`render`] but also records a [`Mark`] at the start of every
/// selector and declaration. Only meaningful for the three whitespace-ful
/// styles; `Compressed` has no stable token boundaries worth mapping, so
/// callers should not ask for positions in that style.
pub fn render_with_positions(ast: &Ast, nodes: &[OutputNode], style: OutputStyle) -> (String, Vec<Mark>) {
    let mut out = String::new();
    let mut marks = Vec::new();
    for node in nodes {
        render_node_marked(ast, node, style, 0, &mut out, &mut marks);
    }
    (out, marks)
}

fn render_node_marked(ast: &Ast, node: &OutputNode, style: OutputStyle, depth: usize, out: &mut String, marks: &mut Vec<Mark>) {
    let pad = indent(style, depth);
    match node {
        OutputNode::Ruleset { selector, declarations } => {
            if declarations.is_empty() {
                return;
            }
            out.push_str(&pad);
            marks.push(Mark { out_offset: out.len(), span: ast.selector(*selector).span });
            out.push_str(&render_selector(ast, *selector));
            out.push_str(" {\n");
            for decl in declarations {
                render_node_marked(ast, decl, style, depth + 1, out, marks);
            }
            out.push_str(&pad);
            out.push_str("}\n");
        }
        OutputNode::MediaBlock { query, body } => {
            out.push_str(&pad);
            out.push_str("@media ");
            out.push_str(query);
            out.push_str(" {\n");
            for child in body {
                render_node_marked(ast, child, style, depth + 1, out, marks);
            }
            out.push_str(&pad);
            out.push_str("}\n");
        }
        OutputNode::AtRule { prelude, body } => {
            out.push_str(&pad);
            out.push_str(prelude);
            match body {
                Some(children) => {
                    out.push_str(" {\n");
                    for child in children {
                        render_node_marked(ast, child, style, depth + 1, out, marks);
                    }
                    out.push_str(&pad);
                    out.push_str("}\n");
                }
                None => out.push_str(";\n"),
            }
        }
        OutputNode::Declaration { property, value, important, span } => {
            let inner_pad = indent(style, depth);
            out.push_str(&inner_pad);
            marks.push(Mark { out_offset: out.len(), span: *span });
            out.push_str(property);
            out.push_str(": ");
            out.push_str(value);
            if *important {
                out.push_str(" !important");
            }
            out.push_str(";\n");
        }
        OutputNode::Comment(text) => {
            out.push_str(&pad);
            out.push_str(text);
            out.push('\n');
        }
        OutputNode::Import(url) => {
            out.push_str(&pad);
            out.push_str("@import ");
            out.push_str(url);
            out.push_str(";\n");
        }
    }
}

fn render_combinator(c: Combinator) -> String {
    match c {
        Combinator::Descendant => " ".to_string(),
        Combinator::Child => " > ".to_string(),
        Combinator::Adjacent => " + ".to_string(),
        Combinator::General => " ~ ".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::eval::Evaluator;
    use super::super::import::ImportResolver;
    use super::super::parser;
    use super::super::source::{PathId, SourceStore};

    fn compile(src: &str, style: OutputStyle) -> String {
        let (mut ast, root) = parser::parse(src, PathId(0)).unwrap();
        let mut sources = SourceStore::new();
        let mut importer = ImportResolver::new(vec![]);
        let eval = Evaluator::new(&mut sources, &mut importer, std::path::PathBuf::from("."), 5);
        let (nodes, _diagnostics) = eval.run(&mut ast, root).unwrap();
        render(&ast, &nodes, style)
    }

    #[test]
    fn expanded_matches_scenario_one() {
        let css = compile("a { b: 1 + 2; }", OutputStyle::Expanded);
        assert_eq!(css, "a {\n  b: 3;\n}\n");
    }

    #[test]
    fn compressed_drops_whitespace() {
        let css = compile("a { b: 1; c: 2; }", OutputStyle::Compressed);
        assert_eq!(css, "a{b:1;c:2}");
    }

    #[test]
    fn empty_ruleset_is_omitted() {
        let css = compile("a { @if false { b: 1; } }", OutputStyle::Expanded);
        assert_eq!(css, "");
    }

    #[test]
    fn extend_groups_selectors_at_comma() {
        let css = compile(".a { color: red; }\n.b { @extend .a; font: bold; }", OutputStyle::Expanded);
        assert!(css.contains(".a, .b {\n  color: red;\n}"));
    }
}
