//! Source-map v3 emission. Consumes the [`Mark`](super::format::Mark) list
//! collected during rendering and turns it into the standard
//! `{version, sources, sourcesContent, names, mappings}` document, with
//! generated-side positions derived by scanning the rendered CSS and
//! original-side positions from [`super::source::SourceStore`].

use std::collections::HashMap;

use serde::Serialize;

use super::format::Mark;
use super::source::SourceStore;

#[derive(Debug, Clone, Serialize)]
pub struct SourceMap {
    pub version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub sources: Vec<String>,
    #[serde(rename = "sourcesContent", skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<String>>,
    pub names: Vec<String>,
    pub mappings: String,
}

/// Builds a [`SourceMap`] from the marks recorded by
/// [`super::format::render_with_positions`]. `output` is the CSS text that
/// `marks`' offsets index into; `file` is the value to record as the
/// generated file name, if any.
pub fn build(sources: &SourceStore, output: &str, marks: &[Mark], file: Option<String>, embed_sources: bool) -> SourceMap {
    let out_lines = line_starts(output);

    let mut source_order: Vec<super::source::PathId> = Vec::new();
    let mut source_index: HashMap<super::source::PathId, usize> = HashMap::new();
    for mark in marks {
        source_index.entry(mark.span.path).or_insert_with(|| {
            let idx = source_order.len();
            source_order.push(mark.span.path);
            idx
        });
    }

    let mut sorted = marks.to_vec_with_generated(&out_lines);
    sorted.sort_by_key(|m| (m.gen_line, m.gen_col));

    let mut mappings = String::new();
    let mut prev_gen_line = 0usize;
    let mut prev_gen_col = 0i64;
    let mut prev_src = 0i64;
    let mut prev_src_line = 0i64;
    let mut prev_src_col = 0i64;
    let mut first_in_line = true;

    for m in &sorted {
        while prev_gen_line < m.gen_line {
            mappings.push(';');
            prev_gen_line += 1;
            prev_gen_col = 0;
            first_in_line = true;
        }
        if !first_in_line {
            mappings.push(',');
        }
        first_in_line = false;

        let src_idx = source_index[&m.span.path] as i64;
        let (src_line, src_col) = sources.position_of(m.span.path, m.span.start);
        let src_line = (src_line - 1) as i64;
        let src_col = src_col as i64;

        encode_vlq(&mut mappings, m.gen_col as i64 - prev_gen_col);
        encode_vlq(&mut mappings, src_idx - prev_src);
        encode_vlq(&mut mappings, src_line - prev_src_line);
        encode_vlq(&mut mappings, src_col - prev_src_col);

        prev_gen_col = m.gen_col as i64;
        prev_src = src_idx;
        prev_src_line = src_line;
        prev_src_col = src_col;
    }

    let source_names: Vec<String> = source_order
        .iter()
        .map(|&id| sources.path(id).to_string_lossy().into_owned())
        .collect();
    let sources_content = if embed_sources {
        Some(source_order.iter().map(|&id| sources.text(id).to_string()).collect())
    } else {
        None
    };

    SourceMap {
        version: 3,
        file,
        sources: source_names,
        sources_content,
        names: Vec::new(),
        mappings,
    }
}

struct GeneratedMark {
    gen_line: usize,
    gen_col: usize,
    span: super::source::Span,
}

trait ToGenerated {
    fn to_vec_with_generated(&self, line_starts: &[usize]) -> Vec<GeneratedMark>;
}

impl ToGenerated for [Mark] {
    fn to_vec_with_generated(&self, line_starts: &[usize]) -> Vec<GeneratedMark> {
        self.iter()
            .map(|m| {
                let (line, col) = resolve_line_col(line_starts, m.out_offset);
                GeneratedMark { gen_line: line, gen_col: col, span: m.span }
            })
            .collect()
    }
}

fn line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

/// 0-based (line, column) for a byte offset, given a sorted list of line-start offsets.
fn resolve_line_col(line_starts: &[usize], offset: usize) -> (usize, usize) {
    let line_idx = match line_starts.binary_search(&offset) {
        Ok(i) => i,
        Err(i) => i.saturating_sub(1),
    };
    (line_idx, offset - line_starts[line_idx])
}

const VLQ_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn encode_vlq(out: &mut String, value: i64) {
    let mut n = if value < 0 { ((-value) << 1) | 1 } else { value << 1 };
    loop {
        let mut digit = (n & 0b11111) as u32;
        n >>= 5;
        if n > 0 {
            digit |= 0b100000;
        }
        out.push(VLQ_ALPHABET[digit as usize] as char);
        if n == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::eval::Evaluator;
    use super::super::format::{self, OutputStyle};
    use super::super::import::ImportResolver;
    use super::super::parser;
    use super::super::source::PathId;

    #[test]
    fn builds_one_segment_per_declaration_and_selector() {
        let (mut ast, root) = parser::parse("a {\n  b: 1;\n}\n", PathId(0)).unwrap();
        let mut sources = SourceStore::new();
        sources.add("/a.scss", "a {\n  b: 1;\n}\n");
        let mut importer = ImportResolver::new(vec![]);
        let eval = Evaluator::new(&mut sources, &mut importer, std::path::PathBuf::from("."), 5);
        let (nodes, _diagnostics) = eval.run(&mut ast, root).unwrap();
        let (css, marks) = format::render_with_positions(&ast, &nodes, OutputStyle::Expanded);
        assert_eq!(marks.len(), 2);
        let map = build(&sources, &css, &marks, Some("out.css".into()), false);
        assert_eq!(map.version, 3);
        assert_eq!(map.sources, vec!["/a.scss".to_string()]);
        assert!(!map.mappings.is_empty());
        assert!(map.sources_content.is_none());
    }

    #[test]
    fn embeds_source_contents_when_requested() {
        let (mut ast, root) = parser::parse("a { b: 1; }", PathId(0)).unwrap();
        let mut sources = SourceStore::new();
        sources.add("/a.scss", "a { b: 1; }");
        let mut importer = ImportResolver::new(vec![]);
        let eval = Evaluator::new(&mut sources, &mut importer, std::path::PathBuf::from("."), 5);
        let (nodes, _diagnostics) = eval.run(&mut ast, root).unwrap();
        let (css, marks) = format::render_with_positions(&ast, &nodes, OutputStyle::Expanded);
        let map = build(&sources, &css, &marks, None, true);
        assert_eq!(map.sources_content, Some(vec!["a { b: 1; }".to_string()]));
    }

    #[test]
    fn vlq_round_trips_small_values() {
        let mut s = String::new();
        encode_vlq(&mut s, 0);
        assert_eq!(s, "A");
        let mut s2 = String::new();
        encode_vlq(&mut s2, -1);
        assert_eq!(s2, "D");
    }
}
