//! Rendering [`crate::SassError`] for a terminal or as the structured JSON
//! document a host embeds.

use serde::Serialize;

use crate::{ErrorKind, SassError};
use crate::compiler::source::SourceStore;

/// Plain-language label for a [`ErrorKind`], used in both render forms.
fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Syntax => "SYNTAX ERROR",
        ErrorKind::Undefined => "UNDEFINED",
        ErrorKind::Arity => "ARGUMENT COUNT",
        ErrorKind::Type => "TYPE ERROR",
        ErrorKind::Unit => "UNIT ERROR",
        ErrorKind::Io => "IO ERROR",
        ErrorKind::Import => "IMPORT ERROR",
        ErrorKind::User => "ERROR",
    }
}

/// One error rendered with enough context to show a human: the source line
/// it occurred on plus a caret underline, resolved from a [`SourceStore`].
#[derive(Debug, Clone)]
pub struct RenderedDiagnostic {
    pub kind: ErrorKind,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub source_line: Option<String>,
    pub underline: Option<String>,
}

impl RenderedDiagnostic {
    /// Build from a `SassError`, resolving its span against `sources` when
    /// the span is not [`crate::compiler::source::Span::dummy`].
    pub fn from_error(error: &SassError, sources: &SourceStore) -> Self {
        let is_dummy = error.span.start == 0 && error.span.end == 0 && error.path_id.0 == 0;
        if is_dummy {
            return Self {
                kind: error.kind,
                message: error.message.clone(),
                file: None,
                line: None,
                column: None,
                source_line: None,
                underline: None,
            };
        }
        let (line, col) = sources.position_of(error.path_id, error.span.start);
        let file = sources.path(error.path_id).to_string_lossy().into_owned();
        let source_line = sources.text(error.path_id).lines().nth(line.saturating_sub(1)).map(|s| s.to_string());
        let underline = source_line.as_ref().map(|l| make_underline(col, l.len().saturating_sub(col).max(1)));
        Self {
            kind: error.kind,
            message: error.message.clone(),
            file: Some(file),
            line: Some(line),
            column: Some(col),
            source_line,
            underline,
        }
    }

    /// Render with ANSI colors for terminal display, Elm-style.
    pub fn render_ansi(&self) -> String {
        let mut out = String::new();
        let location = match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(col)) => format!(" {file}:{line}:{col} "),
            (Some(file), Some(line), None) => format!(" {file}:{line} "),
            _ => " ".to_string(),
        };
        let title_width: usize = 80;
        let category = kind_label(self.kind);
        let dashes = title_width.saturating_sub(category.len() + location.len() + 6);
        out.push_str(&cyan(&format!("── {category} {}", "─".repeat(dashes))));
        out.push_str(&cyan(&location));
        out.push_str(&cyan("──\n\n"));
        out.push_str(&self.message);
        out.push('\n');
        if let (Some(line), Some(text), Some(underline)) = (self.line, &self.source_line, &self.underline) {
            let line_str = line.to_string();
            out.push_str(&format!("  {} │ {}\n", gray(&line_str), text));
            out.push_str(&format!("  {} │ {}\n", " ".repeat(line_str.len()), red(underline)));
        }
        out
    }

    /// Render without ANSI codes, for hosts that don't have a terminal.
    pub fn render_plain(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("error: {}\n", self.message));
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(col)) => out.push_str(&format!("  --> {file}:{line}:{col}\n")),
            (Some(file), Some(line), None) => out.push_str(&format!("  --> {file}:{line}\n")),
            _ => {}
        }
        if let (Some(line), Some(text), Some(underline)) = (self.line, &self.source_line, &self.underline) {
            out.push_str("   |\n");
            out.push_str(&format!("{line:>3} | {text}\n"));
            out.push_str(&format!("   | {underline}\n"));
        }
        out
    }
}

/// The `{status, file, line, column, message}` structured error document a
/// host reads instead of parsing terminal output.
#[derive(Debug, Clone, Serialize)]
pub struct JsonError {
    pub status: &'static str,
    pub file: Option<String>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub message: String,
}

impl From<&RenderedDiagnostic> for JsonError {
    fn from(d: &RenderedDiagnostic) -> Self {
        Self {
            status: "error",
            file: d.file.clone(),
            line: d.line,
            column: d.column,
            message: d.message.clone(),
        }
    }
}

fn make_underline(col: usize, len: usize) -> String {
    format!("{}{}", " ".repeat(col), "^".repeat(len.max(1)))
}

fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}

fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

fn gray(s: &str) -> String {
    format!("\x1b[90m{s}\x1b[0m")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::source::{PathId, Span};

    #[test]
    fn renders_dummy_span_without_location() {
        let err = SassError {
            kind: ErrorKind::Io,
            message: "could not read file".to_string(),
            path_id: PathId(0),
            span: Span::dummy(),
        };
        let sources = SourceStore::new();
        let rendered = RenderedDiagnostic::from_error(&err, &sources);
        assert!(rendered.file.is_none());
        assert!(rendered.render_plain().contains("could not read file"));
    }

    #[test]
    fn renders_spanned_error_with_source_line() {
        let mut sources = SourceStore::new();
        let id = sources.add("/a.scss", "a {\n  b: $x;\n}\n");
        let offset = "a {\n  b: ".len() as u32;
        let err = SassError {
            kind: ErrorKind::Undefined,
            message: "Undefined variable: $x".to_string(),
            path_id: id,
            span: Span::new(id, offset, offset + 2),
        };
        let rendered = RenderedDiagnostic::from_error(&err, &sources);
        assert_eq!(rendered.line, Some(2));
        assert_eq!(rendered.source_line.as_deref(), Some("  b: $x;"));
        let json = JsonError::from(&rendered);
        assert_eq!(json.status, "error");
        assert_eq!(json.line, Some(2));
    }

    #[test]
    fn ansi_render_contains_escape_codes() {
        let mut sources = SourceStore::new();
        let id = sources.add("/a.scss", "a { b: $x; }");
        let err = SassError {
            kind: ErrorKind::Undefined,
            message: "Undefined variable: $x".to_string(),
            path_id: id,
            span: Span::new(id, 7, 9),
        };
        let rendered = RenderedDiagnostic::from_error(&err, &sources);
        assert!(rendered.render_ansi().contains("\x1b["));
    }
}
