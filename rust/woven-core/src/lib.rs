//! Woven: a nested, expression-oriented stylesheet language that compiles
//! to CSS.
//!
//! [`compile_string`] and [`compile_file`] run the full pipeline: parse,
//! evaluate (variables, control flow, mixins/functions, `@extend`), and
//! serialize to one of four CSS output styles, optionally alongside a
//! source map.

pub mod compiler;
pub mod diagnostics;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use compiler::eval::{DiagKind, Diagnostic};
pub use compiler::format::OutputStyle;
pub use compiler::sourcemap::SourceMap;

use compiler::eval::{EvalError, Evaluator};
use compiler::format;
use compiler::import::{ImportError, ImportResolver};
use compiler::parser::{self, ParseError};
use compiler::selectors::ExtendError;
use compiler::source::{PathId, SourceStore, Span};
use compiler::sourcemap;

/// Coarse-grained error taxonomy a host can branch on without matching
/// every evaluator/parser/import variant individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Undefined,
    Arity,
    Type,
    Unit,
    Io,
    Import,
    User,
}

/// A single compilation failure: its kind, a human message, and the
/// source location it occurred at (dummy span/path for errors with no
/// useful location, e.g. a missing input file).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SassError {
    pub kind: ErrorKind,
    pub message: String,
    pub path_id: PathId,
    pub span: Span,
}

impl From<ParseError> for SassError {
    fn from(err: ParseError) -> Self {
        let span = err.span();
        SassError { kind: ErrorKind::Syntax, message: err.to_string(), path_id: span.path, span }
    }
}

impl From<ImportError> for SassError {
    fn from(err: ImportError) -> Self {
        SassError { kind: ErrorKind::Import, message: err.to_string(), path_id: PathId(0), span: Span::dummy() }
    }
}

impl From<ExtendError> for SassError {
    fn from(err: ExtendError) -> Self {
        SassError { kind: ErrorKind::User, message: err.to_string(), path_id: PathId(0), span: Span::dummy() }
    }
}

impl From<EvalError> for SassError {
    fn from(err: EvalError) -> Self {
        let span = err.span();
        let kind = match &err {
            EvalError::Type { .. } => ErrorKind::Type,
            EvalError::Unit { .. } => ErrorKind::Unit,
            EvalError::UndefinedVariable { .. } | EvalError::UndefinedMixin { .. } | EvalError::UndefinedFunction { .. } => {
                ErrorKind::Undefined
            }
            EvalError::Arity { .. } => ErrorKind::Arity,
            EvalError::UserError { .. } => ErrorKind::User,
            EvalError::ContentWithoutBlock { .. }
            | EvalError::ExtendOutsideRuleset { .. }
            | EvalError::MaxCallDepth { .. }
            | EvalError::LoopLimitExceeded { .. } => ErrorKind::User,
            EvalError::Io { .. } => ErrorKind::Io,
            EvalError::Import(_) => ErrorKind::Import,
            EvalError::Parse(_) => ErrorKind::Syntax,
            EvalError::Extend(_) => ErrorKind::User,
        };
        SassError { kind, message: err.to_string(), path_id: span.path, span }
    }
}

impl From<std::io::Error> for SassError {
    fn from(err: std::io::Error) -> Self {
        SassError { kind: ErrorKind::Io, message: err.to_string(), path_id: PathId(0), span: Span::dummy() }
    }
}

/// Compile-time options. Defaults match a bare `sass` invocation: nested
/// output, 5 digits of numeric precision, no load paths, no source map.
#[derive(Debug, Clone)]
pub struct Options {
    pub style: OutputStyle,
    pub precision: usize,
    pub load_paths: Vec<PathBuf>,
    pub source_map: bool,
    pub embed_sources: bool,
    /// Treat the input as indented syntax. The textual preconverter this
    /// would require is an external collaborator this crate doesn't
    /// implement (see spec Non-goals); set, it produces an `Io`-kind error.
    pub indented: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            style: OutputStyle::Nested,
            precision: 5,
            load_paths: Vec::new(),
            source_map: false,
            embed_sources: false,
            indented: false,
        }
    }
}

/// What one successful compilation produced.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub css: String,
    pub source_map: Option<SourceMap>,
    pub diagnostics: Vec<Diagnostic>,
    /// Absolute paths of every file pulled in via `@import`, in load order.
    pub loaded_files: Vec<PathBuf>,
}

/// Compile a buffer already read into memory. `path` is used for
/// `@import` resolution relative to its parent directory and for
/// source-map / error file names; it need not exist on disk.
pub fn compile_string(source: &str, path: impl AsRef<Path>, options: &Options) -> Result<CompileOutput, SassError> {
    let path = path.as_ref();
    if options.indented {
        return Err(SassError {
            kind: ErrorKind::Io,
            message: "indented syntax requires an external preconverter, which this crate does not provide".to_string(),
            path_id: PathId(0),
            span: Span::dummy(),
        });
    }

    let mut sources = SourceStore::new();
    let path_id = sources.add(path, source);
    let (mut ast, root) = parser::parse(source, path_id)?;

    let mut importer = ImportResolver::new(options.load_paths.clone());
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let evaluator = Evaluator::new(&mut sources, &mut importer, base_dir, options.precision);
    let (nodes, diagnostics) = evaluator.run(&mut ast, root)?;

    let (css, source_map) = if options.source_map {
        let (css, marks) = format::render_with_positions(&ast, &nodes, options.style);
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        let map = sourcemap::build(&sources, &css, &marks, file_name, options.embed_sources);
        (css, Some(map))
    } else {
        (format::render(&ast, &nodes, options.style), None)
    };

    Ok(CompileOutput { css, source_map, diagnostics, loaded_files: importer.load_order })
}

/// Read `path` from disk and compile it.
pub fn compile_file(path: impl AsRef<Path>, options: &Options) -> Result<CompileOutput, SassError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|e| SassError {
        kind: ErrorKind::Io,
        message: format!("could not read {}: {e}", path.display()),
        path_id: PathId(0),
        span: Span::dummy(),
    })?;
    compile_string(&source, path, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_plain_declaration_with_default_options() {
        let out = compile_string("a { b: 1 + 2; }", "input.scss", &Options::default()).unwrap();
        assert_eq!(out.css, "a {\n  b: 3;\n}\n");
        assert!(out.source_map.is_none());
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn collects_warn_diagnostics_without_failing() {
        let out = compile_string("@warn \"careful\";\na { b: 1; }", "input.scss", &Options::default()).unwrap();
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagKind::Warn);
    }

    #[test]
    fn undefined_variable_maps_to_undefined_kind() {
        let err = compile_string("a { b: $missing; }", "input.scss", &Options::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Undefined);
    }

    #[test]
    fn indented_syntax_is_rejected_as_unimplemented() {
        let options = Options { indented: true, ..Options::default() };
        let err = compile_string("a\n  b: 1", "input.sass", &options).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
    }

    #[test]
    fn compact_style_respects_options() {
        let options = Options { style: OutputStyle::Compact, ..Options::default() };
        let out = compile_string("a { b: 1; c: 2; }", "input.scss", &options).unwrap();
        assert_eq!(out.css, "a { b: 1; c: 2; }\n");
    }

    #[test]
    fn source_map_requested_is_produced() {
        let options = Options { source_map: true, ..Options::default() };
        let out = compile_string("a { b: 1; }", "input.scss", &options).unwrap();
        let map = out.source_map.expect("source map requested");
        assert_eq!(map.version, 3);
        assert!(!map.mappings.is_empty());
    }
}
