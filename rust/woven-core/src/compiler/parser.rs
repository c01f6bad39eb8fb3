//! Recursive-descent parser over the [`lexer::Cursor`] primitives.
//!
//! There is no pre-tokenization: the grammar is driven directly off the
//! character cursor, the same way the lexer primitives are documented to be
//! used. Statement shape (ruleset vs. declaration vs. propset) is
//! disambiguated with bounded lookahead to the first top-level `{`, `;`, or
//! `}` — never full backtracking, and never error recovery. A malformed
//! input simply fails the parse; there is no synchronization point to skip
//! to, because a "best effort" AST here would just feed the evaluator
//! nonsense.

use thiserror::Error;

use super::ast::{
    Args, Ast, AtRootFilter, BinOp, Combinator, DefKind, Expr, ExprId, FnNameRef, ListSeparator,
    Param, Params, PseudoArg, SchemaPart, SelectorId, SelectorKind, Stmt, StmtId, UnOp,
};
use super::lexer::{is_digit, is_ident_continue, is_ident_start, Cursor, LexError};
use super::source::{PathId, Span};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected input: expected {expected}, found {found}")]
    Unexpected {
        span: Span,
        expected: String,
        found: String,
    },
    #[error("unexpected end of input: expected {expected}")]
    UnexpectedEof { span: Span, expected: String },
    #[error("{source}")]
    Lex { span: Span, source: LexError },
    #[error("invalid numeric literal {text:?}")]
    InvalidNumber { span: Span, text: String },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            Self::Unexpected { span, .. }
            | Self::UnexpectedEof { span, .. }
            | Self::Lex { span, .. }
            | Self::InvalidNumber { span, .. } => *span,
        }
    }
}

/// Pseudo-classes/elements whose functional argument is itself a selector
/// list rather than opaque text (`:not(.a, .b)`, not `:nth-child(2n+1)`).
const SELECTOR_VALUED_PSEUDOS: &[&str] = &[
    "not",
    "matches",
    "is",
    "where",
    "has",
    "current",
    "host",
    "host-context",
    "slotted",
];

pub struct Parser<'a> {
    cur: Cursor<'a>,
    ast: Ast,
    paren_depth: u32,
}

/// Parse a full stylesheet buffer into its own [`Ast`], rooted at a single
/// [`Stmt::Block`] with `is_root: true`.
pub fn parse(source: &str, path: PathId) -> Result<(Ast, StmtId), ParseError> {
    let mut parser = Parser {
        cur: Cursor::new(source, path),
        ast: Ast::new(),
        paren_depth: 0,
    };
    let root = parser.parse_block_contents(true)?;
    parser.ast.root = Some(root);
    Ok((parser.ast, root))
}

/// Parses a standalone selector list (no surrounding stylesheet) into an
/// existing arena — used by the evaluator to re-parse a selector schema's
/// text once its interpolation holes have been resolved to strings.
pub fn parse_selector_list_standalone(ast: &mut Ast, source: &str, path: PathId) -> Result<SelectorId, ParseError> {
    let taken = std::mem::take(ast);
    let mut parser = Parser { cur: Cursor::new(source, path), ast: taken, paren_depth: 0 };
    parser.cur.skip_css();
    let result = parser.parse_selector_list();
    *ast = parser.ast;
    result
}

/// Parses a whole buffer into an existing arena rather than a fresh one —
/// used so that every `@import`ed file's statements and selectors land in
/// the same arena as the file that imported them, keeping every
/// [`SelectorId`]/[`StmtId`] produced during one compilation comparable.
pub fn parse_into(ast: &mut Ast, source: &str, path: PathId) -> Result<StmtId, ParseError> {
    let taken = std::mem::take(ast);
    let mut parser = Parser { cur: Cursor::new(source, path), ast: taken, paren_depth: 0 };
    let result = parser.parse_block_contents(true);
    *ast = parser.ast;
    result
}

impl<'a> Parser<'a> {
    // ── error helpers ───────────────────────────────────────────────────

    fn err_unexpected(&self, expected: &str) -> ParseError {
        match self.cur.current() {
            Some(c) => ParseError::Unexpected {
                span: self.cur.span_point(),
                expected: expected.to_string(),
                found: c.to_string(),
            },
            None => ParseError::UnexpectedEof {
                span: self.cur.span_point(),
                expected: expected.to_string(),
            },
        }
    }

    fn from_lex(&self, e: LexError) -> ParseError {
        ParseError::Lex {
            span: self.cur.span_point(),
            source: e,
        }
    }

    fn expect_char(&mut self, c: char) -> Result<(), ParseError> {
        if self.cur.current() == Some(c) {
            self.cur.advance();
            Ok(())
        } else {
            Err(self.err_unexpected(&format!("'{c}'")))
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<(), ParseError> {
        if self.cur.keyword(kw) {
            Ok(())
        } else {
            Err(self.err_unexpected(&format!("'{kw}'")))
        }
    }

    fn try_consume_keyword(&mut self, kw: &str) -> bool {
        self.cur.keyword(kw)
    }

    /// Consumes `@<kw>` (with leading CSS whitespace) if present, restoring
    /// the cursor otherwise.
    fn try_consume_at_keyword(&mut self, kw: &str) -> bool {
        let save = self.cur;
        self.cur.skip_css();
        if self.cur.current() == Some('@') {
            self.cur.advance();
            if self.cur.keyword(kw) {
                return true;
            }
        }
        self.cur = save;
        false
    }

    /// Consumes `!<word>` (e.g. `!important`) if present, with optional CSS
    /// whitespace between the bang and the word, as CSS allows.
    fn try_consume_bang(&mut self, word: &str) -> bool {
        let save = self.cur;
        if self.cur.current() == Some('!') {
            self.cur.advance();
            self.cur.skip_css();
            if self.cur.keyword(word) {
                return true;
            }
        }
        self.cur = save;
        false
    }

    fn consume_optional_semicolon(&mut self) {
        let save = self.cur;
        self.cur.skip_css();
        if self.cur.current() == Some(';') {
            self.cur.advance();
        } else {
            self.cur = save;
        }
    }

    fn parse_ident_text(&mut self) -> Result<String, ParseError> {
        if !self
            .cur
            .current()
            .map(is_ident_start)
            .unwrap_or(false)
        {
            return Err(self.err_unexpected("an identifier"));
        }
        Ok(self.cur.take_while(is_ident_continue).to_string())
    }

    // ── schema / interpolation ──────────────────────────────────────────

    /// Scan raw text up to (not including) any `stop` character, alternating
    /// literal runs with `#{ ... }` interpolation holes. Quoted strings are
    /// passed over verbatim (their quotes are never treated as stop chars
    /// and their contents are never scanned for holes here — a schema
    /// inside a quoted string is parsed by [`Parser::parse_quoted_string_expr`]
    /// instead).
    fn capture_schema_text(&mut self, stop: &[char]) -> Result<Vec<SchemaPart>, ParseError> {
        let mut parts = Vec::new();
        let mut literal_start = self.cur.pos;
        loop {
            match self.cur.current() {
                None => break,
                Some(c) if stop.contains(&c) => break,
                Some(q @ ('"' | '\'')) => {
                    let _ = q;
                    self.cur.scan_quoted_string().map_err(|e| self.from_lex(e))?;
                }
                Some('#') if self.cur.peek_at(1) == Some('{') => {
                    if self.cur.pos > literal_start {
                        parts.push(SchemaPart::Literal(
                            self.cur.src[literal_start..self.cur.pos].to_string(),
                        ));
                    }
                    self.cur.advance();
                    self.cur.advance();
                    self.cur.skip_css();
                    let hole = self.parse_value_list()?;
                    self.cur.skip_css();
                    self.expect_char('}')?;
                    parts.push(SchemaPart::Hole(hole));
                    literal_start = self.cur.pos;
                }
                Some(_) => {
                    self.cur.advance();
                }
            }
        }
        if self.cur.pos > literal_start {
            parts.push(SchemaPart::Literal(
                self.cur.src[literal_start..self.cur.pos].to_string(),
            ));
        }
        Ok(parts)
    }

    fn schema_to_expr(&mut self, parts: Vec<SchemaPart>, span: Span) -> ExprId {
        if parts.len() == 1 {
            match parts.into_iter().next().unwrap() {
                SchemaPart::Literal(s) => return self.ast.alloc_expr(Expr::StringConstant(s), span),
                SchemaPart::Hole(e) => return e,
            }
        }
        if parts.is_empty() {
            return self
                .ast
                .alloc_expr(Expr::StringConstant(String::new()), span);
        }
        self.ast.alloc_expr(Expr::StringSchema { parts }, span)
    }

    // ── top-level block/statement dispatch ──────────────────────────────

    fn parse_block(&mut self) -> Result<StmtId, ParseError> {
        self.expect_char('{')?;
        self.parse_block_contents(false)
    }

    fn parse_block_contents(&mut self, is_root: bool) -> Result<StmtId, ParseError> {
        let start = self.cur.pos;
        let mut statements = Vec::new();
        loop {
            self.cur.skip_raw_whitespace();
            if self.cur.skip_line_comment() {
                continue;
            }
            let comment_start = self.cur.pos;
            if let Some(text) = self.cur.scan_block_comment().map_err(|e| self.from_lex(e))? {
                let is_loud = text.starts_with('!');
                let span = self.cur.span_to(comment_start);
                statements.push(
                    self.ast
                        .alloc_stmt(Stmt::Comment { text: text.trim().to_string(), is_loud }, span),
                );
                continue;
            }
            match self.cur.current() {
                None => {
                    if !is_root {
                        return Err(self.err_unexpected("'}'"));
                    }
                    break;
                }
                Some('}') if !is_root => {
                    self.cur.advance();
                    break;
                }
                Some(_) => {
                    let stmt_start = self.cur.pos;
                    let stmt = self.parse_statement()?;
                    let span = self.cur.span_to(stmt_start);
                    statements.push(self.ast.alloc_stmt(stmt, span));
                }
            }
        }
        let span = self.cur.span_to(start);
        Ok(self.ast.alloc_stmt(Stmt::Block { is_root, statements }, span))
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.cur.current() {
            Some('$') => self.parse_assignment(),
            Some('@') => self.parse_at_rule(),
            Some(_) => self.parse_generic_statement(),
            None => Err(self.err_unexpected("a statement")),
        }
    }

    /// Scans to the first top-level `{`, `;`, `}`, or end-of-input, tracking
    /// paren/bracket depth and skipping over interpolation holes and quoted
    /// strings wholesale (their contents never count toward depth).
    fn lookahead_terminator(&self) -> Result<Option<char>, ParseError> {
        let mut probe = self.cur;
        let mut depth: i32 = 0;
        loop {
            match probe.current() {
                None => return Ok(None),
                Some('/') if probe.peek_at(1) == Some('*') => {
                    if probe.scan_block_comment().is_err() {
                        return Ok(None);
                    }
                }
                Some('/') if probe.peek_at(1) == Some('/') => {
                    probe.skip_line_comment();
                }
                Some('"') | Some('\'') => {
                    if probe.scan_quoted_string().is_err() {
                        return Ok(None);
                    }
                }
                Some('#') if probe.peek_at(1) == Some('{') => {
                    probe.advance();
                    probe.advance();
                    match probe.scan_balanced('{', '}') {
                        Ok(end) => probe.pos = end,
                        Err(_) => return Ok(None),
                    }
                }
                Some('(') | Some('[') => {
                    depth += 1;
                    probe.advance();
                }
                Some(')') | Some(']') => {
                    depth -= 1;
                    probe.advance();
                }
                Some(c @ ('{' | ';' | '}')) if depth <= 0 => return Ok(Some(c)),
                Some(_) => {
                    probe.advance();
                }
            }
        }
    }

    fn parse_generic_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.lookahead_terminator()? {
            Some('{') => self.parse_ruleset_or_propset(),
            Some(';') | Some('}') | None => self.parse_declaration_stmt(),
            Some(other) => Err(self.err_unexpected(&format!(
                "one of '{{', ';', '}}' (unexpected lookahead terminator '{other}')"
            ))),
        }
    }

    fn parse_ruleset_or_propset(&mut self) -> Result<Stmt, ParseError> {
        let save = self.cur;
        if let Some(stmt) = self.try_parse_propset()? {
            return Ok(stmt);
        }
        self.cur = save;
        let selector = self.parse_selector_or_schema('{')?;
        self.cur.skip_css();
        self.expect_char('{')?;
        let block = self.parse_block_contents(false)?;
        Ok(Stmt::Ruleset { selector, block })
    }

    /// `font: { family: Arial; size: 10px; }` — a bare property name
    /// directly followed by `:` and `{`, with no selector punctuation in
    /// between. Restores the cursor and returns `Ok(None)` on any mismatch.
    fn try_parse_propset(&mut self) -> Result<Option<Stmt>, ParseError> {
        let save = self.cur;
        let start = self.cur.pos;
        let parts = self.capture_schema_text(&[':', ';', '{', '}'])?;
        if self.cur.current() != Some(':') {
            self.cur = save;
            return Ok(None);
        }
        let looks_like_selector = parts.iter().any(|p| {
            matches!(p, SchemaPart::Literal(s) if s.chars().any(|c| matches!(c, '.' | '#' | '&' | '>' | '+' | '~' | '[' | '*')))
        });
        if looks_like_selector {
            self.cur = save;
            return Ok(None);
        }
        self.cur.advance(); // ':'
        self.cur.skip_css();
        if self.cur.current() != Some('{') {
            self.cur = save;
            return Ok(None);
        }
        self.cur.advance();
        let property_prefix = self.schema_to_expr(parts, self.cur.span_to(start));
        let block = self.parse_block_contents(false)?;
        Ok(Some(Stmt::Propset { property_prefix, block }))
    }

    fn parse_declaration_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.cur.pos;
        let parts = self.capture_schema_text(&[':', ';', '{', '}'])?;
        let property = self.schema_to_expr(parts, self.cur.span_to(start));
        self.cur.skip_css();
        self.expect_char(':')?;
        self.cur.skip_css();
        let value = self.parse_value_list()?;
        self.cur.skip_css();
        let is_important = self.try_consume_bang("important");
        self.cur.skip_css();
        self.consume_optional_semicolon();
        Ok(Stmt::Declaration { property, value, is_important })
    }

    fn parse_assignment(&mut self) -> Result<Stmt, ParseError> {
        self.expect_char('$')?;
        let name = self.parse_ident_text()?;
        self.cur.skip_css();
        self.expect_char(':')?;
        self.cur.skip_css();
        let value = self.parse_value_list()?;
        self.cur.skip_css();
        let mut is_default = false;
        let mut is_global = false;
        loop {
            if self.try_consume_bang("default") {
                is_default = true;
                self.cur.skip_css();
                continue;
            }
            if self.try_consume_bang("global") {
                is_global = true;
                self.cur.skip_css();
                continue;
            }
            break;
        }
        self.consume_optional_semicolon();
        Ok(Stmt::Assignment { name, value, is_default, is_global })
    }

    // ── at-rules ─────────────────────────────────────────────────────────

    fn parse_at_rule(&mut self) -> Result<Stmt, ParseError> {
        self.expect_char('@')?;
        let name = self.parse_ident_text()?;
        match name.as_str() {
            "if" => {
                self.cur.skip_css();
                self.parse_if_body()
            }
            "for" => self.parse_for(),
            "each" => self.parse_each(),
            "while" => self.parse_while(),
            "mixin" => self.parse_definition(DefKind::Mixin),
            "function" => self.parse_definition(DefKind::Function),
            "include" => self.parse_mixin_call(),
            "return" => {
                self.cur.skip_css();
                let value = self.parse_value_list()?;
                self.cur.skip_css();
                self.consume_optional_semicolon();
                Ok(Stmt::Return { value })
            }
            "content" => {
                self.cur.skip_css();
                self.consume_optional_semicolon();
                Ok(Stmt::Content)
            }
            "extend" => self.parse_extend(),
            "warn" => {
                self.cur.skip_css();
                let value = self.parse_value_list()?;
                self.cur.skip_css();
                self.consume_optional_semicolon();
                Ok(Stmt::Warning(value))
            }
            "error" => {
                self.cur.skip_css();
                let value = self.parse_value_list()?;
                self.cur.skip_css();
                self.consume_optional_semicolon();
                Ok(Stmt::ErrorStmt(value))
            }
            "debug" => {
                self.cur.skip_css();
                let value = self.parse_value_list()?;
                self.cur.skip_css();
                self.consume_optional_semicolon();
                Ok(Stmt::Debug(value))
            }
            "import" => self.parse_import(),
            "media" => self.parse_media(),
            "at-root" => self.parse_at_root(),
            other => self.parse_generic_at_rule(other.to_string()),
        }
    }

    /// Parses `<predicate> { <consequent> } [@else [if <predicate>] { ... }]`
    /// without having consumed the leading `@if`/`@else if` keywords — the
    /// caller does that.
    fn parse_if_body(&mut self) -> Result<Stmt, ParseError> {
        let predicate = self.parse_value_list()?;
        self.cur.skip_css();
        let consequent = self.parse_block()?;
        let alternative = if self.try_consume_at_keyword("else") {
            self.cur.skip_css();
            if self.try_consume_keyword("if") {
                self.cur.skip_css();
                let inner = self.parse_if_body()?;
                let span = self.cur.span_to(self.cur.pos);
                Some(self.ast.alloc_stmt(inner, span))
            } else {
                self.cur.skip_css();
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If { predicate, consequent, alternative })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        self.cur.skip_css();
        self.expect_char('$')?;
        let var = self.parse_ident_text()?;
        self.cur.skip_css();
        self.expect_keyword("from")?;
        self.cur.skip_css();
        let lower = self.parse_or_expr()?;
        self.cur.skip_css();
        let inclusive = if self.try_consume_keyword("through") {
            true
        } else {
            self.expect_keyword("to")?;
            false
        };
        self.cur.skip_css();
        let upper = self.parse_or_expr()?;
        self.cur.skip_css();
        let body = self.parse_block()?;
        Ok(Stmt::For { var, lower, upper, inclusive, body })
    }

    fn parse_each(&mut self) -> Result<Stmt, ParseError> {
        self.cur.skip_css();
        let mut vars = Vec::new();
        loop {
            self.expect_char('$')?;
            vars.push(self.parse_ident_text()?);
            self.cur.skip_css();
            if self.cur.current() == Some(',') {
                self.cur.advance();
                self.cur.skip_css();
            } else {
                break;
            }
        }
        self.expect_keyword("in")?;
        self.cur.skip_css();
        let iterable = self.parse_value_list()?;
        self.cur.skip_css();
        let body = self.parse_block()?;
        Ok(Stmt::Each { vars, iterable, body })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        self.cur.skip_css();
        let predicate = self.parse_value_list()?;
        self.cur.skip_css();
        let body = self.parse_block()?;
        Ok(Stmt::While { predicate, body })
    }

    fn parse_definition(&mut self, kind: DefKind) -> Result<Stmt, ParseError> {
        self.cur.skip_css();
        let name = self.parse_ident_text()?;
        self.cur.skip_css();
        let parameters = if self.cur.current() == Some('(') {
            self.parse_params()?
        } else {
            Params::default()
        };
        self.cur.skip_css();
        let body = self.parse_block()?;
        Ok(Stmt::Definition { kind, name, parameters, body })
    }

    fn parse_params(&mut self) -> Result<Params, ParseError> {
        self.expect_char('(')?;
        self.cur.skip_css();
        let mut items = Vec::new();
        if self.cur.current() != Some(')') {
            loop {
                self.cur.skip_css();
                self.expect_char('$')?;
                let name = self.parse_ident_text()?;
                self.cur.skip_css();
                let is_rest = self.cur.literal("...");
                let default = if !is_rest && self.cur.current() == Some(':') {
                    self.cur.advance();
                    self.cur.skip_css();
                    let v = self.parse_or_expr()?;
                    Some(self.force_division(v))
                } else {
                    None
                };
                items.push(Param { name, default, is_rest });
                self.cur.skip_css();
                if self.cur.current() == Some(',') {
                    self.cur.advance();
                } else {
                    break;
                }
            }
        }
        self.cur.skip_css();
        self.expect_char(')')?;
        Ok(Params { items })
    }

    fn parse_mixin_call(&mut self) -> Result<Stmt, ParseError> {
        self.cur.skip_css();
        let name = self.parse_ident_text()?;
        self.cur.skip_css();
        let arguments = if self.cur.current() == Some('(') {
            self.parse_args()?
        } else {
            Args::default()
        };
        self.cur.skip_css();
        let content_block = if self.cur.current() == Some('{') {
            Some(self.parse_block()?)
        } else {
            self.consume_optional_semicolon();
            None
        };
        Ok(Stmt::MixinCall { name, arguments, content_block })
    }

    fn parse_args(&mut self) -> Result<Args, ParseError> {
        self.expect_char('(')?;
        self.cur.skip_css();
        let mut positional = Vec::new();
        let mut named = Vec::new();
        let mut rest = None;
        if self.cur.current() != Some(')') {
            loop {
                self.cur.skip_css();
                if self.cur.current() == Some('$') {
                    let save = self.cur;
                    self.cur.advance();
                    if self.cur.current().map(is_ident_start).unwrap_or(false) {
                        let nm = self.cur.take_while(is_ident_continue).to_string();
                        self.cur.skip_css();
                        if self.cur.current() == Some(':') {
                            self.cur.advance();
                            self.cur.skip_css();
                            let v = self.parse_or_expr()?;
                            let v = self.force_division(v);
                            named.push((nm, v));
                            self.cur.skip_css();
                            if self.cur.current() == Some(',') {
                                self.cur.advance();
                                continue;
                            } else {
                                break;
                            }
                        }
                    }
                    self.cur = save;
                }
                let v = self.parse_or_expr()?;
                self.cur.skip_css();
                if self.cur.literal("...") {
                    rest = Some(self.force_division(v));
                    self.cur.skip_css();
                    if self.cur.current() == Some(',') {
                        self.cur.advance();
                        continue;
                    } else {
                        break;
                    }
                }
                positional.push(self.force_division(v));
                self.cur.skip_css();
                if self.cur.current() == Some(',') {
                    self.cur.advance();
                } else {
                    break;
                }
            }
        }
        self.cur.skip_css();
        self.expect_char(')')?;
        Ok(Args { positional, named, rest })
    }

    fn parse_extend(&mut self) -> Result<Stmt, ParseError> {
        self.cur.skip_css();
        let target = self.parse_selector_or_schema(';')?;
        self.cur.skip_css();
        let is_optional = self.try_consume_bang("optional");
        self.cur.skip_css();
        self.consume_optional_semicolon();
        Ok(Stmt::Extend { target, is_optional })
    }

    fn parse_import(&mut self) -> Result<Stmt, ParseError> {
        self.cur.skip_css();
        let mut urls = vec![self.parse_or_expr()?];
        self.cur.skip_css();
        while self.cur.current() == Some(',') {
            self.cur.advance();
            self.cur.skip_css();
            urls.push(self.parse_or_expr()?);
            self.cur.skip_css();
        }
        let media_queries = if !matches!(self.cur.current(), Some(';') | Some('}') | None) {
            Some(self.parse_value_list()?)
        } else {
            None
        };
        self.cur.skip_css();
        self.consume_optional_semicolon();
        Ok(Stmt::Import { urls, media_queries })
    }

    fn parse_media(&mut self) -> Result<Stmt, ParseError> {
        self.cur.skip_css();
        let start = self.cur.pos;
        let parts = self.capture_schema_text(&['{', ';', '}'])?;
        let queries = self.schema_to_expr(parts, self.cur.span_to(start));
        self.cur.skip_css();
        let block = self.parse_block()?;
        Ok(Stmt::MediaBlock { queries, block })
    }

    fn parse_at_root(&mut self) -> Result<Stmt, ParseError> {
        self.cur.skip_css();
        let filter = if self.cur.current() == Some('(') {
            self.cur.advance();
            self.cur.skip_css();
            let with = if self.try_consume_keyword("without") {
                false
            } else {
                self.try_consume_keyword("with");
                true
            };
            self.cur.skip_css();
            self.expect_char(':')?;
            self.cur.skip_css();
            let mut directives = vec![self.parse_ident_text()?];
            loop {
                self.cur.skip_css();
                if self.cur.current().map(is_ident_start).unwrap_or(false) {
                    directives.push(self.parse_ident_text()?);
                } else {
                    break;
                }
            }
            self.cur.skip_css();
            self.expect_char(')')?;
            Some(AtRootFilter { with, directives })
        } else {
            None
        };
        self.cur.skip_css();
        let body = self.parse_block()?;
        Ok(Stmt::AtRoot { filter, body })
    }

    /// Passthrough for anything not otherwise recognized — `@supports`,
    /// `@font-face`, `@keyframes`, `@page`, vendor directives, and future
    /// CSS at-rules all land here with their prelude kept as raw/interpolated
    /// text and their body (if any) parsed as an ordinary block.
    fn parse_generic_at_rule(&mut self, name: String) -> Result<Stmt, ParseError> {
        self.cur.skip_css();
        let start = self.cur.pos;
        let parts = self.capture_schema_text(&['{', ';', '}'])?;
        let value = if parts.is_empty() {
            None
        } else {
            Some(self.schema_to_expr(parts, self.cur.span_to(start)))
        };
        self.cur.skip_css();
        let block = if self.cur.current() == Some('{') {
            Some(self.parse_block()?)
        } else {
            self.consume_optional_semicolon();
            None
        };
        Ok(Stmt::AtRule { keyword: name, selector: None, value, block })
    }

    // ── selectors ────────────────────────────────────────────────────────

    /// If the prefix up to `stop` contains `#{`, defer it as a
    /// [`SelectorKind::Schema`] to be re-parsed after interpolants are
    /// evaluated; otherwise parse the full structural selector grammar.
    fn parse_selector_or_schema(&mut self, stop: char) -> Result<SelectorId, ParseError> {
        let start = self.cur.pos;
        let save = self.cur;
        let mut probe = self.cur;
        let mut has_interp = false;
        loop {
            match probe.current() {
                None => break,
                Some(c) if c == stop => break,
                Some('"') | Some('\'') => {
                    if probe.scan_quoted_string().is_err() {
                        break;
                    }
                }
                Some('#') if probe.peek_at(1) == Some('{') => {
                    has_interp = true;
                    break;
                }
                Some(_) => {
                    probe.advance();
                }
            }
        }
        if has_interp {
            let parts = self.capture_schema_text(&[stop])?;
            let span = self.cur.span_to(start);
            Ok(self.ast.alloc_selector(SelectorKind::Schema { parts }, span))
        } else {
            self.cur = save;
            self.parse_selector_list()
        }
    }

    fn parse_selector_list(&mut self) -> Result<SelectorId, ParseError> {
        let start = self.cur.pos;
        let mut complexes = vec![self.parse_complex()?];
        loop {
            self.cur.skip_css();
            if self.cur.current() == Some(',') {
                self.cur.advance();
                self.cur.skip_css();
                complexes.push(self.parse_complex()?);
            } else {
                break;
            }
        }
        let span = self.cur.span_to(start);
        Ok(self
            .ast
            .alloc_selector(SelectorKind::List { complexes, is_optional: false }, span))
    }

    fn at_compound_start(&self) -> bool {
        matches!(self.cur.current(), Some(c) if is_ident_start(c) || matches!(c, '.' | '#' | '%' | '&' | ':' | '[' | '*'))
    }

    fn parse_complex(&mut self) -> Result<SelectorId, ParseError> {
        let start = self.cur.pos;
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators: Vec<Combinator> = Vec::new();
        loop {
            let ws_start = self.cur.pos;
            self.cur.skip_raw_whitespace();
            let _ = self.cur.skip_block_comment();
            self.cur.skip_raw_whitespace();
            let had_ws = self.cur.pos != ws_start;
            let explicit = match self.cur.current() {
                Some('>') => {
                    self.cur.advance();
                    self.cur.skip_css();
                    Some(Combinator::Child)
                }
                Some('+') => {
                    self.cur.advance();
                    self.cur.skip_css();
                    Some(Combinator::Adjacent)
                }
                Some('~') if self.cur.peek_at(1) != Some('=') => {
                    self.cur.advance();
                    self.cur.skip_css();
                    Some(Combinator::General)
                }
                _ => None,
            };
            if explicit.is_none() && !had_ws {
                break;
            }
            if !self.at_compound_start() {
                break;
            }
            combinators.push(explicit.unwrap_or(Combinator::Descendant));
            compounds.push(self.parse_compound()?);
        }
        let mut node = self.ast.alloc_selector(
            SelectorKind::Complex { head: compounds.pop(), combinator: None, reference: None, tail: None },
            self.cur.span_to(start),
        );
        while let Some(compound) = compounds.pop() {
            let comb = combinators.pop().unwrap();
            node = self.ast.alloc_selector(
                SelectorKind::Complex {
                    head: Some(compound),
                    combinator: Some(comb),
                    reference: None,
                    tail: Some(node),
                },
                self.cur.span_to(start),
            );
        }
        Ok(node)
    }

    fn parse_compound(&mut self) -> Result<SelectorId, ParseError> {
        let start = self.cur.pos;
        let mut simples = Vec::new();
        let mut has_parent_ref = false;
        loop {
            let simple_start = self.cur.pos;
            match self.cur.current() {
                Some('&') => {
                    self.cur.advance();
                    has_parent_ref = true;
                    simples.push(
                        self.ast
                            .alloc_selector(SelectorKind::ParentRef, self.cur.span_to(simple_start)),
                    );
                }
                Some('*') => {
                    self.cur.advance();
                    simples.push(self.ast.alloc_selector(
                        SelectorKind::Type { name: "*".to_string(), namespace: None },
                        self.cur.span_to(simple_start),
                    ));
                }
                Some('.') => {
                    self.cur.advance();
                    let name = self.parse_ident_text()?;
                    simples.push(
                        self.ast
                            .alloc_selector(SelectorKind::ClassRef(name), self.cur.span_to(simple_start)),
                    );
                }
                Some('#') => {
                    self.cur.advance();
                    let name = self.parse_ident_text()?;
                    simples.push(
                        self.ast
                            .alloc_selector(SelectorKind::IdRef(name), self.cur.span_to(simple_start)),
                    );
                }
                Some('%') => {
                    self.cur.advance();
                    let name = self.parse_ident_text()?;
                    simples.push(self.ast.alloc_selector(
                        SelectorKind::Placeholder(name),
                        self.cur.span_to(simple_start),
                    ));
                }
                Some(':') => {
                    simples.push(self.parse_pseudo()?);
                }
                Some('[') => {
                    simples.push(self.parse_attribute()?);
                }
                Some(c) if is_ident_start(c) => {
                    let name = self.parse_ident_text()?;
                    let (name, namespace) = if self.cur.current() == Some('|')
                        && self.cur.peek_at(1) != Some('|')
                    {
                        self.cur.advance();
                        let local = self.parse_ident_text()?;
                        (local, Some(name))
                    } else {
                        (name, None)
                    };
                    simples.push(self.ast.alloc_selector(
                        SelectorKind::Type { name, namespace },
                        self.cur.span_to(simple_start),
                    ));
                }
                _ => break,
            }
        }
        if simples.is_empty() {
            return Err(self.err_unexpected("a selector"));
        }
        let span = self.cur.span_to(start);
        Ok(self
            .ast
            .alloc_selector(SelectorKind::Compound { simples, has_parent_ref }, span))
    }

    fn parse_pseudo(&mut self) -> Result<SelectorId, ParseError> {
        let start = self.cur.pos;
        self.expect_char(':')?;
        let is_element = if self.cur.current() == Some(':') {
            self.cur.advance();
            true
        } else {
            false
        };
        let name = self.parse_ident_text()?;
        if self.cur.current() != Some('(') {
            let span = self.cur.span_to(start);
            return Ok(self
                .ast
                .alloc_selector(SelectorKind::PseudoSimple { name, is_element }, span));
        }
        self.cur.advance();
        self.cur.skip_css();
        if SELECTOR_VALUED_PSEUDOS.contains(&name.as_str()) {
            let inner = self.parse_selector_list()?;
            self.cur.skip_css();
            self.expect_char(')')?;
            let span = self.cur.span_to(start);
            return Ok(self.ast.alloc_selector(SelectorKind::Wrapped { name, inner }, span));
        }
        let text_start = self.cur.pos;
        let end = self
            .cur
            .scan_balanced('(', ')')
            .map_err(|e| self.from_lex(e))?;
        let raw = self.cur.src[text_start..end - 1].trim().to_string();
        let span = self.cur.span_to(start);
        Ok(self.ast.alloc_selector(
            SelectorKind::PseudoFunctional { name, arg: PseudoArg::Text(raw) },
            span,
        ))
    }

    fn parse_attribute(&mut self) -> Result<SelectorId, ParseError> {
        let start = self.cur.pos;
        self.expect_char('[')?;
        self.cur.skip_css();
        let name = self.parse_ident_text()?;
        self.cur.skip_css();
        let mut matcher = None;
        let mut value = None;
        if matches!(self.cur.current(), Some('=' | '~' | '|' | '^' | '$' | '*')) {
            let op_start = self.cur.pos;
            if self.cur.current() != Some('=') {
                self.cur.advance();
            }
            self.expect_char('=')?;
            matcher = Some(self.cur.src[op_start..self.cur.pos].to_string());
            self.cur.skip_css();
            let v = match self.cur.current() {
                Some('"') | Some('\'') => {
                    let (s, _) = self.cur.scan_quoted_string().map_err(|e| self.from_lex(e))?;
                    s
                }
                _ => self.cur.take_while(is_ident_continue).to_string(),
            };
            value = Some(v);
        }
        self.cur.skip_css();
        self.expect_char(']')?;
        let span = self.cur.span_to(start);
        Ok(self
            .ast
            .alloc_selector(SelectorKind::Attribute { name, matcher, value }, span))
    }

    // ── values / expressions ─────────────────────────────────────────────

    fn can_start_expr(&self) -> bool {
        match self.cur.current() {
            None => false,
            Some(c) => !matches!(c, ',' | ';' | '{' | '}' | ')' | ']' | ':' | '!'),
        }
    }

    fn parse_value_list(&mut self) -> Result<ExprId, ParseError> {
        let start = self.cur.pos;
        let mut comma_items = vec![self.parse_space_list()?];
        loop {
            self.cur.skip_css();
            if self.cur.current() == Some(',') {
                self.cur.advance();
                self.cur.skip_css();
                comma_items.push(self.parse_space_list()?);
            } else {
                break;
            }
        }
        if comma_items.len() == 1 {
            Ok(comma_items.pop().unwrap())
        } else {
            let span = self.cur.span_to(start);
            Ok(self
                .ast
                .alloc_expr(Expr::List { separator: ListSeparator::Comma, items: comma_items }, span))
        }
    }

    fn parse_space_list(&mut self) -> Result<ExprId, ParseError> {
        let start = self.cur.pos;
        let mut items = vec![self.parse_or_expr()?];
        loop {
            self.cur.skip_css();
            if self.can_start_expr() {
                items.push(self.parse_or_expr()?);
            } else {
                break;
            }
        }
        if items.len() == 1 {
            Ok(items.pop().unwrap())
        } else {
            let span = self.cur.span_to(start);
            Ok(self
                .ast
                .alloc_expr(Expr::List { separator: ListSeparator::Space, items }, span))
        }
    }

    fn parse_or_expr(&mut self) -> Result<ExprId, ParseError> {
        let start = self.cur.pos;
        let mut left = self.parse_and_expr()?;
        loop {
            let save = self.cur;
            self.cur.skip_css();
            if self.cur.keyword("or") {
                self.cur.skip_css();
                let rhs = self.parse_and_expr()?;
                let (left_f, rhs_f) = (self.force_division(left), self.force_division(rhs));
                let span = self.cur.span_to(start);
                left = self.ast.alloc_expr(
                    Expr::Binary { op: BinOp::Or, lhs: left_f, rhs: rhs_f },
                    span,
                );
            } else {
                self.cur = save;
                break;
            }
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<ExprId, ParseError> {
        let start = self.cur.pos;
        let mut left = self.parse_comparison()?;
        loop {
            let save = self.cur;
            self.cur.skip_css();
            if self.cur.keyword("and") {
                self.cur.skip_css();
                let rhs = self.parse_comparison()?;
                let (left_f, rhs_f) = (self.force_division(left), self.force_division(rhs));
                let span = self.cur.span_to(start);
                left = self.ast.alloc_expr(
                    Expr::Binary { op: BinOp::And, lhs: left_f, rhs: rhs_f },
                    span,
                );
            } else {
                self.cur = save;
                break;
            }
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<ExprId, ParseError> {
        let start = self.cur.pos;
        let left = self.parse_additive()?;
        let save = self.cur;
        self.cur.skip_css();
        let op = match self.cur.current() {
            Some('=') if self.cur.peek_at(1) == Some('=') => {
                self.cur.advance_n(2);
                Some(BinOp::Eq)
            }
            Some('!') if self.cur.peek_at(1) == Some('=') => {
                self.cur.advance_n(2);
                Some(BinOp::Neq)
            }
            Some('<') if self.cur.peek_at(1) == Some('=') => {
                self.cur.advance_n(2);
                Some(BinOp::Lte)
            }
            Some('>') if self.cur.peek_at(1) == Some('=') => {
                self.cur.advance_n(2);
                Some(BinOp::Gte)
            }
            Some('<') => {
                self.cur.advance();
                Some(BinOp::Lt)
            }
            Some('>') => {
                self.cur.advance();
                Some(BinOp::Gt)
            }
            _ => None,
        };
        match op {
            Some(op) => {
                self.cur.skip_css();
                let rhs = self.parse_additive()?;
                let (left_f, rhs_f) = (self.force_division(left), self.force_division(rhs));
                let span = self.cur.span_to(start);
                Ok(self.ast.alloc_expr(Expr::Binary { op, lhs: left_f, rhs: rhs_f }, span))
            }
            None => {
                self.cur = save;
                Ok(left)
            }
        }
    }

    fn parse_additive(&mut self) -> Result<ExprId, ParseError> {
        let start = self.cur.pos;
        let mut left = self.parse_multiplicative()?;
        loop {
            let save = self.cur;
            let ws_before = {
                let before = self.cur.pos;
                self.cur.skip_raw_whitespace();
                let _ = self.cur.skip_block_comment();
                self.cur.pos != before
            };
            match self.cur.current() {
                Some(c @ ('+' | '-')) => {
                    let mut probe = self.cur;
                    probe.advance();
                    let space_after = probe.current().map(|n| n.is_whitespace()).unwrap_or(true);
                    if ws_before && !space_after {
                        // Looks like the start of a new signed atom (e.g. `10px -5px`).
                        self.cur = save;
                        break;
                    }
                    self.cur.advance();
                    self.cur.skip_css();
                    let rhs = self.parse_multiplicative()?;
                    let op = if c == '+' { BinOp::Add } else { BinOp::Sub };
                    let (left_f, rhs_f) = (self.force_division(left), self.force_division(rhs));
                    let span = self.cur.span_to(start);
                    left = self.ast.alloc_expr(Expr::Binary { op, lhs: left_f, rhs: rhs_f }, span);
                }
                _ => {
                    self.cur = save;
                    break;
                }
            }
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<ExprId, ParseError> {
        let start = self.cur.pos;
        let mut left = self.parse_unary()?;
        loop {
            let save = self.cur;
            self.cur.skip_css();
            match self.cur.current() {
                Some('*') => {
                    self.cur.advance();
                    self.cur.skip_css();
                    let rhs = self.parse_unary()?;
                    let (left_f, rhs_f) = (self.force_division(left), self.force_division(rhs));
                    let span = self.cur.span_to(start);
                    left = self
                        .ast
                        .alloc_expr(Expr::Binary { op: BinOp::Mul, lhs: left_f, rhs: rhs_f }, span);
                }
                Some('%') => {
                    self.cur.advance();
                    self.cur.skip_css();
                    let rhs = self.parse_unary()?;
                    let (left_f, rhs_f) = (self.force_division(left), self.force_division(rhs));
                    let span = self.cur.span_to(start);
                    left = self
                        .ast
                        .alloc_expr(Expr::Binary { op: BinOp::Mod, lhs: left_f, rhs: rhs_f }, span);
                }
                Some('/') if self.cur.peek_at(1) != Some('/') && self.cur.peek_at(1) != Some('*') => {
                    self.cur.advance();
                    self.cur.skip_css();
                    let rhs = self.parse_unary()?;
                    let span = self.cur.span_to(start);
                    left = self.build_slash(left, rhs, span);
                }
                _ => {
                    self.cur = save;
                    break;
                }
            }
        }
        Ok(left)
    }

    /// `a/b` is real division if it's inside parens, or either operand is a
    /// variable or function call; otherwise it stays a literal slash unless
    /// a later enclosing operator forces it (see [`Parser::force_division`]).
    fn build_slash(&mut self, lhs: ExprId, rhs: ExprId, span: Span) -> ExprId {
        let operand_forces = |ast: &Ast, id: ExprId| {
            matches!(
                ast.expr(id).kind,
                Expr::Variable { .. } | Expr::FunctionCall { .. }
            )
        };
        if self.paren_depth > 0 || operand_forces(&self.ast, lhs) || operand_forces(&self.ast, rhs) {
            self.ast.alloc_expr(Expr::Binary { op: BinOp::Div, lhs, rhs }, span)
        } else {
            self.ast.alloc_expr(Expr::Slash { lhs, rhs }, span)
        }
    }

    /// Reinterprets a bare `Expr::Slash` as real division once it becomes an
    /// operand of another arithmetic/comparison operator or of a function
    /// call argument — "used inside another arithmetic context" per the
    /// division-ambiguity rule. Nodes already resolved (by parens or a
    /// variable/function operand) pass through unchanged.
    fn force_division(&mut self, id: ExprId) -> ExprId {
        if let Expr::Slash { lhs, rhs } = &self.ast.expr(id).kind {
            let (lhs, rhs) = (*lhs, *rhs);
            let span = self.ast.expr(id).span;
            return self.ast.alloc_expr(Expr::Binary { op: BinOp::Div, lhs, rhs }, span);
        }
        id
    }

    fn parse_unary(&mut self) -> Result<ExprId, ParseError> {
        let start = self.cur.pos;
        match self.cur.current() {
            Some('-') => {
                self.cur.advance();
                let operand = self.parse_unary()?;
                let span = self.cur.span_to(start);
                if let Expr::Number { value, numer_units, denom_units } = self.ast.expr(operand).kind.clone() {
                    return Ok(self.ast.alloc_expr(
                        Expr::Number { value: -value, numer_units, denom_units },
                        span,
                    ));
                }
                Ok(self.ast.alloc_expr(Expr::Unary { op: UnOp::Minus, operand }, span))
            }
            Some('+') => {
                self.cur.advance();
                let operand = self.parse_unary()?;
                let span = self.cur.span_to(start);
                Ok(self.ast.alloc_expr(Expr::Unary { op: UnOp::Plus, operand }, span))
            }
            _ if self.cur.keyword("not") => {
                self.cur.skip_css();
                let operand = self.parse_unary()?;
                let span = self.cur.span_to(start);
                Ok(self.ast.alloc_expr(Expr::Unary { op: UnOp::Not, operand }, span))
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<ExprId, ParseError> {
        self.cur.skip_css();
        let start = self.cur.pos;
        match self.cur.current() {
            None => Err(self.err_unexpected("a value")),
            Some('(') => self.parse_parenthesized(),
            Some('"') | Some('\'') => self.parse_quoted_string_expr(),
            Some('$') => {
                self.cur.advance();
                let name = self.parse_ident_text()?;
                let span = self.cur.span_to(start);
                Ok(self.ast.alloc_expr(Expr::Variable { name }, span))
            }
            Some('#') if self.cur.peek_at(1) == Some('{') => {
                self.cur.advance();
                self.cur.advance();
                self.cur.skip_css();
                let inner = self.parse_value_list()?;
                self.cur.skip_css();
                self.expect_char('}')?;
                Ok(inner)
            }
            Some('#') => {
                if let Some(color) = self.try_parse_hex_color(start)? {
                    Ok(color)
                } else {
                    Err(self.err_unexpected("a hex color"))
                }
            }
            Some(c) if is_digit(c) => self.parse_number(),
            Some('.') if self.cur.peek_at(1).map(is_digit).unwrap_or(false) => self.parse_number(),
            Some(c) if is_ident_start(c) || c == '-' => self.parse_bare_token_or_call(),
            _ => Err(self.err_unexpected("a value")),
        }
    }

    fn parse_parenthesized(&mut self) -> Result<ExprId, ParseError> {
        let start = self.cur.pos;
        self.cur.advance();
        self.paren_depth += 1;
        self.cur.skip_css();
        if self.cur.current() == Some(')') {
            self.cur.advance();
            self.paren_depth -= 1;
            let span = self.cur.span_to(start);
            return Ok(self
                .ast
                .alloc_expr(Expr::List { separator: ListSeparator::Space, items: vec![] }, span));
        }
        let save = self.cur;
        let first = self.parse_or_expr()?;
        self.cur.skip_css();
        if self.cur.current() == Some(':') {
            self.cur.advance();
            self.cur.skip_css();
            let v0 = self.parse_or_expr()?;
            let mut pairs = vec![(first, v0)];
            loop {
                self.cur.skip_css();
                if self.cur.current() != Some(',') {
                    break;
                }
                self.cur.advance();
                self.cur.skip_css();
                if self.cur.current() == Some(')') {
                    break;
                }
                let k = self.parse_or_expr()?;
                self.cur.skip_css();
                self.expect_char(':')?;
                self.cur.skip_css();
                let v = self.parse_or_expr()?;
                pairs.push((k, v));
            }
            self.cur.skip_css();
            self.expect_char(')')?;
            self.paren_depth -= 1;
            let span = self.cur.span_to(start);
            Ok(self.ast.alloc_expr(Expr::Map { pairs }, span))
        } else {
            self.cur = save;
            let list = self.parse_value_list()?;
            self.cur.skip_css();
            self.expect_char(')')?;
            self.paren_depth -= 1;
            Ok(list)
        }
    }

    fn parse_quoted_string_expr(&mut self) -> Result<ExprId, ParseError> {
        let start = self.cur.pos;
        let quote = match self.cur.current() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.err_unexpected("a string")),
        };
        self.cur.advance();
        let mut parts = Vec::new();
        let mut literal = String::new();
        loop {
            match self.cur.current() {
                None => {
                    return Err(ParseError::UnexpectedEof {
                        span: self.cur.span_point(),
                        expected: "closing quote".to_string(),
                    })
                }
                Some(c) if c == quote => {
                    self.cur.advance();
                    break;
                }
                Some('\\') => {
                    self.cur.advance();
                    match self.cur.advance() {
                        Some('n') => literal.push('\n'),
                        Some('t') => literal.push('\t'),
                        Some(other) => literal.push(other),
                        None => {
                            return Err(ParseError::UnexpectedEof {
                                span: self.cur.span_point(),
                                expected: "escape sequence".to_string(),
                            })
                        }
                    }
                }
                Some('#') if self.cur.peek_at(1) == Some('{') => {
                    if !literal.is_empty() {
                        parts.push(SchemaPart::Literal(std::mem::take(&mut literal)));
                    }
                    self.cur.advance();
                    self.cur.advance();
                    self.cur.skip_css();
                    let hole = self.parse_value_list()?;
                    self.cur.skip_css();
                    self.expect_char('}')?;
                    parts.push(SchemaPart::Hole(hole));
                }
                Some(c) => {
                    literal.push(c);
                    self.cur.advance();
                }
            }
        }
        if !literal.is_empty() || parts.is_empty() {
            parts.push(SchemaPart::Literal(literal));
        }
        let span = self.cur.span_to(start);
        if parts.len() == 1 {
            if let SchemaPart::Literal(s) = &parts[0] {
                return Ok(self
                    .ast
                    .alloc_expr(Expr::StringQuoted { value: s.clone(), quote }, span));
            }
        }
        Ok(self.ast.alloc_expr(Expr::QuotedSchema { parts, quote }, span))
    }

    fn try_parse_hex_color(&mut self, start: usize) -> Result<Option<ExprId>, ParseError> {
        let save = self.cur;
        self.cur.advance(); // '#'
        let digits = self
            .cur
            .take_while(|c| c.is_ascii_hexdigit())
            .to_string();
        let trailing_ident = self.cur.current().map(is_ident_continue).unwrap_or(false);
        if trailing_ident || !matches!(digits.len(), 3 | 4 | 6 | 8) {
            self.cur = save;
            return Ok(None);
        }
        let expand = |c: char| -> u8 {
            let v = c.to_digit(16).unwrap_or(0) as u8;
            v * 16 + v
        };
        let hx = |s: &str| u8::from_str_radix(s, 16).unwrap_or(0);
        let (r, g, b, a) = match digits.len() {
            3 => {
                let cs: Vec<char> = digits.chars().collect();
                (expand(cs[0]) as f64, expand(cs[1]) as f64, expand(cs[2]) as f64, 1.0)
            }
            4 => {
                let cs: Vec<char> = digits.chars().collect();
                (
                    expand(cs[0]) as f64,
                    expand(cs[1]) as f64,
                    expand(cs[2]) as f64,
                    expand(cs[3]) as f64 / 255.0,
                )
            }
            6 => (
                hx(&digits[0..2]) as f64,
                hx(&digits[2..4]) as f64,
                hx(&digits[4..6]) as f64,
                1.0,
            ),
            8 => (
                hx(&digits[0..2]) as f64,
                hx(&digits[2..4]) as f64,
                hx(&digits[4..6]) as f64,
                hx(&digits[6..8]) as f64 / 255.0,
            ),
            _ => unreachable!(),
        };
        let span = self.cur.span_to(start);
        Ok(Some(self.ast.alloc_expr(
            Expr::Color { r, g, b, a, display_name: None },
            span,
        )))
    }

    fn parse_number(&mut self) -> Result<ExprId, ParseError> {
        let start = self.cur.pos;
        self.cur.take_while(is_digit);
        if self.cur.current() == Some('.') && self.cur.peek_at(1).map(is_digit).unwrap_or(false) {
            self.cur.advance();
            self.cur.take_while(is_digit);
        }
        if matches!(self.cur.current(), Some('e') | Some('E')) {
            let save = self.cur;
            self.cur.advance();
            if matches!(self.cur.current(), Some('+') | Some('-')) {
                self.cur.advance();
            }
            if self.cur.current().map(is_digit).unwrap_or(false) {
                self.cur.take_while(is_digit);
            } else {
                self.cur = save;
            }
        }
        let text = &self.cur.src[start..self.cur.pos];
        let value: f64 = text
            .parse()
            .map_err(|_| ParseError::InvalidNumber { span: self.cur.span_to(start), text: text.to_string() })?;
        let numer_units = if self.cur.current() == Some('%') {
            self.cur.advance();
            vec!["%".to_string()]
        } else if self.cur.current().map(is_ident_start).unwrap_or(false) {
            vec![self.cur.take_while(is_ident_continue).to_string()]
        } else {
            Vec::new()
        };
        let span = self.cur.span_to(start);
        Ok(self
            .ast
            .alloc_expr(Expr::Number { value, numer_units, denom_units: Vec::new() }, span))
    }

    fn parse_bare_token_or_call(&mut self) -> Result<ExprId, ParseError> {
        let start = self.cur.pos;
        let mut parts = Vec::new();
        let mut literal = String::new();
        loop {
            match self.cur.current() {
                Some('#') if self.cur.peek_at(1) == Some('{') => {
                    if !literal.is_empty() {
                        parts.push(SchemaPart::Literal(std::mem::take(&mut literal)));
                    }
                    self.cur.advance();
                    self.cur.advance();
                    self.cur.skip_css();
                    let hole = self.parse_value_list()?;
                    self.cur.skip_css();
                    self.expect_char('}')?;
                    parts.push(SchemaPart::Hole(hole));
                }
                Some(c) if is_ident_continue(c) => {
                    literal.push(c);
                    self.cur.advance();
                }
                _ => break,
            }
        }
        if !literal.is_empty() || parts.is_empty() {
            parts.push(SchemaPart::Literal(literal.clone()));
        }
        let span = self.cur.span_to(start);
        if parts.len() == 1 {
            if let SchemaPart::Literal(name) = parts.into_iter().next().unwrap() {
                if name == "url" && self.cur.current() == Some('(') {
                    return self.parse_url_call(start, name);
                }
                if self.cur.current() == Some('(') {
                    let arguments = self.parse_args()?;
                    let span = self.cur.span_to(start);
                    return Ok(self.ast.alloc_expr(
                        Expr::FunctionCall { name: FnNameRef::Static(name), arguments },
                        span,
                    ));
                }
                return Ok(match name.as_str() {
                    "true" => self.ast.alloc_expr(Expr::Boolean(true), span),
                    "false" => self.ast.alloc_expr(Expr::Boolean(false), span),
                    "null" => self.ast.alloc_expr(Expr::Null, span),
                    _ => self.ast.alloc_expr(Expr::StringConstant(name), span),
                });
            }
            unreachable!()
        }
        if self.cur.current() == Some('(') {
            let arguments = self.parse_args()?;
            let span = self.cur.span_to(start);
            return Ok(self
                .ast
                .alloc_expr(Expr::FunctionCall { name: FnNameRef::Schema(parts), arguments }, span));
        }
        Ok(self.ast.alloc_expr(Expr::StringSchema { parts }, span))
    }

    /// `url(...)` permits unquoted content (slashes, colons, dots) that the
    /// ordinary value grammar would otherwise split apart; a quoted
    /// argument is parsed normally (so interpolation still works inside it).
    fn parse_url_call(&mut self, start: usize, name: String) -> Result<ExprId, ParseError> {
        let save = self.cur;
        self.cur.advance(); // '('
        self.cur.skip_css();
        if matches!(self.cur.current(), Some('"') | Some('\'')) {
            let inner = self.parse_or_expr()?;
            self.cur.skip_css();
            self.expect_char(')')?;
            let span = self.cur.span_to(start);
            let args = Args { positional: vec![inner], named: Vec::new(), rest: None };
            return Ok(self
                .ast
                .alloc_expr(Expr::FunctionCall { name: FnNameRef::Static(name), arguments: args }, span));
        }
        self.cur = save;
        self.cur.advance();
        let content_start = self.cur.pos;
        let end = self
            .cur
            .scan_balanced('(', ')')
            .map_err(|e| self.from_lex(e))?;
        let raw = self.cur.src[content_start..end - 1].trim().to_string();
        let inner_span = self.cur.span_to(content_start);
        let inner = self.ast.alloc_expr(Expr::StringConstant(raw), inner_span);
        let span = self.cur.span_to(start);
        let args = Args { positional: vec![inner], named: Vec::new(), rest: None };
        Ok(self
            .ast
            .alloc_expr(Expr::FunctionCall { name: FnNameRef::Static(name), arguments: args }, span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::{Expr, Stmt};

    fn parse_src(src: &str) -> (Ast, StmtId) {
        parse(src, PathId(0)).expect("parse should succeed")
    }

    fn root_statements<'a>(ast: &'a Ast, root: StmtId) -> &'a [StmtId] {
        match &ast.stmt(root).kind {
            Stmt::Block { statements, .. } => statements,
            _ => panic!("expected root block"),
        }
    }

    #[test]
    fn parses_simple_ruleset() {
        let (ast, root) = parse_src(".a { color: red; }");
        let stmts = root_statements(&ast, root);
        assert_eq!(stmts.len(), 1);
        assert!(matches!(ast.stmt(stmts[0]).kind, Stmt::Ruleset { .. }));
    }

    #[test]
    fn parses_nested_ruleset_and_declaration_without_semicolon() {
        let (ast, root) = parse_src(".a { .b { width: 1px } }");
        let stmts = root_statements(&ast, root);
        let outer = match &ast.stmt(stmts[0]).kind {
            Stmt::Ruleset { block, .. } => *block,
            _ => panic!("expected ruleset"),
        };
        let inner_stmts = root_statements(&ast, outer);
        assert_eq!(inner_stmts.len(), 1);
        assert!(matches!(ast.stmt(inner_stmts[0]).kind, Stmt::Ruleset { .. }));
    }

    #[test]
    fn distinguishes_propset_from_ruleset() {
        let (ast, root) = parse_src("a { font: { weight: bold; size: 10px; } }");
        let stmts = root_statements(&ast, root);
        let block = match &ast.stmt(stmts[0]).kind {
            Stmt::Ruleset { block, .. } => *block,
            _ => panic!("expected ruleset"),
        };
        let inner = root_statements(&ast, block);
        assert!(matches!(ast.stmt(inner[0]).kind, Stmt::Propset { .. }));
    }

    #[test]
    fn parses_variable_assignment_with_default() {
        let (ast, root) = parse_src("$x: 10px !default;");
        let stmts = root_statements(&ast, root);
        match &ast.stmt(stmts[0]).kind {
            Stmt::Assignment { name, is_default, is_global, .. } => {
                assert_eq!(name, "x");
                assert!(is_default);
                assert!(!is_global);
            }
            _ => panic!("expected assignment"),
        }
    }

    #[test]
    fn bare_slash_stays_literal_outside_arithmetic_context() {
        let (ast, root) = parse_src("a { font: 12px/1.5; }");
        let stmts = root_statements(&ast, root);
        let decl_block = match &ast.stmt(stmts[0]).kind {
            Stmt::Ruleset { block, .. } => *block,
            _ => panic!(),
        };
        let decls = root_statements(&ast, decl_block);
        match &ast.stmt(decls[0]).kind {
            Stmt::Declaration { value, .. } => {
                assert!(matches!(ast.expr(*value).kind, Expr::Slash { .. }));
            }
            _ => panic!("expected declaration"),
        }
    }

    #[test]
    fn parenthesized_slash_becomes_division() {
        let (ast, root) = parse_src("a { width: (1/2); }");
        let stmts = root_statements(&ast, root);
        let decl_block = match &ast.stmt(stmts[0]).kind {
            Stmt::Ruleset { block, .. } => *block,
            _ => panic!(),
        };
        let decls = root_statements(&ast, decl_block);
        match &ast.stmt(decls[0]).kind {
            Stmt::Declaration { value, .. } => {
                assert!(matches!(
                    ast.expr(*value).kind,
                    Expr::Binary { op: BinOp::Div, .. }
                ));
            }
            _ => panic!("expected declaration"),
        }
    }

    #[test]
    fn variable_operand_forces_division() {
        let (ast, root) = parse_src("a { width: $x/2; }");
        let stmts = root_statements(&ast, root);
        let decl_block = match &ast.stmt(stmts[0]).kind {
            Stmt::Ruleset { block, .. } => *block,
            _ => panic!(),
        };
        let decls = root_statements(&ast, decl_block);
        match &ast.stmt(decls[0]).kind {
            Stmt::Declaration { value, .. } => {
                assert!(matches!(
                    ast.expr(*value).kind,
                    Expr::Binary { op: BinOp::Div, .. }
                ));
            }
            _ => panic!("expected declaration"),
        }
    }

    #[test]
    fn parses_interpolated_selector_as_schema() {
        let (ast, root) = parse_src(".icon-#{$name} { color: red; }");
        let stmts = root_statements(&ast, root);
        match &ast.stmt(stmts[0]).kind {
            Stmt::Ruleset { selector, .. } => {
                assert!(matches!(
                    ast.selector(*selector).kind,
                    SelectorKind::Schema { .. }
                ));
            }
            _ => panic!("expected ruleset"),
        }
    }

    #[test]
    fn parses_not_pseudo_as_wrapped_selector_list() {
        let (ast, root) = parse_src("a:not(.b, .c) { color: red; }");
        let stmts = root_statements(&ast, root);
        match &ast.stmt(stmts[0]).kind {
            Stmt::Ruleset { selector, .. } => match &ast.selector(*selector).kind {
                SelectorKind::List { complexes, .. } => {
                    let complex = ast.selector(complexes[0]);
                    let compound = match &complex.kind {
                        SelectorKind::Complex { head, .. } => head.unwrap(),
                        _ => panic!(),
                    };
                    let simples = match &ast.selector(compound).kind {
                        SelectorKind::Compound { simples, .. } => simples,
                        _ => panic!(),
                    };
                    assert!(simples
                        .iter()
                        .any(|s| matches!(ast.selector(*s).kind, SelectorKind::Wrapped { .. })));
                }
                _ => panic!("expected list"),
            },
            _ => panic!("expected ruleset"),
        }
    }

    #[test]
    fn parses_mixin_call_with_named_and_rest_args() {
        let (ast, root) = parse_src("a { @include m($x: 1, $rest...); }");
        let stmts = root_statements(&ast, root);
        let block = match &ast.stmt(stmts[0]).kind {
            Stmt::Ruleset { block, .. } => *block,
            _ => panic!(),
        };
        let inner = root_statements(&ast, block);
        match &ast.stmt(inner[0]).kind {
            Stmt::MixinCall { arguments, .. } => {
                assert_eq!(arguments.named.len(), 1);
                assert!(arguments.rest.is_some());
            }
            _ => panic!("expected mixin call"),
        }
    }

    #[test]
    fn parses_if_else_chain() {
        let (ast, root) = parse_src("@if $a { x: 1; } @else if $b { x: 2; } @else { x: 3; }");
        let stmts = root_statements(&ast, root);
        match &ast.stmt(stmts[0]).kind {
            Stmt::If { alternative, .. } => {
                let alt = alternative.expect("expected @else if branch");
                assert!(matches!(ast.stmt(alt).kind, Stmt::If { .. }));
            }
            _ => panic!("expected if statement"),
        }
    }

    #[test]
    fn parses_map_literal() {
        let (ast, root) = parse_src("$m: (a: 1, b: 2);");
        let stmts = root_statements(&ast, root);
        match &ast.stmt(stmts[0]).kind {
            Stmt::Assignment { value, .. } => {
                assert!(matches!(ast.expr(*value).kind, Expr::Map { .. }));
            }
            _ => panic!("expected assignment"),
        }
    }
}
