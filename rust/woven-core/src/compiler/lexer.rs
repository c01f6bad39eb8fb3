//! Lexer primitives: pure combinators over a cursor into one source buffer.
//!
//! These never look past the buffer they were given and never backtrack on
//! their own; the parser owns save/restore of cursor positions. Combinators
//! come in a *raw* form (no skipping) and a *css* form (skips insignificant
//! whitespace and block comments first).

use thiserror::Error;

use super::source::{PathId, Span};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LexError {
    #[error("unterminated string starting at byte {start}")]
    UnterminatedString { start: usize },
    #[error("unterminated comment starting at byte {start}")]
    UnterminatedComment { start: usize },
    #[error("unbalanced '{open}' starting at byte {start}: no matching '{close}'")]
    UnbalancedScope { open: char, close: char, start: usize },
    #[error("invalid escape sequence at byte {at}")]
    InvalidEscape { at: usize },
}

/// A cursor into one source buffer. Byte-offset based; spans are derived
/// directly from byte positions — line/column are resolved lazily by the
/// source store, not tracked here.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    pub src: &'a str,
    pub pos: usize,
    path: PathId,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str, path: PathId) -> Self {
        Self { src, pos: 0, path }
    }

    pub fn at(src: &'a str, path: PathId, pos: usize) -> Self {
        Self { src, pos, path }
    }

    pub fn path(&self) -> PathId {
        self.path
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub fn current(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn peek_at(&self, offset: usize) -> Option<char> {
        self.rest().chars().nth(offset)
    }

    pub fn span_to(&self, start: usize) -> Span {
        Span::new(self.path, start as u32, self.pos as u32)
    }

    pub fn span_point(&self) -> Span {
        Span::new(self.path, self.pos as u32, self.pos as u32)
    }

    pub fn advance(&mut self) -> Option<char> {
        let ch = self.current()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    pub fn advance_n(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    /// Exact literal match (case-sensitive). Advances on success.
    pub fn literal(&mut self, lit: &str) -> bool {
        if self.rest().starts_with(lit) {
            self.pos += lit.len();
            true
        } else {
            false
        }
    }

    /// Case-insensitive ASCII keyword match, only if not followed by an
    /// identifier continuation character (so `@iffoo` isn't `@if` + `foo`).
    pub fn keyword(&mut self, kw: &str) -> bool {
        let rest = self.rest();
        if rest.len() < kw.len() || !rest.as_bytes()[..kw.len()].eq_ignore_ascii_case(kw.as_bytes())
        {
            return false;
        }
        let after = rest[kw.len()..].chars().next();
        if after.map(is_ident_continue).unwrap_or(false) {
            return false;
        }
        self.pos += kw.len();
        true
    }

    /// Consume while `pred` holds; returns the consumed slice.
    pub fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.current() {
            if !pred(c) {
                break;
            }
            self.advance();
        }
        &self.src[start..self.pos]
    }

    /// Raw whitespace skip: spaces, tabs, newlines. No comments.
    pub fn skip_raw_whitespace(&mut self) {
        self.take_while(|c| c.is_whitespace());
    }

    /// CSS-significant skip: whitespace and `/* ... */` comments, repeated
    /// until neither matches. Never touches `//` line comments — those are a
    /// source-language surface confined to outside string/url content by
    /// the caller, not a lexer-primitive concern.
    pub fn skip_css(&mut self) {
        loop {
            let before = self.pos;
            self.skip_raw_whitespace();
            let _ = self.skip_block_comment();
            if self.pos == before {
                break;
            }
        }
    }

    /// Skip a single `// ...` line comment if present. Returns whether one was skipped.
    pub fn skip_line_comment(&mut self) -> bool {
        if self.literal("//") {
            self.take_while(|c| c != '\n');
            true
        } else {
            false
        }
    }

    /// Skip a single `/* ... */` comment if present, returning its text
    /// (without delimiters). Unterminated comments are consumed to EOF
    /// rather than treated as an error here; callers that must reject
    /// malformed input use [`Cursor::scan_block_comment`] instead.
    pub fn skip_block_comment(&mut self) -> Option<&'a str> {
        if !self.literal("/*") {
            return None;
        }
        let body_start = self.pos;
        loop {
            if self.literal("*/") {
                return Some(&self.src[body_start..self.pos - 2]);
            }
            if self.advance().is_none() {
                return Some(&self.src[body_start..self.pos]);
            }
        }
    }

    /// Like [`Cursor::skip_block_comment`], but returns an error on an unterminated comment.
    pub fn scan_block_comment(&mut self) -> Result<Option<&'a str>, LexError> {
        let start = self.pos;
        if !self.literal("/*") {
            return Ok(None);
        }
        let body_start = self.pos;
        loop {
            if self.literal("*/") {
                return Ok(Some(&self.src[body_start..self.pos - 2]));
            }
            if self.advance().is_none() {
                return Err(LexError::UnterminatedComment { start });
            }
        }
    }

    /// Scan a `"..."` or `'...'` string, honoring backslash escapes. Returns
    /// the unescaped contents and the quote character used.
    pub fn scan_quoted_string(&mut self) -> Result<(String, char), LexError> {
        let start = self.pos;
        let quote = match self.current() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(LexError::UnterminatedString { start }),
        };
        self.advance();
        let mut out = String::new();
        loop {
            match self.current() {
                None => return Err(LexError::UnterminatedString { start }),
                Some(c) if c == quote => {
                    self.advance();
                    return Ok((out, quote));
                }
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        None => return Err(LexError::InvalidEscape { at: self.pos }),
                        Some('n') => out.push('\n'),
                        Some('t') => out.push('\t'),
                        Some(other) => out.push(other),
                    }
                }
                Some('\n') => return Err(LexError::UnterminatedString { start }),
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
            }
        }
    }

    /// Balanced-scope skip: the cursor sits just after an already-consumed
    /// `open`. Advance past a region that may contain nested occurrences of
    /// `open`/`close`, without interpreting its contents (no special
    /// handling of strings or comments inside — callers needing that parse
    /// the grabbed span separately). Returns the byte offset just after the
    /// matching `close`.
    pub fn scan_balanced(&mut self, open: char, close: char) -> Result<usize, LexError> {
        let start = self.pos;
        let mut depth = 1usize;
        while depth > 0 {
            match self.advance() {
                None => return Err(LexError::UnbalancedScope { open, close, start }),
                Some(c) if c == open && open != close => depth += 1,
                Some(c) if c == close => depth -= 1,
                _ => {}
            }
        }
        Ok(self.pos)
    }
}

pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '-' || !c.is_ascii()
}

pub fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

pub fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cur(src: &str) -> Cursor<'_> {
        Cursor::new(src, PathId(0))
    }

    #[test]
    fn keyword_requires_word_boundary() {
        let mut c = cur("iffoo");
        assert!(!c.keyword("if"));
        let mut c2 = cur("if(");
        assert!(c2.keyword("if"));
    }

    #[test]
    fn scan_balanced_handles_nesting() {
        let mut c = cur("{a {b} c} rest");
        c.advance(); // consume the leading '{'
        let end = c.scan_balanced('{', '}').unwrap();
        assert_eq!(&c.src[..end], "{a {b} c}");
    }

    #[test]
    fn scan_quoted_string_handles_escapes() {
        let mut c = cur(r#""a\"b" rest"#);
        let (s, q) = c.scan_quoted_string().unwrap();
        assert_eq!(s, "a\"b");
        assert_eq!(q, '"');
    }

    #[test]
    fn unterminated_string_errors() {
        let mut c = cur("\"abc");
        assert!(c.scan_quoted_string().is_err());
    }
}
