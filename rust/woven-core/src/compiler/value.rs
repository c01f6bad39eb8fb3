//! The runtime value representation produced by evaluation and passed to
//! native functions. Distinct from [`super::ast::Expr`]: `Expr` is what the
//! parser produced (still containing variables, calls, schemas); `Value` is
//! what evaluating an `Expr` in an [`super::env::Environment`] yields.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::source::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListSeparator {
    Comma,
    Space,
}

/// A number together with the numerator/denominator unit multisets it
/// carries. `10px`, `1in`, and unitless `3` are all `Number`s; `5px/2s`
/// (not expressible in source, only as an intermediate of division) would
/// carry `numer = [px]`, `denom = [s]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Number {
    pub value: f64,
    pub numer_units: Vec<String>,
    pub denom_units: Vec<String>,
}

impl Number {
    pub fn unitless(value: f64) -> Self {
        Self { value, numer_units: Vec::new(), denom_units: Vec::new() }
    }

    pub fn with_unit(value: f64, unit: impl Into<String>) -> Self {
        Self { value, numer_units: vec![unit.into()], denom_units: Vec::new() }
    }

    pub fn is_unitless(&self) -> bool {
        self.numer_units.is_empty() && self.denom_units.is_empty()
    }

    /// A single simple unit, e.g. `"px"`, if this number has exactly one
    /// numerator unit and no denominator units.
    pub fn single_unit(&self) -> Option<&str> {
        if self.numer_units.len() == 1 && self.denom_units.is_empty() {
            Some(&self.numer_units[0])
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
    /// The CSS keyword this color was parsed/produced from, if any
    /// (`red`, `transparent`); printed verbatim instead of as `rgb(...)`
    /// when still present and no channel has been altered.
    pub display_name: Option<String>,
}

impl Color {
    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0, display_name: None }
    }

    pub fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a, display_name: None }
    }

    pub fn clamp_channels(&self) -> Self {
        Self {
            r: self.r.clamp(0.0, 255.0),
            g: self.g.clamp(0.0, 255.0),
            b: self.b.clamp(0.0, 255.0),
            a: self.a.clamp(0.0, 1.0),
            display_name: self.display_name.clone(),
        }
    }
}

/// A tagged runtime value, as described by the host/native function ABI:
/// every value a stylesheet expression can evaluate to, plus the two
/// special `Error`/`Warning` wrappers a built-in can return to abort
/// evaluation or emit a diagnostic without throwing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(Number),
    Color(Color),
    /// `quoted` distinguishes `"red"` (a string) from `red` (an unquoted
    /// identifier-like token) — both print differently and compare unequal.
    String { text: String, quoted: bool },
    List { separator: ListSeparator, items: Vec<Value>, has_brackets: bool },
    Map(Vec<(Value, Value)>),
    /// A function reference produced by `get-function()`, opaque to
    /// everything except `call()`.
    FunctionRef(String),
    /// Raised by a built-in to abort the current evaluation with an
    /// `@error`-equivalent diagnostic.
    Error { message: String, span: Span },
    /// Raised by a built-in to emit a `@warn`-equivalent diagnostic without
    /// aborting; the evaluator logs it and continues with `Value::Null`.
    Warning { message: String, span: Span },
}

impl Value {
    pub fn unquoted(text: impl Into<String>) -> Self {
        Value::String { text: text.into(), quoted: false }
    }

    pub fn quoted(text: impl Into<String>) -> Self {
        Value::String { text: text.into(), quoted: true }
    }

    pub fn number(value: f64) -> Self {
        Value::Number(Number::unitless(value))
    }

    /// The CSS/Sass notion of truthiness: everything is truthy except
    /// `null` and `false`.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Boolean(false))
    }

    /// The name `type-of()` reports for this value's kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "bool",
            Value::Number(_) => "number",
            Value::Color(_) => "color",
            Value::String { .. } => "string",
            Value::List { .. } => "list",
            Value::Map(_) => "map",
            Value::FunctionRef(_) => "function",
            Value::Error { .. } => "error",
            Value::Warning { .. } => "warning",
        }
    }

    /// Flattens a bare scalar into a one-element space list, the
    /// normalization `nth()`/`length()`/`@each` rely on so every value can
    /// be treated as a list.
    pub fn as_list_items(&self) -> Vec<Value> {
        match self {
            Value::List { items, .. } => items.clone(),
            Value::Null => Vec::new(),
            other => vec![other.clone()],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", format_number(n)),
            Value::Color(c) => write!(f, "{}", format_color(c)),
            Value::String { text, quoted } => {
                if *quoted {
                    write!(f, "\"{}\"", text.replace('"', "\\\""))
                } else {
                    write!(f, "{text}")
                }
            }
            Value::List { separator, items, has_brackets } => {
                let sep = match separator {
                    ListSeparator::Comma => ", ",
                    ListSeparator::Space => " ",
                };
                let body = items.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(sep);
                if *has_brackets {
                    write!(f, "[{body}]")
                } else {
                    write!(f, "{body}")
                }
            }
            Value::Map(pairs) => {
                let body = pairs
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "({body})")
            }
            Value::FunctionRef(name) => write!(f, "get-function(\"{name}\")"),
            Value::Error { message, .. } => write!(f, "Error: {message}"),
            Value::Warning { message, .. } => write!(f, "Warning: {message}"),
        }
    }
}

pub fn format_number(n: &Number) -> String {
    let mut s = format_f64(n.value);
    for u in &n.numer_units {
        s.push_str(u);
    }
    if !n.denom_units.is_empty() {
        s.push('/');
        s.push_str(&n.denom_units.join("/"));
    }
    s
}

/// Trims trailing zeroes the way CSS output expects (`1.50` -> `1.5`,
/// `2.0` -> `2`), at the caller's configured decimal precision.
pub fn format_f64(value: f64) -> String {
    format_f64_precision(value, 10)
}

pub fn format_f64_precision(value: f64, precision: usize) -> String {
    if value == value.trunc() && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let formatted = format!("{:.*}", precision, value);
    let trimmed = formatted.trim_end_matches('0');
    let trimmed = trimmed.trim_end_matches('.');
    trimmed.to_string()
}

fn format_color(c: &Color) -> String {
    if let Some(name) = &c.display_name {
        return name.clone();
    }
    let clamped = c.clamp_channels();
    let (r, g, b) = (clamped.r.round() as u8, clamped.g.round() as u8, clamped.b.round() as u8);
    if clamped.a >= 1.0 {
        format!("#{r:02x}{g:02x}{b:02x}")
    } else {
        format!("rgba({r}, {g}, {b}, {})", format_f64_precision(clamped.a, 4))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_matches_sass_rules() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Boolean(true).is_truthy());
        assert!(Value::number(0.0).is_truthy());
        assert!(Value::quoted("").is_truthy());
    }

    #[test]
    fn number_formatting_trims_trailing_zeroes() {
        assert_eq!(format_f64(1.5), "1.5");
        assert_eq!(format_f64(2.0), "2");
        assert_eq!(format_f64(0.1 + 0.2), "0.3");
    }

    #[test]
    fn color_without_name_prints_hex_when_opaque() {
        let c = Color::rgb(255.0, 0.0, 0.0);
        assert_eq!(format_color(&c), "#ff0000");
    }

    #[test]
    fn named_color_prints_its_keyword() {
        let mut c = Color::rgb(255.0, 0.0, 0.0);
        c.display_name = Some("red".to_string());
        assert_eq!(format_color(&c), "red");
    }
}
