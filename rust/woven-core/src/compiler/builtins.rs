//! The standard native-function library: the same `Value` ABI a
//! host-registered function would use, just registered ahead of time
//! instead of supplied by the embedder. Grounded on libsass's
//! `fn_utils.cpp`/`fn_selectors.cpp`, which ship an equivalent standard
//! set in the engine's own native-function calling convention.

use std::collections::HashMap;

use super::color;
use super::eval::EvalError;
use super::numeric;
use super::source::Span;
use super::value::{Color, ListSeparator, Number, Value};

type Args = [Value];
type Named = HashMap<String, Value>;

/// Dispatches `name` to a built-in, if one exists. `Ok(None)` means the
/// name isn't a built-in at all (the caller falls back to treating the
/// call as passthrough CSS text).
pub fn call(name: &str, positional: &Args, named: &Named, span: Span) -> Result<Option<Value>, EvalError> {
    let v = match name {
        "percentage" => Some(number_fn(positional, named, "number", span, |n| Value::Number(Number::unitless(n * 100.0)))?),
        "round" => Some(number_fn(positional, named, "number", span, |n| Value::number(n.round()))?),
        "floor" => Some(number_fn(positional, named, "number", span, |n| Value::number(n.floor()))?),
        "ceil" => Some(number_fn(positional, named, "number", span, |n| Value::number(n.ceil()))?),
        "abs" => Some(unit_preserving_number_fn(positional, named, "number", span, f64::abs)?),
        "min" => Some(fold_numbers(positional, span, f64::min)?),
        "max" => Some(fold_numbers(positional, span, f64::max)?),

        "red" => Some(channel(positional, named, span, |c| c.r)?),
        "green" => Some(channel(positional, named, span, |c| c.g)?),
        "blue" => Some(channel(positional, named, span, |c| c.b)?),
        "alpha" | "opacity" => Some(Value::number(color_arg(positional, named, "color", span)?.a)),
        "mix" => Some(mix(positional, named, span)?),
        "lighten" => Some(color_amount(positional, named, span, color::lighten)?),
        "darken" => Some(color_amount(positional, named, span, color::darken)?),
        "saturate" => Some(color_amount(positional, named, span, color::saturate)?),
        "desaturate" => Some(color_amount(positional, named, span, color::desaturate)?),
        "adjust-hue" => Some(color_amount(positional, named, span, color::adjust_hue)?),
        "grayscale" => Some(Value::Color(color::grayscale(&color_arg(positional, named, "color", span)?))),
        "invert" => {
            let c = color_arg(positional, named, "color", span)?;
            let weight = optional_number(positional, named, 1, "weight", 100.0)?;
            Some(Value::Color(color::invert(&c, weight)))
        }
        "rgba" | "rgb" => Some(rgba(positional, named, span)?),

        "unquote" => Some(Value::unquoted(string_arg(positional, named, "string", span)?)),
        "quote" => Some(Value::quoted(string_arg(positional, named, "string", span)?)),
        "str-length" => Some(Value::number(string_arg(positional, named, "string", span)?.chars().count() as f64)),
        "to-upper-case" => Some(Value::quoted(string_arg(positional, named, "string", span)?.to_uppercase())),
        "to-lower-case" => Some(Value::quoted(string_arg(positional, named, "string", span)?.to_lowercase())),

        "length" => Some(Value::number(list_arg(positional, named, "list", span)?.len() as f64)),
        "nth" => Some(nth(positional, named, span)?),
        "join" => Some(join(positional, named, span)?),
        "append" => Some(append(positional, named, span)?),
        "index" => Some(index_of(positional, named, span)?),

        "map-get" => Some(map_get(positional, named, span)?),
        "map-has-key" => Some(Value::Boolean(map_get(positional, named, span)?.is_some())),
        "map-merge" => Some(map_merge(positional, named, span)?),
        "map-keys" => Some(map_keys(positional, named, span)?),
        "map-values" => Some(map_values(positional, named, span)?),

        "type-of" => Some(Value::unquoted(any_arg(positional, named, "value", span)?.type_name())),
        "unit" => Some(Value::quoted(unit_string(&number_arg(positional, named, "number", span)?))),
        "unitless" => Some(Value::Boolean(number_arg(positional, named, "number", span)?.is_unitless())),
        "comparable" => {
            let a = number_arg_at(positional, named, 0, "number1", span)?;
            let b = number_arg_at(positional, named, 1, "number2", span)?;
            Some(Value::Boolean(numeric::comparable(&a, &b)))
        }
        "if" => Some(if_fn(positional, named, span)?),
        _ => None,
    };
    Ok(v)
}

fn arg_at<'a>(positional: &'a Args, named: &'a Named, index: usize, key: &str) -> Option<&'a Value> {
    positional.get(index).or_else(|| named.get(key))
}

fn require<'a>(positional: &'a Args, named: &'a Named, index: usize, key: &str, span: Span) -> Result<&'a Value, EvalError> {
    arg_at(positional, named, index, key).ok_or_else(|| EvalError::Arity { span, message: format!("missing argument ${key}") })
}

fn any_arg(positional: &Args, named: &Named, key: &str, span: Span) -> Result<Value, EvalError> {
    Ok(require(positional, named, 0, key, span)?.clone())
}

fn number_arg_at(positional: &Args, named: &Named, index: usize, key: &str, span: Span) -> Result<Number, EvalError> {
    match require(positional, named, index, key, span)? {
        Value::Number(n) => Ok(n.clone()),
        other => Err(EvalError::Type { span, message: format!("${key}: expected a number, got {}", other.type_name()) }),
    }
}

fn number_arg(positional: &Args, named: &Named, key: &str, span: Span) -> Result<Number, EvalError> {
    number_arg_at(positional, named, 0, key, span)
}

fn optional_number(positional: &Args, named: &Named, index: usize, key: &str, default: f64) -> Result<f64, EvalError> {
    match arg_at(positional, named, index, key) {
        Some(Value::Number(n)) => Ok(n.value),
        _ => Ok(default),
    }
}

fn color_arg(positional: &Args, named: &Named, key: &str, span: Span) -> Result<Color, EvalError> {
    match require(positional, named, 0, key, span)? {
        Value::Color(c) => Ok(c.clone()),
        other => Err(EvalError::Type { span, message: format!("${key}: expected a color, got {}", other.type_name()) }),
    }
}

fn string_arg(positional: &Args, named: &Named, key: &str, span: Span) -> Result<String, EvalError> {
    match require(positional, named, 0, key, span)? {
        Value::String { text, .. } => Ok(text.clone()),
        other => Err(EvalError::Type { span, message: format!("${key}: expected a string, got {}", other.type_name()) }),
    }
}

fn list_arg(positional: &Args, named: &Named, key: &str, span: Span) -> Result<Vec<Value>, EvalError> {
    Ok(require(positional, named, 0, key, span)?.as_list_items())
}

fn number_fn(
    positional: &Args,
    named: &Named,
    key: &str,
    span: Span,
    f: impl Fn(f64) -> Value,
) -> Result<Value, EvalError> {
    let n = number_arg(positional, named, key, span)?;
    Ok(f(n.value))
}

fn unit_preserving_number_fn(
    positional: &Args,
    named: &Named,
    key: &str,
    span: Span,
    f: impl Fn(f64) -> f64,
) -> Result<Value, EvalError> {
    let n = number_arg(positional, named, key, span)?;
    Ok(Value::Number(Number { value: f(n.value), numer_units: n.numer_units, denom_units: n.denom_units }))
}

fn fold_numbers(positional: &Args, span: Span) -> Result<Value, EvalError> {
    if positional.is_empty() {
        return Err(EvalError::Arity { span, message: "expected at least one number".to_string() });
    }
    let mut acc: Option<Number> = None;
    for v in positional {
        let n = match v {
            Value::Number(n) => n.clone(),
            other => return Err(EvalError::Type { span, message: format!("expected a number, got {}", other.type_name()) }),
        };
        acc = Some(match acc {
            None => n,
            Some(a) => {
                if !numeric::comparable(&a, &n) {
                    return Err(EvalError::Unit { span, message: "incompatible units passed to min/max".to_string() });
                }
                a
            }
        });
    }
    Ok(Value::Number(acc.unwrap()))
}

fn channel(positional: &Args, named: &Named, span: Span, f: impl Fn(&Color) -> f64) -> Result<Value, EvalError> {
    let c = color_arg(positional, named, "color", span)?;
    Ok(Value::number(f(&c).round()))
}

fn color_amount(positional: &Args, named: &Named, span: Span, f: impl Fn(&Color, f64) -> Color) -> Result<Value, EvalError> {
    let c = color_arg(positional, named, "color", span)?;
    let amount = number_arg_at(positional, named, 1, "amount", span)?;
    Ok(Value::Color(f(&c, amount.value)))
}

fn mix(positional: &Args, named: &Named, span: Span) -> Result<Value, EvalError> {
    let a = color_arg(positional, named, "color1", span)?;
    let b = match require(positional, named, 1, "color2", span)? {
        Value::Color(c) => c.clone(),
        other => return Err(EvalError::Type { span, message: format!("$color2: expected a color, got {}", other.type_name()) }),
    };
    let weight = optional_number(positional, named, 2, "weight", 50.0)?;
    Ok(Value::Color(color::mix(&a, &b, weight)))
}

fn rgba(positional: &Args, named: &Named, span: Span) -> Result<Value, EvalError> {
    if let Some(Value::Color(c)) = arg_at(positional, named, 0, "color") {
        let alpha = optional_number(positional, named, 1, "alpha", c.a);
        return Ok(Value::Color(Color { a: alpha?, display_name: None, ..c.clone() }));
    }
    let r = number_arg_at(positional, named, 0, "red", span)?.value;
    let g = number_arg_at(positional, named, 1, "green", span)?.value;
    let b = number_arg_at(positional, named, 2, "blue", span)?.value;
    let a = optional_number(positional, named, 3, "alpha", 1.0)?;
    Ok(Value::Color(Color::rgba(r, g, b, a)))
}

fn nth(positional: &Args, named: &Named, span: Span) -> Result<Value, EvalError> {
    let items = list_arg(positional, named, "list", span)?;
    let n = number_arg_at(positional, named, 1, "n", span)?.value as i64;
    let len = items.len() as i64;
    if len == 0 {
        return Err(EvalError::Type { span, message: "nth() called on an empty list".to_string() });
    }
    let idx = if n > 0 { n - 1 } else { len + n };
    items
        .get(idx as usize)
        .cloned()
        .ok_or_else(|| EvalError::Type { span, message: format!("index {n} out of bounds for a list of length {len}") })
}

fn join(positional: &Args, named: &Named, span: Span) -> Result<Value, EvalError> {
    let mut a = list_arg(positional, named, "list1", span)?;
    let b = match arg_at(positional, named, 1, "list2") {
        Some(v) => v.as_list_items(),
        None => Vec::new(),
    };
    let separator = match arg_at(positional, named, 2, "separator") {
        Some(Value::String { text, .. }) if text == "space" => ListSeparator::Space,
        Some(Value::String { text, .. }) if text == "comma" => ListSeparator::Comma,
        _ => ListSeparator::Comma,
    };
    a.extend(b);
    Ok(Value::List { separator, items: a, has_brackets: false })
}

fn append(positional: &Args, named: &Named, span: Span) -> Result<Value, EvalError> {
    let mut items = list_arg(positional, named, "list", span)?;
    let val = any_arg_at(positional, named, 1, "val", span)?;
    items.push(val);
    Ok(Value::List { separator: ListSeparator::Comma, items, has_brackets: false })
}

fn any_arg_at(positional: &Args, named: &Named, index: usize, key: &str, span: Span) -> Result<Value, EvalError> {
    Ok(require(positional, named, index, key, span)?.clone())
}

fn index_of(positional: &Args, named: &Named, span: Span) -> Result<Value, EvalError> {
    let items = list_arg(positional, named, "list", span)?;
    let needle = any_arg_at(positional, named, 1, "value", span)?;
    match items.iter().position(|v| values_equal(v, &needle)) {
        Some(i) => Ok(Value::number((i + 1) as f64)),
        None => Ok(Value::Null),
    }
}

fn map_pairs(positional: &Args, named: &Named, key: &str, span: Span) -> Result<Vec<(Value, Value)>, EvalError> {
    match require(positional, named, 0, key, span)? {
        Value::Map(pairs) => Ok(pairs.clone()),
        other => Err(EvalError::Type { span, message: format!("${key}: expected a map, got {}", other.type_name()) }),
    }
}

fn map_get(positional: &Args, named: &Named, span: Span) -> Result<Option<Value>, EvalError> {
    let pairs = map_pairs(positional, named, "map", span)?;
    let key = any_arg_at(positional, named, 1, "key", span)?;
    Ok(pairs.into_iter().find(|(k, _)| values_equal(k, &key)).map(|(_, v)| v))
}

fn map_merge(positional: &Args, named: &Named, span: Span) -> Result<Value, EvalError> {
    let mut pairs = map_pairs(positional, named, "map1", span)?;
    let other = match require(positional, named, 1, "map2", span)? {
        Value::Map(p) => p.clone(),
        other => return Err(EvalError::Type { span, message: format!("$map2: expected a map, got {}", other.type_name()) }),
    };
    for (k, v) in other {
        if let Some(existing) = pairs.iter_mut().find(|(ek, _)| values_equal(ek, &k)) {
            existing.1 = v;
        } else {
            pairs.push((k, v));
        }
    }
    Ok(Value::Map(pairs))
}

fn map_keys(positional: &Args, named: &Named, span: Span) -> Result<Value, EvalError> {
    let pairs = map_pairs(positional, named, "map", span)?;
    Ok(Value::List { separator: ListSeparator::Comma, items: pairs.into_iter().map(|(k, _)| k).collect(), has_brackets: false })
}

fn map_values(positional: &Args, named: &Named, span: Span) -> Result<Value, EvalError> {
    let pairs = map_pairs(positional, named, "map", span)?;
    Ok(Value::List { separator: ListSeparator::Comma, items: pairs.into_iter().map(|(_, v)| v).collect(), has_brackets: false })
}

fn unit_string(n: &Number) -> String {
    let mut s = n.numer_units.join("*");
    if !n.denom_units.is_empty() {
        s.push('/');
        s.push_str(&n.denom_units.join("*"));
    }
    s
}

fn if_fn(positional: &Args, named: &Named, span: Span) -> Result<Value, EvalError> {
    let cond = require(positional, named, 0, "condition", span)?.is_truthy();
    let branch = if cond { 1 } else { 2 };
    let key = if cond { "if-true" } else { "if-false" };
    Ok(require(positional, named, branch, key, span)?.clone())
}

/// A loose equality used for `map-get`/`index` lookups — string text and
/// unit-aware numeric equality, not `Value`'s exact structural `PartialEq`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String { text: t1, .. }, Value::String { text: t2, .. }) => t1 == t2,
        (Value::Number(n1), Value::Number(n2)) => {
            numeric::comparable(n1, n2) && (n1.value - n2.value).abs() < 1e-9
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::dummy()
    }

    #[test]
    fn percentage_multiplies_by_a_hundred() {
        let args = [Value::number(0.5)];
        let named = Named::new();
        let v = call("percentage", &args, &named, span()).unwrap().unwrap();
        assert_eq!(v, Value::number(50.0));
    }

    #[test]
    fn nth_supports_negative_indices() {
        let list = Value::List {
            separator: ListSeparator::Comma,
            items: vec![Value::number(1.0), Value::number(2.0), Value::number(3.0)],
            has_brackets: false,
        };
        let args = [list, Value::number(-1.0)];
        let named = Named::new();
        let v = call("nth", &args, &named, span()).unwrap().unwrap();
        assert_eq!(v, Value::number(3.0));
    }

    #[test]
    fn map_get_finds_matching_key() {
        let map = Value::Map(vec![(Value::quoted("a"), Value::number(1.0)), (Value::quoted("b"), Value::number(2.0))]);
        let args = [map, Value::quoted("b")];
        let named = Named::new();
        let v = call("map-get", &args, &named, span()).unwrap().unwrap();
        assert_eq!(v, Value::number(2.0));
    }

    #[test]
    fn if_picks_branch_by_truthiness() {
        let args = [Value::Boolean(true), Value::quoted("yes"), Value::quoted("no")];
        let named = Named::new();
        let v = call("if", &args, &named, span()).unwrap().unwrap();
        assert_eq!(v, Value::quoted("yes"));
    }

    #[test]
    fn unknown_name_returns_none() {
        let named = Named::new();
        assert!(call("not-a-real-function", &[], &named, span()).unwrap().is_none());
    }
}
