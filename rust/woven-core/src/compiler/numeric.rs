//! Unit-aware numeric algebra: conversion tables for the handful of unit
//! families the language actually does arithmetic across (lengths, angles,
//! time, resolution) and the multiplication/division rules for the
//! numerator/denominator unit multisets a [`super::value::Number`] carries.

use super::value::Number;

/// Each family lists its units with a factor relative to the family's
/// canonical unit (first entry, factor 1.0).
const LENGTH: &[(&str, f64)] = &[
    ("px", 1.0),
    ("in", 96.0),
    ("pc", 16.0),
    ("pt", 96.0 / 72.0),
    ("mm", 96.0 / 25.4),
    ("cm", 96.0 / 2.54),
    ("q", 96.0 / 101.6),
];

const ANGLE: &[(&str, f64)] = &[("deg", 1.0), ("grad", 0.9), ("rad", 180.0 / std::f64::consts::PI), ("turn", 360.0)];

const TIME: &[(&str, f64)] = &[("s", 1.0), ("ms", 0.001)];

const RESOLUTION: &[(&str, f64)] = &[("dpi", 1.0), ("dpcm", 1.0 / 2.54), ("dppx", 96.0)];

const FAMILIES: &[&[(&str, f64)]] = &[LENGTH, ANGLE, TIME, RESOLUTION];

fn family_of(unit: &str) -> Option<&'static [(&'static str, f64)]> {
    let lower = unit.to_ascii_lowercase();
    FAMILIES.iter().copied().find(|f| f.iter().any(|(u, _)| *u == lower))
}

fn factor(unit: &str) -> Option<f64> {
    let lower = unit.to_ascii_lowercase();
    family_of(unit).and_then(|f| f.iter().find(|(u, _)| *u == lower).map(|(_, factor)| *factor))
}

/// Converts `value` from `from` to `to`, if both are known units in the
/// same family. Units that aren't recognized at all (a vendor-specific
/// custom unit) are only ever compatible with themselves, handled by the
/// caller before reaching here.
pub fn convert(value: f64, from: &str, to: &str) -> Option<f64> {
    if from.eq_ignore_ascii_case(to) {
        return Some(value);
    }
    let (ff, tf) = (factor(from)?, factor(to)?);
    let same_family = family_of(from).zip(family_of(to)).is_some_and(|(a, b)| std::ptr::eq(a, b));
    if !same_family {
        return None;
    }
    Some(value * ff / tf)
}

/// Removes one matching instance of `unit` from `units` (case-sensitively
/// first, falling back to a unit-aware conversion target); used when a
/// denominator unit cancels a numerator unit of the same family during
/// multiplication.
fn remove_one(units: &mut Vec<String>, unit: &str) -> bool {
    if let Some(pos) = units.iter().position(|u| u == unit) {
        units.remove(pos);
        return true;
    }
    if let Some(pos) = units.iter().position(|u| family_of(u).is_some() && family_of(u) == family_of(unit)) {
        units.remove(pos);
        return true;
    }
    false
}

/// Multiplies two numbers, combining their unit multisets and cancelling
/// any numerator/denominator pair that shares a unit family.
pub fn multiply(a: &Number, b: &Number) -> Number {
    let mut numer = a.numer_units.clone();
    numer.extend(b.numer_units.clone());
    let mut denom = a.denom_units.clone();
    denom.extend(b.denom_units.clone());
    cancel(&mut numer, &mut denom);
    Number { value: a.value * b.value, numer_units: numer, denom_units: denom }
}

/// Divides `a` by `b`: `a`'s numerator gains `b`'s denominator, and vice
/// versa, then cancels.
pub fn divide(a: &Number, b: &Number) -> Number {
    let mut numer = a.numer_units.clone();
    numer.extend(b.denom_units.clone());
    let mut denom = a.denom_units.clone();
    denom.extend(b.numer_units.clone());
    cancel(&mut numer, &mut denom);
    Number { value: a.value / b.value, numer_units: numer, denom_units: denom }
}

fn cancel(numer: &mut Vec<String>, denom: &mut Vec<String>) {
    let mut i = 0;
    while i < numer.len() {
        if remove_one(denom, &numer[i]) {
            numer.remove(i);
        } else {
            i += 1;
        }
    }
}

/// `true` when `a` and `b` carry compatible units for addition/subtraction/
/// comparison: both unitless, identical units, or convertible within the
/// same family.
pub fn comparable(a: &Number, b: &Number) -> bool {
    if a.is_unitless() && b.is_unitless() {
        return true;
    }
    match (a.single_unit(), b.single_unit()) {
        (Some(ua), Some(ub)) => convert(1.0, ua, ub).is_some(),
        _ => a.numer_units == b.numer_units && a.denom_units == b.denom_units,
    }
}

/// Adds `b` into `a`'s unit, converting `b`'s value first if they're in the
/// same family but spelled differently (`1in + 48px`).
pub fn add(a: &Number, b: &Number) -> Option<Number> {
    combine(a, b, |x, y| x + y)
}

pub fn subtract(a: &Number, b: &Number) -> Option<Number> {
    combine(a, b, |x, y| x - y)
}

fn combine(a: &Number, b: &Number, op: impl Fn(f64, f64) -> f64) -> Option<Number> {
    if a.is_unitless() && b.is_unitless() {
        return Some(Number::unitless(op(a.value, b.value)));
    }
    match (a.single_unit(), b.single_unit()) {
        (Some(ua), Some(ub)) => {
            let converted = convert(b.value, ub, ua)?;
            Some(Number::with_unit(op(a.value, converted), ua))
        }
        _ if a.numer_units == b.numer_units && a.denom_units == b.denom_units => {
            Some(Number { value: op(a.value, b.value), numer_units: a.numer_units.clone(), denom_units: a.denom_units.clone() })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_within_length_family() {
        assert_eq!(convert(1.0, "in", "px"), Some(96.0));
    }

    #[test]
    fn refuses_cross_family_conversion() {
        assert_eq!(convert(1.0, "in", "deg"), None);
    }

    #[test]
    fn multiply_combines_units() {
        let a = Number::with_unit(2.0, "px");
        let b = Number::unitless(3.0);
        let r = multiply(&a, &b);
        assert_eq!(r.value, 6.0);
        assert_eq!(r.numer_units, vec!["px".to_string()]);
    }

    #[test]
    fn divide_by_same_unit_cancels_to_unitless() {
        let a = Number::with_unit(10.0, "px");
        let b = Number::with_unit(2.0, "px");
        let r = divide(&a, &b);
        assert_eq!(r.value, 5.0);
        assert!(r.is_unitless());
    }

    #[test]
    fn add_converts_compatible_units() {
        let a = Number::with_unit(1.0, "in");
        let b = Number::with_unit(48.0, "px");
        let r = add(&a, &b).unwrap();
        assert_eq!(r.value, 144.0);
        assert_eq!(r.single_unit(), Some("in"));
    }

    #[test]
    fn incompatible_units_refuse_to_combine() {
        let a = Number::with_unit(1.0, "px");
        let b = Number::with_unit(1.0, "deg");
        assert!(add(&a, &b).is_none());
    }
}
