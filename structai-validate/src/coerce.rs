//! Coercion of raw values into declared field types.
//!
//! In strict mode only exact kind matches pass. In lax mode a fixed set of
//! cross-kind conversions is attempted:
//!
//! | target | accepted sources |
//! |--------|------------------|
//! | bool   | bool, `0`/`1`, strings `1 t T TRUE true True 0 f F FALSE false False` |
//! | int    | int, finite float (truncated), numeric string, bool |
//! | float  | float, int, numeric string, bool |
//! | string | string, int, float, bool |
//! | list   | list, converted element-wise |
//! | map    | map, converted value-wise |
//! | struct | map, validated against the nested shape |
//!
//! Lax mode also turns null into the target's zero value. Errors are
//! relative to the value being converted; element and key errors carry the
//! index or key as their leading segment.

use structai_core::{PathSegment, ValidationError, ValidationErrors, Value, ValueMap};

use crate::context::ValidationContext;
use crate::shape::{FieldType, IntBounds};
use crate::structure::validate_struct;

/// Convert `raw` into `ty`.
pub fn coerce(
    raw: &Value,
    ty: &FieldType,
    ctx: &mut ValidationContext<'_>,
) -> Result<Value, ValidationErrors> {
    match ty {
        FieldType::Any => Ok(raw.clone()),
        FieldType::Nullable(_) if raw.is_null() => Ok(Value::Null),
        FieldType::Nullable(inner) => coerce(raw, inner, ctx),
        _ if raw.is_null() => {
            if ctx.is_strict() {
                Err(mismatch(raw, ty))
            } else {
                Ok(ty.zero_value())
            }
        }
        FieldType::Bool => coerce_bool(raw, ctx.is_strict()).ok_or_else(|| mismatch(raw, ty)),
        FieldType::Int(bounds) => coerce_int(raw, *bounds, ctx.is_strict()),
        FieldType::Float => coerce_float(raw, ctx.is_strict()).ok_or_else(|| mismatch(raw, ty)),
        FieldType::String => {
            coerce_string(raw, ctx.is_strict()).ok_or_else(|| mismatch(raw, ty))
        }
        FieldType::List(item) => {
            let items = raw.as_list().ok_or_else(|| mismatch(raw, ty))?;
            coerce_list(items, item, ctx)
        }
        FieldType::Map(value) => {
            let entries = raw.as_map().ok_or_else(|| mismatch(raw, ty))?;
            coerce_map(entries, value, ctx)
        }
        FieldType::Struct(shape) => {
            if raw.as_map().is_none() {
                return Err(mismatch(raw, ty));
            }
            validate_struct(shape, raw, ctx)
        }
    }
}

fn mismatch(raw: &Value, ty: &FieldType) -> ValidationErrors {
    ValidationError::coercion(raw, ty.name()).into()
}

/// Parse the textual boolean forms.
#[must_use]
pub fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn coerce_bool(raw: &Value, strict: bool) -> Option<Value> {
    match raw {
        Value::Bool(b) => Some(Value::Bool(*b)),
        _ if strict => None,
        Value::Int(0) => Some(Value::Bool(false)),
        Value::Int(1) => Some(Value::Bool(true)),
        Value::String(s) => parse_bool(s.trim()).map(Value::Bool),
        _ => None,
    }
}

fn coerce_int(raw: &Value, bounds: IntBounds, strict: bool) -> Result<Value, ValidationErrors> {
    let target = FieldType::Int(bounds);
    let value = match raw {
        Value::Int(i) => Some(*i),
        _ if strict => None,
        Value::Float(f) => float_to_int(*f),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_to_int))
        }
        _ => None,
    };
    let Some(value) = value else {
        return Err(mismatch(raw, &target));
    };
    if bounds.contains(value) {
        Ok(Value::Int(value))
    } else {
        Err(ValidationError::coercion(raw, bounds.name)
            .with_message(format!("value {value} is out of range for {}", bounds.name))
            .into())
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_int(f: f64) -> Option<i64> {
    let truncated = f.trunc();
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range
    (truncated.is_finite() && truncated >= i64::MIN as f64 && truncated < i64::MAX as f64)
        .then_some(truncated as i64)
}

#[allow(clippy::cast_precision_loss)]
fn coerce_float(raw: &Value, strict: bool) -> Option<Value> {
    match raw {
        Value::Float(f) => Some(Value::Float(*f)),
        _ if strict => None,
        Value::Int(i) => Some(Value::Float(*i as f64)),
        Value::Bool(b) => Some(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::Float),
        _ => None,
    }
}

fn coerce_string(raw: &Value, strict: bool) -> Option<Value> {
    match raw {
        Value::String(s) => Some(Value::String(s.clone())),
        _ if strict => None,
        Value::Int(_) | Value::Float(_) | Value::Bool(_) => {
            Some(Value::String(raw.to_plain_string()))
        }
        _ => None,
    }
}

fn coerce_list(
    items: &[Value],
    item_ty: &FieldType,
    ctx: &mut ValidationContext<'_>,
) -> Result<Value, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match ctx.scoped(index, |ctx| coerce(item, item_ty, ctx)) {
            Ok(value) => out.push(value),
            Err(errs) => errors.merge(errs.prefixed(index)),
        }
    }
    errors.into_result(Value::List(out))
}

fn coerce_map(
    entries: &ValueMap,
    value_ty: &FieldType,
    ctx: &mut ValidationContext<'_>,
) -> Result<Value, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut out = ValueMap::with_capacity(entries.len());
    for (key, value) in entries {
        match ctx.scoped(PathSegment::key(key), |ctx| coerce(value, value_ty, ctx)) {
            Ok(converted) => {
                out.insert(key.clone(), converted);
            }
            Err(errs) => errors.merge(errs.prefixed(PathSegment::key(key))),
        }
    }
    errors.into_result(Value::Map(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CoercionMode;
    use crate::shape::FieldTyped;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn lax(raw: Value, ty: &FieldType) -> Result<Value, ValidationErrors> {
        let mut ctx = ValidationContext::root(&raw);
        coerce(&raw, ty, &mut ctx)
    }

    fn strict(raw: Value, ty: &FieldType) -> Result<Value, ValidationErrors> {
        let root = raw.clone();
        let mut ctx = ValidationContext::root(&root).with_coercion(CoercionMode::Strict);
        coerce(&raw, ty, &mut ctx)
    }

    #[rstest]
    #[case("1", true)]
    #[case("t", true)]
    #[case("TRUE", true)]
    #[case("True", true)]
    #[case("0", false)]
    #[case("F", false)]
    #[case("false", false)]
    fn test_bool_strings(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(lax(Value::from(input), &FieldType::Bool).unwrap(), Value::Bool(expected));
    }

    #[test]
    fn test_bool_rejects_other_strings() {
        assert!(lax(Value::from("yes"), &FieldType::Bool).is_err());
        assert!(lax(Value::Int(2), &FieldType::Bool).is_err());
    }

    #[rstest]
    #[case(Value::from("42"), 42)]
    #[case(Value::from(" 7 "), 7)]
    #[case(Value::from("3.9"), 3)]
    #[case(Value::Float(-2.7), -2)]
    #[case(Value::Bool(true), 1)]
    fn test_lax_int(#[case] raw: Value, #[case] expected: i64) {
        assert_eq!(lax(raw, &FieldType::int()).unwrap(), Value::Int(expected));
    }

    #[test]
    fn test_int_rejects_non_finite_and_garbage() {
        assert!(lax(Value::Float(f64::NAN), &FieldType::int()).is_err());
        assert!(lax(Value::Float(1e300), &FieldType::int()).is_err());
        assert!(lax(Value::from("abc"), &FieldType::int()).is_err());
    }

    #[test]
    fn test_int_range() {
        let err = lax(Value::Int(300), &u8::field_type()).unwrap_err();
        assert_eq!(err.errors()[0].message, "value 300 is out of range for u8");
        assert_eq!(err.errors()[0].kind.code(), "type_coercion_failed");
    }

    #[test]
    fn test_lax_float_and_string() {
        assert_eq!(lax(Value::Int(3), &FieldType::Float).unwrap(), Value::Float(3.0));
        assert_eq!(lax(Value::from("2.5"), &FieldType::Float).unwrap(), Value::Float(2.5));
        assert_eq!(lax(Value::Int(42), &FieldType::String).unwrap(), Value::from("42"));
        assert_eq!(lax(Value::Bool(false), &FieldType::String).unwrap(), Value::from("false"));
    }

    #[test]
    fn test_lax_null_becomes_zero() {
        assert_eq!(lax(Value::Null, &FieldType::String).unwrap(), Value::from(""));
        assert_eq!(lax(Value::Null, &FieldType::int()).unwrap(), Value::Int(0));
        assert_eq!(
            lax(Value::Null, &FieldType::nullable(FieldType::int())).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_strict_rejects_cross_kind() {
        assert!(strict(Value::from("42"), &FieldType::int()).is_err());
        assert!(strict(Value::Int(1), &FieldType::Float).is_err());
        assert!(strict(Value::Int(1), &FieldType::String).is_err());
        assert!(strict(Value::Null, &FieldType::String).is_err());
        assert_eq!(strict(Value::Int(1), &FieldType::int()).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_error_names_source_and_target() {
        let err = lax(Value::from("abc"), &FieldType::int()).unwrap_err();
        assert_eq!(err.to_string(), "cannot convert string to int");
    }

    #[test]
    fn test_list_errors_carry_index() {
        let raw = Value::from(json!(["1", "x", 3, "y"]));
        let err = lax(raw, &FieldType::list(FieldType::int())).unwrap_err();
        let paths: Vec<_> = err.iter().map(|e| e.path_string()).collect();
        assert_eq!(paths, vec!["[1]", "[3]"]);
    }

    #[test]
    fn test_map_errors_carry_key() {
        let raw = Value::from(json!({"alice": 1, "bob": "many"}));
        let err = lax(raw, &FieldType::map(FieldType::int())).unwrap_err();
        assert_eq!(err.errors()[0].path_string(), "bob");
    }

    #[test]
    fn test_list_is_not_wrapped() {
        assert!(lax(Value::from("a"), &FieldType::list(FieldType::String)).is_err());
    }

    #[test]
    fn test_any_passes_through() {
        let raw = Value::from(json!({"x": [1, 2]}));
        assert_eq!(lax(raw.clone(), &FieldType::Any).unwrap(), raw);
    }
}
