//! Struct validation.
//!
//! Fields are validated in declaration order. Every field error is
//! collected; model-level validators run only when all fields passed.

use std::sync::Arc;

use structai_core::{
    ErrorKind, PathSegment, ValidationError, ValidationErrors, Value, ValueMap,
};
use tracing::trace;

use crate::coerce::coerce;
use crate::context::{ValidationContext, ValidationMode};
use crate::shape::{Field, Shape, Shaped};

/// Validate `raw` against `shape`.
///
/// Returns the validated map, with fields in declaration order. Error paths
/// are relative to `raw`.
pub fn validate_struct(
    shape: &Shape,
    raw: &Value,
    ctx: &mut ValidationContext<'_>,
) -> Result<Value, ValidationErrors> {
    let Some(input) = raw.as_map() else {
        return Err(ValidationError::coercion(raw, shape.name()).into());
    };

    let mut errors = ValidationErrors::new();
    let mut output = ValueMap::with_capacity(shape.fields().len());

    for field in shape.fields() {
        let name = field.name();
        let result = ctx.scoped(PathSegment::field(name), |ctx| {
            validate_field(field, input.get(name), ctx)
        });
        match result {
            Ok(Some(value)) => {
                output.insert(name.to_string(), value);
            }
            Ok(None) => {}
            Err(field_errors) => errors.merge(field_errors.prefixed(PathSegment::field(name))),
        }
    }

    if errors.has_errors() {
        trace!(
            shape = shape.name(),
            path = %ctx.path(),
            errors = errors.len(),
            "field validation failed"
        );
        return Err(errors);
    }

    for validator in shape.model_validators() {
        if let Err(message) = validator(&output, ctx) {
            errors.add(ValidationError::model(message));
        }
    }

    errors.into_result(Value::Map(output))
}

/// Validate one field. `Ok(None)` means the field is left out of the output.
fn validate_field(
    field: &Field,
    raw: Option<&Value>,
    ctx: &mut ValidationContext<'_>,
) -> Result<Option<Value>, ValidationErrors> {
    let Some(raw) = raw else {
        return validate_absent(field, ctx);
    };

    let value = coerce(raw, field.ty(), ctx)?;

    let mut errors = field.rules().evaluate(&value, ctx);
    for check in field.checks() {
        if let Err(message) = check(&value, ctx) {
            errors.add(ValidationError::new(ErrorKind::CheckFailed, message).with_value(value.clone()));
        }
    }
    if errors.has_errors() {
        return Err(errors);
    }

    ctx.record(value.clone());
    Ok(Some(value))
}

fn validate_absent(
    field: &Field,
    ctx: &mut ValidationContext<'_>,
) -> Result<Option<Value>, ValidationErrors> {
    if field.is_required() {
        return Err(ValidationError::required().into());
    }

    let zero = field.ty().zero_value();
    if field.omit_empty() {
        return Ok(match ctx.mode() {
            ValidationMode::Validation => Some(zero),
            ValidationMode::Serialization => None,
        });
    }

    if field.rules().has_constraints() {
        let errors = field.rules().evaluate(&zero, ctx);
        if errors.has_errors() {
            return Err(errors);
        }
    }
    ctx.record(zero.clone());
    Ok(Some(zero))
}

/// Validator for a single [`Shape`].
#[derive(Debug, Clone)]
pub struct StructValidator {
    shape: Arc<Shape>,
}

impl StructValidator {
    /// Create a validator for `shape`.
    #[must_use]
    pub fn new(shape: Arc<Shape>) -> Self {
        Self { shape }
    }

    /// Create a validator for a [`Shaped`] type.
    #[must_use]
    pub fn of<T: Shaped>() -> Self {
        Self::new(T::shape())
    }

    /// The validated shape.
    #[must_use]
    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CoercionMode;
    use crate::shape::{FieldBuilder, FieldType};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn user() -> Shape {
        Shape::builder("User")
            .field("name", FieldType::String, "required,min=1")
            .field("email", FieldType::String, "required,email")
            .field("age", FieldType::int(), "gte=0,lte=150")
            .add(FieldBuilder::new("nickname", FieldType::String).rules("max=20").omit_empty())
            .build()
            .unwrap()
    }

    fn run(shape: &Shape, raw: serde_json::Value) -> Result<Value, ValidationErrors> {
        let raw = Value::from(raw);
        let mut ctx = ValidationContext::root(&raw);
        validate_struct(shape, &raw, &mut ctx)
    }

    #[test]
    fn test_valid_user() {
        let value = run(
            &user(),
            json!({"name": "Alice", "email": "a@example.com", "age": "30"}),
        )
        .unwrap();
        assert_eq!(
            value,
            Value::from(json!({
                "name": "Alice",
                "email": "a@example.com",
                "age": 30,
                "nickname": ""
            }))
        );
    }

    #[test]
    fn test_collects_all_field_errors_in_order() {
        let err = run(&user(), json!({"name": "", "age": 200})).unwrap_err();
        let paths: Vec<_> = err.iter().map(|e| e.path_string()).collect();
        assert_eq!(paths, vec!["name", "email", "age"]);
        assert!(err.contains_code("required_field_missing"));
    }

    #[test]
    fn test_required_absent_reports_once() {
        let err = run(&user(), json!({"name": "A", "age": 1})).unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err.to_string(), "email: field is required");
    }

    #[test]
    fn test_absent_optional_zero_is_validated() {
        let shape = Shape::builder("Code")
            .field("code", FieldType::String, "len=4")
            .build()
            .unwrap();
        let err = run(&shape, json!({})).unwrap_err();
        assert_eq!(err.errors()[0].path_string(), "code");
    }

    #[test]
    fn test_omit_empty_in_serialization_mode() {
        let shape = user();
        let raw = Value::from(json!({"name": "A", "email": "a@example.com", "age": 1}));
        let mut ctx = ValidationContext::root(&raw).with_mode(ValidationMode::Serialization);
        let value = validate_struct(&shape, &raw, &mut ctx).unwrap();
        assert!(value.get("nickname").is_none());
    }

    #[test]
    fn test_nested_paths() {
        let address = Arc::new(
            Shape::builder("Address")
                .field("city", FieldType::String, "required")
                .build()
                .unwrap(),
        );
        let order = Shape::builder("Order")
            .field("items", FieldType::list(FieldType::structure(address)), "min=1")
            .build()
            .unwrap();
        let err = run(&order, json!({"items": [{"city": "x"}, {}]})).unwrap_err();
        assert_eq!(err.to_string(), "items[1].city: field is required");
    }

    #[test]
    fn test_model_validator_runs_after_fields() {
        let shape = Shape::builder("Range")
            .field("start", FieldType::int(), "required")
            .field("end", FieldType::int(), "required")
            .model_validator(|map, _| {
                let start = map.get("start").and_then(Value::as_int).unwrap_or_default();
                let end = map.get("end").and_then(Value::as_int).unwrap_or_default();
                if end > start {
                    Ok(())
                } else {
                    Err("end must be after start".to_string())
                }
            })
            .build()
            .unwrap();

        let err = run(&shape, json!({"start": 5, "end": 1})).unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err.errors()[0].path.is_root());
        assert_eq!(err.to_string(), "end must be after start");

        // field errors suppress model validators
        let err = run(&shape, json!({"start": 5})).unwrap_err();
        assert!(!err.contains_code("model_level_invariant_violated"));
    }

    #[test]
    fn test_field_check() {
        let shape = Shape::builder("Tag")
            .add(FieldBuilder::new("slug", FieldType::String).check(|v, _| {
                match v.as_str() {
                    Some(s) if s == s.to_lowercase() => Ok(()),
                    _ => Err("must be lowercase".to_string()),
                }
            }))
            .build()
            .unwrap();
        let err = run(&shape, json!({"slug": "Hello"})).unwrap_err();
        assert!(err.contains_code("check_failed"));
    }

    #[test]
    fn test_cross_field_rule() {
        let shape = Shape::builder("Signup")
            .field("password", FieldType::String, "required")
            .field("confirm", FieldType::String, "required,eqfield=password")
            .build()
            .unwrap();
        assert!(run(&shape, json!({"password": "a", "confirm": "a"})).is_ok());
        let err = run(&shape, json!({"password": "a", "confirm": "b"})).unwrap_err();
        assert_eq!(err.to_string(), "confirm: must be equal to password");
    }

    #[test]
    fn test_non_map_input() {
        let err = run(&user(), json!([1, 2])).unwrap_err();
        assert_eq!(err.to_string(), "cannot convert list to User");
    }

    #[test]
    fn test_strict_mode_rejects_string_number() {
        let shape = user();
        let raw = Value::from(json!({"name": "A", "email": "a@example.com", "age": "30"}));
        let mut ctx = ValidationContext::root(&raw).with_coercion(CoercionMode::Strict);
        let err = validate_struct(&shape, &raw, &mut ctx).unwrap_err();
        assert_eq!(err.errors()[0].path_string(), "age");
    }

    #[test]
    fn test_extra_keys_ignored() {
        let value = run(
            &user(),
            json!({"name": "A", "email": "a@example.com", "extra": true}),
        )
        .unwrap();
        assert!(value.get("extra").is_none());
    }
}
