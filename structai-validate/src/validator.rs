//! The [`Validator`] trait and leaf validators.
//!
//! Every validator turns a raw [`Value`] into a validated one or an ordered
//! [`ValidationErrors`] aggregate. Struct validators, type validators and
//! the composites in [`crate::composite`] all implement the same trait, so
//! they nest freely.

use std::any::type_name;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use structai_core::{ErrorKind, ValidationError, ValidationErrors, Value};

use crate::coerce::coerce;
use crate::context::{CoercionMode, ValidationContext, ValidationMode};
use crate::error::ShapeError;
use crate::rules::RuleSet;
use crate::shape::{FieldType, FieldTyped, Shaped};
use crate::structure::{validate_struct, StructValidator};

/// Validates raw values.
pub trait Validator: Send + Sync {
    /// Validate `raw` within an existing call context.
    fn validate(
        &self,
        raw: &Value,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<Value, ValidationErrors>;

    /// Short description used in error messages and union reasons.
    fn describe(&self) -> String;

    /// JSON Schema of accepted input.
    fn json_schema(&self) -> JsonValue;

    /// Validate `raw` in a fresh lax context.
    fn check(&self, raw: &Value) -> Result<Value, ValidationErrors> {
        let mut ctx = ValidationContext::root(raw);
        self.validate(raw, &mut ctx)
    }

    /// Validate `raw` in a fresh context with the given modes.
    fn check_with(
        &self,
        raw: &Value,
        coercion: CoercionMode,
        mode: ValidationMode,
    ) -> Result<Value, ValidationErrors> {
        let mut ctx = ValidationContext::root(raw)
            .with_coercion(coercion)
            .with_mode(mode);
        self.validate(raw, &mut ctx)
    }
}

/// Shared validator for dynamic dispatch.
pub type BoxedValidator = Arc<dyn Validator>;

impl<V: Validator + ?Sized> Validator for Arc<V> {
    fn validate(
        &self,
        raw: &Value,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<Value, ValidationErrors> {
        (**self).validate(raw, ctx)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn json_schema(&self) -> JsonValue {
        (**self).json_schema()
    }
}

impl<V: Validator + ?Sized> Validator for Box<V> {
    fn validate(
        &self,
        raw: &Value,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<Value, ValidationErrors> {
        (**self).validate(raw, ctx)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn json_schema(&self) -> JsonValue {
        (**self).json_schema()
    }
}

impl Validator for StructValidator {
    fn validate(
        &self,
        raw: &Value,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<Value, ValidationErrors> {
        validate_struct(self.shape(), raw, ctx)
    }

    fn describe(&self) -> String {
        self.shape().name().to_string()
    }

    fn json_schema(&self) -> JsonValue {
        self.shape().json_schema()
    }
}

/// Validates a single value against a [`FieldType`] and an optional rule
/// list.
#[derive(Debug, Clone)]
pub struct TypeValidator {
    ty: FieldType,
    rules: RuleSet,
}

impl TypeValidator {
    /// Validator for `ty` with no rules.
    #[must_use]
    pub fn new(ty: FieldType) -> Self {
        Self {
            ty,
            rules: RuleSet::default(),
        }
    }

    /// Validator for a [`FieldTyped`] type.
    #[must_use]
    pub fn of<T: FieldTyped>() -> Self {
        Self::new(T::field_type())
    }

    /// Attach a rule list.
    pub fn with_rules(mut self, rules: &str) -> Result<Self, ShapeError> {
        self.rules = RuleSet::parse(rules)?;
        Ok(self)
    }

    /// The declared type.
    #[must_use]
    pub fn field_type(&self) -> &FieldType {
        &self.ty
    }
}

impl Validator for TypeValidator {
    fn validate(
        &self,
        raw: &Value,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<Value, ValidationErrors> {
        let value = coerce(raw, &self.ty, ctx)?;
        self.rules.evaluate(&value, ctx).into_result(value)
    }

    fn describe(&self) -> String {
        self.ty.name()
    }

    fn json_schema(&self) -> JsonValue {
        let mut schema = self.ty.json_schema();
        crate::schema::apply_rules(&mut schema, &self.rules);
        schema
    }
}

impl Validator for FieldType {
    fn validate(
        &self,
        raw: &Value,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<Value, ValidationErrors> {
        coerce(raw, self, ctx)
    }

    fn describe(&self) -> String {
        self.name()
    }

    fn json_schema(&self) -> JsonValue {
        FieldType::json_schema(self)
    }
}

/// Validator backed by a closure.
pub struct FnValidator<F> {
    name: String,
    func: F,
}

impl<F> FnValidator<F>
where
    F: Fn(&Value, &mut ValidationContext<'_>) -> Result<Value, ValidationErrors> + Send + Sync,
{
    /// Wrap `func` under a descriptive name.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Validator for FnValidator<F>
where
    F: Fn(&Value, &mut ValidationContext<'_>) -> Result<Value, ValidationErrors> + Send + Sync,
{
    fn validate(
        &self,
        raw: &Value,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<Value, ValidationErrors> {
        (self.func)(raw, ctx)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }

    fn json_schema(&self) -> JsonValue {
        serde_json::json!({})
    }
}

impl<F> std::fmt::Debug for FnValidator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnValidator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Convert a validated value into `T`.
///
/// A failure here means the shape and the Rust type disagree; it is reported
/// as a path-less coercion error so callers can treat it like any other
/// validation failure.
pub fn from_validated<T: DeserializeOwned>(value: Value) -> Result<T, ValidationErrors> {
    let source = value.type_name();
    let target = short_type_name::<T>();
    serde_json::from_value(JsonValue::from(value)).map_err(|err| {
        ValidationError::new(
            ErrorKind::TypeCoercionFailed {
                source: source.to_string(),
                target: target.to_string(),
            },
            format!("cannot convert validated {source} to {target}: {err}"),
        )
        .into()
    })
}

/// Validate `raw` as `T` with lax coercion.
pub fn validate_as<T: Shaped>(raw: &Value) -> Result<T, ValidationErrors> {
    validate_as_with(raw, CoercionMode::Lax)
}

/// Validate `raw` as `T` with the given coercion mode.
pub fn validate_as_with<T: Shaped>(
    raw: &Value,
    coercion: CoercionMode,
) -> Result<T, ValidationErrors> {
    let value = StructValidator::of::<T>().check_with(raw, coercion, ValidationMode::Validation)?;
    from_validated(value)
}

fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    let start = base.rfind("::").map_or(0, |i| i + 2);
    &full[start..]
}
