//! Shape descriptors.
//!
//! A [`Shape`] is the runtime description of a typed record: its external
//! field names, declared field types, rule lists and model-level validators.
//! Shapes are usually produced by `#[derive(Shaped)]`, but can be assembled
//! by hand with [`Shape::builder`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use structai_core::{Value, ValueKind, ValueMap};

use crate::context::ValidationContext;
use crate::error::ShapeError;
use crate::rules::RuleSet;

/// Model-level validator: runs over the fully validated field map.
pub type ModelValidatorFn =
    Arc<dyn Fn(&ValueMap, &ValidationContext<'_>) -> Result<(), String> + Send + Sync>;

/// Extra per-field check run after the declared rules.
pub type FieldCheckFn =
    Arc<dyn Fn(&Value, &ValidationContext<'_>) -> Result<(), String> + Send + Sync>;

/// Inclusive range of an integer field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntBounds {
    /// Type name used in error messages.
    pub name: &'static str,
    /// Smallest accepted value.
    pub min: i64,
    /// Largest accepted value.
    pub max: i64,
}

impl IntBounds {
    /// Full `i64` range.
    pub const I64: Self = Self::new("int", i64::MIN, i64::MAX);

    /// Create bounds.
    #[must_use]
    pub const fn new(name: &'static str, min: i64, max: i64) -> Self {
        Self { name, min, max }
    }

    /// Whether `value` is in range.
    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Whether these bounds narrow the full `i64` range.
    #[must_use]
    pub fn is_narrowed(&self) -> bool {
        self.min != i64::MIN || self.max != i64::MAX
    }
}

impl Default for IntBounds {
    fn default() -> Self {
        Self::I64
    }
}

/// Declared type of a field.
#[derive(Clone)]
pub enum FieldType {
    /// Any value, passed through unchanged.
    Any,
    /// Boolean.
    Bool,
    /// Integer within bounds.
    Int(IntBounds),
    /// Floating point number.
    Float,
    /// String.
    String,
    /// Homogeneous list.
    List(Box<FieldType>),
    /// String-keyed map with homogeneous values.
    Map(Box<FieldType>),
    /// Nested record.
    Struct(Arc<Shape>),
    /// Optional value; null is accepted.
    Nullable(Box<FieldType>),
}

impl FieldType {
    /// Full-range integer.
    #[must_use]
    pub fn int() -> Self {
        Self::Int(IntBounds::I64)
    }

    /// List of `item`.
    #[must_use]
    pub fn list(item: FieldType) -> Self {
        Self::List(Box::new(item))
    }

    /// Map of string to `value`.
    #[must_use]
    pub fn map(value: FieldType) -> Self {
        Self::Map(Box::new(value))
    }

    /// Nullable `inner`.
    #[must_use]
    pub fn nullable(inner: FieldType) -> Self {
        Self::Nullable(Box::new(inner))
    }

    /// Nested record.
    #[must_use]
    pub fn structure(shape: Arc<Shape>) -> Self {
        Self::Struct(shape)
    }

    /// Type name used in error messages, e.g. `list<string>`.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Any => "any".to_string(),
            Self::Bool => "bool".to_string(),
            Self::Int(bounds) => bounds.name.to_string(),
            Self::Float => "float".to_string(),
            Self::String => "string".to_string(),
            Self::List(item) => format!("list<{}>", item.name()),
            Self::Map(value) => format!("map<string, {}>", value.name()),
            Self::Struct(shape) => shape.name().to_string(),
            Self::Nullable(inner) => format!("optional<{}>", inner.name()),
        }
    }

    /// The zero value used when a field is absent.
    #[must_use]
    pub fn zero_value(&self) -> Value {
        match self {
            Self::Any | Self::Nullable(_) => Value::Null,
            Self::Bool => Value::zero_of_kind(ValueKind::Bool),
            Self::Int(_) => Value::zero_of_kind(ValueKind::Int),
            Self::Float => Value::zero_of_kind(ValueKind::Float),
            Self::String => Value::zero_of_kind(ValueKind::String),
            Self::List(_) => Value::zero_of_kind(ValueKind::List),
            Self::Map(_) => Value::zero_of_kind(ValueKind::Map),
            Self::Struct(shape) => shape.zero_value(),
        }
    }

    /// Whether null is an accepted value.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        matches!(self, Self::Any | Self::Nullable(_))
    }

    /// Whether this type is a scalar.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        match self {
            Self::Bool | Self::Int(_) | Self::Float | Self::String => true,
            Self::Nullable(inner) => inner.is_scalar(),
            _ => false,
        }
    }

    /// Whether `value`'s runtime kind matches this type without conversion.
    #[must_use]
    pub fn matches_kind(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Any, _) => true,
            (Self::Nullable(_), Value::Null) => true,
            (Self::Nullable(inner), other) => inner.matches_kind(other),
            (Self::Bool, Value::Bool(_)) => true,
            (Self::Int(bounds), Value::Int(i)) => bounds.contains(*i),
            (Self::Float, Value::Float(_)) => true,
            (Self::String, Value::String(_)) => true,
            (Self::List(_), Value::List(_)) => true,
            (Self::Map(_) | Self::Struct(_), Value::Map(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A declared field of a [`Shape`].
#[derive(Clone)]
pub struct Field {
    name: String,
    ty: FieldType,
    rules: RuleSet,
    omit_empty: bool,
    description: Option<String>,
    checks: Vec<FieldCheckFn>,
}

impl Field {
    /// External name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    #[must_use]
    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    /// Parsed rule list.
    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Whether the field must be present.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.rules.is_required()
    }

    /// Whether an absent value skips rule evaluation.
    #[must_use]
    pub fn omit_empty(&self) -> bool {
        self.omit_empty
    }

    /// Field description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Custom checks.
    #[must_use]
    pub fn checks(&self) -> &[FieldCheckFn] {
        &self.checks
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("rules", &self.rules)
            .field("omit_empty", &self.omit_empty)
            .field("checks", &self.checks.len())
            .finish()
    }
}

/// Declaration of a field, before its rules are parsed.
#[derive(Clone)]
pub struct FieldBuilder {
    name: String,
    ty: FieldType,
    rules: String,
    omit_empty: bool,
    description: Option<String>,
    checks: Vec<FieldCheckFn>,
}

impl FieldBuilder {
    /// Declare a field.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            rules: String::new(),
            omit_empty: false,
            description: None,
            checks: Vec::new(),
        }
    }

    /// Set the comma separated rule list, e.g. `"required,min=3"`.
    #[must_use]
    pub fn rules(mut self, rules: impl Into<String>) -> Self {
        self.rules = rules.into();
        self
    }

    /// Skip rules when the field is absent.
    #[must_use]
    pub fn omit_empty(mut self) -> Self {
        self.omit_empty = true;
        self
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a custom check.
    #[must_use]
    pub fn check<F>(mut self, check: F) -> Self
    where
        F: Fn(&Value, &ValidationContext<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.checks.push(Arc::new(check));
        self
    }

    fn build(self) -> Result<Field, ShapeError> {
        let rules = RuleSet::parse(&self.rules).map_err(|e| e.in_field(&self.name))?;
        Ok(Field {
            name: self.name,
            ty: self.ty,
            rules,
            omit_empty: self.omit_empty,
            description: self.description,
            checks: self.checks,
        })
    }
}

/// Runtime description of a typed record.
#[derive(Clone)]
pub struct Shape {
    name: String,
    description: Option<String>,
    fields: Vec<Field>,
    model_validators: Vec<ModelValidatorFn>,
}

impl Shape {
    /// Start building a shape.
    pub fn builder(name: impl Into<String>) -> ShapeBuilder {
        ShapeBuilder::new(name)
    }

    /// Shape name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shape description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by external name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether a field with this external name is declared.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// External field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Model-level validators.
    #[must_use]
    pub fn model_validators(&self) -> &[ModelValidatorFn] {
        &self.model_validators
    }

    /// Map of every field's zero value.
    #[must_use]
    pub fn zero_value(&self) -> Value {
        Value::Map(
            self.fields
                .iter()
                .map(|f| (f.name.clone(), f.ty.zero_value()))
                .collect(),
        )
    }

    /// Whether every key of `map` names a declared field.
    #[must_use]
    pub fn accepts_keys(&self, map: &ValueMap) -> bool {
        self.first_unknown_key(map).is_none()
    }

    /// The first key of `map` that names no declared field.
    #[must_use]
    pub fn first_unknown_key<'m>(&self, map: &'m ValueMap) -> Option<&'m str> {
        map.keys()
            .map(String::as_str)
            .find(|key| !self.has_field(key))
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("model_validators", &self.model_validators.len())
            .finish()
    }
}

/// Builder for [`Shape`].
#[derive(Clone)]
pub struct ShapeBuilder {
    name: String,
    description: Option<String>,
    fields: Vec<FieldBuilder>,
    model_validators: Vec<ModelValidatorFn>,
}

impl ShapeBuilder {
    /// Create a new builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
            model_validators: Vec::new(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a field with a rule list.
    #[must_use]
    pub fn field(self, name: impl Into<String>, ty: FieldType, rules: &str) -> Self {
        self.add(FieldBuilder::new(name, ty).rules(rules))
    }

    /// Add a field declaration.
    #[must_use]
    pub fn add(mut self, field: FieldBuilder) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a model-level validator.
    #[must_use]
    pub fn model_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&ValueMap, &ValidationContext<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.model_validators.push(Arc::new(validator));
        self
    }

    /// Run `T`'s [`SelfValidate`] impl as a model-level validator.
    ///
    /// The validated map is converted to `T` first; a conversion failure is
    /// reported as the validator's message.
    #[must_use]
    pub fn self_validating<T>(self) -> Self
    where
        T: SelfValidate + DeserializeOwned + 'static,
    {
        self.model_validator(|map, _ctx| {
            let json = serde_json::Value::from(Value::Map(map.clone()));
            let typed: T = serde_json::from_value(json).map_err(|e| e.to_string())?;
            typed.validate()
        })
    }

    /// Parse all rule lists and build the shape.
    pub fn build(self) -> Result<Shape, ShapeError> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(self.fields.len());
        for field in self.fields {
            if !seen.insert(field.name.clone()) {
                return Err(ShapeError::DuplicateField {
                    shape: self.name,
                    field: field.name,
                });
            }
            fields.push(field.build()?);
        }
        Ok(Shape {
            name: self.name,
            description: self.description,
            fields,
            model_validators: self.model_validators,
        })
    }
}

/// Types with a known declared [`FieldType`].
pub trait FieldTyped {
    /// The declared type.
    fn field_type() -> FieldType;
}

/// Records with a [`Shape`] descriptor.
///
/// Usually implemented with `#[derive(Shaped)]`.
pub trait Shaped: DeserializeOwned {
    /// The shape descriptor.
    fn shape() -> Arc<Shape>;
}

/// Records that check their own invariants after field validation.
pub trait SelfValidate {
    /// Return a message when an invariant does not hold.
    fn validate(&self) -> Result<(), String>;
}

macro_rules! int_field_type {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FieldTyped for $ty {
                fn field_type() -> FieldType {
                    #[allow(clippy::cast_lossless, clippy::cast_possible_wrap)]
                    let max = if (<$ty>::MAX as u128) > i64::MAX as u128 {
                        i64::MAX
                    } else {
                        <$ty>::MAX as i64
                    };
                    FieldType::Int(IntBounds::new($name, <$ty>::MIN as i64, max))
                }
            }
        )*
    };
}

int_field_type!(
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "int",
    isize => "isize",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    usize => "usize",
);

impl FieldTyped for bool {
    fn field_type() -> FieldType {
        FieldType::Bool
    }
}

impl FieldTyped for f32 {
    fn field_type() -> FieldType {
        FieldType::Float
    }
}

impl FieldTyped for f64 {
    fn field_type() -> FieldType {
        FieldType::Float
    }
}

impl FieldTyped for String {
    fn field_type() -> FieldType {
        FieldType::String
    }
}

impl FieldTyped for Value {
    fn field_type() -> FieldType {
        FieldType::Any
    }
}

impl FieldTyped for serde_json::Value {
    fn field_type() -> FieldType {
        FieldType::Any
    }
}

impl<T: FieldTyped> FieldTyped for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::list(T::field_type())
    }
}

impl<T: FieldTyped> FieldTyped for Option<T> {
    fn field_type() -> FieldType {
        FieldType::nullable(T::field_type())
    }
}

impl<T: FieldTyped> FieldTyped for Box<T> {
    fn field_type() -> FieldType {
        T::field_type()
    }
}

impl<V: FieldTyped, S> FieldTyped for HashMap<String, V, S> {
    fn field_type() -> FieldType {
        FieldType::map(V::field_type())
    }
}

impl<V: FieldTyped> FieldTyped for BTreeMap<String, V> {
    fn field_type() -> FieldType {
        FieldType::map(V::field_type())
    }
}

impl<V: FieldTyped, S> FieldTyped for IndexMap<String, V, S> {
    fn field_type() -> FieldType {
        FieldType::map(V::field_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn address() -> Shape {
        Shape::builder("Address")
            .field("street", FieldType::String, "required")
            .field("city", FieldType::String, "required")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_keeps_order() {
        let shape = Shape::builder("User")
            .field("name", FieldType::String, "required,min=1")
            .field("age", FieldType::int(), "gte=0")
            .add(FieldBuilder::new("nickname", FieldType::String).omit_empty())
            .build()
            .unwrap();
        let names: Vec<_> = shape.field_names().collect();
        assert_eq!(names, vec!["name", "age", "nickname"]);
        assert!(shape.field("name").unwrap().is_required());
        assert!(shape.field("nickname").unwrap().omit_empty());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = Shape::builder("Dup")
            .field("a", FieldType::String, "")
            .field("a", FieldType::int(), "")
            .build()
            .unwrap_err();
        assert!(matches!(err, ShapeError::DuplicateField { .. }));
    }

    #[test]
    fn test_bad_rule_names_field() {
        let err = Shape::builder("Bad")
            .field("age", FieldType::int(), "min=abc")
            .build()
            .unwrap_err();
        assert!(err.to_string().starts_with("Field 'age'"));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(<Vec<String>>::field_type().name(), "list<string>");
        assert_eq!(<Option<i64>>::field_type().name(), "optional<int>");
        assert_eq!(<HashMap<String, f64>>::field_type().name(), "map<string, float>");
        assert_eq!(u8::field_type().name(), "u8");
    }

    #[test]
    fn test_int_bounds() {
        let FieldType::Int(bounds) = u8::field_type() else {
            panic!("expected int");
        };
        assert_eq!((bounds.min, bounds.max), (0, 255));
        let FieldType::Int(bounds) = u64::field_type() else {
            panic!("expected int");
        };
        assert_eq!(bounds.max, i64::MAX);
        assert!(!IntBounds::I64.is_narrowed());
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(FieldType::String.zero_value(), Value::from(""));
        assert_eq!(FieldType::nullable(FieldType::int()).zero_value(), Value::Null);
        let nested = FieldType::structure(Arc::new(address()));
        assert_eq!(
            nested.zero_value(),
            Value::map([("street", Value::from("")), ("city", Value::from(""))])
        );
    }

    #[test]
    fn test_closed_world_keys() {
        let shape = address();
        let ok = Value::map([("street", Value::from("Main"))]);
        let extra = Value::map([("street", Value::from("Main")), ("zip", Value::from("1"))]);
        assert!(shape.accepts_keys(ok.as_map().unwrap()));
        assert_eq!(shape.first_unknown_key(extra.as_map().unwrap()), Some("zip"));
    }

    #[test]
    fn test_matches_kind() {
        assert!(FieldType::int().matches_kind(&Value::Int(3)));
        assert!(!FieldType::int().matches_kind(&Value::from("3")));
        assert!(!u8::field_type().matches_kind(&Value::Int(300)));
        assert!(FieldType::nullable(FieldType::Bool).matches_kind(&Value::Null));
    }
}
