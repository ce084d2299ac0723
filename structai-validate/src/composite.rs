//! Composite validators.
//!
//! These wrap other validators: homogeneous lists and maps, optional values,
//! ordered unions and tag-dispatched unions.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{json, Value as JsonValue};
use structai_core::{
    CandidateFailure, ErrorKind, PathSegment, ValidationError, ValidationErrors, Value, ValueKind,
    ValueMap,
};
use tracing::trace;

use crate::coerce::coerce;
use crate::context::{CoercionMode, ValidationContext};
use crate::shape::{FieldType, Shape, Shaped};
use crate::structure::{validate_struct, StructValidator};
use crate::validator::{BoxedValidator, Validator};

/// Size bound violations of a list or map.
fn cardinality(
    len: usize,
    min: usize,
    max: Option<usize>,
    unit: &str,
    raw: &Value,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if len < min {
        errors.add(ValidationError::constraint(
            "min_items",
            Some(min.to_string()),
            format!("must contain at least {min} {unit}"),
            raw,
        ));
    }
    if let Some(max) = max.filter(|max| len > *max) {
        errors.add(ValidationError::constraint(
            "max_items",
            Some(max.to_string()),
            format!("must contain at most {max} {unit}"),
            raw,
        ));
    }
    errors
}

/// Validates every element of a list.
#[derive(Clone)]
pub struct ListOf {
    item: BoxedValidator,
    min_items: usize,
    max_items: Option<usize>,
}

impl ListOf {
    /// List of `item`.
    pub fn new(item: impl Validator + 'static) -> Self {
        Self {
            item: Arc::new(item),
            min_items: 0,
            max_items: None,
        }
    }

    /// List of a [`Shaped`] record.
    #[must_use]
    pub fn of<T: Shaped>() -> Self {
        Self::new(StructValidator::of::<T>())
    }

    /// Require at least `n` elements.
    #[must_use]
    pub fn min_items(mut self, n: usize) -> Self {
        self.min_items = n;
        self
    }

    /// Allow at most `n` elements.
    #[must_use]
    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }
}

impl Validator for ListOf {
    fn validate(
        &self,
        raw: &Value,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<Value, ValidationErrors> {
        let Some(items) = raw.as_list() else {
            return Err(ValidationError::coercion(raw, self.describe()).into());
        };

        let mut errors = cardinality(items.len(), self.min_items, self.max_items, "items", raw);

        let mut out = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match ctx.scoped(index, |ctx| self.item.validate(item, ctx)) {
                Ok(value) => out.push(value),
                Err(item_errors) => errors.merge(item_errors.prefixed(index)),
            }
        }
        errors.into_result(Value::List(out))
    }

    fn describe(&self) -> String {
        format!("list<{}>", self.item.describe())
    }

    fn json_schema(&self) -> JsonValue {
        let mut schema = json!({"type": "array", "items": self.item.json_schema()});
        if self.min_items > 0 {
            schema["minItems"] = json!(self.min_items);
        }
        if let Some(max) = self.max_items {
            schema["maxItems"] = json!(max);
        }
        schema
    }
}

impl std::fmt::Debug for ListOf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListOf")
            .field("item", &self.item.describe())
            .field("min_items", &self.min_items)
            .field("max_items", &self.max_items)
            .finish()
    }
}

/// Validates every value of a string-keyed map.
///
/// Keys are kept as strings. With a non-string key type each key is coerced
/// leniently and stored in its normalised form, so `"007"` under an integer
/// key type becomes `"7"`.
#[derive(Clone)]
pub struct DictOf {
    key: FieldType,
    value: BoxedValidator,
    min_items: usize,
    max_items: Option<usize>,
}

impl DictOf {
    /// Map of string to `value`.
    pub fn new(value: impl Validator + 'static) -> Self {
        Self {
            key: FieldType::String,
            value: Arc::new(value),
            min_items: 0,
            max_items: None,
        }
    }

    /// Require at least `n` entries.
    #[must_use]
    pub fn min_items(mut self, n: usize) -> Self {
        self.min_items = n;
        self
    }

    /// Allow at most `n` entries.
    #[must_use]
    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }

    /// Declare the key type.
    #[must_use]
    pub fn key_type(mut self, key: FieldType) -> Self {
        self.key = key;
        self
    }

    fn normalize_key(
        &self,
        key: &str,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<String, ValidationErrors> {
        if matches!(self.key, FieldType::String) {
            return Ok(key.to_string());
        }
        let raw_key = Value::from(key);
        ctx.with_coercion_mode(CoercionMode::Lax, |ctx| coerce(&raw_key, &self.key, ctx))
            .map(|k| k.to_plain_string())
    }
}

impl Validator for DictOf {
    fn validate(
        &self,
        raw: &Value,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<Value, ValidationErrors> {
        let Some(entries) = raw.as_map() else {
            return Err(ValidationError::coercion(raw, self.describe()).into());
        };

        let mut errors =
            cardinality(entries.len(), self.min_items, self.max_items, "entries", raw);
        let mut out = ValueMap::with_capacity(entries.len());
        for (key, value) in entries {
            let segment = PathSegment::key(key);
            let result = ctx.scoped(segment.clone(), |ctx| {
                let normalized = self.normalize_key(key, ctx)?;
                let validated = self.value.validate(value, ctx)?;
                Ok::<_, ValidationErrors>((normalized, validated))
            });
            match result {
                Ok((normalized, validated)) => {
                    out.insert(normalized, validated);
                }
                Err(entry_errors) => errors.merge(entry_errors.prefixed(segment)),
            }
        }
        errors.into_result(Value::Map(out))
    }

    fn describe(&self) -> String {
        format!("map<{}, {}>", self.key.name(), self.value.describe())
    }

    fn json_schema(&self) -> JsonValue {
        let mut schema =
            json!({"type": "object", "additionalProperties": self.value.json_schema()});
        if self.min_items > 0 {
            schema["minProperties"] = json!(self.min_items);
        }
        if let Some(max) = self.max_items {
            schema["maxProperties"] = json!(max);
        }
        schema
    }
}

impl std::fmt::Debug for DictOf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictOf")
            .field("key", &self.key)
            .field("value", &self.value.describe())
            .field("min_items", &self.min_items)
            .field("max_items", &self.max_items)
            .finish()
    }
}

/// Accepts absence or null, otherwise delegates.
#[derive(Clone)]
pub struct OptionalOf {
    inner: BoxedValidator,
}

impl OptionalOf {
    /// Optional `inner`.
    pub fn new(inner: impl Validator + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Validate a possibly absent value.
    pub fn resolve(
        &self,
        raw: Option<&Value>,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<Option<Value>, ValidationErrors> {
        match raw {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.inner.validate(value, ctx).map(Some),
        }
    }
}

impl Validator for OptionalOf {
    fn validate(
        &self,
        raw: &Value,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<Value, ValidationErrors> {
        Ok(self.resolve(Some(raw), ctx)?.unwrap_or(Value::Null))
    }

    fn describe(&self) -> String {
        format!("optional<{}>", self.inner.describe())
    }

    fn json_schema(&self) -> JsonValue {
        json!({"anyOf": [self.inner.json_schema(), {"type": "null"}]})
    }
}

impl std::fmt::Debug for OptionalOf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("OptionalOf")
            .field(&self.inner.describe())
            .finish()
    }
}

/// One alternative of a [`UnionOf`].
#[derive(Clone)]
pub enum UnionCandidate {
    /// A record; only maps whose keys are all declared fields are tried.
    Struct(Arc<Shape>),
    /// A scalar type; exact kind first, then the conversion lattice.
    Scalar(FieldType),
    /// Any other validator.
    Custom(BoxedValidator),
}

impl UnionCandidate {
    /// Candidate name used in rejection reasons.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            UnionCandidate::Struct(shape) => shape.name().to_string(),
            UnionCandidate::Scalar(ty) => ty.name(),
            UnionCandidate::Custom(validator) => validator.describe(),
        }
    }

    fn json_schema(&self) -> JsonValue {
        match self {
            UnionCandidate::Struct(shape) => shape.json_schema(),
            UnionCandidate::Scalar(ty) => ty.json_schema(),
            UnionCandidate::Custom(validator) => validator.json_schema(),
        }
    }

    fn attempt(&self, raw: &Value, ctx: &mut ValidationContext<'_>) -> Result<Value, String> {
        match self {
            UnionCandidate::Struct(shape) => {
                let Some(map) = raw.as_map() else {
                    return Err(format!("expected object, got {}", raw.type_name()));
                };
                if let Some(key) = shape.first_unknown_key(map) {
                    return Err(format!("unknown field '{key}'"));
                }
                validate_struct(shape, raw, ctx).map_err(|e| flatten(&e))
            }
            UnionCandidate::Scalar(ty) => {
                if ty.matches_kind(raw) {
                    return ctx
                        .with_coercion_mode(CoercionMode::Strict, |ctx| coerce(raw, ty, ctx))
                        .map_err(|e| flatten(&e));
                }
                if !ctx.is_strict() && lattice_allows(raw.kind(), ty) {
                    return ctx
                        .with_coercion_mode(CoercionMode::Lax, |ctx| coerce(raw, ty, ctx))
                        .map_err(|e| flatten(&e));
                }
                Err(format!("expected {}, got {}", ty.name(), raw.type_name()))
            }
            UnionCandidate::Custom(validator) => {
                validator.validate(raw, ctx).map_err(|e| flatten(&e))
            }
        }
    }
}

/// Conversions a scalar union candidate may apply after an exact-kind miss.
fn lattice_allows(from: ValueKind, to: &FieldType) -> bool {
    match to {
        FieldType::Nullable(inner) => lattice_allows(from, inner),
        FieldType::Int(_) | FieldType::Float => {
            matches!(from, ValueKind::String | ValueKind::Int | ValueKind::Float)
        }
        FieldType::Bool => from == ValueKind::String,
        _ => false,
    }
}

fn flatten(errors: &ValidationErrors) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A union match: which candidate won and its validated value.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionMatch {
    /// Index of the winning candidate.
    pub index: usize,
    /// Name of the winning candidate.
    pub candidate: String,
    /// Validated value.
    pub value: Value,
}

/// Tries candidates in declaration order; the first success wins.
#[derive(Clone, Default)]
pub struct UnionOf {
    candidates: Vec<UnionCandidate>,
}

impl UnionOf {
    /// Empty union.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record candidate.
    #[must_use]
    pub fn shape(mut self, shape: Arc<Shape>) -> Self {
        self.candidates.push(UnionCandidate::Struct(shape));
        self
    }

    /// Add a [`Shaped`] record candidate.
    #[must_use]
    pub fn or<T: Shaped>(self) -> Self {
        self.shape(T::shape())
    }

    /// Add a scalar candidate.
    #[must_use]
    pub fn scalar(mut self, ty: FieldType) -> Self {
        self.candidates.push(UnionCandidate::Scalar(ty));
        self
    }

    /// Add any validator as a candidate.
    #[must_use]
    pub fn custom(mut self, validator: impl Validator + 'static) -> Self {
        self.candidates
            .push(UnionCandidate::Custom(Arc::new(validator)));
        self
    }

    /// Candidates in declaration order.
    #[must_use]
    pub fn candidates(&self) -> &[UnionCandidate] {
        &self.candidates
    }

    /// Find the first candidate accepting `raw`.
    pub fn resolve(
        &self,
        raw: &Value,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<UnionMatch, ValidationErrors> {
        let mut reasons = Vec::with_capacity(self.candidates.len());
        for (index, candidate) in self.candidates.iter().enumerate() {
            let checkpoint = ctx.checkpoint();
            match candidate.attempt(raw, ctx) {
                Ok(value) => {
                    trace!(index, candidate = %candidate.name(), "union candidate matched");
                    return Ok(UnionMatch {
                        index,
                        candidate: candidate.name(),
                        value,
                    });
                }
                Err(reason) => {
                    ctx.rollback(checkpoint);
                    reasons.push(CandidateFailure::new(candidate.name(), reason));
                }
            }
        }

        let summary = reasons
            .iter()
            .map(|r| format!("{}: {}", r.candidate, r.reason))
            .collect::<Vec<_>>()
            .join("; ");
        Err(ValidationError::new(
            ErrorKind::UnionNoCandidateMatched { reasons },
            format!("value did not match any union candidate ({summary})"),
        )
        .with_value(raw.clone())
        .into())
    }
}

impl Validator for UnionOf {
    fn validate(
        &self,
        raw: &Value,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<Value, ValidationErrors> {
        self.resolve(raw, ctx).map(|m| m.value)
    }

    fn describe(&self) -> String {
        let names: Vec<_> = self.candidates.iter().map(UnionCandidate::name).collect();
        format!("union<{}>", names.join(" | "))
    }

    fn json_schema(&self) -> JsonValue {
        let schemas: Vec<_> = self
            .candidates
            .iter()
            .map(UnionCandidate::json_schema)
            .collect();
        json!({"anyOf": schemas})
    }
}

impl std::fmt::Debug for UnionOf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// A discriminated match: the tag value and the validated record.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscriminatedMatch {
    /// Discriminator value that selected the variant.
    pub key: String,
    /// Validated value.
    pub value: Value,
}

/// Selects exactly one variant by the string value of a tag field.
#[derive(Clone)]
pub struct DiscriminatedUnion {
    field: String,
    variants: IndexMap<String, Arc<Shape>>,
}

impl DiscriminatedUnion {
    /// Union dispatched on `field`.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            variants: IndexMap::new(),
        }
    }

    /// Map a tag value to a shape.
    #[must_use]
    pub fn variant(mut self, key: impl Into<String>, shape: Arc<Shape>) -> Self {
        self.variants.insert(key.into(), shape);
        self
    }

    /// Map a tag value to a [`Shaped`] record.
    #[must_use]
    pub fn variant_of<T: Shaped>(self, key: impl Into<String>) -> Self {
        self.variant(key, T::shape())
    }

    /// Discriminator field name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Select and validate the variant named by `raw`'s tag.
    pub fn resolve(
        &self,
        raw: &Value,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<DiscriminatedMatch, ValidationErrors> {
        let Some(map) = raw.as_map() else {
            return Err(ValidationError::coercion(raw, "object").into());
        };
        let field = self.field.as_str();

        let Some(tag) = map.get(field) else {
            return Err(ValidationError::new(
                ErrorKind::MissingDiscriminator {
                    field: field.to_string(),
                },
                format!("discriminator field '{field}' is missing"),
            )
            .prefixed(field)
            .into());
        };

        let Some(key) = tag.as_str() else {
            return Err(ValidationError::new(
                ErrorKind::NonStringDiscriminator {
                    field: field.to_string(),
                },
                format!("discriminator must be a string, got {}", tag.type_name()),
            )
            .with_value(tag.clone())
            .prefixed(field)
            .into());
        };

        let Some(shape) = self.variants.get(key) else {
            let expected: Vec<_> = self.variants.keys().map(String::as_str).collect();
            return Err(ValidationError::new(
                ErrorKind::UnknownDiscriminatorValue {
                    field: field.to_string(),
                    value: key.to_string(),
                },
                format!(
                    "unknown discriminator value '{key}', expected one of [{}]",
                    expected.join(", ")
                ),
            )
            .with_value(tag.clone())
            .prefixed(field)
            .into());
        };

        trace!(field, key, shape = shape.name(), "discriminator selected variant");
        let value = validate_struct(shape, raw, ctx)?;
        Ok(DiscriminatedMatch {
            key: key.to_string(),
            value,
        })
    }
}

impl Validator for DiscriminatedUnion {
    fn validate(
        &self,
        raw: &Value,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<Value, ValidationErrors> {
        self.resolve(raw, ctx).map(|m| m.value)
    }

    fn describe(&self) -> String {
        let names: Vec<_> = self.variants.values().map(|s| s.name()).collect();
        format!("union<{}> by {}", names.join(" | "), self.field)
    }

    fn json_schema(&self) -> JsonValue {
        let schemas: Vec<_> = self.variants.values().map(|s| s.json_schema()).collect();
        json!({
            "oneOf": schemas,
            "discriminator": {"propertyName": self.field},
        })
    }
}

impl std::fmt::Debug for DiscriminatedUnion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscriminatedUnion")
            .field("field", &self.field)
            .field("variants", &self.variants.keys().collect::<Vec<_>>())
            .finish()
    }
}
