//! Validation error model.
//!
//! A [`ValidationError`] describes one failure at one field path. A
//! [`ValidationErrors`] collects every failure of a validation call in
//! order; nested validators prefix their children's paths before merging
//! them into the parent's aggregate.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::path::{FieldPath, PathSegment};
use crate::value::Value;

/// Machine-readable failure category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorKind {
    /// A required field was absent.
    RequiredFieldMissing,
    /// A raw value could not be converted to the declared type.
    TypeCoercionFailed {
        /// Runtime kind of the raw value.
        source: String,
        /// Declared target type.
        target: String,
    },
    /// A declared rule rejected the value.
    ConstraintViolated {
        /// Rule name, e.g. `min`.
        rule: String,
        /// Rule parameter, if any.
        param: Option<String>,
    },
    /// The discriminator field was absent.
    MissingDiscriminator {
        /// Discriminator field name.
        field: String,
    },
    /// The discriminator field was present but not a string.
    NonStringDiscriminator {
        /// Discriminator field name.
        field: String,
    },
    /// The discriminator value has no mapped variant.
    UnknownDiscriminatorValue {
        /// Discriminator field name.
        field: String,
        /// The unmapped value.
        value: String,
    },
    /// No union candidate accepted the value.
    UnionNoCandidateMatched {
        /// Why each candidate was rejected, in declaration order.
        reasons: Vec<CandidateFailure>,
    },
    /// A model-level (cross-field) invariant failed.
    ModelLevelInvariantViolated,
    /// A custom field check failed.
    CheckFailed,
}

impl ErrorKind {
    /// Stable snake_case code for this kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::RequiredFieldMissing => "required_field_missing",
            ErrorKind::TypeCoercionFailed { .. } => "type_coercion_failed",
            ErrorKind::ConstraintViolated { .. } => "constraint_violated",
            ErrorKind::MissingDiscriminator { .. } => "missing_discriminator",
            ErrorKind::NonStringDiscriminator { .. } => "non_string_discriminator",
            ErrorKind::UnknownDiscriminatorValue { .. } => "unknown_discriminator_value",
            ErrorKind::UnionNoCandidateMatched { .. } => "union_no_candidate_matched",
            ErrorKind::ModelLevelInvariantViolated => "model_level_invariant_violated",
            ErrorKind::CheckFailed => "check_failed",
        }
    }
}

/// Why a single union candidate was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFailure {
    /// Candidate description (shape name or type).
    pub candidate: String,
    /// Rejection reason.
    pub reason: String,
}

impl CandidateFailure {
    /// Create a new candidate failure.
    pub fn new(candidate: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            reason: reason.into(),
        }
    }
}

/// A violated rule, as declared in the shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// Rule name.
    pub name: String,
    /// Rule parameter.
    pub param: Option<String>,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.param {
            Some(param) => write!(f, "{}={}", self.name, param),
            None => f.write_str(&self.name),
        }
    }
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{}", located(.path, .message))]
pub struct ValidationError {
    /// Where the failure occurred, relative to the validated root.
    pub path: FieldPath,
    /// Human readable message.
    pub message: String,
    /// Failure category.
    pub kind: ErrorKind,
    /// The offending value, when one was present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ValidationError {
    /// Create a path-less error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            path: FieldPath::root(),
            message: message.into(),
            kind,
            value: None,
        }
    }

    /// A required field is missing.
    #[must_use]
    pub fn required() -> Self {
        Self::new(ErrorKind::RequiredFieldMissing, "field is required")
    }

    /// A value could not be coerced from `value`'s kind to `target`.
    pub fn coercion(value: &Value, target: impl Into<String>) -> Self {
        let target = target.into();
        let source = value.type_name().to_string();
        Self::new(
            ErrorKind::TypeCoercionFailed {
                source: source.clone(),
                target: target.clone(),
            },
            format!("cannot convert {source} to {target}"),
        )
        .with_value(value.clone())
    }

    /// A rule rejected the value.
    pub fn constraint(
        rule: impl Into<String>,
        param: Option<String>,
        message: impl Into<String>,
        value: &Value,
    ) -> Self {
        Self::new(
            ErrorKind::ConstraintViolated {
                rule: rule.into(),
                param,
            },
            message,
        )
        .with_value(value.clone())
    }

    /// A model-level invariant failed.
    pub fn model(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ModelLevelInvariantViolated, message)
    }

    /// Attach the offending value.
    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Replace the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Replace the path.
    #[must_use]
    pub fn at(mut self, path: FieldPath) -> Self {
        self.path = path;
        self
    }

    /// Prefix the path with a single segment.
    #[must_use]
    pub fn prefixed(mut self, segment: impl Into<PathSegment>) -> Self {
        self.path.prepend(&FieldPath::from_segments([segment.into()]));
        self
    }

    /// The violated constraint, for `ConstraintViolated` errors.
    #[must_use]
    pub fn constraint_descriptor(&self) -> Option<Constraint> {
        match &self.kind {
            ErrorKind::ConstraintViolated { rule, param } => Some(Constraint {
                name: rule.clone(),
                param: param.clone(),
            }),
            _ => None,
        }
    }

    /// Dotted path string, empty at the root.
    #[must_use]
    pub fn path_string(&self) -> String {
        self.path.to_string()
    }
}

fn located(path: &FieldPath, message: &str) -> String {
    if path.is_root() {
        message.to_string()
    } else {
        format!("{path}: {message}")
    }
}

/// Ordered collection of validation failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Error)]
#[serde(transparent)]
#[error("{}", render_numbered(.errors))]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collection holding one error.
    #[must_use]
    pub fn single(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    /// Add an error.
    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Whether any error was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate over errors in order.
    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.errors.iter()
    }

    /// Borrow the errors.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// First recorded error.
    #[must_use]
    pub fn first(&self) -> Option<&ValidationError> {
        self.errors.first()
    }

    /// Prefix every error's path with `segment`.
    pub fn prefix(&mut self, segment: impl Into<PathSegment>) {
        let prefix = FieldPath::from_segments([segment.into()]);
        for error in &mut self.errors {
            error.path.prepend(&prefix);
        }
    }

    /// Consuming variant of [`prefix`](Self::prefix).
    #[must_use]
    pub fn prefixed(mut self, segment: impl Into<PathSegment>) -> Self {
        self.prefix(segment);
        self
    }

    /// Append all errors from `other`, keeping order.
    pub fn merge(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    /// `Ok(value)` when empty, otherwise `Err(self)`.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    /// Whether any error has the given kind code.
    #[must_use]
    pub fn contains_code(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.kind.code() == code)
    }

    /// Find the first error at a rendered path.
    #[must_use]
    pub fn at_path(&self, path: &str) -> Option<&ValidationError> {
        self.errors.iter().find(|e| e.path.to_string() == path)
    }

    /// Consume into the inner vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<ValidationError> {
        self.errors
    }
}

/// One line per error, numbered when there is more than one.
fn render_numbered(errors: &[ValidationError]) -> String {
    match errors {
        [] => "no validation errors".to_string(),
        [only] => only.to_string(),
        many => many
            .iter()
            .enumerate()
            .map(|(i, error)| format!("{}. {error}", i + 1))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self::single(error)
    }
}

impl FromIterator<ValidationError> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = ValidationError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl Extend<ValidationError> for ValidationErrors {
    fn extend<I: IntoIterator<Item = ValidationError>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
