//! # structai-validate
//!
//! Validation engine for typed extraction.
//!
//! A raw [`Value`](structai_core::Value) decoded from a generator payload is
//! checked against a declared [`Shape`] and converted into a validated
//! value tree, or rejected with an ordered
//! [`ValidationErrors`](structai_core::ValidationErrors) aggregate.
//!
//! ## Core Concepts
//!
//! - **[`Shape`]**: field names, declared types and rule lists of a record
//! - **[`RuleSet`]**: rule lists such as `"required,min=3,email"`, parsed once
//! - **[`coerce()`]**: strict or lax conversion of raw values into declared types
//! - **[`StructValidator`]**: field-by-field validation with model-level checks
//! - **Composites**: [`ListOf`], [`DictOf`], [`OptionalOf`], [`UnionOf`],
//!   [`DiscriminatedUnion`]
//! - **[`ValidationContext`]**: call-scoped path, mode and sibling state
//!
//! ## Example
//!
//! ```rust
//! use structai_validate::{FieldType, Shape, StructValidator, Validator};
//! use structai_core::Value;
//! use std::sync::Arc;
//!
//! let shape = Shape::builder("User")
//!     .field("name", FieldType::String, "required,min=1")
//!     .field("age", FieldType::int(), "gte=0,lte=150")
//!     .build()
//!     .unwrap();
//!
//! let validator = StructValidator::new(Arc::new(shape));
//! let raw = Value::from(serde_json::json!({"name": "Alice", "age": "30"}));
//! let value = validator.check(&raw).unwrap();
//! assert_eq!(value.get("age"), Some(&Value::Int(30)));
//!
//! let bad = Value::from(serde_json::json!({"age": -1}));
//! let errors = validator.check(&bad).unwrap_err();
//! assert_eq!(errors.len(), 2);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod coerce;
pub mod composite;
pub mod context;
pub mod error;
pub mod parser;
pub mod rules;
pub mod schema;
pub mod shape;
pub mod structure;
pub mod validator;

// Re-exports
pub use coerce::{coerce, parse_bool};
pub use composite::{
    DictOf, DiscriminatedMatch, DiscriminatedUnion, ListOf, OptionalOf, UnionCandidate,
    UnionMatch, UnionOf,
};
pub use context::{Checkpoint, CoercionMode, ValidationContext, ValidationMode};
pub use error::{OutputParseError, ShapeError};
pub use parser::{extract_json_from_text, parse_value_from_text};
pub use rules::{Rule, RuleSet, RuleSpec};
pub use schema::apply_rules;
pub use shape::{
    Field, FieldBuilder, FieldCheckFn, FieldType, FieldTyped, IntBounds, ModelValidatorFn,
    SelfValidate, Shape, ShapeBuilder, Shaped,
};
pub use structure::{validate_struct, StructValidator};
pub use validator::{
    from_validated, validate_as, validate_as_with, BoxedValidator, FnValidator, TypeValidator,
    Validator,
};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        validate_as, CoercionMode, DictOf, DiscriminatedUnion, FieldBuilder, FieldType,
        FieldTyped, ListOf, OptionalOf, SelfValidate, Shape, Shaped, StructValidator,
        TypeValidator, UnionOf, ValidationContext, ValidationMode, Validator,
    };
}
