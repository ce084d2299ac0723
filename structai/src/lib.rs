//! # structai - Typed Extraction from LLM Output
//!
//! structai turns loosely formatted generator output into validated Rust
//! values. A record declares its fields, types and rules once; responses are
//! parsed, coerced and checked against that declaration, and when a response
//! fails, the violations are fed back to the generator and it is asked again.
//!
//! ## Quick Start
//!
//! ```ignore
//! use serde::Deserialize;
//! use structai::prelude::*;
//!
//! #[derive(Debug, Deserialize, Shaped)]
//! struct User {
//!     #[shape(rules = "required,min=1")]
//!     name: String,
//!     #[shape(rules = "required,email")]
//!     email: String,
//!     #[shape(rules = "gte=0,lte=150")]
//!     age: u32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ExtractionClient::new(my_generator())
//!         .with_config(ExtractionConfig::new().with_max_retries(3));
//!
//!     let user = client
//!         .extract::<User>("Alice, alice@example.com, 30 years old")
//!         .await?;
//!     println!("{:?} after {} attempt(s)", user.output, user.attempts);
//!     Ok(())
//! }
//! ```
//!
//! ## Key Features
//!
//! - **Rule lists** such as `required,min=3,email,oneof=a b c` parsed once per shape
//! - **Lax and strict coercion** of strings, numbers and booleans into declared types
//! - **Aggregated errors** with full field paths like `items[2].price`
//! - **Composite validators** for lists, maps, optionals and unions
//! - **Retry with feedback**: the previous output and every violation go back
//!   to the generator
//! - **Cancellation and deadlines** checked before each attempt
//!
//! ## Feature Flags
//!
//! | Feature | Description | Default |
//! |---------|-------------|--------|
//! | `macros` | `#[derive(Shaped)]` | ✅ |
//!
//! ## Architecture
//!
//! - [`structai_core`] - Values, field paths, validation errors, messages, usage
//! - [`structai_validate`] - Shapes, rules, coercion and composite validators
//! - [`structai_models`] - The generator abstraction and test generators
//! - [`structai_client`] - The extraction client and its retry state machine
//! - `structai_macros` - The `Shaped` derive
//!
//! ## Validating Without a Generator
//!
//! ```ignore
//! use structai::prelude::*;
//!
//! let raw = Value::from(serde_json::json!({"name": "Bob", "email": "bob@x.io", "age": "41"}));
//! let user: User = validate_as(&raw)?;
//! assert_eq!(user.age, 41);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Lets `#[derive(Shaped)]` name `::structai` from inside this crate too.
extern crate self as structai;

// ============================================================================
// Crate Re-exports
// ============================================================================

/// Values, paths, errors and messages.
pub use structai_core as core;

/// Shapes, rules, coercion and validators.
pub use structai_validate as validate;

/// Generator abstraction.
pub use structai_models as models;

/// Extraction client.
pub use structai_client as client;

// ============================================================================
// Macro Re-exports
// ============================================================================

/// Derive macro for shape descriptors.
#[cfg(feature = "macros")]
#[cfg_attr(docsrs, doc(cfg(feature = "macros")))]
pub use structai_macros::Shaped;

// ============================================================================
// Flat Re-exports
// ============================================================================

// Values and errors
pub use structai_core::{
    ErrorKind, FieldPath, PathSegment, ValidationError, ValidationErrors, Value, ValueKind,
    ValueMap,
};

// Messages and usage
pub use structai_core::{Conversation, ExtractionUsage, Message, MessageKind, RequestUsage, Role};

// Validation
pub use structai_validate::{
    from_validated, validate_as, validate_as_with, CoercionMode, DictOf, DiscriminatedUnion,
    FieldBuilder, FieldType, FieldTyped, ListOf, OptionalOf, SelfValidate, Shape, ShapeError,
    Shaped, StructValidator, TypeValidator, UnionOf, ValidationContext, ValidationMode, Validator,
};

// Generators
pub use structai_models::{
    BoxedGenerator, FunctionGenerator, Generator, GeneratorError, MockGenerator, RawResponse,
    ResponseHint, ResponseKind,
};

// Client
pub use structai_client::{
    AttemptFailure, CallOptions, CancelReason, CancellationToken, Extraction, ExtractionClient,
    ExtractionConfig, ExtractionError, ExtractionResult, RunState,
};

// ============================================================================
// Prelude
// ============================================================================

/// Everything needed to declare a shape and run an extraction.
pub mod prelude {
    pub use structai_core::{ValidationError, ValidationErrors, Value};

    pub use structai_validate::prelude::*;

    pub use structai_models::prelude::*;

    pub use structai_client::prelude::*;

    #[cfg(feature = "macros")]
    pub use structai_macros::Shaped;
}

// ============================================================================
// Version Information
// ============================================================================

/// Returns the current version of structai.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns version information as a tuple (major, minor, patch).
pub fn version_tuple() -> (u32, u32, u32) {
    let mut parts = version().split('.').map(|s| s.parse().unwrap_or(0));
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}
