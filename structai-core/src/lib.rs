//! # structai-core
//!
//! Core types shared by the structai crates.
//!
//! - **Values**: the untyped [`Value`] tree a generator payload decodes into
//! - **Paths**: [`FieldPath`] locating a value inside nested data
//! - **Errors**: [`ValidationError`] and the ordered [`ValidationErrors`] aggregate
//! - **Messages**: the [`Conversation`] transcript sent to a generator
//! - **Usage**: token accounting reported by generators
//!
//! ## Example
//!
//! ```rust
//! use structai_core::{FieldPath, Value, ValidationError, ValidationErrors};
//!
//! let raw = Value::from(serde_json::json!({"name": "Alice"}));
//! assert_eq!(raw.get("name"), Some(&Value::from("Alice")));
//!
//! let mut errors = ValidationErrors::new();
//! errors.add(ValidationError::required().at(FieldPath::root().child("email")));
//! assert_eq!(errors.to_string(), "email: field is required");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod errors;
pub mod identifier;
pub mod messages;
pub mod path;
pub mod usage;
pub mod value;

// Re-exports for convenience
pub use errors::{CandidateFailure, Constraint, ErrorKind, ValidationError, ValidationErrors};
pub use identifier::generate_run_id;
pub use messages::{Conversation, Message, MessageKind, Role};
pub use path::{FieldPath, PathSegment};
pub use usage::{ExtractionUsage, FinishReason, RequestUsage};
pub use value::{Value, ValueKind, ValueMap};
