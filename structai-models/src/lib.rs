//! # structai-models
//!
//! The [`Generator`] abstraction consumed by the extraction client.
//!
//! A generator receives the conversation so far and a [`ResponseHint`]
//! describing the expected response, and answers with a [`RawResponse`]
//! carrying either text or an already-decoded value. Vendor clients live
//! outside this workspace; they only need to implement [`Generator`].
//!
//! For tests, [`MockGenerator`] replays queued responses and records every
//! request, and [`FunctionGenerator`] computes responses from a closure.
//!
//! ## Example
//!
//! ```rust
//! use structai_models::{Generator, MockGenerator, ResponseHint};
//! use structai_core::Message;
//!
//! # tokio_test::block_on(async {
//! let generator = MockGenerator::new("mock").with_text_response(r#"{"ok": true}"#);
//! let response = generator
//!     .generate(&[Message::user("Hello!")], &ResponseHint::new("Status"))
//!     .await
//!     .unwrap();
//! assert_eq!(response.payload_text(), r#"{"ok": true}"#);
//! # });
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod generator;
pub mod mock;

pub use error::{GeneratorError, GeneratorResult};
pub use generator::{BoxedGenerator, Generator, Payload, RawResponse, ResponseHint, ResponseKind};
pub use mock::{FunctionGenerator, GenerateFn, MockGenerator, RecordedCall};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        BoxedGenerator, FunctionGenerator, Generator, GeneratorError, MockGenerator, RawResponse,
        ResponseHint, ResponseKind,
    };
}
