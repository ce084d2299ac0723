//! Extraction client for structai.
//!
//! The client sends a prompt to a [`Generator`](structai_models::Generator),
//! validates the response against a shape and, when validation fails,
//! retries with the specific violations fed back into the conversation:
//!
//! - Each attempt goes through requesting, parsing and validating
//! - A failed attempt appends the previous output and a list of
//!   `path: message` violations, then asks again
//! - Generator errors end the call immediately and are never retried
//! - Cancellation and deadlines are checked before every attempt
//!
//! # Example
//!
//! ```rust,ignore
//! use structai_client::{ExtractionClient, ExtractionConfig};
//!
//! let client = ExtractionClient::new(generator)
//!     .with_config(ExtractionConfig::new().with_max_retries(3));
//!
//! match client.extract::<User>("Alice <alice@example.com>, 30").await {
//!     Ok(user) => println!("{:?} in {} attempts", user.output, user.attempts),
//!     Err(err) if err.is_exhausted() => eprintln!("gave up: {err}"),
//!     Err(err) => return Err(err.into()),
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod feedback;
pub mod result;
pub mod run;

#[cfg(test)]
mod testing;

pub use client::ExtractionClient;
pub use config::{CallOptions, ExtractionConfig};
pub use error::{AttemptFailure, CancelReason, ExtractionError, ExtractionResult};
pub use result::{AttemptOutcome, AttemptRecord, Extraction};
pub use run::{Converter, ExtractionRun, RunState};

/// Re-export of the cancellation token accepted by [`CallOptions`].
pub use tokio_util::sync::CancellationToken;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        CallOptions, CancellationToken, Extraction, ExtractionClient, ExtractionConfig,
        ExtractionError, RunState,
    };
}
