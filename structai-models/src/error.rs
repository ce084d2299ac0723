//! Generator error types.
//!
//! These describe why a generator could not produce a response at all. They
//! are distinct from validation failures: the extraction engine never retries
//! them and never folds them into a `ValidationErrors` aggregate.

use std::time::Duration;
use thiserror::Error;

/// Generator-level failures.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// HTTP error from the backing service.
    #[error("HTTP error: {status} - {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Provider reported an error.
    #[error("API error: {message}")]
    Api {
        /// Error message.
        message: String,
        /// Provider error code.
        code: Option<String>,
    },

    /// Transport failed before a response arrived.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request timeout.
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    /// Rate limited by the provider.
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Suggested retry delay.
        retry_after: Option<Duration>,
    },

    /// The provider answered with something that is not a response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A scripted generator ran out of responses.
    #[error("No response queued for call {call}")]
    Exhausted {
        /// 1-based call number that found the queue empty.
        call: usize,
    },

    /// Other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GeneratorError {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create an API error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            code: None,
        }
    }

    /// Create an API error with code.
    pub fn api_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// Create an HTTP error.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Create a rate limited error.
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Create an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Whether a caller-side retry layer could reasonably try again.
    ///
    /// The extraction engine itself never does.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            GeneratorError::Timeout(_)
            | GeneratorError::RateLimited { .. }
            | GeneratorError::Transport(_) => true,
            GeneratorError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get the retry-after duration if applicable.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GeneratorError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type for generator operations.
pub type GeneratorResult<T> = Result<T, GeneratorError>;
