//! Token usage and termination metadata reported by generators.
//!
//! The extraction engine treats these as opaque: it only accumulates them
//! across attempts so callers can see what a retried extraction cost.

use serde::{Deserialize, Serialize};

/// Token usage for a single generator call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestUsage {
    /// Prompt tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_tokens: Option<u64>,
    /// Completion tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_tokens: Option<u64>,
    /// Provider-specific usage details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl RequestUsage {
    /// Create an empty usage record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create usage with request and response tokens.
    #[must_use]
    pub fn with_tokens(request_tokens: u64, response_tokens: u64) -> Self {
        Self {
            request_tokens: Some(request_tokens),
            response_tokens: Some(response_tokens),
            details: None,
        }
    }

    /// Set details.
    #[must_use]
    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Total tokens.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.request_tokens.unwrap_or(0) + self.response_tokens.unwrap_or(0)
    }

    /// Whether no counts were reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.request_tokens.is_none() && self.response_tokens.is_none()
    }
}

/// Why the generator stopped producing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of output.
    Stop,
    /// Token limit reached.
    Length,
    /// Output was filtered.
    ContentFilter,
    /// Generator-specific reason.
    Other,
}

/// Usage accumulated over every attempt of an extraction call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionUsage {
    /// Per-attempt usage, in attempt order.
    pub requests: Vec<RequestUsage>,
    /// Sum of prompt tokens.
    pub total_request_tokens: u64,
    /// Sum of completion tokens.
    pub total_response_tokens: u64,
}

impl ExtractionUsage {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one attempt's usage.
    pub fn add_request(&mut self, usage: RequestUsage) {
        self.total_request_tokens += usage.request_tokens.unwrap_or(0);
        self.total_response_tokens += usage.response_tokens.unwrap_or(0);
        self.requests.push(usage);
    }

    /// Number of recorded generator calls.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    /// Sum of all tokens.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.total_request_tokens + self.total_response_tokens
    }
}
