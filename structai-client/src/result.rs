//! Extraction results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use structai_core::{Conversation, ExtractionUsage, RequestUsage};
use structai_models::RawResponse;

/// How one attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The response validated.
    Succeeded,
    /// The payload held no decodable JSON.
    ParseFailed,
    /// The decoded value failed validation.
    ValidationFailed,
    /// The generator returned an error.
    GeneratorFailed,
}

/// One entry of the attempt history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Attempt number, starting at 1.
    pub attempt: u32,
    /// How the attempt ended.
    pub outcome: AttemptOutcome,
    /// Rendered failure, when the attempt failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of individual problems found.
    pub error_count: usize,
    /// Usage reported for this attempt.
    #[serde(default)]
    pub usage: RequestUsage,
    /// When the attempt finished.
    pub finished_at: DateTime<Utc>,
}

impl AttemptRecord {
    /// Whether the attempt succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome == AttemptOutcome::Succeeded
    }
}

/// Result of a successful extraction.
#[derive(Debug, Clone)]
pub struct Extraction<T> {
    /// The validated output.
    pub output: T,
    /// Attempts made, the successful one included.
    pub attempts: u32,
    /// Usage accumulated over every attempt.
    pub usage: ExtractionUsage,
    /// Run identifier, also present in log events.
    pub run_id: String,
    /// One record per attempt.
    pub history: Vec<AttemptRecord>,
    /// The transcript as sent on the final attempt.
    pub transcript: Conversation,
    /// The response that validated.
    pub response: RawResponse,
}

impl<T> Extraction<T> {
    /// Get the output.
    pub fn output(&self) -> &T {
        &self.output
    }

    /// Consume and return output.
    pub fn into_output(self) -> T {
        self.output
    }

    /// Whether more than one attempt was needed.
    #[must_use]
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Records of the attempts that failed.
    pub fn failed_attempts(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.history.iter().filter(|record| !record.succeeded())
    }
}
