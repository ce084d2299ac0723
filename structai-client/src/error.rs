//! Extraction error types.
//!
//! A failed extraction ends in exactly one of three ways, each a distinct
//! variant: the generator failed, every attempt failed validation, or the
//! call was cancelled before its next attempt.

use std::fmt;
use structai_core::ValidationErrors;
use structai_models::GeneratorError;
use structai_validate::OutputParseError;
use thiserror::Error;

use crate::run::RunState;

/// Why a single attempt was rejected.
#[derive(Debug, Error)]
pub enum AttemptFailure {
    /// The payload did not contain a decodable JSON value.
    #[error("response parse failed: {0}")]
    Parse(#[from] OutputParseError),

    /// The decoded value failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationErrors),
}

impl AttemptFailure {
    /// Validation errors, if this was a validation failure.
    #[must_use]
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            Self::Parse(_) => None,
        }
    }

    /// Whether the payload could not be parsed.
    #[must_use]
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    /// Number of individual problems.
    #[must_use]
    pub fn error_count(&self) -> usize {
        match self {
            Self::Validation(errors) => errors.len(),
            Self::Parse(_) => 1,
        }
    }
}

/// Why a call stopped before its next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The cancellation token fired.
    Cancelled,
    /// The deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// Terminal failure of an extraction call.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The generator could not produce a response. Never retried.
    #[error("generator failed on attempt {attempt}: {source}")]
    Generator {
        /// Attempt during which the generator failed.
        attempt: u32,
        /// Underlying generator error.
        #[source]
        source: GeneratorError,
    },

    /// Every allowed attempt failed parsing or validation.
    #[error("extraction failed after {attempts} {}: {last}", attempts_noun(.attempts))]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Failure of the final attempt.
        last: AttemptFailure,
    },

    /// Cancellation or deadline stopped the call before an attempt.
    #[error("extraction {reason} after {attempts} {}", attempts_noun(.attempts))]
    Cancelled {
        /// Attempts completed before stopping.
        attempts: u32,
        /// What stopped the call.
        reason: CancelReason,
    },

    /// The run was finished without output; its failure was already reported.
    #[error("extraction run ended in state '{state}' without output")]
    Incomplete {
        /// State the run ended in.
        state: RunState,
    },
}

fn attempts_noun(attempts: &u32) -> &'static str {
    if *attempts == 1 {
        "attempt"
    } else {
        "attempts"
    }
}

impl ExtractionError {
    /// Whether the generator failed.
    #[must_use]
    pub fn is_generator_error(&self) -> bool {
        matches!(self, Self::Generator { .. })
    }

    /// Whether all attempts were used up.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Whether the call was cancelled or timed out.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Attempts made before the call ended.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Generator { attempt, .. } => *attempt,
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts, .. } => *attempts,
            Self::Incomplete { .. } => 0,
        }
    }

    /// Failure of the final attempt, for exhausted calls.
    #[must_use]
    pub fn last_failure(&self) -> Option<&AttemptFailure> {
        match self {
            Self::Exhausted { last, .. } => Some(last),
            _ => None,
        }
    }

    /// Validation errors of the final attempt, if it got that far.
    #[must_use]
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        self.last_failure().and_then(AttemptFailure::validation_errors)
    }

    /// The generator error, if the generator failed.
    #[must_use]
    pub fn generator_error(&self) -> Option<&GeneratorError> {
        match self {
            Self::Generator { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for extraction calls.
pub type ExtractionResult<T> = Result<T, ExtractionError>;
