//! Extraction configuration.
//!
//! [`ExtractionConfig`] holds client-wide defaults and can be deserialized
//! from any serde format. [`CallOptions`] overrides them for a single call
//! and carries its cancellation signal.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use structai_validate::{CoercionMode, ValidationMode};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Client-wide extraction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Total attempts per call, first included. 0 is treated as 1.
    pub max_retries: u32,
    /// When false, every call makes exactly one attempt.
    pub retry_enabled: bool,
    /// Reject cross-kind values instead of coercing them.
    pub strict_validation: bool,
    /// Validation mode for produced values.
    pub mode: ValidationMode,
    /// System instruction placed before the prompt.
    pub system_prompt: Option<String>,
    /// Append the response JSON Schema to the instructions.
    pub include_schema_hint: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_enabled: true,
            strict_validation: false,
            mode: ValidationMode::Validation,
            system_prompt: None,
            include_schema_hint: true,
        }
    }
}

impl ExtractionConfig {
    /// Create a new default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Config that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new().with_retry_enabled(false)
    }

    /// Set total attempts per call.
    #[must_use]
    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Enable or disable retries.
    #[must_use]
    pub fn with_retry_enabled(mut self, enabled: bool) -> Self {
        self.retry_enabled = enabled;
        self
    }

    /// Enable or disable strict validation.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict_validation = strict;
        self
    }

    /// Set the validation mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the system instruction.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Include or omit the schema in the instructions.
    #[must_use]
    pub fn with_schema_hint(mut self, include: bool) -> Self {
        self.include_schema_hint = include;
        self
    }

    /// Attempts a call may make.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        if self.retry_enabled {
            self.max_retries.max(1)
        } else {
            1
        }
    }

    /// Merge per-call overrides into effective settings.
    pub(crate) fn resolve(&self, options: &CallOptions) -> RunSettings {
        let mut config = self.clone();
        if let Some(strict) = options.strict {
            config.strict_validation = strict;
        }
        if let Some(mode) = options.mode {
            config.mode = mode;
        }
        if let Some(n) = options.max_retries {
            config.max_retries = n;
        }
        if let Some(prompt) = &options.system_prompt {
            config.system_prompt = Some(prompt.clone());
        }
        RunSettings {
            max_attempts: config.max_attempts(),
            coercion: CoercionMode::from_strict(config.strict_validation),
            mode: config.mode,
            system_prompt: config.system_prompt,
            include_schema_hint: config.include_schema_hint,
            cancellation: options.cancellation.clone(),
            deadline: options.deadline,
        }
    }
}

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Override strict validation.
    pub strict: Option<bool>,
    /// Override the validation mode.
    pub mode: Option<ValidationMode>,
    /// Override total attempts.
    pub max_retries: Option<u32>,
    /// Override the system instruction.
    pub system_prompt: Option<String>,
    /// Stops the call before its next attempt once cancelled.
    pub cancellation: Option<CancellationToken>,
    /// No attempt starts after this instant.
    pub deadline: Option<Instant>,
}

impl CallOptions {
    /// Create empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override strict validation.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    /// Override the validation mode.
    #[must_use]
    pub fn mode(mut self, mode: ValidationMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Override total attempts.
    #[must_use]
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Override the system instruction.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set an absolute deadline.
    #[must_use]
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now.
    #[must_use]
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(Instant::now() + timeout)
    }
}

/// Effective settings of one call.
#[derive(Debug, Clone)]
pub(crate) struct RunSettings {
    pub max_attempts: u32,
    pub coercion: CoercionMode,
    pub mode: ValidationMode,
    pub system_prompt: Option<String>,
    pub include_schema_hint: bool,
    pub cancellation: Option<CancellationToken>,
    pub deadline: Option<Instant>,
}

impl RunSettings {
    pub fn is_strict(&self) -> bool {
        self.coercion == CoercionMode::Strict
    }
}
