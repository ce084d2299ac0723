//! Extraction run execution.
//!
//! An [`ExtractionRun`] drives one call through its states:
//!
//! ```text
//! Requesting -> Parsing -> Validating -> Succeeded
//!     ^                        |
//!     +------ Retrying <-------+-----> Exhausted
//! ```
//!
//! Attempts are strictly sequential: each request carries the transcript of
//! every earlier attempt. Cancellation and the deadline are checked before
//! each request, so an attempt already in flight always completes.

use std::fmt;
use structai_core::{generate_run_id, Conversation, ExtractionUsage, Value, ValidationErrors};
use structai_models::{Generator, Payload, RawResponse, ResponseHint, ResponseKind};
use structai_validate::{parse_value_from_text, OutputParseError, ValidationContext, Validator};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{CallOptions, ExtractionConfig, RunSettings};
use crate::error::{AttemptFailure, CancelReason, ExtractionError, ExtractionResult};
use crate::feedback;
use crate::result::{AttemptOutcome, AttemptRecord, Extraction};

/// Converts a validated value into the caller's output type.
pub type Converter<T> = fn(Value) -> Result<T, ValidationErrors>;

/// State of an extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// About to call the generator.
    Requesting,
    /// Decoding the response payload.
    Parsing,
    /// Validating the decoded value.
    Validating,
    /// Appending feedback before the next attempt.
    Retrying,
    /// Output is ready.
    Succeeded,
    /// Every allowed attempt failed.
    Exhausted,
    /// Stopped by cancellation or deadline.
    Cancelled,
    /// The generator failed.
    Failed,
}

impl RunState {
    /// Whether the run has ended.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Exhausted | Self::Cancelled | Self::Failed
        )
    }

    /// Lowercase state name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requesting => "requesting",
            Self::Parsing => "parsing",
            Self::Validating => "validating",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::Exhausted => "exhausted",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Active extraction run that can be stepped.
pub struct ExtractionRun<'a, T> {
    generator: &'a dyn Generator,
    validator: &'a dyn Validator,
    convert: Converter<T>,
    settings: RunSettings,
    hint: ResponseHint,
    state: RunState,
    attempt: u32,
    conversation: Conversation,
    usage: ExtractionUsage,
    run_id: String,
    history: Vec<AttemptRecord>,
    response: Option<RawResponse>,
    raw: Option<Value>,
    failure: Option<AttemptFailure>,
    output: Option<T>,
}

impl<T> fmt::Debug for ExtractionRun<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionRun")
            .field("run_id", &self.run_id)
            .field("generator", &self.generator.name())
            .field("shape", &self.hint.shape_name)
            .field("state", &self.state)
            .field("attempt", &self.attempt)
            .field("max_attempts", &self.settings.max_attempts)
            .finish_non_exhaustive()
    }
}

impl<'a, T> ExtractionRun<'a, T> {
    /// Create a run for one prompt.
    ///
    /// The transcript starts with the system instruction, if any, followed
    /// by `prompt`.
    pub fn new(
        generator: &'a dyn Generator,
        validator: &'a dyn Validator,
        convert: Converter<T>,
        prompt: impl Into<String>,
        config: &ExtractionConfig,
        options: &CallOptions,
    ) -> Self {
        let settings = config.resolve(options);
        let schema = validator.json_schema();
        let hint = ResponseHint::new(validator.describe())
            .with_kind(response_kind(&schema))
            .with_strict(settings.is_strict())
            .with_schema(schema);

        let mut instructions = settings.system_prompt.clone().unwrap_or_default();
        if settings.include_schema_hint {
            if let Some(schema) = &hint.schema {
                if !instructions.is_empty() {
                    instructions.push_str("\n\n");
                }
                instructions.push_str(&feedback::schema_instructions(&hint.shape_name, schema));
            }
        }

        Self {
            generator,
            validator,
            convert,
            settings,
            hint,
            state: RunState::Requesting,
            attempt: 1,
            conversation: Conversation::start(Some(&instructions), prompt),
            usage: ExtractionUsage::new(),
            run_id: generate_run_id(),
            history: Vec::new(),
            response: None,
            raw: None,
            failure: None,
            output: None,
        }
    }

    /// Run to completion.
    pub async fn run_to_completion(mut self) -> ExtractionResult<Extraction<T>> {
        while !self.state.is_terminal() {
            self.step().await?;
        }
        self.finish()
    }

    /// Advance one transition and return the new state.
    ///
    /// Terminal failures are returned as errors from the transition that
    /// reaches them; stepping a finished run returns its state unchanged.
    pub async fn step(&mut self) -> ExtractionResult<RunState> {
        match self.state {
            RunState::Requesting => self.request().await,
            RunState::Parsing => self.parse(),
            RunState::Validating => self.validate(),
            RunState::Retrying => Ok(self.retry()),
            terminal => Ok(terminal),
        }
    }

    async fn request(&mut self) -> ExtractionResult<RunState> {
        if let Some(reason) = self.stop_reason() {
            let attempts = self.attempt - 1;
            self.transition(RunState::Cancelled);
            warn!(
                run_id = %self.run_id,
                attempts,
                reason = %reason,
                "Extraction stopped before next attempt"
            );
            return Err(ExtractionError::Cancelled { attempts, reason });
        }

        let result = self
            .generator
            .generate(self.conversation.messages(), &self.hint)
            .await;

        match result {
            Ok(response) => {
                self.usage.add_request(response.usage.clone());
                self.response = Some(response);
                Ok(self.transition(RunState::Parsing))
            }
            Err(source) => {
                self.record(AttemptOutcome::GeneratorFailed, Some(source.to_string()), 1);
                self.transition(RunState::Failed);
                warn!(
                    run_id = %self.run_id,
                    attempt = self.attempt,
                    generator = self.generator.name(),
                    error = %source,
                    "Generator failed"
                );
                Err(ExtractionError::Generator {
                    attempt: self.attempt,
                    source,
                })
            }
        }
    }

    fn parse(&mut self) -> ExtractionResult<RunState> {
        let parsed = match self.response.as_ref().map(|r| &r.payload) {
            Some(Payload::Structured(value)) => Ok(value.clone()),
            Some(Payload::Text(text)) => parse_value_from_text(text),
            None => Err(OutputParseError::Empty),
        };
        match parsed {
            Ok(raw) => {
                self.raw = Some(raw);
                Ok(self.transition(RunState::Validating))
            }
            Err(err) => self.reject(AttemptFailure::Parse(err)),
        }
    }

    fn validate(&mut self) -> ExtractionResult<RunState> {
        let Some(raw) = self.raw.take() else {
            return self.reject(AttemptFailure::Parse(OutputParseError::Empty));
        };
        let mut ctx = ValidationContext::root(&raw)
            .with_coercion(self.settings.coercion)
            .with_mode(self.settings.mode);
        let result = self
            .validator
            .validate(&raw, &mut ctx)
            .and_then(self.convert);

        match result {
            Ok(output) => {
                self.output = Some(output);
                self.record(AttemptOutcome::Succeeded, None, 0);
                Ok(self.transition(RunState::Succeeded))
            }
            Err(errors) => self.reject(AttemptFailure::Validation(errors)),
        }
    }

    /// Record a failed attempt and pick between retrying and giving up.
    fn reject(&mut self, failure: AttemptFailure) -> ExtractionResult<RunState> {
        let outcome = if failure.is_parse_failure() {
            AttemptOutcome::ParseFailed
        } else {
            AttemptOutcome::ValidationFailed
        };
        self.record(outcome, Some(failure.to_string()), failure.error_count());

        if self.attempt < self.settings.max_attempts {
            debug!(
                run_id = %self.run_id,
                attempt = self.attempt,
                errors = failure.error_count(),
                "Attempt rejected, retrying"
            );
            self.failure = Some(failure);
            return Ok(self.transition(RunState::Retrying));
        }

        self.transition(RunState::Exhausted);
        warn!(
            run_id = %self.run_id,
            attempts = self.attempt,
            errors = failure.error_count(),
            "Extraction exhausted"
        );
        Err(ExtractionError::Exhausted {
            attempts: self.attempt,
            last: failure,
        })
    }

    fn retry(&mut self) -> RunState {
        if let Some(response) = &self.response {
            self.conversation.push(feedback::previous_output(response));
        }
        if let Some(failure) = &self.failure {
            self.conversation.push(feedback::retry_prompt(failure));
        }
        self.attempt += 1;
        self.transition(RunState::Requesting)
    }

    fn stop_reason(&self) -> Option<CancelReason> {
        if self
            .settings
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Some(CancelReason::Cancelled);
        }
        if self
            .settings
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
        {
            return Some(CancelReason::DeadlineExceeded);
        }
        None
    }

    fn transition(&mut self, next: RunState) -> RunState {
        debug!(
            run_id = %self.run_id,
            attempt = self.attempt,
            max_attempts = self.settings.max_attempts,
            from = %self.state,
            state = %next,
            "Extraction transition"
        );
        self.state = next;
        next
    }

    fn record(&mut self, outcome: AttemptOutcome, error: Option<String>, error_count: usize) {
        let usage = match (&self.response, outcome) {
            (_, AttemptOutcome::GeneratorFailed) | (None, _) => Default::default(),
            (Some(response), _) => response.usage.clone(),
        };
        self.history.push(AttemptRecord {
            attempt: self.attempt,
            outcome,
            error,
            error_count,
            usage,
            finished_at: chrono::Utc::now(),
        });
    }

    fn finish(self) -> ExtractionResult<Extraction<T>> {
        match (self.output, self.response) {
            (Some(output), Some(response)) => Ok(Extraction {
                output,
                attempts: self.attempt,
                usage: self.usage,
                run_id: self.run_id,
                history: self.history,
                transcript: self.conversation,
                response,
            }),
            _ => Err(ExtractionError::Incomplete { state: self.state }),
        }
    }

    /// Current state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Current attempt number, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Attempts this run may make.
    pub fn max_attempts(&self) -> u32 {
        self.settings.max_attempts
    }

    /// Transcript that the next request will send.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Response-shape hint sent with every request.
    pub fn hint(&self) -> &ResponseHint {
        &self.hint
    }

    /// Attempt history so far.
    pub fn history(&self) -> &[AttemptRecord] {
        &self.history
    }

    /// Usage so far.
    pub fn usage(&self) -> &ExtractionUsage {
        &self.usage
    }

    /// Run ID.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Failure of the most recent rejected attempt, while retrying.
    pub fn last_failure(&self) -> Option<&AttemptFailure> {
        self.failure.as_ref()
    }
}

fn response_kind(schema: &serde_json::Value) -> ResponseKind {
    match schema.get("type").and_then(serde_json::Value::as_str) {
        Some("object") => ResponseKind::Object,
        Some("array") => ResponseKind::List,
        _ => ResponseKind::Any,
    }
}
