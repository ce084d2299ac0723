//! The extraction client.

use std::sync::Arc;
use structai_core::{Value, ValidationErrors};
use structai_models::{BoxedGenerator, Generator};
use structai_validate::{from_validated, ListOf, Shaped, StructValidator, Validator};
use tracing::debug;

use crate::config::{CallOptions, ExtractionConfig};
use crate::error::ExtractionResult;
use crate::result::Extraction;
use crate::run::{Converter, ExtractionRun};

/// Extracts validated, typed values from a generator.
///
/// Each call sends the prompt, validates the response against the target
/// shape and, on failure, retries with corrective feedback until the
/// configured number of attempts is used up.
///
/// # Example
///
/// ```rust,ignore
/// let client = ExtractionClient::new(generator)
///     .with_config(ExtractionConfig::new().with_max_retries(3));
///
/// let user = client.extract::<User>("Alice, alice@example.com, 30").await?;
/// println!("{} after {} attempts", user.output.name, user.attempts);
/// ```
#[derive(Clone)]
pub struct ExtractionClient {
    generator: BoxedGenerator,
    config: ExtractionConfig,
}

impl std::fmt::Debug for ExtractionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionClient")
            .field("generator", &self.generator.name())
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionClient {
    /// Create a client with the default configuration.
    pub fn new(generator: impl Generator + 'static) -> Self {
        Self::from_arc(Arc::new(generator))
    }

    /// Create a client from a shared generator.
    pub fn from_arc(generator: BoxedGenerator) -> Self {
        Self {
            generator,
            config: ExtractionConfig::default(),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ExtractionConfig) -> Self {
        self.config = config;
        self
    }

    /// The configuration.
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// The generator.
    pub fn generator(&self) -> &BoxedGenerator {
        &self.generator
    }

    /// Extract one `T`.
    pub async fn extract<T: Shaped>(
        &self,
        prompt: impl Into<String>,
    ) -> ExtractionResult<Extraction<T>> {
        self.extract_with(prompt, CallOptions::default()).await
    }

    /// Extract one `T` with per-call options.
    pub async fn extract_with<T: Shaped>(
        &self,
        prompt: impl Into<String>,
        options: CallOptions,
    ) -> ExtractionResult<Extraction<T>> {
        let validator = StructValidator::of::<T>();
        self.run(&validator, from_validated::<T>, prompt, &options)
            .await
    }

    /// Extract a list of `T`.
    ///
    /// The whole list is one response: a single invalid element fails the
    /// attempt, and a retry regenerates the entire list.
    pub async fn extract_list<T: Shaped>(
        &self,
        prompt: impl Into<String>,
    ) -> ExtractionResult<Extraction<Vec<T>>> {
        self.extract_list_with(prompt, CallOptions::default()).await
    }

    /// Extract a list of `T` with per-call options.
    pub async fn extract_list_with<T: Shaped>(
        &self,
        prompt: impl Into<String>,
        options: CallOptions,
    ) -> ExtractionResult<Extraction<Vec<T>>> {
        let validator = ListOf::of::<T>();
        self.run(&validator, from_validated::<Vec<T>>, prompt, &options)
            .await
    }

    /// Extract a value accepted by an arbitrary validator.
    ///
    /// Use this for shapes built at runtime, unions and dictionaries.
    pub async fn extract_value(
        &self,
        prompt: impl Into<String>,
        validator: &dyn Validator,
        options: CallOptions,
    ) -> ExtractionResult<Extraction<Value>> {
        self.run(validator, keep_value, prompt, &options).await
    }

    async fn run<T>(
        &self,
        validator: &dyn Validator,
        convert: Converter<T>,
        prompt: impl Into<String>,
        options: &CallOptions,
    ) -> ExtractionResult<Extraction<T>> {
        let run = ExtractionRun::new(
            self.generator.as_ref(),
            validator,
            convert,
            prompt,
            &self.config,
            options,
        );
        debug!(
            run_id = run.run_id(),
            generator = self.generator.name(),
            shape = %run.hint().shape_name,
            max_attempts = run.max_attempts(),
            "Starting extraction"
        );
        run.run_to_completion().await
    }
}

fn keep_value(value: Value) -> Result<Value, ValidationErrors> {
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CancelReason;
    use crate::result::AttemptOutcome;
    use crate::testing::{User, VALID_USER};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::time::Duration;
    use structai_core::MessageKind;
    use structai_models::{FunctionGenerator, GeneratorError, MockGenerator, RawResponse};
    use structai_validate::{DictOf, FieldType, UnionOf, ValidationMode};
    use tokio_util::sync::CancellationToken;

    const MISSING_EMAIL: &str = r#"{"name":"Alice","age":30}"#;

    fn client(generator: &MockGenerator, config: ExtractionConfig) -> ExtractionClient {
        ExtractionClient::new(generator.clone()).with_config(config)
    }

    #[tokio::test]
    async fn test_retry_converges() {
        let generator = MockGenerator::new("mock")
            .with_text_response(MISSING_EMAIL)
            .with_text_response(r#"{"name":"Alice","email":"alice@example.com","age":30}"#);
        let client = client(&generator, ExtractionConfig::new().with_max_retries(3));

        let extraction = client.extract::<User>("Extract the user").await.unwrap();

        assert_eq!(
            extraction.output,
            User {
                name: "Alice".into(),
                email: "alice@example.com".into(),
                age: 30,
            }
        );
        assert_eq!(extraction.attempts, 2);
        assert!(extraction.was_retried());
        assert_eq!(generator.call_count(), 2);

        let second = generator.call(1).unwrap();
        let transcript = second.transcript();
        assert!(transcript.contains(MISSING_EMAIL));
        assert!(transcript.contains("email: field is required"));
        let kinds: Vec<MessageKind> = second.conversation.iter().map(|m| m.kind).collect();
        assert_eq!(
            &kinds[kinds.len() - 2..],
            &[MessageKind::PreviousOutput, MessageKind::RetryPrompt]
        );
    }

    #[tokio::test]
    async fn test_retry_exhausts() {
        let generator = MockGenerator::new("mock").repeating_text(MISSING_EMAIL);
        let client = client(&generator, ExtractionConfig::new().with_max_retries(3));

        let err = client.extract::<User>("Extract").await.unwrap_err();

        assert_eq!(generator.call_count(), 3);
        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 3);
        assert!(err.to_string().contains("3 attempts"));
        assert!(err.validation_errors().unwrap().contains_code("required_field_missing"));
    }

    #[rstest]
    #[case::max_one(ExtractionConfig::new().with_max_retries(1))]
    #[case::disabled(ExtractionConfig::no_retry())]
    #[case::zero(ExtractionConfig::new().with_max_retries(0))]
    #[tokio::test]
    async fn test_retry_disabled_makes_one_call(#[case] config: ExtractionConfig) {
        let generator = MockGenerator::new("mock").repeating_text(MISSING_EMAIL);
        let err = client(&generator, config)
            .extract::<User>("Extract")
            .await
            .unwrap_err();

        assert_eq!(generator.call_count(), 1);
        assert_eq!(err.attempts(), 1);
        assert!(err.is_exhausted());
    }

    #[tokio::test]
    async fn test_retry_disabled_valid_response() {
        let generator = MockGenerator::new("mock").repeating_text(VALID_USER);
        let extraction = client(&generator, ExtractionConfig::no_retry())
            .extract::<User>("Extract")
            .await
            .unwrap();
        assert_eq!(extraction.attempts, 1);
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_list_regenerates_whole_response() {
        let generator = MockGenerator::new("mock")
            .with_text_response(
                r#"[
                    {"name": "Alice", "email": "alice@example.com", "age": 30},
                    {"name": "Bob", "email": "not-an-email", "age": 41},
                    {"name": "Cara", "email": "cara@example.com", "age": 25}
                ]"#,
            )
            .with_text_response(
                r#"[
                    {"name": "Alice", "email": "alice@example.com", "age": 30},
                    {"name": "Bob", "email": "bob@example.com", "age": 41},
                    {"name": "Cara", "email": "cara@example.com", "age": 25}
                ]"#,
            );
        let client = client(&generator, ExtractionConfig::new());

        let extraction = client.extract_list::<User>("Extract everyone").await.unwrap();

        assert_eq!(generator.call_count(), 2);
        assert_eq!(extraction.attempts, 2);
        assert_eq!(extraction.output.len(), 3);
        assert_eq!(extraction.output[1].email, "bob@example.com");
        let feedback = generator.call(1).unwrap().last_message().unwrap().content.clone();
        assert!(feedback.contains("[1].email: must be a valid email address"));
    }

    #[tokio::test]
    async fn test_generator_error_not_retried() {
        let generator = MockGenerator::new("mock")
            .with_error(GeneratorError::transport("connection refused"))
            .repeating_text(VALID_USER);
        let client = client(&generator, ExtractionConfig::new().with_max_retries(3));

        let err = client.extract::<User>("Extract").await.unwrap_err();

        assert_eq!(generator.call_count(), 1);
        assert!(err.is_generator_error());
        assert!(!err.is_exhausted());
        assert!(err.validation_errors().is_none());
        assert_eq!(
            err.to_string(),
            "generator failed on attempt 1: Transport error: connection refused"
        );
    }

    #[tokio::test]
    async fn test_generator_error_after_validation_failure() {
        let generator = MockGenerator::new("mock")
            .with_text_response(MISSING_EMAIL)
            .with_error(GeneratorError::rate_limited(None));
        let err = client(&generator, ExtractionConfig::new())
            .extract::<User>("Extract")
            .await
            .unwrap_err();

        assert!(err.is_generator_error());
        assert_eq!(err.attempts(), 2);
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let generator = MockGenerator::new("mock").repeating_text(VALID_USER);
        let token = CancellationToken::new();
        token.cancel();

        let err = client(&generator, ExtractionConfig::new())
            .extract_with::<User>("Extract", CallOptions::new().cancellation(token))
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.attempts(), 0);
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_attempt_stops_retry() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let generator = FunctionGenerator::new(move |_, _| {
            trigger.cancel();
            Ok(RawResponse::text(MISSING_EMAIL))
        });
        let client = ExtractionClient::new(generator.clone());

        let err = client
            .extract_with::<User>("Extract", CallOptions::new().cancellation(token))
            .await
            .unwrap_err();

        assert_eq!(generator.call_count(), 1);
        assert!(err.is_cancelled());
        assert!(!err.is_exhausted());
        assert_eq!(err.attempts(), 1);
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let generator = MockGenerator::new("mock").repeating_text(VALID_USER);
        let options = CallOptions::new().deadline(tokio::time::Instant::now());
        tokio::time::sleep(Duration::from_millis(1)).await;

        let err = client(&generator, ExtractionConfig::new())
            .extract_with::<User>("Extract", options)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            crate::ExtractionError::Cancelled {
                attempts: 0,
                reason: CancelReason::DeadlineExceeded
            }
        ));
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_parse_failure_is_retried() {
        let generator = MockGenerator::new("mock")
            .with_text_response("Sorry, I cannot find a user in that text.")
            .with_text_response(format!("Here you go:\n```json\n{VALID_USER}\n```"));
        let extraction = client(&generator, ExtractionConfig::new())
            .extract::<User>("Extract")
            .await
            .unwrap();

        assert_eq!(extraction.attempts, 2);
        assert_eq!(extraction.history[0].outcome, AttemptOutcome::ParseFailed);
        assert_eq!(extraction.history[1].outcome, AttemptOutcome::Succeeded);
        assert_eq!(extraction.failed_attempts().count(), 1);
    }

    #[tokio::test]
    async fn test_strict_option_rejects_string_numbers() {
        let payload = r#"{"name":"Alice","email":"alice@example.com","age":"30"}"#;
        let generator = MockGenerator::new("mock").repeating_text(payload);
        let client = client(&generator, ExtractionConfig::new());

        let lax = client.extract::<User>("Extract").await.unwrap();
        assert_eq!(lax.output.age, 30);

        let err = client
            .extract_with::<User>("Extract", CallOptions::new().strict(true).max_retries(1))
            .await
            .unwrap_err();
        assert!(err.validation_errors().unwrap().contains_code("type_coercion_failed"));
        assert!(generator.call(1).unwrap().hint.strict);
    }

    #[tokio::test]
    async fn test_usage_accumulates_across_attempts() {
        let generator = MockGenerator::new("mock")
            .with_response(
                RawResponse::text(MISSING_EMAIL)
                    .with_usage(structai_core::RequestUsage::with_tokens(100, 20)),
            )
            .with_response(
                RawResponse::text(VALID_USER)
                    .with_usage(structai_core::RequestUsage::with_tokens(150, 25)),
            );
        let extraction = client(&generator, ExtractionConfig::new())
            .extract::<User>("Extract")
            .await
            .unwrap();

        assert_eq!(extraction.usage.request_count(), 2);
        assert_eq!(extraction.usage.total_tokens(), 295);
        assert_eq!(extraction.history[0].usage.total(), 120);
        assert!(!extraction.run_id.is_empty());
        assert_eq!(extraction.transcript.len(), generator.call(1).unwrap().conversation.len());
    }

    #[tokio::test]
    async fn test_extract_value_with_dict() {
        let generator = MockGenerator::new("mock")
            .with_text_response(r#"{"alice": "x", "bob": 7}"#)
            .with_text_response(r#"{"alice": 3, "bob": 7}"#);
        let validator = DictOf::new(FieldType::int());

        let extraction = client(&generator, ExtractionConfig::new().with_strict(true))
            .extract_value("Scores", &validator, CallOptions::new())
            .await
            .unwrap();

        assert_eq!(extraction.attempts, 2);
        assert_eq!(extraction.output.get("alice"), Some(&Value::Int(3)));
        let feedback = generator.call(1).unwrap().last_message().unwrap().content.clone();
        assert!(feedback.contains("- alice: "));
    }

    #[tokio::test]
    async fn test_extract_value_with_union() {
        let generator = MockGenerator::new("mock").with_text_response(r#""42""#);
        let validator = UnionOf::new()
            .scalar(FieldType::int())
            .scalar(FieldType::String);

        let extraction = client(&generator, ExtractionConfig::new())
            .extract_value("Answer", &validator, CallOptions::new())
            .await
            .unwrap();

        assert_eq!(extraction.output, Value::Int(42));
    }

    #[tokio::test]
    async fn test_serialization_mode_override() {
        let generator = MockGenerator::new("mock").repeating_text(r#"{"id": 1}"#);
        let shape = structai_validate::Shape::builder("Item")
            .field("id", FieldType::int(), "required")
            .add(structai_validate::FieldBuilder::new("note", FieldType::String).omit_empty())
            .build()
            .unwrap();
        let validator = StructValidator::new(Arc::new(shape));
        let client = client(&generator, ExtractionConfig::new());

        let validated = client
            .extract_value("Item", &validator, CallOptions::new())
            .await
            .unwrap();
        assert_eq!(validated.output.get("note"), Some(&Value::String(String::new())));

        let serialized = client
            .extract_value(
                "Item",
                &validator,
                CallOptions::new().mode(ValidationMode::Serialization),
            )
            .await
            .unwrap();
        assert_eq!(serialized.output.get("note"), None);
    }

    #[test]
    fn test_debug_shows_generator_name() {
        let client = ExtractionClient::new(MockGenerator::new("local-mock"));
        let rendered = format!("{client:?}");
        assert!(rendered.contains("local-mock"));
    }
}
