//! Corrective feedback appended to the transcript after a failed attempt.
//!
//! Each failed attempt adds two messages: the generator's previous output,
//! replayed as an assistant message, and a user message listing every
//! violation by field path with a request to fix them.

use structai_core::{Message, MessageKind, ValidationErrors};
use structai_models::RawResponse;

use crate::error::AttemptFailure;

const VALIDATION_HEADER: &str = "Your previous response did not pass validation:";
const CORRECTION_REQUEST: &str =
    "Respond again with the complete corrected JSON, fixing every error listed above.";

/// Replay a generator output into the transcript.
#[must_use]
pub fn previous_output(response: &RawResponse) -> Message {
    Message::assistant(response.payload_text()).with_kind(MessageKind::PreviousOutput)
}

/// Build the corrective user message for a failed attempt.
#[must_use]
pub fn retry_prompt(failure: &AttemptFailure) -> Message {
    let body = match failure {
        AttemptFailure::Validation(errors) => format!(
            "{VALIDATION_HEADER}\n{}\n{CORRECTION_REQUEST}",
            violation_lines(errors)
        ),
        AttemptFailure::Parse(err) => format!(
            "Your previous response could not be parsed as JSON ({err}).\n\
             Respond with a single JSON value and nothing else."
        ),
    };
    Message::user(body).with_kind(MessageKind::RetryPrompt)
}

/// One `- path: message` line per violation.
#[must_use]
pub fn violation_lines(errors: &ValidationErrors) -> String {
    errors
        .iter()
        .map(|error| format!("- {error}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Instruction text describing the expected response.
pub(crate) fn schema_instructions(shape_name: &str, schema: &serde_json::Value) -> String {
    let rendered = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!("Respond with JSON matching the `{shape_name}` schema below.\n{rendered}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use structai_core::{FieldPath, Role, Value, ValidationError};
    use structai_validate::OutputParseError;

    #[test]
    fn test_previous_output_replays_payload() {
        let msg = previous_output(&RawResponse::text(r#"{"name":"Alice"}"#));
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.kind, MessageKind::PreviousOutput);
        assert_eq!(msg.content, r#"{"name":"Alice"}"#);
    }

    #[test]
    fn test_retry_prompt_lists_violations() {
        let mut errors = ValidationErrors::new();
        errors.add(ValidationError::required().at(FieldPath::root().child("email")));
        errors.add(
            ValidationError::constraint("gte", Some("0".into()), "must be at least 0", &Value::Int(-1))
                .at(FieldPath::root().child("age")),
        );

        let msg = retry_prompt(&AttemptFailure::Validation(errors));
        assert_eq!(msg.role, Role::User);
        assert!(msg.is_retry_prompt());
        assert_eq!(
            msg.content,
            "Your previous response did not pass validation:\n\
             - email: field is required\n\
             - age: must be at least 0\n\
             Respond again with the complete corrected JSON, fixing every error listed above."
        );
    }

    #[test]
    fn test_retry_prompt_for_parse_failure() {
        let msg = retry_prompt(&AttemptFailure::Parse(OutputParseError::NoJsonFound));
        assert!(msg.content.contains("could not be parsed as JSON"));
        assert!(msg.content.contains("No JSON object or array found"));
    }

    #[test]
    fn test_schema_instructions() {
        let text = schema_instructions("User", &serde_json::json!({"type": "object"}));
        assert!(text.starts_with("Respond with JSON matching the `User` schema below."));
        assert!(text.contains("\"type\": \"object\""));
    }
}
