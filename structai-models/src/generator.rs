//! Core generator trait and types.
//!
//! A [`Generator`] is whatever produces candidate output for a conversation:
//! a hosted model behind a vendor client, a local model, or a scripted test
//! double. The extraction engine only sees this interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use structai_core::{FinishReason, Message, RequestUsage, Value};

use crate::error::GeneratorError;

/// The shape of response the caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    /// A single JSON object.
    #[default]
    Object,
    /// A JSON array of objects.
    List,
    /// Any JSON value.
    Any,
}

/// Response-shape hint passed with every request.
///
/// Generators that support native structured output can forward `schema`
/// to their backend; others may ignore it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseHint {
    /// Name of the expected shape.
    pub shape_name: String,
    /// JSON Schema of the expected response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    /// Expected top-level kind.
    pub kind: ResponseKind,
    /// Whether the response will be validated strictly.
    pub strict: bool,
}

impl ResponseHint {
    /// Create a hint for a named shape.
    #[must_use]
    pub fn new(shape_name: impl Into<String>) -> Self {
        Self {
            shape_name: shape_name.into(),
            ..Self::default()
        }
    }

    /// Set the JSON Schema.
    #[must_use]
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Set the expected kind.
    #[must_use]
    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    /// Mark the response as strictly validated.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// The payload of a raw response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum Payload {
    /// Free text, possibly wrapping JSON in prose or code fences.
    Text(String),
    /// Output the generator already decoded.
    Structured(Value),
}

/// A generator's answer to one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    /// Response payload.
    pub payload: Payload,
    /// Token usage.
    #[serde(default)]
    pub usage: RequestUsage,
    /// Why generation stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Name of the model that answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    /// When the response was received.
    pub timestamp: DateTime<Utc>,
}

impl RawResponse {
    /// Create a response from a payload.
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            usage: RequestUsage::default(),
            finish_reason: Some(FinishReason::Stop),
            model_name: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a text response.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Payload::Text(text.into()))
    }

    /// Create a pre-structured response.
    pub fn structured(value: impl Into<Value>) -> Self {
        Self::new(Payload::Structured(value.into()))
    }

    /// Set usage.
    #[must_use]
    pub fn with_usage(mut self, usage: RequestUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Set finish reason.
    #[must_use]
    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }

    /// Set model name.
    #[must_use]
    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }

    /// The payload as text, for replaying into a transcript.
    #[must_use]
    pub fn payload_text(&self) -> String {
        match &self.payload {
            Payload::Text(text) => text.clone(),
            Payload::Structured(value) => value.to_json_string(),
        }
    }
}

/// Core generator trait.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generator name, used in logs and attempt history.
    fn name(&self) -> &str;

    /// Produce a response for the conversation.
    ///
    /// Errors are terminal for the calling extraction.
    async fn generate(
        &self,
        conversation: &[Message],
        hint: &ResponseHint,
    ) -> Result<RawResponse, GeneratorError>;
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Arc<G> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn generate(
        &self,
        conversation: &[Message],
        hint: &ResponseHint,
    ) -> Result<RawResponse, GeneratorError> {
        (**self).generate(conversation, hint).await
    }
}

/// Boxed generator for dynamic dispatch.
pub type BoxedGenerator = Arc<dyn Generator>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hint_builder() {
        let hint = ResponseHint::new("User")
            .with_kind(ResponseKind::List)
            .with_schema(serde_json::json!({"type": "array"}))
            .with_strict(true);

        assert_eq!(hint.shape_name, "User");
        assert_eq!(hint.kind, ResponseKind::List);
        assert!(hint.strict);
        assert!(hint.schema.is_some());
    }

    #[test]
    fn test_kind_default() {
        assert_eq!(ResponseKind::default(), ResponseKind::Object);
    }

    #[test]
    fn test_payload_text() {
        let text = RawResponse::text("```json\n{}\n```");
        assert_eq!(text.payload_text(), "```json\n{}\n```");

        let structured = RawResponse::structured(serde_json::json!({"a": 1}));
        assert_eq!(structured.payload_text(), r#"{"a":1}"#);
    }

    #[test]
    fn test_response_builder() {
        let response = RawResponse::text("{}")
            .with_usage(RequestUsage::with_tokens(10, 4))
            .with_finish_reason(FinishReason::Length)
            .with_model_name("local");

        assert_eq!(response.usage.total(), 14);
        assert_eq!(response.finish_reason, Some(FinishReason::Length));
        assert_eq!(response.model_name.as_deref(), Some("local"));
    }
}
