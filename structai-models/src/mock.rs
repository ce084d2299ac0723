//! Scripted generators for testing.
//!
//! - [`MockGenerator`]: returns queued responses in order and records every
//!   request it receives
//! - [`FunctionGenerator`]: computes each response from the conversation
//!
//! # Examples
//!
//! ```rust
//! use structai_models::MockGenerator;
//!
//! let generator = MockGenerator::new("test")
//!     .with_text_response(r#"{"name": "Alice"}"#)
//!     .with_text_response(r#"{"name": "Alice", "email": "alice@example.com"}"#);
//! assert_eq!(generator.remaining(), 2);
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use structai_core::{Message, Value};
use tracing::debug;

use crate::error::GeneratorError;
use crate::generator::{Generator, RawResponse, ResponseHint};

/// One request a scripted generator received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// The conversation as sent.
    pub conversation: Vec<Message>,
    /// The response-shape hint as sent.
    pub hint: ResponseHint,
}

impl RecordedCall {
    /// The last message of the recorded conversation.
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.conversation.last()
    }

    /// Concatenated content of every message.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.conversation
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Default)]
struct MockState {
    queue: VecDeque<Result<RawResponse, GeneratorError>>,
    fallback: Option<RawResponse>,
    calls: Vec<RecordedCall>,
}

/// A generator returning pre-configured responses in order.
///
/// When the queue runs dry the fallback response is repeated if one was set;
/// otherwise the call fails with [`GeneratorError::Exhausted`]. Clones share
/// the queue and the recorded calls.
#[derive(Debug, Clone)]
pub struct MockGenerator {
    name: String,
    state: Arc<Mutex<MockState>>,
}

impl MockGenerator {
    /// Create a mock with an empty queue.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Queue a response.
    #[must_use]
    pub fn with_response(self, response: RawResponse) -> Self {
        self.state.lock().queue.push_back(Ok(response));
        self
    }

    /// Queue a text response.
    #[must_use]
    pub fn with_text_response(self, text: impl Into<String>) -> Self {
        let response = RawResponse::text(text).with_model_name(self.name.clone());
        self.with_response(response)
    }

    /// Queue a pre-structured response.
    #[must_use]
    pub fn with_structured_response(self, value: impl Into<Value>) -> Self {
        let response = RawResponse::structured(value).with_model_name(self.name.clone());
        self.with_response(response)
    }

    /// Queue a failure.
    #[must_use]
    pub fn with_error(self, error: GeneratorError) -> Self {
        self.state.lock().queue.push_back(Err(error));
        self
    }

    /// Repeat this response whenever the queue is empty.
    #[must_use]
    pub fn repeating(self, response: RawResponse) -> Self {
        self.state.lock().fallback = Some(response);
        self
    }

    /// Repeat this text whenever the queue is empty.
    #[must_use]
    pub fn repeating_text(self, text: impl Into<String>) -> Self {
        let response = RawResponse::text(text).with_model_name(self.name.clone());
        self.repeating(response)
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Number of queued responses not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// The `index`-th call (0-based).
    #[must_use]
    pub fn call(&self, index: usize) -> Option<RecordedCall> {
        self.state.lock().calls.get(index).cloned()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }
}

#[async_trait]
impl Generator for MockGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        conversation: &[Message],
        hint: &ResponseHint,
    ) -> Result<RawResponse, GeneratorError> {
        let mut state = self.state.lock();
        state.calls.push(RecordedCall {
            conversation: conversation.to_vec(),
            hint: hint.clone(),
        });
        let call = state.calls.len();
        debug!(
            generator = %self.name,
            call,
            messages = conversation.len(),
            queued = state.queue.len(),
            "mock generator called"
        );

        match state.queue.pop_front() {
            Some(next) => next,
            None => match &state.fallback {
                Some(response) => Ok(response.clone()),
                None => Err(GeneratorError::Exhausted { call }),
            },
        }
    }
}

/// Type alias for a response function.
pub type GenerateFn =
    dyn Fn(&[Message], &ResponseHint) -> Result<RawResponse, GeneratorError> + Send + Sync;

/// A generator controlled by a local function.
///
/// More flexible than [`MockGenerator`]: the function sees the whole
/// conversation, so it can answer differently once feedback arrives.
///
/// ```rust
/// use structai_models::{FunctionGenerator, RawResponse};
///
/// let generator = FunctionGenerator::new(|conversation, _hint| {
///     if conversation.iter().any(|m| m.is_retry_prompt()) {
///         Ok(RawResponse::text(r#"{"name": "fixed"}"#))
///     } else {
///         Ok(RawResponse::text("{}"))
///     }
/// });
/// ```
#[derive(Clone)]
pub struct FunctionGenerator {
    name: String,
    function: Arc<GenerateFn>,
    calls: Arc<AtomicUsize>,
}

impl std::fmt::Debug for FunctionGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionGenerator")
            .field("name", &self.name)
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

impl FunctionGenerator {
    /// Create a generator from a response function.
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(&[Message], &ResponseHint) -> Result<RawResponse, GeneratorError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: "function".to_string(),
            function: Arc::new(function),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always return the same text.
    pub fn constant_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_, _| Ok(RawResponse::text(text.clone())))
    }

    /// Cycle through texts, wrapping around at the end.
    pub fn cycle(texts: Vec<String>) -> Self {
        let counter = AtomicUsize::new(0);
        Self::new(move |_, _| {
            if texts.is_empty() {
                return Err(GeneratorError::invalid_response("no responses to cycle"));
            }
            let idx = counter.fetch_add(1, Ordering::SeqCst) % texts.len();
            Ok(RawResponse::text(texts[idx].clone()))
        })
    }

    /// Set a custom name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for FunctionGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        conversation: &[Message],
        hint: &ResponseHint,
    ) -> Result<RawResponse, GeneratorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            generator = %self.name,
            call,
            messages = conversation.len(),
            "function generator called"
        );
        (self.function)(conversation, hint)
    }
}
