//! Scripted providers for session tests, here and in downstream crates.

use std::sync::Mutex;

use pengate_core::error::ProviderError;
use pengate_core::message::{Message, MessageToolCall};
use pengate_core::provider::{
    Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage,
};
use tokio::sync::mpsc;

/// One scripted model step.
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    Respond(ProviderResponse),
    Fail(ProviderError),
}

/// A mock provider that plays back a sequence of scripted steps.
///
/// Each call returns the next step. Text is streamed word by word so tests
/// can observe deltas. Every request is recorded for inspection. Panics if
/// more calls are made than steps provided.
pub struct SequentialMockProvider {
    steps: Vec<ScriptedStep>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            steps,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn responses(responses: Vec<ProviderResponse>) -> Self {
        Self::new(responses.into_iter().map(ScriptedStep::Respond).collect())
    }

    /// A provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::responses(vec![make_text_response(text)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next(&self, request: ProviderRequest) -> ScriptedStep {
        let mut requests = self.requests.lock().unwrap();
        let index = requests.len();
        requests.push(request);
        match self.steps.get(index) {
            Some(step) => step.clone(),
            None => panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                index,
                self.steps.len()
            ),
        }
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.next(request) {
            ScriptedStep::Respond(response) => Ok(response),
            ScriptedStep::Fail(err) => Err(err),
        }
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        let response = match self.next(request) {
            ScriptedStep::Respond(response) => response,
            ScriptedStep::Fail(err) => return Err(err),
        };

        let words: Vec<String> = response
            .message
            .content
            .split_inclusive(' ')
            .map(String::from)
            .collect();
        let (tx, rx) = mpsc::channel(words.len() + 1);
        for word in words {
            let _ = tx.send(Ok(StreamChunk::text(word))).await;
        }
        let _ = tx
            .send(Ok(StreamChunk {
                content: None,
                tool_calls: response.message.tool_calls,
                done: true,
                usage: response.usage,
                finish_reason: response.finish_reason,
            }))
            .await;
        Ok(rx)
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        input_tokens: 10,
        output_tokens: 5,
    })
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: usage(),
        model: "mock-model".into(),
        finish_reason: Some("stop".into()),
    }
}

/// Create a response with tool calls and optional leading text.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_calls(text, tool_calls),
        usage: usage(),
        model: "mock-model".into(),
        finish_reason: Some("tool_calls".into()),
    }
}

/// Helper to create a tool call with a unique id.
pub fn make_tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}
