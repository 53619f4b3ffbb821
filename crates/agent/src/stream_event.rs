//! Agent-level streaming events.
//!
//! `AgentStreamEvent` is what the session loop produces and the gateway
//! forwards to the client over SSE, one event per message.

use pengate_core::provider::Usage;
use serde::{Deserialize, Serialize};

/// Why a step, or the whole run, ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    /// The model answered without calling tools.
    Stop,
    /// The step ended in tool calls. For the run: calls are pending on the client.
    ToolCalls,
    /// The step bound was reached.
    MaxSteps,
    Error,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::ToolCalls => "tool-calls",
            FinishReason::MaxSteps => "max-steps",
            FinishReason::Error => "error",
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by the session loop:
/// - `text_delta`:  partial text from the model
/// - `tool_call`:   the model called a tool
/// - `tool_result`: a tool ran in-process
/// - `step_finish`: one model step is complete
/// - `finish`:      the run is over; always the last event
/// - `error`:       an upstream failure ended the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    TextDelta {
        text: String,
    },

    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
        /// True when the client must execute this call.
        #[serde(rename = "clientSide")]
        client_side: bool,
    },

    ToolResult {
        id: String,
        name: String,
        success: bool,
        output: serde_json::Value,
    },

    StepFinish {
        step: usize,
        #[serde(rename = "finishReason")]
        finish_reason: FinishReason,
        usage: Usage,
    },

    Finish {
        #[serde(rename = "finishReason")]
        finish_reason: FinishReason,
        steps: usize,
        usage: Usage,
    },

    Error {
        message: String,
    },
}

impl AgentStreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text_delta",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::StepFinish { .. } => "step_finish",
            Self::Finish { .. } => "finish",
            Self::Error { .. } => "error",
        }
    }
}
