//! The chat session loop.
//!
//! One [`ChatSession`] serves one chat request. It runs the model step by
//! step on a spawned task and streams [`AgentStreamEvent`]s back:
//!
//! 1. **Plan** the step with the gate (active tools, system prompt)
//! 2. **Stream** the model output, forwarding text deltas as they arrive
//! 3. **Act** on tool calls: run in-process tools concurrently, relay the rest
//! 4. **Observe**: append calls and results to the conversation and loop
//!
//! The run ends when the model answers without tool calls, when calls are
//! pending on the client, when the step bound is reached, or on an upstream
//! failure. A dropped receiver stops the loop before the next step.

use std::sync::Arc;

use futures::future::join_all;
use pengate_core::error::{ProviderError, ToolError};
use pengate_core::message::{Message, MessageToolCall};
use pengate_core::provider::{Provider, ProviderRequest, Usage};
use pengate_core::tool::{ToolCall, ToolRegistry, ToolResult};
use pengate_telemetry::{SessionLog, SessionLogWriter, new_session_id};
use pengate_tools::ToolInput;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::gate::{StepPlan, plan_step};
use crate::history::{RecordedCall, RecordedResult, StepHistory, StepRecord};
use crate::mode::AgentMode;
use crate::stream_event::{AgentStreamEvent, FinishReason};

const EVENT_BUFFER: usize = 64;

/// Where and what to record once the run is over.
#[derive(Debug, Clone)]
struct SessionLogTarget {
    writer: SessionLogWriter,
    messages: Vec<Value>,
}

/// Outcome of dispatching one tool call.
enum Dispatch {
    Done(ToolResult),
    /// Executed by the client; the run ends after this step.
    Pending,
    Upstream(ToolError),
}

/// One streaming chat request.
pub struct ChatSession {
    provider: Arc<dyn Provider>,
    model: String,
    model_label: String,
    tools: Arc<ToolRegistry>,
    mode: AgentMode,
    system: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_steps: usize,
    session_log: Option<SessionLogTarget>,
}

impl ChatSession {
    /// A session for `mode` with the base system prompt already assembled.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        mode: AgentMode,
        system: impl Into<String>,
    ) -> Self {
        let model = model.into();
        Self {
            provider,
            model_label: model.clone(),
            model,
            tools,
            mode,
            system: system.into(),
            temperature: 0.7,
            max_tokens: None,
            max_steps: mode.default_max_steps(),
            session_log: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Model identifier recorded in the session log (e.g. `anthropic:claude-...`).
    pub fn with_model_label(mut self, label: impl Into<String>) -> Self {
        self.model_label = label.into();
        self
    }

    /// Record the run with `writer` once it is over. `messages` are the
    /// client's messages as received.
    pub fn with_session_log(mut self, writer: SessionLogWriter, messages: Vec<Value>) -> Self {
        self.session_log = Some(SessionLogTarget { writer, messages });
        self
    }

    pub fn mode(&self) -> AgentMode {
        self.mode
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Start the run. Events arrive on the returned receiver; `finish` is
    /// always the last one unless the receiver was dropped.
    pub fn run(self, messages: Vec<Message>) -> mpsc::Receiver<AgentStreamEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(async move {
            self.drive(messages, tx).await;
        });
        rx
    }

    async fn drive(self, mut messages: Vec<Message>, tx: mpsc::Sender<AgentStreamEvent>) {
        let session_id = new_session_id();
        info!(
            session = %session_id,
            mode = %self.mode,
            model = %self.model_label,
            messages = messages.len(),
            "Chat started"
        );

        let tool_names: Vec<String> = self.tools.names().iter().map(|n| n.to_string()).collect();
        let name_refs: Vec<&str> = tool_names.iter().map(String::as_str).collect();
        let definitions = self.tools.definitions();

        let mut history = StepHistory::new();
        let mut disconnected = false;

        let finish_reason = loop {
            if tx.is_closed() {
                disconnected = true;
                break FinishReason::Stop;
            }
            if history.len() >= self.max_steps {
                warn!(session = %session_id, steps = history.len(), "Step bound reached");
                break FinishReason::MaxSteps;
            }

            let step_index = history.len();
            let plan = plan_step(self.mode, &self.system, &history, &name_refs);
            debug!(
                session = %session_id,
                step = step_index,
                locked = plan.locked,
                tools = plan.active_tools.len(),
                "Step planned"
            );

            let request = ProviderRequest {
                model: self.model.clone(),
                system: plan.system.clone(),
                messages: messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: definitions
                    .iter()
                    .filter(|d| plan.allows(&d.name))
                    .cloned()
                    .collect(),
            };

            let streamed = match self.stream_step(request, &tx).await {
                Ok(Some(streamed)) => streamed,
                Ok(None) => {
                    disconnected = true;
                    break FinishReason::Stop;
                }
                Err(e) => {
                    warn!(session = %session_id, error = %e, "Provider failed");
                    let _ = tx
                        .send(AgentStreamEvent::Error {
                            message: e.to_string(),
                        })
                        .await;
                    break FinishReason::Error;
                }
            };

            let recorded: Vec<RecordedCall> = streamed.calls.iter().map(record_call).collect();
            messages.push(Message::assistant_with_calls(
                streamed.text.clone(),
                streamed.calls.clone(),
            ));

            if recorded.is_empty() {
                history.push(StepRecord {
                    text: streamed.text,
                    tool_calls: recorded,
                    tool_results: vec![],
                    finish_reason: FinishReason::Stop,
                    usage: streamed.usage,
                });
                if !self.step_finished(&tx, step_index, FinishReason::Stop, streamed.usage).await {
                    disconnected = true;
                }
                break FinishReason::Stop;
            }

            for call in &recorded {
                let event = AgentStreamEvent::ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.arguments.clone(),
                    client_side: self.tools.contains(&call.name)
                        && !self.tools.is_executable(&call.name)
                        && plan.allows(&call.name)
                        && call.input.is_some(),
                };
                if tx.send(event).await.is_err() {
                    disconnected = true;
                    break;
                }
            }
            if disconnected {
                break FinishReason::Stop;
            }

            let outcomes = join_all(recorded.iter().map(|call| self.dispatch(&plan, call))).await;

            let mut results = Vec::new();
            let mut pending = 0usize;
            let mut upstream = None;
            for (call, outcome) in recorded.iter().zip(outcomes) {
                match outcome {
                    Dispatch::Done(result) => {
                        let output = result_value(&result);
                        messages.push(Message::tool_result(&call.id, &result.output));
                        let event = AgentStreamEvent::ToolResult {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            success: result.success,
                            output: output.clone(),
                        };
                        if tx.send(event).await.is_err() {
                            disconnected = true;
                        }
                        results.push(RecordedResult {
                            call_id: call.id.clone(),
                            name: call.name.clone(),
                            success: result.success,
                            result: output,
                        });
                    }
                    Dispatch::Pending => pending += 1,
                    Dispatch::Upstream(e) => {
                        if upstream.is_none() {
                            upstream = Some(e);
                        }
                    }
                }
            }

            history.push(StepRecord {
                text: streamed.text,
                tool_calls: recorded,
                tool_results: results,
                finish_reason: FinishReason::ToolCalls,
                usage: streamed.usage,
            });

            if let Some(e) = upstream {
                warn!(session = %session_id, error = %e, "Upstream failure during tool execution");
                let _ = tx
                    .send(AgentStreamEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                break FinishReason::Error;
            }

            if disconnected
                || !self
                    .step_finished(&tx, step_index, FinishReason::ToolCalls, streamed.usage)
                    .await
            {
                disconnected = true;
                break FinishReason::Stop;
            }

            if pending > 0 {
                debug!(session = %session_id, pending, "Tool calls relayed to client");
                break FinishReason::ToolCalls;
            }
        };

        let total = history.total_usage();
        if disconnected {
            info!(session = %session_id, steps = history.len(), "Client disconnected, run stopped");
        } else {
            info!(
                session = %session_id,
                finish = %finish_reason,
                steps = history.len(),
                input_tokens = total.input_tokens,
                output_tokens = total.output_tokens,
                "Chat finished"
            );
            let _ = tx
                .send(AgentStreamEvent::Finish {
                    finish_reason,
                    steps: history.len(),
                    usage: total,
                })
                .await;
        }

        if let Some(target) = self.session_log {
            let mut log = SessionLog::new(session_id, self.model_label, self.system)
                .with_messages(target.messages);
            for step in history.to_log_steps() {
                log.push_step(step);
            }
            target.writer.spawn_write(log);
        }
    }

    /// Stream one model step. `Ok(None)` means the client went away.
    async fn stream_step(
        &self,
        request: ProviderRequest,
        tx: &mpsc::Sender<AgentStreamEvent>,
    ) -> Result<Option<StreamedStep>, ProviderError> {
        let mut chunks = self.provider.stream(request).await?;
        let mut step = StreamedStep::default();

        loop {
            let chunk = tokio::select! {
                chunk = chunks.recv() => chunk,
                _ = tx.closed() => return Ok(None),
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk?;

            if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
                step.text.push_str(&text);
                if tx.send(AgentStreamEvent::TextDelta { text }).await.is_err() {
                    return Ok(None);
                }
            }
            step.calls.extend(chunk.tool_calls);
            if let Some(usage) = chunk.usage {
                step.usage = usage;
            }
            if chunk.done {
                break;
            }
        }

        Ok(Some(step))
    }

    async fn dispatch(&self, plan: &StepPlan, call: &RecordedCall) -> Dispatch {
        if !plan.allows(&call.name) {
            let reason = if self.tools.contains(&call.name) {
                "tool_unavailable"
            } else {
                "unknown_tool"
            };
            return Dispatch::Done(ToolResult::json(
                false,
                json!({
                    "error": reason,
                    "message": format!("Tool '{}' is not available on this step", call.name),
                }),
            ));
        }

        // Schema check precedes execution and relay alike.
        if call.input.is_none() {
            let message = match ToolInput::decode(&call.name, &call.arguments) {
                Err(e) => e.to_string(),
                Ok(_) => format!("{}: arguments do not match the schema", call.name),
            };
            warn!(tool = %call.name, error = %message, "Tool call rejected");
            let mut result = ToolResult::json(
                false,
                json!({ "error": "invalid_arguments", "message": message }),
            );
            result.call_id = call.id.clone();
            return Dispatch::Done(result);
        }

        let tool_call = ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        };
        match self.tools.execute(&tool_call).await {
            Ok(result) => Dispatch::Done(result),
            Err(ToolError::ClientSide(_)) => Dispatch::Pending,
            Err(e @ ToolError::Upstream { .. }) => Dispatch::Upstream(e),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call rejected");
                let kind = match &e {
                    ToolError::InvalidArguments(_) => "invalid_arguments",
                    ToolError::NotFound(_) => "unknown_tool",
                    _ => "execution_failed",
                };
                let mut result = ToolResult::json(
                    false,
                    json!({ "error": kind, "message": e.to_string() }),
                );
                result.call_id = call.id.clone();
                Dispatch::Done(result)
            }
        }
    }

    async fn step_finished(
        &self,
        tx: &mpsc::Sender<AgentStreamEvent>,
        step: usize,
        finish_reason: FinishReason,
        usage: Usage,
    ) -> bool {
        tx.send(AgentStreamEvent::StepFinish {
            step,
            finish_reason,
            usage,
        })
        .await
        .is_ok()
    }
}

#[derive(Debug, Default)]
struct StreamedStep {
    text: String,
    calls: Vec<MessageToolCall>,
    usage: Usage,
}

/// Arguments that are not valid JSON are kept as the raw string, which no
/// tool schema accepts.
fn record_call(call: &MessageToolCall) -> RecordedCall {
    let arguments = call
        .arguments_json()
        .unwrap_or_else(|_| Value::String(call.arguments.clone()));
    RecordedCall::new(call.id.clone(), call.name.clone(), arguments)
}

fn result_value(result: &ToolResult) -> Value {
    result
        .data
        .clone()
        .unwrap_or_else(|| Value::String(result.output.clone()))
}
