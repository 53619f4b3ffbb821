//! `POST /api/chat`: validate, resolve the model, stream the session.
//!
//! The body is validated field by field so a 400 can name every offending
//! field at once. Nothing reaches a provider until validation has passed.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::{Stream, StreamExt};
use pengate_agent::{AgentMode, ChatSession, build_system_prompt};
use pengate_core::message::{Message, MessageToolCall};
use pengate_tools::build_registry;
use serde_json::{Map, Value};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::GatewayState;
use crate::error::{FieldErrors, GatewayError};

/// A validated chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// UI messages exactly as the client sent them.
    pub messages: Vec<Value>,
    pub canvas_context: Option<String>,
    pub model: Option<String>,
    pub agent_mode: AgentMode,
}

impl ChatRequest {
    pub fn parse(body: &[u8]) -> Result<Self, GatewayError> {
        let mut errors = FieldErrors::new();
        let value: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                errors.insert("body".into(), vec![format!("Malformed JSON: {e}")]);
                return Err(GatewayError::InvalidBody(errors));
            }
        };
        let Value::Object(fields) = value else {
            errors.insert("body".into(), vec!["Expected object".into()]);
            return Err(GatewayError::InvalidBody(errors));
        };

        let messages = parse_messages(&fields, &mut errors);
        let canvas_context = optional_string(&fields, "canvasContext", &mut errors);
        let model = optional_string(&fields, "model", &mut errors);
        let agent_mode = match fields.get("agentMode") {
            None => AgentMode::default(),
            Some(Value::String(s)) => AgentMode::parse(s).unwrap_or_else(|| {
                push(
                    &mut errors,
                    "agentMode",
                    format!("Invalid enum value. Expected 'edits' | 'fast', received '{s}'"),
                );
                AgentMode::default()
            }),
            Some(other) => {
                push(&mut errors, "agentMode", expected("string", other));
                AgentMode::default()
            }
        };

        if !errors.is_empty() {
            return Err(GatewayError::InvalidBody(errors));
        }
        Ok(Self {
            messages,
            canvas_context,
            model,
            agent_mode,
        })
    }

    /// Conversation in model form. Settled tool calls are kept with their
    /// results; system-role messages and messages with nothing to say are
    /// skipped.
    pub fn to_messages(&self) -> Vec<Message> {
        self.messages.iter().flat_map(ui_message).collect()
    }
}

const ROLES: [&str; 3] = ["user", "assistant", "system"];

fn parse_messages(fields: &Map<String, Value>, errors: &mut FieldErrors) -> Vec<Value> {
    let items = match fields.get("messages") {
        None => {
            push(errors, "messages", "Required".into());
            return Vec::new();
        }
        Some(Value::Array(items)) => items,
        Some(other) => {
            push(errors, "messages", expected("array", other));
            return Vec::new();
        }
    };
    if items.is_empty() {
        push(errors, "messages", "messages must not be empty".into());
    }
    for (i, item) in items.iter().enumerate() {
        let Value::Object(message) = item else {
            push(errors, &format!("messages.{i}"), expected("object", item));
            continue;
        };
        match message.get("role").and_then(Value::as_str) {
            Some(role) if ROLES.contains(&role) => {}
            _ => push(
                errors,
                &format!("messages.{i}.role"),
                "Expected 'user' | 'assistant' | 'system'".into(),
            ),
        }
    }
    items.clone()
}

fn optional_string(
    fields: &Map<String, Value>,
    key: &str,
    errors: &mut FieldErrors,
) -> Option<String> {
    match fields.get(key) {
        None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            push(errors, key, expected("string", other));
            None
        }
    }
}

fn push(errors: &mut FieldErrors, field: &str, message: String) {
    errors.entry(field.to_string()).or_default().push(message);
}

fn expected(kind: &str, got: &Value) -> String {
    let received = match got {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    format!("Expected {kind}, received {received}")
}

/// Tool part states that carry a result the model must see.
const SETTLED_STATES: [&str; 2] = ["output-available", "output-error"];

/// `{ role, content }` or `{ role, parts: [...] }` in model form.
///
/// Assistant parts are split into steps at `step-start`. Each step becomes
/// one assistant message with its text and settled tool calls, followed by
/// one tool-result message per call. Calls still waiting on the client are
/// dropped since they have no result to pair with.
fn ui_message(value: &Value) -> Vec<Message> {
    let Some(role) = value.get("role").and_then(Value::as_str) else {
        return Vec::new();
    };
    let parts: &[Value] = match value.get("content") {
        Some(Value::String(text)) => return text_message(role, text.clone()).into_iter().collect(),
        _ => value
            .get("parts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
    };

    if role != "assistant" {
        let text: String = parts.iter().filter_map(text_part).collect();
        return text_message(role, text).into_iter().collect();
    }

    let mut messages = Vec::new();
    let mut step = AssistantStep::default();
    for part in parts {
        match part.get("type").and_then(Value::as_str) {
            Some("step-start") => step.flush(&mut messages),
            Some("text") => step.text.extend(text_part(part)),
            Some(kind) => {
                if let Some(call) = tool_part(kind, part) {
                    step.calls.push(call);
                }
            }
            None => {}
        }
    }
    step.flush(&mut messages);
    messages
}

fn text_message(role: &str, text: String) -> Option<Message> {
    if text.trim().is_empty() {
        return None;
    }
    match role {
        "user" => Some(Message::user(text)),
        "assistant" => Some(Message::assistant(text)),
        _ => {
            debug!(role, "Skipping message role the model does not take inline");
            None
        }
    }
}

fn text_part(part: &Value) -> Option<&str> {
    if part.get("type").and_then(Value::as_str) != Some("text") {
        return None;
    }
    part.get("text").and_then(Value::as_str)
}

/// A settled `tool-<name>` or `dynamic-tool` part as a call plus its result.
fn tool_part(kind: &str, part: &Value) -> Option<(MessageToolCall, String)> {
    let name = match kind.strip_prefix("tool-") {
        Some(name) => name,
        None if kind == "dynamic-tool" => part.get("toolName")?.as_str()?,
        None => return None,
    };
    let state = part.get("state").and_then(Value::as_str)?;
    if !SETTLED_STATES.contains(&state) {
        return None;
    }
    let id = part.get("toolCallId")?.as_str()?;
    let input = part.get("input").cloned().unwrap_or_else(|| Value::Object(Map::new()));
    let output = if state == "output-error" {
        let message = part.get("errorText").and_then(Value::as_str).unwrap_or("Tool failed");
        serde_json::json!({ "error": message }).to_string()
    } else {
        match part.get("output") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "null".into(),
        }
    };
    Some((
        MessageToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: input.to_string(),
        },
        output,
    ))
}

#[derive(Default)]
struct AssistantStep {
    text: String,
    calls: Vec<(MessageToolCall, String)>,
}

impl AssistantStep {
    fn flush(&mut self, messages: &mut Vec<Message>) {
        let text = std::mem::take(&mut self.text);
        let calls = std::mem::take(&mut self.calls);
        if calls.is_empty() {
            messages.extend(text_message("assistant", text));
            return;
        }
        let (calls, outputs): (Vec<_>, Vec<_>) = calls.into_iter().unzip();
        let results: Vec<Message> = calls
            .iter()
            .zip(outputs)
            .map(|(call, output)| Message::tool_result(&call.id, output))
            .collect();
        messages.push(Message::assistant_with_calls(text, calls));
        messages.extend(results);
    }
}

pub async fn chat_handler(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, GatewayError> {
    let request = ChatRequest::parse(&body)?;
    let resolved = state.providers.resolve(request.model.as_deref())?;
    let mode = request.agent_mode;

    info!(
        mode = %mode,
        model = %resolved.label(),
        messages = request.messages.len(),
        has_canvas_context = request.canvas_context.is_some(),
        "Chat request"
    );

    let system = build_system_prompt(mode, request.canvas_context.as_deref());
    let tools = Arc::new(build_registry(&state.canvas_backend()));
    let agent = &state.config.agent;

    let mut session = ChatSession::new(
        resolved.provider.clone(),
        resolved.model.clone(),
        tools,
        mode,
        system,
    )
    .with_temperature(agent.temperature)
    .with_max_tokens(agent.max_tokens)
    .with_max_steps(state.max_steps(mode))
    .with_model_label(resolved.label());

    if let Some(writer) = &state.session_log {
        let messages = if state.config.logging.include_messages {
            request.messages.clone()
        } else {
            Vec::new()
        };
        session = session.with_session_log(writer.clone(), messages);
    }

    let rx = session.run(request.to_messages());
    let stream = ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(Event::default().event(event.event_type()).data(data))
    });

    Ok(Sse::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pengate_core::message::Role;
    use serde_json::json;

    fn details(body: Value) -> FieldErrors {
        match ChatRequest::parse(body.to_string().as_bytes()) {
            Err(GatewayError::InvalidBody(details)) => details,
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn minimal_request_defaults_to_edits() {
        let request = ChatRequest::parse(
            json!({"messages": [{"role": "user", "content": "hi"}]})
                .to_string()
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(request.agent_mode, AgentMode::Edits);
        assert!(request.canvas_context.is_none());
        assert!(request.model.is_none());
    }

    #[test]
    fn empty_messages_rejected() {
        let details = details(json!({"messages": []}));
        assert_eq!(details["messages"], vec!["messages must not be empty"]);
    }

    #[test]
    fn missing_messages_rejected() {
        assert_eq!(details(json!({}))["messages"], vec!["Required"]);
    }

    #[test]
    fn unknown_mode_rejected() {
        let details = details(json!({
            "messages": [{"role": "user", "content": "hi"}],
            "agentMode": "turbo"
        }));
        assert!(details["agentMode"][0].contains("'edits' | 'fast'"));
    }

    #[test]
    fn every_bad_field_is_reported() {
        let details = details(json!({
            "messages": [42, {"role": "robot"}],
            "canvasContext": 7,
            "model": null
        }));
        assert!(details.contains_key("messages.0"));
        assert!(details.contains_key("messages.1.role"));
        assert_eq!(details["canvasContext"], vec!["Expected string, received number"]);
        assert_eq!(details["model"], vec!["Expected string, received null"]);
    }

    #[test]
    fn malformed_json_rejected() {
        match ChatRequest::parse(b"{not json") {
            Err(GatewayError::InvalidBody(details)) => assert!(details.contains_key("body")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ui_messages_convert_from_content_or_parts() {
        let request = ChatRequest {
            messages: vec![
                json!({"role": "system", "content": "ignored"}),
                json!({"role": "user", "parts": [
                    {"type": "step-start"},
                    {"type": "text", "text": "make the "},
                    {"type": "text", "text": "header blue"}
                ]}),
                json!({"role": "assistant", "parts": [{"type": "tool-batch_design", "toolCallId": "c9", "state": "input-streaming"}]}),
                json!({"role": "assistant", "content": "Done."}),
            ],
            canvas_context: None,
            model: None,
            agent_mode: AgentMode::Edits,
        };
        let messages = request.to_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "make the header blue");
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[test]
    fn settled_tool_parts_become_calls_and_results() {
        let request = ChatRequest {
            messages: vec![
                json!({"role": "user", "content": "use my colors"}),
                json!({"role": "assistant", "parts": [
                    {"type": "step-start"},
                    {"type": "text", "text": "Checking variables."},
                    {"type": "tool-get_variables", "toolCallId": "c1", "state": "output-available",
                     "input": {}, "output": {"variables": {"--primary": "#FF0000"}}},
                    {"type": "tool-batch_get", "toolCallId": "c2", "state": "output-error",
                     "input": {"nodeIds": ["gone"]}, "errorText": "node not found"},
                    {"type": "step-start"},
                    {"type": "tool-batch_design", "toolCallId": "c3", "state": "input-available",
                     "input": {"operations": "U(\"a\",{})"}},
                    {"type": "text", "text": "Applying the palette."}
                ]}),
            ],
            canvas_context: None,
            model: None,
            agent_mode: AgentMode::Edits,
        };
        let messages = request.to_messages();
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Tool, Role::Assistant]
        );

        let step = &messages[1];
        assert_eq!(step.content, "Checking variables.");
        let names: Vec<_> = step.tool_calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["get_variables", "batch_get"]);
        assert_eq!(
            step.tool_calls[1].arguments_json().unwrap(),
            json!({"nodeIds": ["gone"]})
        );

        assert_eq!(messages[2].tool_call_id.as_deref(), Some("c1"));
        let output: Value = serde_json::from_str(&messages[2].content).unwrap();
        assert_eq!(output["variables"]["--primary"], "#FF0000");
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("c2"));
        assert!(messages[3].content.contains("node not found"));

        // the unsettled call is dropped, its step keeps the text
        assert_eq!(messages[4].content, "Applying the palette.");
        assert!(messages[4].tool_calls.is_empty());
    }
}
