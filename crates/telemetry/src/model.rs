//! Data model for session records.

use chrono::{DateTime, SecondsFormat, Utc};
use pengate_core::provider::Usage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Step ──────────────────────────────────────────────────────────────────

/// A tool call as the model made it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedCall {
    pub tool_name: String,
    pub args: Value,
}

/// A tool result as the model saw it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedResult {
    pub tool_name: String,
    pub result: Value,
}

/// One generation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStep {
    /// Zero-based.
    pub step_number: usize,
    pub text: String,
    pub tool_calls: Vec<LoggedCall>,
    pub tool_results: Vec<LoggedResult>,
    pub finish_reason: String,
    pub usage: Usage,
}

// ── Session ───────────────────────────────────────────────────────────────

/// Everything worth keeping about one chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLog {
    pub session_id: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub model: String,
    pub system_prompt: String,
    /// Messages as the client sent them.
    pub messages: Vec<Value>,
    pub steps: Vec<LogStep>,
    pub total_usage: Usage,
}

impl SessionLog {
    pub fn new(
        session_id: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self::at(Utc::now(), session_id, model, system_prompt)
    }

    pub fn at(
        time: DateTime<Utc>,
        session_id: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: time.to_rfc3339_opts(SecondsFormat::Millis, true),
            model: model.into(),
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
            steps: Vec::new(),
            total_usage: Usage::default(),
        }
    }

    pub fn with_messages(mut self, messages: Vec<Value>) -> Self {
        self.messages = messages;
        self
    }

    /// Append a step and fold its usage into the total.
    pub fn push_step(&mut self, step: LogStep) {
        self.total_usage += step.usage;
        self.steps.push(step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn step(n: usize, input: u32, output: u32) -> LogStep {
        LogStep {
            step_number: n,
            text: String::new(),
            tool_calls: vec![LoggedCall {
                tool_name: "get_guidelines".into(),
                args: json!({"topic": "design-system"}),
            }],
            tool_results: vec![],
            finish_reason: "tool-calls".into(),
            usage: Usage {
                input_tokens: input,
                output_tokens: output,
            },
        }
    }

    #[test]
    fn steps_accumulate_usage() {
        let mut log = SessionLog::new("s1", "anthropic:claude", "system");
        log.push_step(step(0, 100, 20));
        log.push_step(step(1, 150, 30));
        assert_eq!(log.total_usage.input_tokens, 250);
        assert_eq!(log.total_usage.output_tokens, 50);
        assert_eq!(log.steps.len(), 2);
    }

    #[test]
    fn serializes_camel_case() {
        let time = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut log = SessionLog::at(time, "s1", "openai:gpt-4o", "be brief")
            .with_messages(vec![json!({"role": "user", "content": "hi"})]);
        log.push_step(step(0, 1, 2));
        let value = serde_json::to_value(&log).unwrap();
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["timestamp"], "2026-03-01T12:00:00.000Z");
        assert_eq!(value["systemPrompt"], "be brief");
        assert_eq!(value["steps"][0]["stepNumber"], 0);
        assert_eq!(value["steps"][0]["toolCalls"][0]["toolName"], "get_guidelines");
        assert_eq!(value["totalUsage"]["outputTokens"], 2);
    }
}
