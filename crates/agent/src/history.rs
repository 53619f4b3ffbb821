//! Append-only record of the steps of one chat request.

use pengate_core::provider::Usage;
use pengate_telemetry::{LogStep, LoggedCall, LoggedResult};
use pengate_tools::ToolInput;
use serde_json::Value;

use crate::stream_event::FinishReason;

/// A tool call as the model made it, plus its decoded form when the
/// arguments matched the tool's schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    pub input: Option<ToolInput>,
}

impl RecordedCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        let name = name.into();
        let input = ToolInput::decode(&name, &arguments).ok();
        Self {
            id: id.into(),
            name,
            arguments,
            input,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedResult {
    pub call_id: String,
    pub name: String,
    pub success: bool,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub text: String,
    pub tool_calls: Vec<RecordedCall>,
    pub tool_results: Vec<RecordedResult>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepHistory {
    steps: Vec<StepRecord>,
}

impl StepHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: StepRecord) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Every tool call across all steps, in order.
    pub fn calls(&self) -> impl Iterator<Item = &RecordedCall> {
        self.steps.iter().flat_map(|s| s.tool_calls.iter())
    }

    pub fn total_usage(&self) -> Usage {
        let mut total = Usage::default();
        for step in &self.steps {
            total += step.usage;
        }
        total
    }

    /// Steps in session-log form.
    pub fn to_log_steps(&self) -> Vec<LogStep> {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| LogStep {
                step_number: i,
                text: step.text.clone(),
                tool_calls: step
                    .tool_calls
                    .iter()
                    .map(|c| LoggedCall {
                        tool_name: c.name.clone(),
                        args: c.arguments.clone(),
                    })
                    .collect(),
                tool_results: step
                    .tool_results
                    .iter()
                    .map(|r| LoggedResult {
                        tool_name: r.name.clone(),
                        result: r.result.clone(),
                    })
                    .collect(),
                finish_reason: step.finish_reason.as_str().to_string(),
                usage: step.usage,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pengate_tools::GuidelineTopic;
    use serde_json::json;

    fn step(calls: Vec<RecordedCall>, input: u32) -> StepRecord {
        StepRecord {
            text: String::new(),
            tool_calls: calls,
            tool_results: vec![],
            finish_reason: FinishReason::ToolCalls,
            usage: Usage {
                input_tokens: input,
                output_tokens: 1,
            },
        }
    }

    #[test]
    fn call_decodes_when_schema_matches() {
        let call = RecordedCall::new("c1", "get_guidelines", json!({"topic": "design-system"}));
        match call.input {
            Some(ToolInput::GetGuidelines(i)) => assert_eq!(i.topic, GuidelineTopic::DesignSystem),
            other => panic!("unexpected {other:?}"),
        }
        let bad = RecordedCall::new("c2", "get_guidelines", json!({"topic": "DESIGN"}));
        assert!(bad.input.is_none());
    }

    #[test]
    fn calls_flatten_across_steps() {
        let mut history = StepHistory::new();
        history.push(step(vec![RecordedCall::new("a", "get_variables", json!({}))], 10));
        history.push(step(
            vec![
                RecordedCall::new("b", "get_editor_state", json!({"include_schema": false})),
                RecordedCall::new("c", "get_style_guide_tags", json!({})),
            ],
            20,
        ));
        let ids: Vec<_> = history.calls().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(history.total_usage().input_tokens, 30);
    }

    #[test]
    fn log_steps_are_numbered_from_zero() {
        let mut history = StepHistory::new();
        history.push(step(vec![], 1));
        history.push(step(vec![], 1));
        let steps = history.to_log_steps();
        assert_eq!(steps[0].step_number, 0);
        assert_eq!(steps[1].step_number, 1);
        assert_eq!(steps[1].finish_reason, "tool-calls");
    }
}
