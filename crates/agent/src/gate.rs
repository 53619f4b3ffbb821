//! Step gate: which tools the model may call on the next step.
//!
//! The gate is a pure function of the mode and the step history, recomputed
//! from scratch before every step. `batch_design` stays withheld until the
//! history shows the prerequisite lookups; once they appear it stays
//! available for the rest of the request, since history only grows.
//!
//! A prerequisite counts as soon as the call was made, whatever its result
//! was. Variables and empty-space lookups count by name; guidelines count
//! when the raw `topic` argument is `design-system`.

use pengate_tools::catalog::{BATCH_DESIGN, FIND_EMPTY_SPACE_ON_CANVAS, GET_GUIDELINES, GET_VARIABLES};
use pengate_tools::guidelines::GuidelineTopic;
use serde_json::Value;

use crate::history::{RecordedCall, StepHistory};
use crate::mode::AgentMode;

pub const EDITS_RULE: &str = "MANDATORY TOOL RULE: You must call get_guidelines with \
topic=\"design-system\" before your first batch_design call. Until then, batch_design is \
unavailable.";

pub const FAST_RULE: &str = "MANDATORY FAST TOOL RULES:\n\
1) You must call get_guidelines with topic=\"design-system\".\n\
2) You must call get_variables.\n\
3) You must call find_empty_space_on_canvas with the intended embed width/height.\n\
Only after all three are completed, batch_design becomes available.";

/// A prerequisite lookup the gate watches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prerequisite {
    DesignSystemGuidelines,
    Variables,
    EmptySpace,
}

impl Prerequisite {
    pub fn tool_name(&self) -> &'static str {
        match self {
            Prerequisite::DesignSystemGuidelines => GET_GUIDELINES.name,
            Prerequisite::Variables => GET_VARIABLES.name,
            Prerequisite::EmptySpace => FIND_EMPTY_SPACE_ON_CANVAS.name,
        }
    }

    fn satisfied_by(&self, call: &RecordedCall) -> bool {
        if call.name != self.tool_name() {
            return false;
        }
        match self {
            Prerequisite::DesignSystemGuidelines => {
                call.arguments.get("topic").and_then(Value::as_str)
                    == Some(GuidelineTopic::DesignSystem.as_str())
            }
            Prerequisite::Variables | Prerequisite::EmptySpace => true,
        }
    }
}

/// Prerequisites that unlock `batch_design` in a mode.
pub fn prerequisites(mode: AgentMode) -> &'static [Prerequisite] {
    match mode {
        AgentMode::Edits => &[Prerequisite::DesignSystemGuidelines],
        AgentMode::Fast => &[
            Prerequisite::DesignSystemGuidelines,
            Prerequisite::Variables,
            Prerequisite::EmptySpace,
        ],
    }
}

/// Prerequisites the history has not shown yet.
pub fn missing(mode: AgentMode, history: &StepHistory) -> Vec<Prerequisite> {
    prerequisites(mode)
        .iter()
        .copied()
        .filter(|p| !history.calls().any(|c| p.satisfied_by(c)))
        .collect()
}

/// What the next step may do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPlan {
    pub active_tools: Vec<String>,
    pub system: String,
    pub locked: bool,
}

impl StepPlan {
    pub fn allows(&self, tool: &str) -> bool {
        self.active_tools.iter().any(|t| t == tool)
    }
}

/// Plan the next step. `tool_names` is the full tool list in offer order.
pub fn plan_step(
    mode: AgentMode,
    base_system: &str,
    history: &StepHistory,
    tool_names: &[&str],
) -> StepPlan {
    let locked = !missing(mode, history).is_empty();
    if !locked {
        return StepPlan {
            active_tools: tool_names.iter().map(|n| n.to_string()).collect(),
            system: base_system.to_string(),
            locked,
        };
    }

    let rule = match mode {
        AgentMode::Edits => EDITS_RULE,
        AgentMode::Fast => FAST_RULE,
    };
    StepPlan {
        active_tools: tool_names
            .iter()
            .filter(|n| **n != BATCH_DESIGN.name)
            .map(|n| n.to_string())
            .collect(),
        system: format!("{base_system}\n\n{rule}"),
        locked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::StepRecord;
    use crate::stream_event::FinishReason;
    use pengate_core::provider::Usage;
    use pengate_tools::CATALOG;
    use serde_json::{Value, json};

    fn names() -> Vec<&'static str> {
        CATALOG.iter().map(|s| s.name).collect()
    }

    fn call(name: &str, args: Value) -> RecordedCall {
        RecordedCall::new(format!("call_{name}"), name, args)
    }

    fn with_steps(steps: Vec<Vec<RecordedCall>>) -> StepHistory {
        let mut history = StepHistory::new();
        for calls in steps {
            history.push(StepRecord {
                text: String::new(),
                tool_calls: calls,
                tool_results: vec![],
                finish_reason: FinishReason::ToolCalls,
                usage: Usage::default(),
            });
        }
        history
    }

    fn design_system() -> RecordedCall {
        call("get_guidelines", json!({"topic": "design-system"}))
    }

    fn empty_space() -> RecordedCall {
        call(
            "find_empty_space_on_canvas",
            json!({"direction": "right", "width": 390, "height": 844, "padding": 100}),
        )
    }

    #[test]
    fn edits_starts_locked() {
        let plan = plan_step(AgentMode::Edits, "BASE", &StepHistory::new(), &names());
        assert!(plan.locked);
        assert!(!plan.allows("batch_design"));
        assert_eq!(plan.active_tools.len(), 12);
        assert_eq!(plan.system, format!("BASE\n\n{EDITS_RULE}"));
    }

    #[test]
    fn edits_unlocks_on_design_system_guidelines() {
        let history = with_steps(vec![vec![design_system()]]);
        let plan = plan_step(AgentMode::Edits, "BASE", &history, &names());
        assert!(!plan.locked);
        assert!(plan.allows("batch_design"));
        assert_eq!(plan.active_tools, names());
        assert_eq!(plan.system, "BASE");
    }

    #[test]
    fn other_topics_do_not_unlock() {
        let history = with_steps(vec![vec![
            call("get_guidelines", json!({"topic": "landing-page"})),
            call("get_guidelines", json!({"topic": "design system"})),
        ]]);
        assert!(plan_step(AgentMode::Edits, "", &history, &names()).locked);
    }

    #[test]
    fn edits_stays_unlocked_after_other_calls() {
        let history = with_steps(vec![
            vec![design_system()],
            vec![call("get_variables", json!({}))],
            vec![call("batch_get", json!({"nodeIds": ["a"]}))],
        ]);
        assert!(!plan_step(AgentMode::Edits, "", &history, &names()).locked);
    }

    #[test]
    fn fast_needs_all_three() {
        let partial = with_steps(vec![vec![
            design_system(),
            call("get_variables", json!({})),
        ]]);
        let plan = plan_step(AgentMode::Fast, "BASE", &partial, &names());
        assert!(plan.locked);
        assert!(!plan.allows("batch_design"));
        assert_eq!(plan.system, format!("BASE\n\n{FAST_RULE}"));
        assert_eq!(missing(AgentMode::Fast, &partial), vec![Prerequisite::EmptySpace]);
    }

    #[test]
    fn fast_order_does_not_matter() {
        let history = with_steps(vec![
            vec![empty_space()],
            vec![call("get_variables", json!({}))],
            vec![design_system()],
        ]);
        assert!(!plan_step(AgentMode::Fast, "", &history, &names()).locked);

        let one_step = with_steps(vec![vec![
            call("get_variables", json!({})),
            design_system(),
            empty_space(),
        ]]);
        assert!(!plan_step(AgentMode::Fast, "", &one_step, &names()).locked);
    }

    #[test]
    fn edits_prerequisite_alone_does_not_unlock_fast() {
        let history = with_steps(vec![vec![design_system()]]);
        assert!(!plan_step(AgentMode::Edits, "", &history, &names()).locked);
        assert!(plan_step(AgentMode::Fast, "", &history, &names()).locked);
    }

    #[test]
    fn rejected_prerequisite_calls_still_count() {
        let history = with_steps(vec![vec![
            call("get_guidelines", json!({"topic": "design-system", "verbose": true})),
            call("get_variables", json!({"filter": "colors"})),
            call("find_empty_space_on_canvas", json!({"width": 390, "height": 844})),
        ]]);
        assert!(history.calls().all(|c| c.input.is_none()));
        assert!(missing(AgentMode::Fast, &history).is_empty());
        assert!(plan_step(AgentMode::Fast, "", &history, &names()).allows("batch_design"));
    }

    #[test]
    fn guidelines_without_a_topic_do_not_count() {
        let history = with_steps(vec![vec![
            call("get_guidelines", json!({})),
            call("get_guidelines", json!({"topic": 7})),
        ]]);
        assert_eq!(
            missing(AgentMode::Edits, &history),
            vec![Prerequisite::DesignSystemGuidelines]
        );
    }

    #[test]
    fn plan_is_recomputed_not_remembered() {
        let history = with_steps(vec![vec![design_system()]]);
        let a = plan_step(AgentMode::Edits, "BASE", &history, &names());
        let b = plan_step(AgentMode::Edits, "BASE", &history, &names());
        assert_eq!(a, b);
    }

    #[test]
    fn locked_plan_keeps_offer_order() {
        let plan = plan_step(AgentMode::Fast, "", &StepHistory::new(), &names());
        let expected: Vec<_> = names()
            .into_iter()
            .filter(|n| *n != "batch_design")
            .collect();
        assert_eq!(plan.active_tools, expected);
    }
}
