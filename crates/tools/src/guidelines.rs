//! `get_guidelines`: static design rules per topic.

use async_trait::async_trait;
use pengate_core::error::ToolError;
use pengate_core::tool::{Tool, ToolResult};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::catalog::GET_GUIDELINES;
use crate::input::ToolInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuidelineTopic {
    Code,
    Table,
    Tailwind,
    LandingPage,
    DesignSystem,
}

impl GuidelineTopic {
    pub const ALL: [GuidelineTopic; 5] = [
        GuidelineTopic::Code,
        GuidelineTopic::Table,
        GuidelineTopic::Tailwind,
        GuidelineTopic::LandingPage,
        GuidelineTopic::DesignSystem,
    ];

    pub const NAMES: [&'static str; 5] =
        ["code", "table", "tailwind", "landing-page", "design-system"];

    pub fn as_str(&self) -> &'static str {
        match self {
            GuidelineTopic::Code => "code",
            GuidelineTopic::Table => "table",
            GuidelineTopic::Tailwind => "tailwind",
            GuidelineTopic::LandingPage => "landing-page",
            GuidelineTopic::DesignSystem => "design-system",
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            GuidelineTopic::Code => include_str!("../text/guidelines/code.md"),
            GuidelineTopic::Table => include_str!("../text/guidelines/table.md"),
            GuidelineTopic::Tailwind => include_str!("../text/guidelines/tailwind.md"),
            GuidelineTopic::LandingPage => include_str!("../text/guidelines/landing-page.md"),
            GuidelineTopic::DesignSystem => include_str!("../text/guidelines/design-system.md"),
        }
    }
}

impl std::fmt::Display for GuidelineTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct GuidelinesTool;

#[async_trait]
impl Tool for GuidelinesTool {
    fn name(&self) -> &str {
        GET_GUIDELINES.name
    }

    fn description(&self) -> &str {
        GET_GUIDELINES.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        GET_GUIDELINES.schema()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let ToolInput::GetGuidelines(input) = ToolInput::decode(self.name(), &arguments)? else {
            return Err(ToolError::InvalidArguments(self.name().into()));
        };
        Ok(ToolResult::json(
            true,
            json!({
                "topic": input.topic,
                "guidelines": input.topic.text().trim_end(),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_serde_tags() {
        for (topic, name) in GuidelineTopic::ALL.iter().zip(GuidelineTopic::NAMES) {
            assert_eq!(topic.as_str(), name);
            assert_eq!(serde_json::to_value(topic).unwrap(), json!(name));
        }
    }

    #[test]
    fn every_topic_has_text() {
        for topic in GuidelineTopic::ALL {
            assert!(!topic.text().trim().is_empty(), "{topic}");
        }
        assert!(GuidelineTopic::DesignSystem.text().contains("fill_container"));
    }

    #[tokio::test]
    async fn returns_topic_and_text() {
        let result = GuidelinesTool
            .execute(json!({"topic": "design-system"}))
            .await
            .unwrap();
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["topic"], "design-system");
        assert!(data["guidelines"].as_str().unwrap().contains("auto-layout"));
    }

    #[tokio::test]
    async fn unknown_topic_never_executes() {
        let err = GuidelinesTool
            .execute(json!({"topic": "motion"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
