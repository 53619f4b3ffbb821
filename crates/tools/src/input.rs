//! Typed tool arguments.
//!
//! Arguments are decoded exactly once, at the tool boundary, into
//! [`ToolInput`]. Every struct rejects unknown fields, so a call that does
//! not match its schema never reaches execution.

use pengate_core::{
    BatchGetQuery, EmptySpaceQuery, LayoutQuery, PropertyName, PropertyReplacements, Props,
    ToolError,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::guidelines::GuidelineTopic;

/// Arguments of a tool that takes none.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoArguments {}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditorStateInput {
    pub include_schema: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OpenDocumentInput {
    pub file_path_or_template: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchDesignInput {
    pub operations: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetVariablesInput {
    pub variables: Props,
    #[serde(default)]
    pub replace: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplacePropertiesInput {
    pub parents: Vec<String>,
    pub properties: PropertyReplacements,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UniquePropertiesInput {
    pub parents: Vec<String>,
    pub properties: Vec<PropertyName>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuidelinesInput {
    pub topic: GuidelineTopic,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StyleGuideInput {
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One decoded tool call, tagged by tool name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolInput {
    GetEditorState(EditorStateInput),
    OpenDocument(OpenDocumentInput),
    BatchGet(BatchGetQuery),
    SnapshotLayout(LayoutQuery),
    GetVariables(NoArguments),
    BatchDesign(BatchDesignInput),
    SetVariables(SetVariablesInput),
    ReplaceAllMatchingProperties(ReplacePropertiesInput),
    FindEmptySpaceOnCanvas(EmptySpaceQuery),
    SearchAllUniqueProperties(UniquePropertiesInput),
    GetGuidelines(GuidelinesInput),
    GetStyleGuideTags(NoArguments),
    GetStyleGuide(StyleGuideInput),
}

impl ToolInput {
    /// Decode the arguments of a call to `name`.
    pub fn decode(name: &str, arguments: &Value) -> Result<Self, ToolError> {
        // A model that sends no arguments for an argument-less tool sends null.
        let arguments = match arguments {
            Value::Null => json!({}),
            other => other.clone(),
        };
        serde_json::from_value(json!({ "name": name, "arguments": arguments }))
            .map_err(|e| ToolError::InvalidArguments(format!("{name}: {e}")))
    }

    pub fn tool_name(&self) -> &'static str {
        match self {
            ToolInput::GetEditorState(_) => "get_editor_state",
            ToolInput::OpenDocument(_) => "open_document",
            ToolInput::BatchGet(_) => "batch_get",
            ToolInput::SnapshotLayout(_) => "snapshot_layout",
            ToolInput::GetVariables(_) => "get_variables",
            ToolInput::BatchDesign(_) => "batch_design",
            ToolInput::SetVariables(_) => "set_variables",
            ToolInput::ReplaceAllMatchingProperties(_) => "replace_all_matching_properties",
            ToolInput::FindEmptySpaceOnCanvas(_) => "find_empty_space_on_canvas",
            ToolInput::SearchAllUniqueProperties(_) => "search_all_unique_properties",
            ToolInput::GetGuidelines(_) => "get_guidelines",
            ToolInput::GetStyleGuideTags(_) => "get_style_guide_tags",
            ToolInput::GetStyleGuide(_) => "get_style_guide",
        }
    }
}
