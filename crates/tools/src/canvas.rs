//! Tools that read or edit the document.
//!
//! These only execute in-process when the session owns a document. Otherwise
//! they are declared to the model and the client runs them.

use std::sync::Arc;

use async_trait::async_trait;
use pengate_core::error::ToolError;
use pengate_core::tool::{Tool, ToolResult};
use pengate_core::{CanvasError, ImageSource, SharedDocument};
use pengate_script::{Interpreter, ScriptError};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::catalog::{BATCH_DESIGN, ToolSpec};
use crate::input::ToolInput;

/// Tool result for a failure the model can correct.
pub(crate) fn canvas_failure(err: &CanvasError) -> ToolResult {
    ToolResult::json(false, json!({ "error": err.kind(), "message": err.to_string() }))
}

/// A read-only query or bulk edit answered by the document.
pub struct CanvasTool {
    spec: &'static ToolSpec,
    document: SharedDocument,
}

impl CanvasTool {
    pub fn new(spec: &'static ToolSpec, document: SharedDocument) -> Self {
        Self { spec, document }
    }
}

#[async_trait]
impl Tool for CanvasTool {
    fn name(&self) -> &str {
        self.spec.name
    }

    fn description(&self) -> &str {
        self.spec.description
    }

    fn parameters_schema(&self) -> Value {
        self.spec.schema()
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let input = ToolInput::decode(self.name(), &arguments)?;
        let mut doc = self.document.lock().await;
        let outcome = match input {
            ToolInput::GetEditorState(i) => Ok(doc.editor_state(i.include_schema)),
            ToolInput::OpenDocument(i) => doc.open_document(&i.file_path_or_template),
            ToolInput::BatchGet(q) => doc.batch_get(&q),
            ToolInput::SnapshotLayout(q) => doc.snapshot_layout(&q),
            ToolInput::GetVariables(_) => Ok(doc.variables()),
            ToolInput::SetVariables(i) => Ok(doc.set_variables(i.variables, i.replace)),
            ToolInput::ReplaceAllMatchingProperties(i) => {
                doc.replace_matching_properties(&i.parents, &i.properties)
            }
            ToolInput::FindEmptySpaceOnCanvas(q) => doc.find_empty_space(&q),
            ToolInput::SearchAllUniqueProperties(i) => {
                doc.search_unique_properties(&i.parents, &i.properties)
            }
            other => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: self.name().into(),
                    reason: format!("{} is not a document query", other.tool_name()),
                });
            }
        };

        Ok(match outcome {
            Ok(data) => ToolResult::json(true, data),
            Err(err) => {
                debug!(tool = self.name(), error = %err, "document query failed");
                canvas_failure(&err)
            }
        })
    }
}

/// `batch_design`: runs a mini-script with the document locked throughout.
pub struct BatchDesignTool {
    interpreter: Interpreter,
}

impl BatchDesignTool {
    pub fn new(document: SharedDocument, images: Arc<dyn ImageSource>) -> Self {
        Self {
            interpreter: Interpreter::new(document, images),
        }
    }
}

#[async_trait]
impl Tool for BatchDesignTool {
    fn name(&self) -> &str {
        BATCH_DESIGN.name
    }

    fn description(&self) -> &str {
        BATCH_DESIGN.description
    }

    fn parameters_schema(&self) -> Value {
        BATCH_DESIGN.schema()
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let ToolInput::BatchDesign(input) = ToolInput::decode(self.name(), &arguments)? else {
            return Err(ToolError::InvalidArguments(self.name().into()));
        };

        match self.interpreter.run(&input.operations).await {
            Ok(report) => {
                info!(
                    applied = report.applied.len(),
                    failed = !report.is_success(),
                    "batch_design finished"
                );
                Ok(ToolResult::json(report.is_success(), report.to_value()))
            }
            Err(ScriptError::Upstream { source, .. }) => Err(ToolError::Upstream {
                tool_name: self.name().into(),
                source,
            }),
            Err(err) => {
                warn!(error = %err, "batch_design rejected");
                Ok(ToolResult::json(
                    false,
                    json!({
                        "error": err.kind(),
                        "line": err.line(),
                        "message": err.to_string(),
                        "applied": [],
                    }),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BATCH_GET, FIND_EMPTY_SPACE_ON_CANVAS, GET_VARIABLES, SET_VARIABLES};
    use pengate_canvas::{InMemoryDocument, PlaceholderImageSource};
    use pengate_core::document::shared;
    use pengate_core::{ImageFill, ImageKind, ProviderError};

    fn document() -> SharedDocument {
        shared(InMemoryDocument::new())
    }

    fn design_tool(document: SharedDocument) -> BatchDesignTool {
        BatchDesignTool::new(document, Arc::new(PlaceholderImageSource::default()))
    }

    struct DownImages;

    #[async_trait]
    impl ImageSource for DownImages {
        fn name(&self) -> &str {
            "down"
        }

        async fn fetch(&self, _: ImageKind, _: &str) -> Result<ImageFill, ProviderError> {
            Err(ProviderError::Timeout("image lookup".into()))
        }
    }

    #[tokio::test]
    async fn batch_design_applies_and_reports() {
        let doc = document();
        let tool = design_tool(doc.clone());
        let result = tool
            .execute(json!({"operations": "a=I(document,{type:\"frame\"})\nU(a,{width:100})"}))
            .await
            .unwrap();
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["applied"].as_array().unwrap().len(), 2);
        let id = data["bindings"]["a"].as_str().unwrap().to_string();

        let guard = doc.lock().await;
        let target = guard.resolve(&id).unwrap();
        assert_eq!(guard.node_type(&target).unwrap().as_str(), "frame");
    }

    #[tokio::test]
    async fn batch_design_validation_is_a_failed_result() {
        let tool = design_tool(document());
        let result = tool
            .execute(json!({"operations": "U(ghost,{width:1})"}))
            .await
            .unwrap();
        assert!(!result.success);
        let data = result.data.unwrap();
        assert_eq!(data["error"], "validation_failure");
        assert_eq!(data["line"], 1);
    }

    #[tokio::test]
    async fn missing_node_is_reported_not_raised() {
        let tool = design_tool(document());
        let result = tool
            .execute(json!({"operations": "U(\"missingId\",{content:\"x\"})"}))
            .await
            .unwrap();
        assert!(!result.success);
        let data = result.data.unwrap();
        assert_eq!(data["failure"]["kind"], "not_found");
        assert_eq!(data["applied"], json!([]));
    }

    #[tokio::test]
    async fn image_outage_is_upstream() {
        let doc = document();
        let tool = BatchDesignTool::new(doc, Arc::new(DownImages));
        let err = tool
            .execute(json!({
                "operations": "hero=I(document,{type:\"frame\"})\nG(hero,\"stock\",\"harbor at dawn\")"
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Upstream { .. }));
    }

    #[tokio::test]
    async fn batch_design_rejects_extra_arguments() {
        let tool = design_tool(document());
        let err = tool
            .execute(json!({"operations": "D(\"x\")", "atomic": true}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn variables_round_trip() {
        let doc = document();
        let set = CanvasTool::new(&SET_VARIABLES, doc.clone());
        let get = CanvasTool::new(&GET_VARIABLES, doc);
        set.execute(json!({"variables": {"--primary": {"type": "color", "value": "#3B82F6"}}}))
            .await
            .unwrap();
        let result = get.execute(json!({})).await.unwrap();
        assert!(result.success);
        assert_eq!(
            result.data.unwrap()["variables"]["--primary"]["value"],
            "#3B82F6"
        );
    }

    #[tokio::test]
    async fn query_failure_carries_kind() {
        let tool = CanvasTool::new(&FIND_EMPTY_SPACE_ON_CANVAS, document());
        let result = tool
            .execute(json!({
                "direction": "right", "width": 100, "height": 100, "padding": 10, "nodeId": "nope"
            }))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.data.unwrap()["error"], "not_found");
    }

    #[tokio::test]
    async fn wrong_tool_input_is_refused() {
        let tool = CanvasTool::new(&BATCH_GET, document());
        let err = tool.execute(json!({"readDepth": "deep"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
