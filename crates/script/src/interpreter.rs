//! Executes parsed scripts against a shared document.

use std::collections::BTreeMap;
use std::sync::Arc;

use pengate_core::{
    CanvasError, CopyOptions, Direction, DocumentTree, ImageSource, Placement, Props,
    ProviderError, SharedDocument, Target,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ScriptError;
use crate::ops::{Bindings, OpTag, Operation, PathExpr, Script, Statement};
use crate::parser::parse_script;

/// Gap used when a copy names `positionDirection` without `positionPadding`.
pub const DEFAULT_COPY_PADDING: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedOperation {
    pub index: usize,
    pub line: usize,
    pub op: OpTag,
    pub node_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationFailure {
    pub index: usize,
    pub line: usize,
    pub op: OpTag,
    /// `not_found` or `invalid_operation`.
    pub kind: String,
    pub message: String,
}

/// Outcome of one script call: what was applied, and where it stopped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptReport {
    pub applied: Vec<AppliedOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<OperationFailure>,
    /// Final binding values, echoed for the model. They do not outlive the call.
    pub bindings: BTreeMap<String, String>,
}

impl ScriptReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// One-line summary for logs and tool output.
    pub fn summary(&self) -> String {
        match &self.failure {
            None => format!("applied {} operation(s)", self.applied.len()),
            Some(f) => format!(
                "applied {} operation(s); operation {} ({} on line {}) failed: {}",
                self.applied.len(),
                f.index,
                f.op,
                f.line,
                f.message
            ),
        }
    }
}

enum StepError {
    Canvas(CanvasError),
    Upstream(ProviderError),
}

impl From<CanvasError> for StepError {
    fn from(e: CanvasError) -> Self {
        StepError::Canvas(e)
    }
}

/// Runs mini-scripts. Holds the document lock for a whole script so no
/// other tool call interleaves with it.
#[derive(Clone)]
pub struct Interpreter {
    document: SharedDocument,
    images: Arc<dyn ImageSource>,
}

impl Interpreter {
    pub fn new(document: SharedDocument, images: Arc<dyn ImageSource>) -> Self {
        Self { document, images }
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    /// Parse and execute. Validation failures apply nothing.
    pub async fn run(&self, source: &str) -> Result<ScriptReport, ScriptError> {
        let script = parse_script(source)?;
        self.execute(&script).await
    }

    pub async fn execute(&self, script: &Script) -> Result<ScriptReport, ScriptError> {
        let mut doc = self.document.lock().await;
        let mut bindings = Bindings::new(doc.root_id());
        let mut report = ScriptReport::default();

        for (index, statement) in script.statements.iter().enumerate() {
            let tag = statement.op.tag();
            match self.apply(&mut *doc, &bindings, statement).await {
                Ok(node_id) => {
                    let binding = statement.op.binding().map(str::to_string);
                    if let Some(name) = &binding {
                        bindings.bind(name, &node_id);
                    }
                    debug!(index, op = %tag, node_id = %node_id, "Applied operation");
                    report.applied.push(AppliedOperation {
                        index,
                        line: statement.line,
                        op: tag,
                        node_id,
                        binding,
                    });
                }
                Err(StepError::Canvas(e)) => {
                    warn!(index, op = %tag, line = statement.line, error = %e, "Script operation failed");
                    report.failure = Some(OperationFailure {
                        index,
                        line: statement.line,
                        op: tag,
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    });
                    break;
                }
                Err(StepError::Upstream(source)) => {
                    warn!(index, error = %source, "Image source failed; aborting script");
                    return Err(ScriptError::Upstream { index, source });
                }
            }
        }

        report.bindings = bindings.created();
        info!(
            operations = script.len(),
            applied = report.applied.len(),
            failed = report.failure.is_some(),
            "Script finished"
        );
        Ok(report)
    }

    /// Apply one operation; returns the created or affected node id.
    async fn apply(
        &self,
        doc: &mut dyn DocumentTree,
        bindings: &Bindings,
        statement: &Statement,
    ) -> Result<String, StepError> {
        match &statement.op {
            Operation::Insert {
                parent, payload, ..
            } => {
                reject_image_nodes(payload)?;
                let parent = resolve(&*doc, bindings, parent)?;
                Ok(doc.insert(&parent, payload.clone())?)
            }
            Operation::Copy {
                source,
                parent,
                overrides,
                ..
            } => {
                let source = resolve(&*doc, bindings, source)?;
                let parent = resolve(&*doc, bindings, parent)?;
                let options = copy_options(overrides.clone())?;
                Ok(doc.copy(&source, &parent, options)?)
            }
            Operation::Update { target, patch } => {
                let target = resolve(&*doc, bindings, target)?;
                doc.update(&target, patch.clone())?;
                Ok(target.key())
            }
            Operation::Replace {
                target, payload, ..
            } => {
                reject_image_nodes(payload)?;
                let target = resolve(&*doc, bindings, target)?;
                Ok(doc.replace(&target, payload.clone())?)
            }
            Operation::Move {
                node,
                parent,
                index,
            } => {
                let node = resolve(&*doc, bindings, node)?;
                let parent = parent.as_ref().map(|p| resolve(&*doc, bindings, p)).transpose()?;
                doc.move_node(&node, parent.as_ref(), *index)?;
                Ok(node.key())
            }
            Operation::Delete { target } => {
                let target = resolve(&*doc, bindings, target)?;
                doc.delete(&target)?;
                Ok(target.key())
            }
            Operation::GenerateImage {
                target,
                kind,
                prompt,
            } => {
                let target = resolve(&*doc, bindings, target)?;
                let node_type = doc.node_type(&target)?;
                if !node_type.can_carry_fill() {
                    return Err(CanvasError::invalid(format!(
                        "{node_type} '{target}' cannot carry an image fill; use a frame or rectangle"
                    ))
                    .into());
                }
                let fill = self
                    .images
                    .fetch(*kind, prompt)
                    .await
                    .map_err(StepError::Upstream)?;
                doc.apply_fill(&target, &fill)?;
                Ok(target.key())
            }
        }
    }
}

/// There is no image node type; images are fills applied with `G`.
fn reject_image_nodes(payload: &Props) -> Result<(), CanvasError> {
    if payload.get("type").and_then(Value::as_str) == Some("image") {
        return Err(CanvasError::invalid(
            "there is no image node type; insert a frame or rectangle and fill it with G()",
        ));
    }
    for child in payload
        .get("children")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        if let Some(child) = child.as_object() {
            reject_image_nodes(child)?;
        }
    }
    Ok(())
}

fn copy_options(mut overrides: Props) -> Result<CopyOptions, CanvasError> {
    let descendants = match overrides.remove("descendants") {
        None => Props::new(),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(CanvasError::invalid("'descendants' must be an object")),
    };
    let padding = overrides.remove("positionPadding");
    let placement = match overrides.remove("positionDirection") {
        None => None,
        Some(direction) => {
            let direction: Direction = serde_json::from_value(direction).map_err(|_| {
                CanvasError::invalid("positionDirection must be top, right, bottom or left")
            })?;
            Some(Placement {
                direction,
                padding: padding
                    .as_ref()
                    .and_then(Value::as_f64)
                    .unwrap_or(DEFAULT_COPY_PADDING),
            })
        }
    };
    Ok(CopyOptions {
        overrides,
        descendants,
        placement,
    })
}

fn resolve(doc: &dyn DocumentTree, bindings: &Bindings, path: &PathExpr) -> Result<Target, CanvasError> {
    doc.resolve(&path.evaluate(bindings)?)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use async_trait::async_trait;
    use pengate_canvas::{InMemoryDocument, PlaceholderImageSource, ROOT_ID};
    use pengate_core::{ImageFill, ImageKind, document::shared};
    use serde_json::json;

    struct CountingImages {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ImageSource for CountingImages {
        fn name(&self) -> &str {
            "counting"
        }

        async fn fetch(&self, _kind: ImageKind, prompt: &str) -> Result<ImageFill, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ProviderError::Timeout("image service".into()))
            } else {
                Ok(ImageFill::new(format!("https://img/{prompt}")))
            }
        }
    }

    fn interpreter(doc: InMemoryDocument) -> Interpreter {
        Interpreter::new(shared(doc), Arc::new(PlaceholderImageSource::default()))
    }

    async fn snapshot(interp: &Interpreter) -> Value {
        let doc = interp.document().lock().await;
        doc.batch_get(&serde_json::from_value(json!({"readDepth": 5})).unwrap())
            .unwrap()
    }

    #[tokio::test]
    async fn insert_then_update_through_binding() {
        let interp = interpreter(InMemoryDocument::new());
        let report = interp
            .run("a=I(document,{type:\"frame\"})\nU(a,{width:100})")
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.applied.len(), 2);
        let id = report.bindings["a"].clone();
        assert_eq!(report.applied[1].node_id, id);

        let nodes = snapshot(&interp).await;
        assert_eq!(nodes["nodes"].as_array().unwrap().len(), 1);
        assert_eq!(nodes["nodes"][0]["id"], json!(id));
        assert_eq!(nodes["nodes"][0]["type"], "frame");
        assert_eq!(nodes["nodes"][0]["width"], 100);
    }

    #[tokio::test]
    async fn over_limit_applies_nothing() {
        let interp = interpreter(InMemoryDocument::new());
        let src: String = (0..26)
            .map(|i| format!("f{i}=I(document, {{type: \"frame\"}})\n"))
            .collect();
        let err = interp.run(&src).await.unwrap_err();
        assert_eq!(err.kind(), "validation_failure");
        assert!(snapshot(&interp).await["nodes"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bindings_do_not_survive_the_call() {
        let interp = interpreter(InMemoryDocument::new());
        interp.run("a=I(document, {type: \"frame\"})").await.unwrap();
        let err = interp.run("U(a, {width: 10})").await.unwrap_err();
        assert!(matches!(err, ScriptError::Validation { .. }));
    }

    #[tokio::test]
    async fn first_failure_stops_the_script_without_rollback() {
        let interp = interpreter(InMemoryDocument::new());
        let report = interp
            .run(
                "a=I(document, {type: \"frame\", name: \"kept\"})\n\
                 U(\"missing\", {width: 1})\n\
                 b=I(document, {type: \"frame\", name: \"never\"})",
            )
            .await
            .unwrap();

        assert!(!report.is_success());
        assert_eq!(report.applied.len(), 1);
        let failure = report.failure.as_ref().unwrap();
        assert_eq!(failure.index, 1);
        assert_eq!(failure.line, 2);
        assert_eq!(failure.kind, "not_found");
        assert!(!report.bindings.contains_key("b"));

        let nodes = snapshot(&interp).await;
        assert_eq!(nodes["nodes"].as_array().unwrap().len(), 1);
        assert_eq!(nodes["nodes"][0]["name"], "kept");
    }

    #[tokio::test]
    async fn image_node_type_is_rejected() {
        let interp = interpreter(InMemoryDocument::new());
        let report = interp
            .run("a=I(document, {type: \"frame\", children: [{type: \"image\"}]})")
            .await
            .unwrap();
        assert_eq!(report.failure.unwrap().kind, "invalid_operation");
    }

    #[tokio::test]
    async fn generate_image_checks_fill_before_calling_source() {
        let images = Arc::new(CountingImages {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let interp = Interpreter::new(shared(InMemoryDocument::new()), images.clone());

        let report = interp
            .run("t=I(document, {type: \"text\", content: \"x\"})\nG(t, \"ai\", \"sunset\")")
            .await
            .unwrap();
        assert_eq!(report.failure.unwrap().kind, "invalid_operation");
        assert_eq!(images.calls.load(Ordering::SeqCst), 0);

        let report = interp
            .run("hero=I(document, {type: \"rectangle\"})\nG(hero, \"stock\", \"sunset\")")
            .await
            .unwrap();
        assert!(report.is_success());
        assert_eq!(images.calls.load(Ordering::SeqCst), 1);
        let id = &report.bindings["hero"];
        let doc = interp.document().lock().await;
        let node = doc
            .batch_get(&serde_json::from_value(json!({"nodeIds": [id]})).unwrap())
            .unwrap();
        assert_eq!(node["nodes"][0]["fill"]["url"], "https://img/sunset");
    }

    #[tokio::test]
    async fn image_source_failure_aborts_with_upstream_error() {
        let images = Arc::new(CountingImages {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let interp = Interpreter::new(shared(InMemoryDocument::new()), images);
        let err = interp
            .run("r=I(document, {type: \"rectangle\"})\nG(r, \"ai\", \"forest\")\nU(r, {width: 5})")
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::Upstream { index: 1, .. }));
    }

    #[tokio::test]
    async fn copy_with_descendants_and_placement() {
        let interp = interpreter(InMemoryDocument::new());
        let report = interp
            .run(
                "card=I(document, {type: \"frame\", name: \"Card\", x: 0, y: 0, width: 200, height: 100, \
                   children: [{type: \"text\", name: \"title\", content: \"Old\"}]})\n\
                 copy=C(card, document, {name: \"Card 2\", positionDirection: \"bottom\", positionPadding: 20, \
                   descendants: {title: {content: \"New\", fontSize: 20}}})",
            )
            .await
            .unwrap();
        assert!(report.is_success(), "{}", report.summary());

        let copy = node_by_id(&interp, &report.bindings["copy"]).await;
        assert_eq!(copy["name"], "Card 2");
        assert_eq!(copy["y"].as_f64(), Some(120.0));
        assert_eq!(copy["children"][0]["content"], "New");
        assert_eq!(copy["children"][0]["fontSize"], 20);
    }

    #[tokio::test]
    async fn update_through_a_fresh_copy_still_executes() {
        // Prompts steer the model to `descendants`, but the path form is not rejected.
        let interp = interpreter(InMemoryDocument::new());
        let report = interp
            .run(
                "card=I(document, {type: \"frame\", name: \"Card\", \
                   children: [{type: \"text\", name: \"title\", content: \"Old\"}]})\n\
                 copy=C(card, document)\n\
                 U(copy+\"/title\", {fontSize: 20})",
            )
            .await
            .unwrap();
        assert!(report.is_success(), "{}", report.summary());

        let copy = node_by_id(&interp, &report.bindings["copy"]).await;
        assert_eq!(copy["children"][0]["fontSize"], 20);
    }

    async fn node_by_id(interp: &Interpreter, id: &str) -> Value {
        let nodes = snapshot(interp).await;
        nodes["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["id"] == json!(id))
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn replace_and_move_and_delete() {
        let interp = interpreter(InMemoryDocument::new());
        let report = interp
            .run(
                "col=I(document, {type: \"frame\", layout: \"vertical\"})\n\
                 a=I(col, {type: \"text\", content: \"a\"})\n\
                 b=I(col, {type: \"text\", content: \"b\"})\n\
                 M(b, 0)\n\
                 c=R(a, {type: \"rectangle\"})\n\
                 D(b)",
            )
            .await
            .unwrap();
        assert!(report.is_success(), "{}", report.summary());
        let col = report.bindings["col"].clone();
        let c = report.bindings["c"].clone();
        let doc = interp.document().lock().await;
        let out = doc
            .batch_get(&serde_json::from_value(json!({"nodeIds": [col]})).unwrap())
            .unwrap();
        let kids = out["nodes"][0]["children"].as_array().unwrap();
        assert_eq!(kids.len(), 1);
        assert_eq!(kids[0]["id"], json!(c));
    }

    #[tokio::test]
    async fn deleting_the_root_fails() {
        let interp = interpreter(InMemoryDocument::new());
        let report = interp.run("D(document)").await.unwrap();
        let failure = report.failure.unwrap();
        assert_eq!(failure.kind, "invalid_operation");
        assert!(report.applied.is_empty());
        assert_eq!(ROOT_ID, "document");
    }
}
