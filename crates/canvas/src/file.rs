//! JSON document files: `{ version, children, variables, themes }`.

use std::path::Path;

use pengate_core::{CanvasError, Props};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::document::{InMemoryDocument, ROOT_ID};

pub const FILE_VERSION: &str = "1";

fn default_version() -> String {
    FILE_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFile {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub children: Vec<Value>,
    #[serde(default)]
    pub variables: Props,
    #[serde(default)]
    pub themes: Props,
}

#[derive(Debug, Error)]
pub enum DocumentFileError {
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid document: {0}")]
    Invalid(#[from] CanvasError),
}

impl InMemoryDocument {
    /// Build a document from its file form. Component references may point
    /// forward; they are checked once every node exists.
    pub fn from_file(file: DocumentFile) -> Result<Self, CanvasError> {
        let mut doc = InMemoryDocument::new();
        for child in file.children {
            let Value::Object(payload) = child else {
                return Err(CanvasError::invalid("top-level entries must be node objects"));
            };
            let mut out = Vec::new();
            doc.build(payload, ROOT_ID, ROOT_ID, false, &mut out)?;
            doc.commit(out, ROOT_ID, None);
        }
        for node in doc.nodes.values() {
            if let Some(component) = node.component() {
                if !doc.nodes.contains_key(component) {
                    return Err(CanvasError::not_found(format!(
                        "component '{component}' referenced by '{}'",
                        node.id
                    )));
                }
            }
        }
        doc.variables = file.variables;
        doc.themes = file.themes;
        Ok(doc)
    }

    pub fn to_file(&self) -> DocumentFile {
        DocumentFile {
            version: FILE_VERSION.to_string(),
            children: self
                .children_of(ROOT_ID)
                .into_iter()
                .filter_map(|id| self.node_json(id))
                .collect(),
            variables: self.variables.clone(),
            themes: self.themes.clone(),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, DocumentFileError> {
        let file: DocumentFile = serde_json::from_str(s)?;
        Ok(Self::from_file(file)?)
    }

    pub fn to_json_string(&self) -> Result<String, DocumentFileError> {
        Ok(serde_json::to_string_pretty(&self.to_file())?)
    }

    pub fn load(path: &Path) -> Result<Self, DocumentFileError> {
        let content = std::fs::read_to_string(path)?;
        let mut doc = Self::from_json_str(&content)?;
        doc.path = Some(path.to_path_buf());
        Ok(doc)
    }

    pub fn save(&self, path: &Path) -> Result<(), DocumentFileError> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pengate_core::DocumentTree;
    use serde_json::json;

    const SAMPLE: &str = r##"{
        "version": "1",
        "children": [
            {"type": "ref", "id": "inst", "ref": "Card"},
            {"type": "frame", "id": "Card", "reusable": true,
             "children": [{"type": "text", "id": "title", "content": "Hi"}]}
        ],
        "variables": {"accent": {"type": "color", "value": "#F97316"}}
    }"##;

    #[test]
    fn forward_component_references_load() {
        let doc = InMemoryDocument::from_json_str(SAMPLE).unwrap();
        assert_eq!(doc.children_of(ROOT_ID), vec!["inst", "Card"]);
        assert_eq!(doc.variables()["variables"]["accent"]["value"], "#F97316");
    }

    #[test]
    fn dangling_reference_is_rejected() {
        let err = InMemoryDocument::from_json_str(
            r#"{"children": [{"type": "ref", "ref": "missing"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DocumentFileError::Invalid(CanvasError::NotFound(_))));
    }

    #[test]
    fn save_then_open_from_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let doc = InMemoryDocument::from_json_str(SAMPLE).unwrap();
        doc.save(&dir.path().join("card.pen")).unwrap();

        let mut fresh = InMemoryDocument::new().with_base_dir(dir.path());
        let opened = fresh.open_document("card.pen").unwrap();
        assert_eq!(opened["nodeCount"], 3);
        assert_eq!(fresh.prop("title", "content"), Some(&json!("Hi")));
        assert!(fresh.editor_state(false)["document"]["path"].is_string());
    }
}
