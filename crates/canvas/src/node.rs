//! Node storage for the in-memory document.

use pengate_core::{CanvasError, NodeType, Props};
use serde_json::{Value, json};

/// Keys that define a node's identity and cannot be patched.
pub const IMMUTABLE_KEYS: [&str; 4] = ["id", "type", "ref", "children"];

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Node {
    pub id: String,
    pub node_type: NodeType,
    /// Every property except `id`, `type` and `children`. For `ref` nodes
    /// this includes `ref` and the `descendants` override map.
    pub props: Props,
    pub children: Vec<String>,
    pub parent: Option<String>,
}

impl Node {
    pub fn name(&self) -> Option<&str> {
        self.props.get("name").and_then(Value::as_str)
    }

    pub fn slot(&self) -> Option<&str> {
        self.props.get("slot").and_then(Value::as_str)
    }

    pub fn component(&self) -> Option<&str> {
        match self.node_type {
            NodeType::Ref => self.props.get("ref").and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn is_reusable(&self) -> bool {
        self.props.get("reusable").and_then(Value::as_bool) == Some(true)
    }

    /// Does a path segment address this node?
    pub fn matches_segment(&self, segment: &str) -> SegmentMatch {
        if self.id == segment {
            SegmentMatch::Id
        } else if self.name() == Some(segment) {
            SegmentMatch::Name
        } else if self.slot() == Some(segment) {
            SegmentMatch::Slot
        } else {
            SegmentMatch::None
        }
    }

    /// Shallow JSON view without children.
    pub fn to_json_shallow(&self) -> Value {
        let mut obj = Props::new();
        obj.insert("id".into(), json!(self.id));
        obj.insert("type".into(), json!(self.node_type));
        for (k, v) in &self.props {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }

    /// Apply a shallow patch. `null` removes a property.
    pub fn patch(&mut self, patch: &Props) {
        apply_patch(&mut self.props, patch);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum SegmentMatch {
    Id,
    Name,
    Slot,
    None,
}

pub(crate) fn apply_patch(target: &mut Props, patch: &Props) {
    for (key, value) in patch {
        if value.is_null() {
            target.remove(key);
        } else {
            target.insert(key.clone(), value.clone());
        }
    }
}

pub(crate) fn reject_immutable(patch: &Props) -> Result<(), CanvasError> {
    match IMMUTABLE_KEYS.iter().find(|k| patch.contains_key(**k)) {
        Some(key) => Err(CanvasError::invalid(format!(
            "property '{key}' cannot be changed by an update"
        ))),
        None => Ok(()),
    }
}

/// Read and validate the `type` of a node payload.
pub(crate) fn payload_type(payload: &Props) -> Result<NodeType, CanvasError> {
    let tag = payload
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| CanvasError::invalid("node data needs a string 'type'"))?;
    NodeType::parse(tag).ok_or_else(|| CanvasError::invalid(format!("unknown node type '{tag}'")))
}

/// Split a node payload into type, explicit id, props and child payloads.
pub(crate) struct Payload {
    pub node_type: NodeType,
    pub id: Option<String>,
    pub props: Props,
    pub children: Vec<Props>,
}

impl Payload {
    pub fn parse(mut payload: Props) -> Result<Self, CanvasError> {
        let node_type = payload_type(&payload)?;
        payload.remove("type");

        let id = match payload.remove("id") {
            None => None,
            Some(Value::String(id)) if !id.is_empty() && !id.contains('/') => Some(id),
            Some(other) => {
                return Err(CanvasError::invalid(format!("invalid node id {other}")));
            }
        };

        let children = match payload.remove("children") {
            None => Vec::new(),
            Some(Value::Array(items)) => {
                if !items.is_empty() && !node_type.has_children() {
                    return Err(CanvasError::invalid(format!(
                        "{node_type} nodes cannot have children"
                    )));
                }
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(obj) => Ok(obj),
                        other => Err(CanvasError::invalid(format!(
                            "child node data must be an object, got {other}"
                        ))),
                    })
                    .collect::<Result<_, _>>()?
            }
            Some(other) => {
                return Err(CanvasError::invalid(format!(
                    "'children' must be an array, got {other}"
                )));
            }
        };

        if node_type == NodeType::Ref && !payload.get("ref").is_some_and(Value::is_string) {
            return Err(CanvasError::invalid("ref nodes need a string 'ref'"));
        }

        Ok(Self {
            node_type,
            id,
            props: payload,
            children,
        })
    }
}

/// Normalize a corner radius to four numbers.
pub(crate) fn corner_radius(value: &Value) -> Option<Vec<f64>> {
    match value {
        Value::Number(n) => n.as_f64().map(|r| vec![r; 4]),
        Value::Array(items) if items.len() == 4 => items.iter().map(Value::as_f64).collect(),
        _ => None,
    }
}

/// JSON equality that treats `8` and `8.0` as equal.
pub(crate) fn same_value(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(v: Value) -> Props {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn payload_splits_children_and_id() {
        let p = Payload::parse(props(json!({
            "type": "frame", "id": "hero", "width": 10,
            "children": [{"type": "text", "content": "hi"}]
        })))
        .unwrap();
        assert_eq!(p.node_type, NodeType::Frame);
        assert_eq!(p.id.as_deref(), Some("hero"));
        assert_eq!(p.children.len(), 1);
        assert!(!p.props.contains_key("type"));
    }

    #[test]
    fn payload_rejects_children_on_leaf_types() {
        let err = Payload::parse(props(json!({
            "type": "text", "children": [{"type": "text"}]
        })));
        assert!(matches!(err, Err(CanvasError::InvalidOperation(_))));
    }

    #[test]
    fn ref_payload_needs_component() {
        assert!(Payload::parse(props(json!({"type": "ref"}))).is_err());
    }

    #[test]
    fn patch_null_removes() {
        let mut target = props(json!({"a": 1, "b": 2}));
        apply_patch(&mut target, &props(json!({"a": null, "c": 3})));
        assert_eq!(Value::Object(target), json!({"b": 2, "c": 3}));
    }

    #[test]
    fn immutable_keys_are_rejected() {
        assert!(reject_immutable(&props(json!({"type": "text"}))).is_err());
        assert!(reject_immutable(&props(json!({"width": 1}))).is_ok());
    }

    #[test]
    fn corner_radius_normalizes() {
        assert_eq!(corner_radius(&json!(4)), Some(vec![4.0; 4]));
        assert_eq!(corner_radius(&json!([1, 2, 3, 4])), Some(vec![1.0, 2.0, 3.0, 4.0]));
        assert_eq!(corner_radius(&json!([1, 2])), None);
    }
}
