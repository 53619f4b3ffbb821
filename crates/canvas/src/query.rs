//! Read-only queries and bulk property edits.

use std::path::{Component, Path};

use pengate_core::{BatchGetQuery, CanvasError, NodePattern, NodeType, PropertyName, PropertyReplacements};
use regex::Regex;
use serde_json::{Value, json};
use tracing::debug;

use crate::document::{InMemoryDocument, ROOT_ID};
use crate::node::{Node, corner_radius, same_value};

/// How `batch_get` renders one node.
#[derive(Debug, Clone, Copy)]
struct ReadOptions {
    resolve_instances: bool,
    resolve_variables: bool,
    include_path_geometry: bool,
}

struct CompiledPattern<'a> {
    pattern: &'a NodePattern,
    name: Option<Regex>,
}

impl CompiledPattern<'_> {
    fn matches(&self, node: &Node) -> bool {
        if self.pattern.node_type.is_some_and(|t| t != node.node_type) {
            return false;
        }
        if let Some(re) = &self.name {
            if !node.name().is_some_and(|n| re.is_match(n)) {
                return false;
            }
        }
        if let Some(reusable) = self.pattern.reusable {
            if node.is_reusable() != reusable {
                return false;
            }
        }
        true
    }
}

/// Document key that stores a property for a node, if it applies.
fn property_key(node: &Node, property: PropertyName) -> Option<&'static str> {
    let is_text = node.node_type == NodeType::Text;
    match property {
        PropertyName::FillColor if !is_text => Some("fill"),
        PropertyName::TextColor if is_text => Some("fill"),
        PropertyName::FillColor | PropertyName::TextColor => None,
        PropertyName::StrokeColor => Some("stroke"),
        other => Some(other.as_str()),
    }
}

/// The value of an auditable property, normalized for comparison.
fn property_value(node: &Node, property: PropertyName) -> Option<Value> {
    let raw = node.props.get(property_key(node, property)?)?;
    match property {
        // Image fills are objects; only plain colors are audited.
        PropertyName::FillColor | PropertyName::TextColor | PropertyName::StrokeColor => {
            raw.as_str().map(|s| json!(s))
        }
        PropertyName::CornerRadius => corner_radius(raw).map(|r| json!(r)),
        _ => Some(raw.clone()),
    }
}

impl InMemoryDocument {
    pub(crate) fn editor_state_json(&self, include_schema: bool) -> Value {
        let top_level: Vec<Value> = self
            .children_of(ROOT_ID)
            .into_iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|n| json!({ "id": n.id, "type": n.node_type, "name": n.name() }))
            .collect();
        let selection: Vec<Value> = self
            .selection
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(Node::to_json_shallow)
            .collect();
        let components: Vec<Value> = self
            .nodes
            .values()
            .filter(|n| n.is_reusable())
            .map(|n| json!({ "id": n.id, "name": n.name() }))
            .collect();

        let mut state = json!({
            "document": {
                "path": self.path.as_ref().map(|p| p.display().to_string()),
                "nodeCount": self.nodes.len() - 1,
                "topLevel": top_level,
            },
            "selection": selection,
            "components": components,
            "variableCount": self.variables.len(),
        });
        if include_schema {
            state["schema"] = json!({
                "nodeTypes": NodeType::ALL.iter().map(NodeType::as_str).collect::<Vec<_>>(),
                "layout": ["none", "vertical", "horizontal"],
                "sizing": ["<number>", "fill_container", "fit_content", "fill_container(<n>)", "fit_content(<n>)"],
                "imageFillTypes": ["frame", "rectangle"],
            });
        }
        state
    }

    /// Open a document file relative to the base directory, or `new` for an
    /// empty document.
    pub(crate) fn open(&mut self, path_or_template: &str) -> Result<Value, CanvasError> {
        let target = path_or_template.trim();
        if target.is_empty() || target == "new" {
            let base_dir = std::mem::take(&mut self.base_dir);
            *self = InMemoryDocument::new().with_base_dir(base_dir);
            return Ok(json!({ "opened": "new", "nodeCount": 0 }));
        }

        let relative = Path::new(target);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(CanvasError::invalid(format!(
                "'{target}' must be a relative path inside the workspace"
            )));
        }
        let full = self.base_dir.join(relative);
        debug!(path = %full.display(), "Opening document");
        let loaded = InMemoryDocument::load(&full)
            .map_err(|e| CanvasError::invalid(format!("cannot open '{target}': {e}")))?;
        let base_dir = std::mem::take(&mut self.base_dir);
        *self = loaded.with_base_dir(base_dir);
        self.path = Some(relative.to_path_buf());
        Ok(json!({
            "opened": target,
            "nodeCount": self.nodes.len() - 1,
            "topLevel": self.children_of(ROOT_ID),
        }))
    }

    pub(crate) fn batch_get_json(&self, query: &BatchGetQuery) -> Result<Value, CanvasError> {
        let options = ReadOptions {
            resolve_instances: query.resolve_instances.unwrap_or(false),
            resolve_variables: query.resolve_variables.unwrap_or(false),
            include_path_geometry: query.include_path_geometry.unwrap_or(false),
        };
        let read_depth = query.read_depth();
        let parent = query.parent_id.as_deref().unwrap_or(ROOT_ID);
        self.node(parent)?;

        let mut nodes = Vec::new();
        let mut not_found = Vec::new();
        for id in query.node_ids.iter().flatten() {
            match self.nodes.get(id) {
                Some(node) => nodes.push(self.read_node(node, read_depth, options)),
                None => not_found.push(id.clone()),
            }
        }

        let patterns = query.patterns.as_deref().unwrap_or_default();
        let mut matches = Vec::new();
        if !patterns.is_empty() {
            let compiled = patterns
                .iter()
                .map(|p| {
                    let name = p
                        .name
                        .as_deref()
                        .map(Regex::new)
                        .transpose()
                        .map_err(|e| CanvasError::invalid(format!("invalid name pattern: {e}")))?;
                    Ok(CompiledPattern { pattern: p, name })
                })
                .collect::<Result<Vec<_>, CanvasError>>()?;
            let search_depth = query.search_depth.unwrap_or(u32::MAX);
            self.search(parent, 0, search_depth, &mut |node| {
                if compiled.iter().any(|c| c.matches(node)) {
                    matches.push(self.read_node(node, read_depth, options));
                }
            });
        }

        if query.node_ids.is_none() && patterns.is_empty() {
            // Nothing asked for: list the parent's children.
            let start = self.node(parent)?;
            for child in start.children.iter().filter_map(|c| self.nodes.get(c)) {
                nodes.push(self.read_node(child, read_depth.saturating_sub(1), options));
            }
        }

        let mut result = json!({ "nodes": nodes });
        if !patterns.is_empty() {
            result["matches"] = Value::Array(matches);
        }
        if !not_found.is_empty() {
            result["notFound"] = json!(not_found);
        }
        Ok(result)
    }

    fn search(&self, parent: &str, depth: u32, max_depth: u32, visit: &mut dyn FnMut(&Node)) {
        if depth >= max_depth {
            return;
        }
        let Some(node) = self.nodes.get(parent) else {
            return;
        };
        for child in node.children.iter().filter_map(|c| self.nodes.get(c)) {
            visit(child);
            self.search(&child.id, depth + 1, max_depth, visit);
        }
    }

    fn read_node(&self, node: &Node, depth: u32, options: ReadOptions) -> Value {
        let mut value = node.to_json_shallow();
        if node.node_type == NodeType::Path && !options.include_path_geometry {
            if let Some(obj) = value.as_object_mut() {
                obj.remove("geometry");
            }
        }
        if options.resolve_variables {
            self.substitute_variables(&mut value);
        }
        if node.node_type.has_children() {
            if depth > 0 {
                let children: Vec<Value> = node
                    .children
                    .iter()
                    .filter_map(|c| self.nodes.get(c))
                    .map(|c| self.read_node(c, depth - 1, options))
                    .collect();
                value["children"] = Value::Array(children);
            } else {
                value["childCount"] = json!(node.children.len());
            }
        }
        if options.resolve_instances {
            if let Some(component) = node.component().and_then(|c| self.nodes.get(c)) {
                let mut resolved = self.read_node(component, depth, options);
                if let Some(overrides) = node.props.get("descendants").and_then(Value::as_object) {
                    apply_overrides(&mut resolved, overrides, &mut Vec::new());
                }
                value["resolved"] = resolved;
            }
        }
        value
    }

    /// Replace `$name` strings with the variable's value.
    fn substitute_variables(&self, value: &mut Value) {
        match value {
            Value::String(s) => {
                if let Some(var) = s.strip_prefix('$').and_then(|name| self.variables.get(name)) {
                    *value = var.get("value").cloned().unwrap_or_else(|| var.clone());
                }
            }
            Value::Array(items) => items.iter_mut().for_each(|v| self.substitute_variables(v)),
            Value::Object(map) => map.values_mut().for_each(|v| self.substitute_variables(v)),
            _ => {}
        }
    }

    fn subtree_nodes(&self, parents: &[String]) -> Result<Vec<&Node>, CanvasError> {
        let parents: Vec<&str> = if parents.is_empty() {
            vec![ROOT_ID]
        } else {
            parents.iter().map(String::as_str).collect()
        };
        let mut out = Vec::new();
        for parent in parents {
            self.node(parent)?;
            out.extend(self.subtree_ids(parent).iter().filter_map(|id| self.nodes.get(id)));
        }
        Ok(out)
    }

    pub(crate) fn unique_properties_json(
        &self,
        parents: &[String],
        properties: &[PropertyName],
    ) -> Result<Value, CanvasError> {
        let nodes = self.subtree_nodes(parents)?;
        let mut result = serde_json::Map::new();
        for &property in properties {
            let mut seen: Vec<Value> = Vec::new();
            for node in &nodes {
                if let Some(value) = property_value(node, property) {
                    if !seen.iter().any(|s| same_value(s, &value)) {
                        seen.push(value);
                    }
                }
            }
            result.insert(property.as_str().to_string(), Value::Array(seen));
        }
        Ok(Value::Object(result))
    }

    /// Swap matching property values under `parents`. Each node property is
    /// compared against its original value, so swaps never chain.
    pub(crate) fn replace_properties(
        &mut self,
        parents: &[String],
        replacements: &PropertyReplacements,
    ) -> Result<Value, CanvasError> {
        let pairs = replacements.pairs();
        let mut edits: Vec<(String, &'static str, Value)> = Vec::new();
        for node in self.subtree_nodes(parents)? {
            let mut done: Vec<PropertyName> = Vec::new();
            for (property, from, to) in &pairs {
                if done.contains(property) {
                    continue;
                }
                let (Some(key), Some(current)) =
                    (property_key(node, *property), property_value(node, *property))
                else {
                    continue;
                };
                let from = match property {
                    PropertyName::CornerRadius => corner_radius(from).map_or(Value::Null, |r| json!(r)),
                    _ => from.clone(),
                };
                if same_value(&current, &from) {
                    edits.push((node.id.clone(), key, to.clone()));
                    done.push(*property);
                }
            }
        }

        let replaced = edits.len();
        for (id, key, value) in edits {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.props.insert(key.to_string(), value);
            }
        }
        debug!(replaced, "Replaced matching properties");
        Ok(json!({ "replaced": replaced }))
    }
}

/// Apply instance overrides (keyed by component id paths) onto a rendered
/// component tree.
fn apply_overrides(value: &mut Value, overrides: &serde_json::Map<String, Value>, path: &mut Vec<String>) {
    let Some(children) = value.get_mut("children").and_then(Value::as_array_mut) else {
        return;
    };
    for child in children.iter_mut() {
        let Some(id) = child.get("id").and_then(Value::as_str).map(str::to_string) else {
            continue;
        };
        path.push(id);
        if let Some(Value::Object(patch)) = overrides.get(&path.join("/")) {
            if patch.contains_key("type") {
                *child = Value::Object(patch.clone());
            } else if let Some(obj) = child.as_object_mut() {
                for (k, v) in patch {
                    obj.insert(k.clone(), v.clone());
                }
            }
        }
        apply_overrides(child, overrides, path);
        path.pop();
    }
}
