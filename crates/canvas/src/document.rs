//! The in-memory document tree and its mutations.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use pengate_core::{
    BatchGetQuery, CanvasError, CopyOptions, DocumentTree, EmptySpaceQuery, LayoutQuery, NodeType,
    ImageFill, PropertyName, PropertyReplacements, Props, Target,
};
use serde_json::{Value, json};

use crate::node::{Node, Payload, SegmentMatch, apply_patch, reject_immutable};

/// Id of the root node; scripts reach it through the `document` binding.
pub const ROOT_ID: &str = "document";

/// A design document held entirely in memory.
///
/// Used for sandbox chat sessions, the `script` CLI command and tests.
#[derive(Debug, Clone)]
pub struct InMemoryDocument {
    pub(crate) nodes: HashMap<String, Node>,
    pub(crate) variables: Props,
    pub(crate) themes: Props,
    pub(crate) selection: Vec<String>,
    pub(crate) path: Option<PathBuf>,
    pub(crate) base_dir: PathBuf,
    next_id: u64,
}

impl Default for InMemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocument {
    /// An empty document holding only the root.
    pub fn new() -> Self {
        let root = Node {
            id: ROOT_ID.into(),
            node_type: NodeType::Group,
            props: Props::new(),
            children: Vec::new(),
            parent: None,
        };
        Self {
            nodes: HashMap::from([(ROOT_ID.to_string(), root)]),
            variables: Props::new(),
            themes: Props::new(),
            selection: Vec::new(),
            path: None,
            base_dir: PathBuf::from("."),
            next_id: 0,
        }
    }

    /// Directory that relative `open_document` paths are resolved against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn with_selection(mut self, ids: Vec<String>) -> Self {
        self.selection = ids;
        self
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Ordered child ids of a node.
    pub fn children_of(&self, id: &str) -> Vec<&str> {
        self.nodes
            .get(id)
            .map(|n| n.children.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).and_then(|n| n.parent.as_deref())
    }

    /// One property of a node.
    pub fn prop(&self, id: &str, key: &str) -> Option<&Value> {
        self.nodes.get(id).and_then(|n| n.props.get(key))
    }

    /// The full subtree under `id` as nested JSON.
    pub fn node_json(&self, id: &str) -> Option<Value> {
        let node = self.nodes.get(id)?;
        let mut value = node.to_json_shallow();
        if node.node_type.has_children() {
            let children: Vec<Value> = node
                .children
                .iter()
                .filter_map(|c| self.node_json(c))
                .collect();
            value["children"] = Value::Array(children);
        }
        Some(value)
    }

    pub(crate) fn node(&self, id: &str) -> Result<&Node, CanvasError> {
        self.nodes
            .get(id)
            .ok_or_else(|| CanvasError::not_found(format!("node '{id}'")))
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut Node, CanvasError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| CanvasError::not_found(format!("node '{id}'")))
    }

    fn fresh_id(&mut self, pending: &[Node]) -> String {
        loop {
            self.next_id += 1;
            let id = format!("n{}", self.next_id);
            if !self.nodes.contains_key(&id) && !pending.iter().any(|n| n.id == id) {
                return id;
            }
        }
    }

    /// Preorder ids of the subtree rooted at `id`.
    pub(crate) fn subtree_ids(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.children.iter().rev().cloned());
                out.push(current);
            }
        }
        out
    }

    /// Is `id` equal to or below `ancestor`?
    pub(crate) fn is_in_subtree(&self, ancestor: &str, id: &str) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.nodes.get(c).and_then(|n| n.parent.as_deref());
        }
        false
    }

    /// The node a target names, if it can hold children.
    fn container_id(&self, target: &Target) -> Result<String, CanvasError> {
        match target {
            Target::InstanceDescendant { .. } => Err(CanvasError::invalid(format!(
                "cannot add children inside instance descendant '{target}'; replace the slot with R() instead"
            ))),
            Target::Node { id } => {
                let node = self.node(id)?;
                if !node.node_type.has_children() {
                    return Err(CanvasError::invalid(format!(
                        "{} node '{id}' cannot contain children",
                        node.node_type
                    )));
                }
                Ok(id.clone())
            }
        }
    }

    fn find_child<'a>(&'a self, parent: &Node, segment: &str) -> Result<&'a Node, CanvasError> {
        let kids: Vec<&Node> = parent
            .children
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect();
        for kind in [SegmentMatch::Id, SegmentMatch::Name, SegmentMatch::Slot] {
            let hits: Vec<&Node> = kids
                .iter()
                .copied()
                .filter(|n| n.matches_segment(segment) == kind)
                .collect();
            match hits.as_slice() {
                [] => continue,
                [one] => return Ok(one),
                many => {
                    return Err(CanvasError::invalid(format!(
                        "path segment '{segment}' is ambiguous under '{}': {} children match",
                        parent.id,
                        many.len()
                    )));
                }
            }
        }
        Err(CanvasError::not_found(format!(
            "'{segment}' under '{}'",
            parent.id
        )))
    }

    /// Walk `segments` inside the component an instance references.
    pub(crate) fn resolve_in_component(
        &self,
        instance: &Node,
        segments: &[&str],
    ) -> Result<Vec<String>, CanvasError> {
        let component_id = instance.component().ok_or_else(|| {
            CanvasError::invalid(format!("'{}' is not a component instance", instance.id))
        })?;
        let mut current = self.node(component_id)?;
        let mut ids = Vec::with_capacity(segments.len());
        for segment in segments {
            if current.node_type == NodeType::Ref && !ids.is_empty() {
                return Err(CanvasError::invalid(format!(
                    "'{}' is a nested instance; edit it through its own id",
                    current.id
                )));
            }
            current = self.find_child(current, segment)?;
            ids.push(current.id.clone());
        }
        Ok(ids)
    }

    /// The component-side node an instance descendant starts from.
    fn component_node(&self, instance: &str, path: &[String]) -> Result<&Node, CanvasError> {
        let last = path
            .last()
            .ok_or_else(|| CanvasError::invalid("empty instance descendant path"))?;
        let inst = self.node(instance)?;
        match inst.component() {
            Some(component) if self.is_in_subtree(component, last) => self.node(last),
            _ => Err(CanvasError::not_found(format!(
                "descendant '{}' of instance '{instance}'",
                path.join("/")
            ))),
        }
    }

    /// The override object for one instance descendant, created on demand.
    fn override_entry(&mut self, instance: &str, key: &str) -> Result<&mut Props, CanvasError> {
        let node = self.node_mut(instance)?;
        let descendants = node
            .props
            .entry("descendants")
            .or_insert_with(|| json!({}));
        let map = descendants.as_object_mut().ok_or_else(|| {
            CanvasError::invalid(format!("'descendants' of '{instance}' is not an object"))
        })?;
        map.entry(key.to_string())
            .or_insert_with(|| json!({}))
            .as_object_mut()
            .ok_or_else(|| CanvasError::invalid(format!("override '{key}' is not an object")))
    }

    fn override_value(&self, instance: &str, key: &str) -> Option<&Props> {
        self.nodes
            .get(instance)?
            .props
            .get("descendants")?
            .get(key)?
            .as_object()
    }

    /// Create nodes for `payload` (and nested children) into `out`, without
    /// touching the tree. `anchor` is where the subtree will be attached.
    pub(crate) fn build(
        &mut self,
        payload: Props,
        parent: &str,
        anchor: &str,
        check_refs: bool,
        out: &mut Vec<Node>,
    ) -> Result<String, CanvasError> {
        let Payload {
            node_type,
            id,
            props,
            children,
        } = Payload::parse(payload)?;

        if check_refs {
            if let Some(component) = props.get("ref").and_then(Value::as_str) {
                let known = self.nodes.contains_key(component) || out.iter().any(|n| n.id == component);
                if !known {
                    return Err(CanvasError::not_found(format!("component '{component}'")));
                }
                if self.is_in_subtree(component, anchor) {
                    return Err(CanvasError::invalid(format!(
                        "an instance of '{component}' cannot be placed inside '{component}'"
                    )));
                }
            }
        }

        let id = match id {
            Some(id) => {
                if self.nodes.contains_key(&id) || out.iter().any(|n| n.id == id) {
                    return Err(CanvasError::invalid(format!("node id '{id}' already exists")));
                }
                id
            }
            None => self.fresh_id(out),
        };

        let index = out.len();
        out.push(Node {
            id: id.clone(),
            node_type,
            props,
            children: Vec::new(),
            parent: Some(parent.to_string()),
        });
        for child in children {
            let child_id = self.build(child, &id, anchor, check_refs, out)?;
            out[index].children.push(child_id);
        }
        Ok(id)
    }

    /// Attach a built subtree (`nodes[0]` is its root) under `parent`.
    pub(crate) fn commit(&mut self, nodes: Vec<Node>, parent: &str, index: Option<usize>) {
        let Some(root_id) = nodes.first().map(|n| n.id.clone()) else {
            return;
        };
        for node in nodes {
            self.nodes.insert(node.id.clone(), node);
        }
        if let Some(p) = self.nodes.get_mut(parent) {
            match index {
                Some(i) if i <= p.children.len() => p.children.insert(i, root_id),
                _ => p.children.push(root_id),
            }
        }
    }

    /// Fail if an instance outside the subtree of `id` references a node in it.
    fn ensure_unreferenced(&self, id: &str) -> Result<HashSet<String>, CanvasError> {
        let doomed: HashSet<String> = self.subtree_ids(id).into_iter().collect();
        for node in self.nodes.values() {
            if doomed.contains(&node.id) {
                continue;
            }
            if let Some(component) = node.component().filter(|c| doomed.contains(*c)) {
                return Err(CanvasError::invalid(format!(
                    "'{component}' is used by instance '{}'",
                    node.id
                )));
            }
        }
        Ok(doomed)
    }

    fn remove_subtree(&mut self, id: &str, doomed: &HashSet<String>) -> Option<usize> {
        let parent = self.nodes.get(id).and_then(|n| n.parent.clone());
        let mut position = None;
        if let Some(p) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            position = p.children.iter().position(|c| c == id);
            p.children.retain(|c| c != id);
        }
        self.nodes.retain(|k, _| !doomed.contains(k));
        self.selection.retain(|s| !doomed.contains(s));
        position
    }

    fn not_root(&self, id: &str, action: &str) -> Result<(), CanvasError> {
        if id == ROOT_ID {
            Err(CanvasError::invalid(format!("the document root cannot be {action}")))
        } else {
            Ok(())
        }
    }

    /// Resolve `descendants` keys of a ref node into override keys.
    fn instance_overrides(
        &self,
        instance: &Node,
        descendants: &Value,
    ) -> Result<Vec<(String, Props)>, CanvasError> {
        let map = descendants
            .as_object()
            .ok_or_else(|| CanvasError::invalid("'descendants' must be an object"))?;
        let mut out = Vec::with_capacity(map.len());
        for (key, value) in map {
            let segments: Vec<&str> = key.split('/').filter(|s| !s.is_empty()).collect();
            let ids = self.resolve_in_component(instance, &segments)?;
            let patch = value.as_object().cloned().ok_or_else(|| {
                CanvasError::invalid(format!("override for '{key}' must be an object"))
            })?;
            out.push((ids.join("/"), patch));
        }
        Ok(out)
    }

    fn merge_overrides(
        &mut self,
        instance: &str,
        overrides: Vec<(String, Props)>,
    ) -> Result<(), CanvasError> {
        for (key, patch) in overrides {
            apply_patch(self.override_entry(instance, &key)?, &patch);
        }
        Ok(())
    }
}

impl DocumentTree for InMemoryDocument {
    fn root_id(&self) -> &str {
        ROOT_ID
    }

    fn resolve(&self, path: &str) -> Result<Target, CanvasError> {
        let path = path.trim();
        let mut segments = path.split('/');
        let head = segments.next().unwrap_or_default();
        let rest: Vec<&str> = segments.collect();
        if head.is_empty() || rest.iter().any(|s| s.is_empty()) {
            return Err(CanvasError::invalid(format!("malformed path '{path}'")));
        }

        let mut current = self.node(head)?;
        for (i, segment) in rest.iter().enumerate() {
            if current.node_type == NodeType::Ref {
                if i == 0 {
                    let ids = self.resolve_in_component(current, &rest)?;
                    return Ok(Target::InstanceDescendant {
                        instance: current.id.clone(),
                        path: ids,
                    });
                }
                return Err(CanvasError::invalid(format!(
                    "path '{path}' passes through instance '{}'; instance descendant paths must start at the instance id",
                    current.id
                )));
            }
            current = self.find_child(current, segment)?;
        }
        Ok(Target::node(current.id.clone()))
    }

    fn node_type(&self, target: &Target) -> Result<NodeType, CanvasError> {
        match target {
            Target::Node { id } => Ok(self.node(id)?.node_type),
            Target::InstanceDescendant { instance, path } => {
                let key = path.join("/");
                let replaced = self
                    .override_value(instance, &key)
                    .and_then(|o| o.get("type"))
                    .and_then(Value::as_str)
                    .and_then(NodeType::parse);
                match replaced {
                    Some(t) => Ok(t),
                    None => Ok(self.component_node(instance, path)?.node_type),
                }
            }
        }
    }

    fn insert(&mut self, parent: &Target, payload: Props) -> Result<String, CanvasError> {
        let parent_id = self.container_id(parent)?;
        let mut out = Vec::new();
        let id = self.build(payload, &parent_id, &parent_id, true, &mut out)?;
        self.commit(out, &parent_id, None);
        Ok(id)
    }

    fn copy(
        &mut self,
        source: &Target,
        parent: &Target,
        options: CopyOptions,
    ) -> Result<String, CanvasError> {
        let Target::Node { id: src } = source else {
            return Err(CanvasError::invalid(format!(
                "cannot copy instance descendant '{source}'; copy the instance instead"
            )));
        };
        self.not_root(src, "copied")?;
        let parent_id = self.container_id(parent)?;
        reject_immutable(&options.overrides)?;
        if let Some(component) = self.node(src)?.component() {
            if self.is_in_subtree(component, &parent_id) {
                return Err(CanvasError::invalid(format!(
                    "an instance of '{component}' cannot be placed inside '{component}'"
                )));
            }
        }

        // Fresh ids for the whole subtree, parents before children.
        let originals: Vec<Node> = self
            .subtree_ids(src)
            .iter()
            .filter_map(|id| self.nodes.get(id).cloned())
            .collect();
        let mut mapping: HashMap<String, String> = HashMap::new();
        let mut out: Vec<Node> = Vec::with_capacity(originals.len());
        for original in &originals {
            let new_id = self.fresh_id(&out);
            mapping.insert(original.id.clone(), new_id.clone());
            let new_parent = if original.id == *src {
                parent_id.clone()
            } else {
                original
                    .parent
                    .as_ref()
                    .and_then(|p| mapping.get(p))
                    .cloned()
                    .unwrap_or_else(|| parent_id.clone())
            };
            out.push(Node {
                id: new_id,
                parent: Some(new_parent),
                children: Vec::new(),
                ..original.clone()
            });
        }
        for (copy, original) in out.iter_mut().zip(&originals) {
            copy.children = original
                .children
                .iter()
                .filter_map(|c| mapping.get(c).cloned())
                .collect();
        }

        // `descendants` patches, resolved before anything is committed.
        let mut instance_patches = Vec::new();
        let mut subtree_patches: Vec<(usize, Props)> = Vec::new();
        if !options.descendants.is_empty() {
            if out[0].node_type == NodeType::Ref {
                instance_patches =
                    self.instance_overrides(&out[0], &Value::Object(options.descendants.clone()))?;
            } else {
                for (key, value) in &options.descendants {
                    let patch = value.as_object().cloned().ok_or_else(|| {
                        CanvasError::invalid(format!("override for '{key}' must be an object"))
                    })?;
                    reject_immutable(&patch)?;
                    let index = find_in_copy(&out, &originals, key)?;
                    subtree_patches.push((index, patch));
                }
            }
        }

        if let Some(placement) = options.placement {
            let layout = self.compute_layout();
            if let (Some(src_rect), Some(parent_rect)) = (layout.get(src), layout.get(&parent_id)) {
                let (x, y) = src_rect.beside(placement.direction, placement.padding);
                out[0].props.insert("x".into(), json!(x - parent_rect.x));
                out[0].props.insert("y".into(), json!(y - parent_rect.y));
            }
        }

        out[0].patch(&options.overrides);
        for (index, patch) in subtree_patches {
            out[index].patch(&patch);
        }

        let root_id = out[0].id.clone();
        self.commit(out, &parent_id, None);
        self.merge_overrides(&root_id, instance_patches)?;
        Ok(root_id)
    }

    fn update(&mut self, target: &Target, mut patch: Props) -> Result<(), CanvasError> {
        reject_immutable(&patch)?;
        match target {
            Target::Node { id } => {
                let node = self.node(id)?;
                let overrides = match patch.remove("descendants") {
                    None => Vec::new(),
                    Some(descendants) => {
                        if node.node_type != NodeType::Ref {
                            return Err(CanvasError::invalid(format!(
                                "'descendants' only applies to instances; '{id}' is a {}",
                                node.node_type
                            )));
                        }
                        self.instance_overrides(node, &descendants)?
                    }
                };
                self.node_mut(id)?.patch(&patch);
                self.merge_overrides(id, overrides)
            }
            Target::InstanceDescendant { instance, path } => {
                if patch.contains_key("descendants") {
                    return Err(CanvasError::invalid(
                        "'descendants' cannot be set on an instance descendant",
                    ));
                }
                self.component_node(instance, path)?;
                apply_patch(self.override_entry(instance, &path.join("/"))?, &patch);
                Ok(())
            }
        }
    }

    fn replace(&mut self, target: &Target, payload: Props) -> Result<String, CanvasError> {
        match target {
            Target::Node { id } => {
                self.not_root(id, "replaced")?;
                let parent = self
                    .node(id)?
                    .parent
                    .clone()
                    .ok_or_else(|| CanvasError::invalid(format!("'{id}' has no parent")))?;
                let doomed = self.ensure_unreferenced(id)?;
                let mut out = Vec::new();
                // Ids of the replaced subtree may be reused by the payload.
                let saved: Vec<Node> = doomed.iter().filter_map(|d| self.nodes.remove(d)).collect();
                let built = self.build(payload, &parent, &parent, true, &mut out);
                for node in saved {
                    self.nodes.insert(node.id.clone(), node);
                }
                let new_id = built?;
                let position = self.remove_subtree(id, &doomed);
                self.commit(out, &parent, position);
                Ok(new_id)
            }
            Target::InstanceDescendant { instance, path } => {
                self.component_node(instance, path)?;
                let mut payload = payload;
                Payload::parse(payload.clone())?;
                let new_id = match payload.get("id").and_then(Value::as_str) {
                    Some(id) => id.to_string(),
                    None => {
                        let id = self.fresh_id(&[]);
                        payload.insert("id".into(), json!(id));
                        id
                    }
                };
                let entry = self.override_entry(instance, &path.join("/"))?;
                *entry = payload;
                Ok(new_id)
            }
        }
    }

    fn move_node(
        &mut self,
        node: &Target,
        parent: Option<&Target>,
        index: Option<usize>,
    ) -> Result<(), CanvasError> {
        let Target::Node { id } = node else {
            return Err(CanvasError::invalid(format!(
                "instance descendant '{node}' cannot be moved"
            )));
        };
        self.not_root(id, "moved")?;
        let current_parent = self
            .node(id)?
            .parent
            .clone()
            .ok_or_else(|| CanvasError::invalid(format!("'{id}' has no parent")))?;
        let new_parent = match parent {
            Some(target) => self.container_id(target)?,
            None => current_parent.clone(),
        };
        if self.is_in_subtree(id, &new_parent) {
            return Err(CanvasError::invalid(format!(
                "cannot move '{id}' into its own subtree"
            )));
        }

        let old_position = self
            .node(&current_parent)?
            .children
            .iter()
            .position(|c| c == id);
        let mut siblings = self.node(&new_parent)?.children.clone();
        siblings.retain(|c| c != id);
        let index = match (index, new_parent == current_parent) {
            (Some(i), _) => i,
            (None, true) => old_position.unwrap_or(siblings.len()),
            (None, false) => siblings.len(),
        };
        if index > siblings.len() {
            return Err(CanvasError::invalid(format!(
                "index {index} is out of range; '{new_parent}' would have {} children",
                siblings.len()
            )));
        }

        self.node_mut(&current_parent)?.children.retain(|c| c != id);
        self.node_mut(&new_parent)?.children.insert(index, id.clone());
        self.node_mut(id)?.parent = Some(new_parent);
        Ok(())
    }

    fn delete(&mut self, target: &Target) -> Result<(), CanvasError> {
        let Target::Node { id } = target else {
            return Err(CanvasError::invalid(format!(
                "instance descendant '{target}' cannot be deleted; set enabled: false or replace it"
            )));
        };
        self.not_root(id, "deleted")?;
        self.node(id)?;
        let doomed = self.ensure_unreferenced(id)?;
        self.remove_subtree(id, &doomed);
        Ok(())
    }

    fn apply_fill(&mut self, target: &Target, fill: &ImageFill) -> Result<(), CanvasError> {
        let node_type = self.node_type(target)?;
        if !node_type.can_carry_fill() {
            return Err(CanvasError::invalid(format!(
                "{node_type} nodes cannot carry an image fill; use a frame or rectangle"
            )));
        }
        match target {
            Target::Node { id } => {
                self.node_mut(id)?
                    .props
                    .insert("fill".into(), fill.to_value());
            }
            Target::InstanceDescendant { instance, path } => {
                self.override_entry(instance, &path.join("/"))?
                    .insert("fill".into(), fill.to_value());
            }
        }
        Ok(())
    }

    fn editor_state(&self, include_schema: bool) -> Value {
        self.editor_state_json(include_schema)
    }

    fn open_document(&mut self, path_or_template: &str) -> Result<Value, CanvasError> {
        self.open(path_or_template)
    }

    fn batch_get(&self, query: &BatchGetQuery) -> Result<Value, CanvasError> {
        self.batch_get_json(query)
    }

    fn snapshot_layout(&self, query: &LayoutQuery) -> Result<Value, CanvasError> {
        self.snapshot_layout_json(query)
    }

    fn variables(&self) -> Value {
        json!({ "variables": self.variables, "themes": self.themes })
    }

    fn set_variables(&mut self, variables: Props, replace: bool) -> Value {
        let updated: Vec<String> = variables.keys().cloned().collect();
        if replace {
            self.variables = variables;
        } else {
            self.variables.extend(variables);
        }
        json!({ "updated": updated, "total": self.variables.len() })
    }

    fn find_empty_space(&self, query: &EmptySpaceQuery) -> Result<Value, CanvasError> {
        self.find_empty_space_json(query)
    }

    fn search_unique_properties(
        &self,
        parents: &[String],
        properties: &[PropertyName],
    ) -> Result<Value, CanvasError> {
        self.unique_properties_json(parents, properties)
    }

    fn replace_matching_properties(
        &mut self,
        parents: &[String],
        replacements: &PropertyReplacements,
    ) -> Result<Value, CanvasError> {
        self.replace_properties(parents, replacements)
    }
}

/// Locate a `descendants` key (`seg/seg`) inside a freshly copied subtree.
/// Segments match the original ids, then names, then slots.
fn find_in_copy(out: &[Node], originals: &[Node], key: &str) -> Result<usize, CanvasError> {
    let mut current = 0usize;
    for segment in key.split('/').filter(|s| !s.is_empty()) {
        let kids: Vec<usize> = out[current]
            .children
            .iter()
            .filter_map(|c| out.iter().position(|n| &n.id == c))
            .collect();
        let mut found = None;
        for kind in [SegmentMatch::Id, SegmentMatch::Name, SegmentMatch::Slot] {
            let hits: Vec<usize> = kids
                .iter()
                .copied()
                .filter(|&i| originals[i].matches_segment(segment) == kind)
                .collect();
            match hits.as_slice() {
                [] => continue,
                [one] => {
                    found = Some(*one);
                    break;
                }
                _ => {
                    return Err(CanvasError::invalid(format!(
                        "descendant key '{key}' is ambiguous at '{segment}'"
                    )));
                }
            }
        }
        current = found.ok_or_else(|| {
            CanvasError::not_found(format!("descendant '{key}' in the copy"))
        })?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pengate_core::{Direction, Placement};

    fn props(v: Value) -> Props {
        v.as_object().cloned().unwrap()
    }

    fn root() -> Target {
        Target::node(ROOT_ID)
    }

    /// A document with a card component and one instance of it.
    fn with_component() -> InMemoryDocument {
        let mut doc = InMemoryDocument::new();
        doc.insert(
            &root(),
            props(json!({
                "type": "frame", "id": "Card", "reusable": true, "name": "Card",
                "children": [
                    {"type": "text", "id": "title", "name": "Title", "content": "Title"},
                    {"type": "frame", "id": "body", "slot": "content", "children": [
                        {"type": "rectangle", "id": "media", "name": "media"}
                    ]}
                ]
            })),
        )
        .unwrap();
        doc.insert(&root(), props(json!({"type": "ref", "id": "card1", "ref": "Card"})))
            .unwrap();
        doc
    }

    #[test]
    fn insert_creates_child_of_root() {
        let mut doc = InMemoryDocument::new();
        let id = doc.insert(&root(), props(json!({"type": "frame"}))).unwrap();
        assert_eq!(doc.children_of(ROOT_ID), vec![id.as_str()]);
        assert_eq!(doc.parent_of(&id), Some(ROOT_ID));
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn insert_into_leaf_is_invalid() {
        let mut doc = InMemoryDocument::new();
        let text = doc
            .insert(&root(), props(json!({"type": "text", "content": "x"})))
            .unwrap();
        let err = doc
            .insert(&Target::node(&text), props(json!({"type": "frame"})))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_operation");
    }

    #[test]
    fn resolve_by_id_name_and_slot() {
        let doc = with_component();
        assert_eq!(doc.resolve("Card/Title").unwrap(), Target::node("title"));
        assert_eq!(doc.resolve("Card/content/media").unwrap(), Target::node("media"));
        assert!(matches!(
            doc.resolve("Card/missing"),
            Err(CanvasError::NotFound(_))
        ));
    }

    #[test]
    fn ambiguous_segment_is_invalid() {
        let mut doc = InMemoryDocument::new();
        let f = doc.insert(&root(), props(json!({"type": "frame", "id": "f"}))).unwrap();
        for _ in 0..2 {
            doc.insert(&Target::node(&f), props(json!({"type": "text", "name": "label"})))
                .unwrap();
        }
        let err = doc.resolve("f/label").unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn instance_paths_resolve_inside_component() {
        let doc = with_component();
        assert_eq!(
            doc.resolve("card1/Title").unwrap(),
            Target::InstanceDescendant {
                instance: "card1".into(),
                path: vec!["title".into()]
            }
        );
        assert_eq!(
            doc.node_type(&doc.resolve("card1/content/media").unwrap()).unwrap(),
            NodeType::Rectangle
        );
    }

    #[test]
    fn instance_reached_mid_path_is_invalid() {
        let mut doc = with_component();
        doc.insert(&root(), props(json!({"type": "frame", "id": "screen"})))
            .unwrap();
        doc.move_node(&Target::node("card1"), Some(&Target::node("screen")), None)
            .unwrap();
        let err = doc.resolve("screen/card1/title").unwrap_err();
        assert_eq!(err.kind(), "invalid_operation");
        assert!(doc.resolve("screen/card1").is_ok());
    }

    #[test]
    fn update_instance_descendant_writes_override() {
        let mut doc = with_component();
        let target = doc.resolve("card1/title").unwrap();
        doc.update(&target, props(json!({"content": "Account"}))).unwrap();
        assert_eq!(
            doc.prop("card1", "descendants").unwrap()["title"]["content"],
            "Account"
        );
        // The component itself is untouched.
        assert_eq!(doc.prop("title", "content").unwrap(), "Title");
    }

    #[test]
    fn descendants_map_only_on_instances() {
        let mut doc = with_component();
        doc.update(
            &Target::node("card1"),
            props(json!({"descendants": {"Title": {"content": "Hi"}}})),
        )
        .unwrap();
        assert_eq!(
            doc.prop("card1", "descendants").unwrap()["title"]["content"],
            "Hi"
        );

        let err = doc
            .update(
                &Target::node("Card"),
                props(json!({"descendants": {"title": {"content": "x"}}})),
            )
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_operation");
    }

    #[test]
    fn update_rejects_identity_fields_and_null_removes() {
        let mut doc = with_component();
        assert!(doc
            .update(&Target::node("title"), props(json!({"id": "x"})))
            .is_err());
        doc.update(&Target::node("title"), props(json!({"content": null})))
            .unwrap();
        assert!(doc.prop("title", "content").is_none());
    }

    #[test]
    fn copy_gets_fresh_ids_and_descendant_patches() {
        let mut doc = with_component();
        let copy = doc
            .copy(
                &Target::node("Card"),
                &root(),
                CopyOptions {
                    overrides: props(json!({"name": "Card v2", "reusable": false})),
                    descendants: props(json!({"title": {"content": "Copied"}})),
                    placement: None,
                },
            )
            .unwrap();
        assert_ne!(copy, "Card");
        assert_eq!(doc.prop(&copy, "name").unwrap(), "Card v2");
        let kids = doc.children_of(&copy);
        assert_eq!(kids.len(), 2);
        assert_ne!(kids[0], "title");
        assert_eq!(doc.prop(kids[0], "content").unwrap(), "Copied");
        assert_eq!(doc.prop("title", "content").unwrap(), "Title");
    }

    #[test]
    fn copy_places_beside_source() {
        let mut doc = InMemoryDocument::new();
        let screen = doc
            .insert(
                &root(),
                props(json!({"type": "frame", "x": 0, "y": 0, "width": 400, "height": 300})),
            )
            .unwrap();
        let copy = doc
            .copy(
                &Target::node(&screen),
                &root(),
                CopyOptions {
                    placement: Some(Placement {
                        direction: Direction::Right,
                        padding: 100.0,
                    }),
                    ..CopyOptions::default()
                },
            )
            .unwrap();
        assert_eq!(doc.prop(&copy, "x").unwrap().as_f64(), Some(500.0));
        assert_eq!(doc.prop(&copy, "y").unwrap().as_f64(), Some(0.0));
    }

    #[test]
    fn replace_keeps_sibling_position() {
        let mut doc = InMemoryDocument::new();
        let a = doc.insert(&root(), props(json!({"type": "frame"}))).unwrap();
        let b = doc.insert(&root(), props(json!({"type": "frame"}))).unwrap();
        let c = doc.insert(&root(), props(json!({"type": "frame"}))).unwrap();
        let new = doc
            .replace(&Target::node(&b), props(json!({"type": "text", "content": "swap"})))
            .unwrap();
        assert_eq!(doc.children_of(ROOT_ID), vec![a.as_str(), new.as_str(), c.as_str()]);
        assert!(!doc.contains(&b));
    }

    #[test]
    fn replace_instance_slot_is_node_valued_override() {
        let mut doc = with_component();
        let target = doc.resolve("card1/content").unwrap();
        let id = doc
            .replace(&target, props(json!({"type": "text", "content": "Slot text"})))
            .unwrap();
        let over = &doc.prop("card1", "descendants").unwrap()["body"];
        assert_eq!(over["type"], "text");
        assert_eq!(over["id"], json!(id));
        assert_eq!(doc.node_type(&target).unwrap(), NodeType::Text);
    }

    #[test]
    fn move_rules() {
        let mut doc = InMemoryDocument::new();
        let outer = doc.insert(&root(), props(json!({"type": "frame"}))).unwrap();
        let inner = doc
            .insert(&Target::node(&outer), props(json!({"type": "frame"})))
            .unwrap();
        let other = doc.insert(&root(), props(json!({"type": "frame"}))).unwrap();

        assert!(doc.move_node(&root(), None, None).is_err());
        assert!(doc
            .move_node(&Target::node(&outer), Some(&Target::node(&inner)), None)
            .is_err());

        doc.move_node(&Target::node(&other), None, Some(0)).unwrap();
        assert_eq!(doc.children_of(ROOT_ID), vec![other.as_str(), outer.as_str()]);

        doc.move_node(&Target::node(&inner), Some(&root()), None).unwrap();
        assert_eq!(doc.children_of(ROOT_ID).last(), Some(&inner.as_str()));
        assert!(doc.move_node(&Target::node(&inner), None, Some(9)).is_err());
    }

    #[test]
    fn delete_rules() {
        let mut doc = with_component();
        assert!(doc.delete(&root()).is_err());
        let target = doc.resolve("card1/title").unwrap();
        assert!(doc.delete(&target).is_err());
        // Component still used by card1.
        assert!(doc.delete(&Target::node("Card")).is_err());

        doc.delete(&Target::node("card1")).unwrap();
        doc.delete(&Target::node("Card")).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn fill_requires_frame_or_rectangle() {
        let mut doc = with_component();
        let fill = ImageFill::new("https://img/1");
        assert!(doc.apply_fill(&Target::node("title"), &fill).is_err());
        doc.apply_fill(&Target::node("media"), &fill).unwrap();
        assert_eq!(doc.prop("media", "fill").unwrap()["type"], "image");
    }

    #[test]
    fn instance_inside_own_component_is_rejected() {
        let mut doc = with_component();
        let err = doc
            .insert(&Target::node("body"), props(json!({"type": "ref", "ref": "Card"})))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_operation");
    }

    #[test]
    fn failed_insert_leaves_tree_untouched() {
        let mut doc = InMemoryDocument::new();
        let before = doc.len();
        let err = doc.insert(
            &root(),
            props(json!({"type": "frame", "children": [{"type": "ref", "ref": "nope"}]})),
        );
        assert!(err.is_err());
        assert_eq!(doc.len(), before);
    }
}
