//! A small flexbox-style layout pass over the in-memory document.
//!
//! Sizes are numbers or one of `fill_container`, `fit_content`,
//! `fill_container(n)` and `fit_content(n)`. Frames with `layout:
//! "vertical" | "horizontal"` stack their children with `padding` and `gap`;
//! anything else positions children by their own `x`/`y`.

use std::collections::HashMap;

use pengate_core::{CanvasError, Direction, EmptySpaceQuery, LayoutQuery, NodeType};
use serde_json::{Value, json};

use crate::document::{InMemoryDocument, ROOT_ID};
use crate::node::Node;

const DEFAULT_SIZE: f64 = 100.0;
const DEFAULT_FONT_SIZE: f64 = 16.0;
/// Shift attempts before `find_empty_space` gives up.
const MAX_PLACEMENT_ATTEMPTS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Does `other` lie within this rect (with a small tolerance)?
    pub fn contains(&self, other: &Rect) -> bool {
        const EPS: f64 = 0.5;
        other.x >= self.x - EPS
            && other.y >= self.y - EPS
            && other.right() <= self.right() + EPS
            && other.bottom() <= self.bottom() + EPS
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    fn inflate(&self, by: f64) -> Rect {
        Rect::new(self.x - by, self.y - by, self.width + 2.0 * by, self.height + 2.0 * by)
    }

    /// Origin for a same-sized box placed `padding` away in `direction`.
    pub fn beside(&self, direction: Direction, padding: f64) -> (f64, f64) {
        match direction {
            Direction::Right => (self.right() + padding, self.y),
            Direction::Left => (self.x - padding - self.width, self.y),
            Direction::Bottom => (self.x, self.bottom() + padding),
            Direction::Top => (self.x, self.y - padding - self.height),
        }
    }

    fn to_json(self) -> Value {
        json!({ "x": self.x, "y": self.y, "width": self.width, "height": self.height })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Size {
    Fixed(f64),
    Fill(Option<f64>),
    Fit(Option<f64>),
    Unset,
}

fn parse_size(value: Option<&Value>) -> Size {
    match value {
        Some(Value::Number(n)) => n.as_f64().map_or(Size::Unset, Size::Fixed),
        Some(Value::String(s)) => {
            let (name, arg) = match s.split_once('(') {
                Some((name, rest)) => (name.trim(), rest.trim_end_matches(')').trim().parse().ok()),
                None => (s.trim(), None),
            };
            match name {
                "fill_container" => Size::Fill(arg),
                "fit_content" => Size::Fit(arg),
                _ => Size::Unset,
            }
        }
        _ => Size::Unset,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Flow {
    Vertical,
    Horizontal,
    Free,
}

fn flow(node: &Node) -> Flow {
    match node.props.get("layout").and_then(Value::as_str) {
        Some("vertical") => Flow::Vertical,
        Some("horizontal") => Flow::Horizontal,
        _ => Flow::Free,
    }
}

/// Top, right, bottom, left.
fn padding(node: &Node) -> [f64; 4] {
    match node.props.get("padding") {
        Some(Value::Number(n)) => [n.as_f64().unwrap_or(0.0); 4],
        Some(Value::Array(items)) => {
            let v: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
            match v.as_slice() {
                [all] => [*all; 4],
                [vertical, horizontal] => [*vertical, *horizontal, *vertical, *horizontal],
                [t, r, b, l] => [*t, *r, *b, *l],
                _ => [0.0; 4],
            }
        }
        _ => [0.0; 4],
    }
}

fn number(node: &Node, key: &str) -> f64 {
    node.props.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn enabled(node: &Node) -> bool {
    node.props.get("enabled").and_then(Value::as_bool) != Some(false)
}

/// One laid-out node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placed {
    pub rect: Rect,
    pub problem: Option<&'static str>,
}

impl InMemoryDocument {
    fn visible_children(&self, node: &Node) -> Vec<&Node> {
        node.children
            .iter()
            .filter_map(|c| self.nodes.get(c))
            .filter(|n| enabled(n))
            .collect()
    }

    /// Natural size, with `fill_container` counted as its minimum.
    fn measure(&self, node: &Node) -> (f64, f64) {
        if let Some(component) = node.component().and_then(|c| self.nodes.get(c)) {
            let (cw, ch) = self.measure(component);
            let w = match parse_size(node.props.get("width")) {
                Size::Fixed(v) => v,
                _ => cw,
            };
            let h = match parse_size(node.props.get("height")) {
                Size::Fixed(v) => v,
                _ => ch,
            };
            return (w, h);
        }

        let (content_w, content_h) = self.content_size(node);
        let resolve = |size: Size, content: f64| match size {
            Size::Fixed(v) => v,
            Size::Fill(min) => min.unwrap_or(0.0),
            Size::Fit(min) => content.max(min.unwrap_or(0.0)),
            Size::Unset => content,
        };
        (
            resolve(parse_size(node.props.get("width")), content_w),
            resolve(parse_size(node.props.get("height")), content_h),
        )
    }

    /// Size a node would take from its content alone.
    fn content_size(&self, node: &Node) -> (f64, f64) {
        match node.node_type {
            NodeType::Text => {
                let size = node
                    .props
                    .get("fontSize")
                    .and_then(Value::as_f64)
                    .unwrap_or(DEFAULT_FONT_SIZE);
                let content = node.props.get("content").and_then(Value::as_str).unwrap_or("");
                let longest = content.lines().map(|l| l.chars().count()).max().unwrap_or(0);
                let lines = content.lines().count().max(1);
                (longest as f64 * size * 0.55, lines as f64 * size * 1.2)
            }
            NodeType::IconFont => {
                let size = node.props.get("size").and_then(Value::as_f64).unwrap_or(24.0);
                (size, size)
            }
            NodeType::Frame | NodeType::Group => {
                let kids = self.visible_children(node);
                if kids.is_empty() {
                    let fallback = if node.node_type == NodeType::Frame { DEFAULT_SIZE } else { 0.0 };
                    return (fallback, fallback);
                }
                let [t, r, b, l] = padding(node);
                let gap = number(node, "gap") * (kids.len() - 1) as f64;
                let sizes: Vec<(f64, f64)> = kids.iter().map(|k| self.measure(k)).collect();
                let (w, h) = match flow(node) {
                    Flow::Vertical => (
                        sizes.iter().map(|s| s.0).fold(0.0, f64::max),
                        sizes.iter().map(|s| s.1).sum::<f64>() + gap,
                    ),
                    Flow::Horizontal => (
                        sizes.iter().map(|s| s.0).sum::<f64>() + gap,
                        sizes.iter().map(|s| s.1).fold(0.0, f64::max),
                    ),
                    Flow::Free => kids.iter().zip(&sizes).fold((0.0_f64, 0.0_f64), |(w, h), (k, s)| {
                        (w.max(number(k, "x") + s.0), h.max(number(k, "y") + s.1))
                    }),
                };
                (w + l + r, h + t + b)
            }
            _ => (DEFAULT_SIZE, DEFAULT_SIZE),
        }
    }

    /// Absolute rects for every visible node.
    pub fn compute_layout(&self) -> HashMap<String, Rect> {
        self.layout_with_problems()
            .into_iter()
            .map(|(id, placed)| (id, placed.rect))
            .collect()
    }

    pub(crate) fn layout_with_problems(&self) -> HashMap<String, Placed> {
        let mut out = HashMap::new();
        let Some(root) = self.nodes.get(ROOT_ID) else {
            return out;
        };
        let mut bounds: Option<Rect> = None;
        for child in self.visible_children(root) {
            let (w, h) = self.measure(child);
            let rect = Rect::new(number(child, "x"), number(child, "y"), w, h);
            bounds = Some(bounds.map_or(rect, |b| b.union(&rect)));
            self.place(child, rect, &mut out);
        }
        out.insert(
            ROOT_ID.to_string(),
            Placed {
                rect: bounds.unwrap_or_default(),
                problem: None,
            },
        );
        out
    }

    fn place(&self, node: &Node, rect: Rect, out: &mut HashMap<String, Placed>) {
        out.entry(node.id.clone()).or_insert(Placed {
            rect,
            problem: None,
        });
        if node.node_type == NodeType::Ref {
            return;
        }
        let kids = self.visible_children(node);
        if kids.is_empty() {
            return;
        }

        let [t, r, b, l] = padding(node);
        let inner = Rect::new(
            rect.x + l,
            rect.y + t,
            (rect.width - l - r).max(0.0),
            (rect.height - t - b).max(0.0),
        );
        let gap = number(node, "gap");
        let flow = flow(node);
        let vertical = flow == Flow::Vertical;

        // Main-axis space left for fill_container children.
        let is_fill = |k: &Node| {
            let main = k.props.get(if vertical { "height" } else { "width" });
            matches!(parse_size(main), Size::Fill(_))
        };
        let fixed: f64 = kids
            .iter()
            .copied()
            .filter(|&k| !is_fill(k))
            .map(|k| {
                let (w, h) = self.measure(k);
                if vertical { h } else { w }
            })
            .sum();
        let fills = kids.iter().copied().filter(|&k| is_fill(k)).count();
        let available = if vertical { inner.height } else { inner.width };
        let free = (available - fixed - gap * (kids.len() - 1) as f64).max(0.0);
        let share = if fills > 0 { free / fills as f64 } else { 0.0 };

        let mut cursor = if vertical { inner.y } else { inner.x };
        for kid in kids {
            let (mut w, mut h) = self.measure(kid);
            let child_rect = match flow {
                Flow::Free => Rect::new(rect.x + number(kid, "x"), rect.y + number(kid, "y"), w, h),
                Flow::Vertical | Flow::Horizontal => {
                    let width_size = parse_size(kid.props.get("width"));
                    let height_size = parse_size(kid.props.get("height"));
                    if vertical {
                        if let Size::Fill(min) = height_size {
                            h = share.max(min.unwrap_or(0.0));
                        }
                        if let Size::Fill(min) = width_size {
                            w = inner.width.max(min.unwrap_or(0.0));
                        }
                        let placed = Rect::new(inner.x, cursor, w, h);
                        cursor += h + gap;
                        placed
                    } else {
                        if let Size::Fill(min) = width_size {
                            w = share.max(min.unwrap_or(0.0));
                        }
                        if let Size::Fill(min) = height_size {
                            h = inner.height.max(min.unwrap_or(0.0));
                        }
                        let placed = Rect::new(cursor, inner.y, w, h);
                        cursor += w + gap;
                        placed
                    }
                }
            };
            let problem = if rect.contains(&child_rect) {
                None
            } else if node.props.get("clip").and_then(Value::as_bool) == Some(true) {
                Some("clipped")
            } else {
                Some("overflow")
            };
            out.insert(
                kid.id.clone(),
                Placed {
                    rect: child_rect,
                    problem,
                },
            );
            self.place(kid, child_rect, out);
        }
    }

    pub(crate) fn snapshot_layout_json(&self, query: &LayoutQuery) -> Result<Value, CanvasError> {
        let parent = query.parent_id.as_deref().unwrap_or(ROOT_ID);
        let start = self.node(parent)?;
        let layout = self.layout_with_problems();
        let max_depth = query.max_depth.unwrap_or(1);

        if query.problems_only == Some(true) {
            let mut problems = Vec::new();
            for id in self.subtree_ids(parent).iter().skip(1) {
                if let (Some(node), Some(placed)) = (self.nodes.get(id), layout.get(id)) {
                    if let Some(problem) = placed.problem {
                        problems.push(json!({
                            "id": node.id,
                            "name": node.name(),
                            "problem": problem,
                            "rect": placed.rect.to_json(),
                        }));
                    }
                }
            }
            return Ok(json!({ "parentId": parent, "problems": problems }));
        }

        let children: Vec<Value> = self
            .visible_children(start)
            .into_iter()
            .filter_map(|kid| self.snapshot_node(kid, &layout, 1, max_depth))
            .collect();
        Ok(json!({
            "parentId": parent,
            "rect": layout.get(parent).map(|p| p.rect.to_json()),
            "children": children,
        }))
    }

    fn snapshot_node(
        &self,
        node: &Node,
        layout: &HashMap<String, Placed>,
        depth: u32,
        max_depth: u32,
    ) -> Option<Value> {
        let placed = layout.get(&node.id)?;
        let mut entry = json!({
            "id": node.id,
            "type": node.node_type,
            "rect": placed.rect.to_json(),
        });
        if let Some(name) = node.name() {
            entry["name"] = json!(name);
        }
        if let Some(problem) = placed.problem {
            entry["problem"] = json!(problem);
        }
        let kids = self.visible_children(node);
        if !kids.is_empty() && node.node_type != NodeType::Ref {
            if depth < max_depth {
                let children: Vec<Value> = kids
                    .into_iter()
                    .filter_map(|k| self.snapshot_node(k, layout, depth + 1, max_depth))
                    .collect();
                entry["children"] = Value::Array(children);
            } else {
                entry["childCount"] = json!(kids.len());
            }
        }
        Some(entry)
    }

    pub(crate) fn find_empty_space_json(&self, query: &EmptySpaceQuery) -> Result<Value, CanvasError> {
        if query.width <= 0.0 || query.height <= 0.0 {
            return Err(CanvasError::invalid("width and height must be positive"));
        }
        let layout = self.compute_layout();
        let top_level: Vec<Rect> = self
            .children_of(ROOT_ID)
            .iter()
            .filter_map(|id| layout.get(*id).copied())
            .collect();

        let reference = match &query.node_id {
            Some(id) => {
                self.node(id)?;
                layout
                    .get(id)
                    .copied()
                    .ok_or_else(|| CanvasError::invalid(format!("node '{id}' is not visible")))?
            }
            None => top_level
                .iter()
                .copied()
                .reduce(|a, b| a.union(&b))
                .unwrap_or_default(),
        };

        let (x, y) = match query.direction {
            Direction::Right => (reference.right() + query.padding, reference.y),
            Direction::Left => (reference.x - query.padding - query.width, reference.y),
            Direction::Bottom => (reference.x, reference.bottom() + query.padding),
            Direction::Top => (reference.x, reference.y - query.padding - query.height),
        };
        let mut candidate = Rect::new(x, y, query.width, query.height);
        if top_level.is_empty() && query.node_id.is_none() {
            candidate.x = 0.0;
            candidate.y = 0.0;
        }

        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let hit = top_level
                .iter()
                .find(|r| r.inflate(query.padding).intersects(&candidate));
            let Some(hit) = hit else {
                return Ok(json!({
                    "x": candidate.x,
                    "y": candidate.y,
                    "width": candidate.width,
                    "height": candidate.height,
                    "direction": query.direction,
                    "relativeTo": query.node_id.as_deref().unwrap_or(ROOT_ID),
                }));
            };
            match query.direction {
                Direction::Right => candidate.x = hit.right() + query.padding,
                Direction::Left => candidate.x = hit.x - query.padding - candidate.width,
                Direction::Bottom => candidate.y = hit.bottom() + query.padding,
                Direction::Top => candidate.y = hit.y - query.padding - candidate.height,
            }
        }
        Err(CanvasError::invalid("no empty space found in that direction"))
    }
}
