//! Typed inputs for the read-only and bulk document queries.
//!
//! These are decoded straight from tool arguments, so every struct rejects
//! unknown fields and the enums are closed.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::document::{Direction, NodeType};

/// One search pattern for `batch_get`. All present fields must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodePattern {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    /// Regular expression matched against the node name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reusable: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BatchGetQuery {
    #[serde(default)]
    pub patterns: Option<Vec<NodePattern>>,
    #[serde(default)]
    pub node_ids: Option<Vec<String>>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub read_depth: Option<u32>,
    #[serde(default)]
    pub search_depth: Option<u32>,
    #[serde(default)]
    pub resolve_instances: Option<bool>,
    #[serde(default)]
    pub resolve_variables: Option<bool>,
    #[serde(default)]
    pub include_path_geometry: Option<bool>,
}

impl BatchGetQuery {
    pub const DEFAULT_READ_DEPTH: u32 = 1;

    pub fn read_depth(&self) -> u32 {
        self.read_depth.unwrap_or(Self::DEFAULT_READ_DEPTH)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LayoutQuery {
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub max_depth: Option<u32>,
    #[serde(default)]
    pub problems_only: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EmptySpaceQuery {
    pub direction: Direction,
    pub width: f64,
    pub height: f64,
    pub padding: f64,
    #[serde(default)]
    pub node_id: Option<String>,
}

/// Properties that can be audited or bulk-replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyName {
    FillColor,
    TextColor,
    StrokeColor,
    StrokeThickness,
    CornerRadius,
    Padding,
    Gap,
    FontSize,
    FontFamily,
    FontWeight,
}

impl PropertyName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyName::FillColor => "fillColor",
            PropertyName::TextColor => "textColor",
            PropertyName::StrokeColor => "strokeColor",
            PropertyName::StrokeThickness => "strokeThickness",
            PropertyName::CornerRadius => "cornerRadius",
            PropertyName::Padding => "padding",
            PropertyName::Gap => "gap",
            PropertyName::FontSize => "fontSize",
            PropertyName::FontFamily => "fontFamily",
            PropertyName::FontWeight => "fontWeight",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Swap<T> {
    pub from: T,
    pub to: T,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PropertyReplacements {
    #[serde(default)]
    pub fill_color: Option<Vec<Swap<String>>>,
    #[serde(default)]
    pub text_color: Option<Vec<Swap<String>>>,
    #[serde(default)]
    pub stroke_color: Option<Vec<Swap<String>>>,
    #[serde(default)]
    pub stroke_thickness: Option<Vec<Swap<f64>>>,
    #[serde(default)]
    pub corner_radius: Option<Vec<Swap<Vec<f64>>>>,
    #[serde(default)]
    pub padding: Option<Vec<Swap<f64>>>,
    #[serde(default)]
    pub gap: Option<Vec<Swap<f64>>>,
    #[serde(default)]
    pub font_size: Option<Vec<Swap<f64>>>,
    #[serde(default)]
    pub font_family: Option<Vec<Swap<String>>>,
    #[serde(default)]
    pub font_weight: Option<Vec<Swap<String>>>,
}

impl PropertyReplacements {
    /// Flatten into `(property, from, to)` triples with JSON values.
    pub fn pairs(&self) -> Vec<(PropertyName, Value, Value)> {
        fn push<T: Serialize>(
            out: &mut Vec<(PropertyName, Value, Value)>,
            name: PropertyName,
            swaps: &Option<Vec<Swap<T>>>,
        ) {
            for swap in swaps.iter().flatten() {
                out.push((name, json!(swap.from), json!(swap.to)));
            }
        }

        let mut out = Vec::new();
        push(&mut out, PropertyName::FillColor, &self.fill_color);
        push(&mut out, PropertyName::TextColor, &self.text_color);
        push(&mut out, PropertyName::StrokeColor, &self.stroke_color);
        push(&mut out, PropertyName::StrokeThickness, &self.stroke_thickness);
        push(&mut out, PropertyName::CornerRadius, &self.corner_radius);
        push(&mut out, PropertyName::Padding, &self.padding);
        push(&mut out, PropertyName::Gap, &self.gap);
        push(&mut out, PropertyName::FontSize, &self.font_size);
        push(&mut out, PropertyName::FontFamily, &self.font_family);
        push(&mut out, PropertyName::FontWeight, &self.font_weight);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_get_rejects_unknown_fields() {
        let err = serde_json::from_value::<BatchGetQuery>(json!({"nodeId": "x"}));
        assert!(err.is_err());
        let ok: BatchGetQuery =
            serde_json::from_value(json!({"nodeIds": ["a"], "readDepth": 2})).unwrap();
        assert_eq!(ok.read_depth(), 2);
    }

    #[test]
    fn pattern_type_is_closed() {
        assert!(serde_json::from_value::<NodePattern>(json!({"type": "button"})).is_err());
        let p: NodePattern = serde_json::from_value(json!({"type": "icon_font"})).unwrap();
        assert_eq!(p.node_type, Some(NodeType::IconFont));
    }

    #[test]
    fn replacements_flatten_in_declaration_order() {
        let r: PropertyReplacements = serde_json::from_value(json!({
            "gap": [{"from": 8, "to": 12}],
            "fillColor": [{"from": "#fff", "to": "$--background"}],
        }))
        .unwrap();
        let pairs = r.pairs();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, PropertyName::FillColor);
        assert_eq!(pairs[1], (PropertyName::Gap, json!(8.0), json!(12.0)));
    }

    #[test]
    fn empty_space_requires_direction() {
        assert!(serde_json::from_value::<EmptySpaceQuery>(
            json!({"width": 10, "height": 10, "padding": 0})
        )
        .is_err());
    }
}
